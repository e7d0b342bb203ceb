use fnos_proxy_core::model::{Credential, SearchHit};
use serde::de::{Error as _, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::endpoints::{CODE_ERROR, CODE_OK, MSG_SUCCESS, OCR_LANGUAGE, OCR_PAGE, OCR_PAGE_SIZE};

/// Body of `POST /p/api/v1/magic-search/do`. Other fields sent by the fnOS
/// web client are ignored here and preserved when the body is forwarded.
///
/// Parsing is lenient the way the fnOS backend is: a `null` body or keyword
/// reads as an empty keyword, and the key is matched case-insensitively
/// when no exact `keyword` is present.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct MagicSearchRequest {
    pub keyword: String,
}

impl<'de> Deserialize<'de> for MagicSearchRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(fields) = Option::<Map<String, Value>>::deserialize(deserializer)? else {
            return Ok(MagicSearchRequest::default());
        };
        let value = fields.get("keyword").or_else(|| {
            fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("keyword"))
                .map(|(_, value)| value)
        });
        let keyword = match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(D::Error::invalid_type(unexpected(other), &"a string")),
        };
        Ok(MagicSearchRequest { keyword })
    }
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
        Value::Null => Unexpected::Unit,
        Value::String(s) => Unexpected::Str(s),
    }
}

/// `{code, msg, data}` envelope used by fnOS and by this proxy's own errors.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub code: i32,
    pub msg: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_OK,
            msg: MSG_SUCCESS.to_string(),
            data,
        }
    }
}

impl Envelope<Option<Value>> {
    /// Error envelope; `data` serializes as `null`.
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            code: CODE_ERROR,
            msg: msg.into(),
            data: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub data: Vec<Credential>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignRequest {
    pub method: String,
    pub url: String,
    pub data: Option<Value>,
    pub params: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AssetSearchRequest {
    pub page: u32,
    pub size: u32,
    #[serde(rename = "isVisible")]
    pub is_visible: bool,
    pub language: String,
    pub ocr: String,
}

impl AssetSearchRequest {
    /// Single large page of visible assets matching `text`.
    pub fn ocr(text: &str) -> Self {
        Self {
            page: OCR_PAGE,
            size: OCR_PAGE_SIZE,
            is_visible: true,
            language: OCR_LANGUAGE.to_string(),
            ocr: text.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetsPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub items: Vec<SearchHit>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetSearchResponse {
    pub assets: AssetsPage,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GalleryResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ocr_request_has_fixed_paging() {
        let body = serde_json::to_value(AssetSearchRequest::ocr("cat")).unwrap();
        assert_eq!(
            body,
            json!({"page": 1, "size": 1000, "isVisible": true, "language": "en", "ocr": "cat"})
        );
    }

    #[test]
    fn error_envelope_has_null_data() {
        let body = serde_json::to_value(Envelope::error("Invalid JSON format")).unwrap();
        assert_eq!(body, json!({"code": 1, "msg": "Invalid JSON format", "data": null}));
    }

    #[test]
    fn asset_response_tolerates_extra_fields() {
        let raw = json!({
            "assets": {
                "total": 2,
                "count": 2,
                "items": [
                    {"id": "u1", "originalPath": "/mnt/a/1.jpg"},
                    {"id": "u2", "originalPath": "/mnt/a/2.jpg"}
                ],
                "nextPage": null
            },
            "albums": {}
        });
        let parsed: AssetSearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.assets.items.len(), 2);
        assert_eq!(parsed.assets.items[1].original_path, "/mnt/a/2.jpg");
    }

    #[test]
    fn gallery_response_missing_data_is_null() {
        let parsed: GalleryResponse = serde_json::from_value(json!({"code": 0, "msg": "ok"})).unwrap();
        assert!(parsed.data.is_null());
    }

    #[test]
    fn magic_search_request_ignores_unknown_fields() {
        let req: MagicSearchRequest =
            serde_json::from_str(r#"{"keyword":"ocr:sign","limit":20}"#).unwrap();
        assert_eq!(req.keyword, "ocr:sign");
        let missing: MagicSearchRequest = serde_json::from_str(r#"{"limit":20}"#).unwrap();
        assert_eq!(missing.keyword, "");
        assert!(serde_json::from_str::<MagicSearchRequest>(r#"{"keyword":5}"#).is_err());
        assert!(serde_json::from_str::<MagicSearchRequest>("not json").is_err());
    }

    #[test]
    fn magic_search_request_tolerates_nulls_and_key_case() {
        let null_keyword: MagicSearchRequest = serde_json::from_str(r#"{"keyword":null}"#).unwrap();
        assert_eq!(null_keyword.keyword, "");
        let null_body: MagicSearchRequest = serde_json::from_str("null").unwrap();
        assert_eq!(null_body.keyword, "");

        let folded: MagicSearchRequest = serde_json::from_str(r#"{"KeyWord":"ocr:cat"}"#).unwrap();
        assert_eq!(folded.keyword, "ocr:cat");
        let exact_wins: MagicSearchRequest =
            serde_json::from_str(r#"{"Keyword":"ocr:a","keyword":"ocr:b"}"#).unwrap();
        assert_eq!(exact_wins.keyword, "ocr:b");

        assert!(serde_json::from_str::<MagicSearchRequest>("[1]").is_err());
        assert!(serde_json::from_str::<MagicSearchRequest>(r#"{"Keyword":true}"#).is_err());
    }
}
