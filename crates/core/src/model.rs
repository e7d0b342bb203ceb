use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Backend-internal photo key (`user_photo.id`).
pub type PhotoId = i64;

/// One cookie as reported by the auth delegate or forwarded from the caller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Credential {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "httpOnly", default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(rename = "sameSite", default)]
    pub same_site: String,
}

impl Credential {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    fn cookie_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Per-request credentials used to call the backend on the caller's behalf.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub cookies: Vec<Credential>,
    pub access_token: String,
}

impl Session {
    pub fn new(cookies: Vec<Credential>, access_token: impl Into<String>) -> Self {
        Self {
            cookies,
            access_token: access_token.into(),
        }
    }

    /// Parses a raw `Cookie` request header (`a=1; b=2`).
    pub fn parse_cookie_header(raw: &str) -> Vec<Credential> {
        raw.split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some(Credential::new(name, value.trim()))
            })
            .collect()
    }

    /// Value for an outbound `Cookie` header, `None` when there are no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self.cookies.iter().map(Credential::cookie_pair).collect();
        Some(pairs.join("; "))
    }

    pub fn has_cookies(&self) -> bool {
        !self.cookies.is_empty()
    }
}

/// One OCR index hit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    #[serde(rename = "originalPath", default)]
    pub original_path: String,
}

/// Detail record returned by the gallery API. Carried as an opaque document;
/// only `id` is read.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct GalleryItem(Value);

impl GalleryItem {
    /// Wraps a detail payload. `null` payloads yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.0.as_object().and_then(|obj| obj.get("id"))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// The `data` member of a magic-search response.
#[derive(Clone, Debug, PartialEq)]
pub enum MagicSearchPayload {
    /// Serialized as `[]`.
    Empty,
    /// Serialized as `{"idList": [...]}`.
    IdList(Vec<PhotoId>),
    /// Serialized as `{"list": [...], "idList": [...]}`.
    Detailed {
        list: Vec<GalleryItem>,
        id_list: Vec<Value>,
    },
}

impl MagicSearchPayload {
    /// Builds the detailed shape, deriving `idList` from each item's `id`.
    pub fn detailed(list: Vec<GalleryItem>) -> Self {
        let id_list = list
            .iter()
            .filter_map(|item| item.id().cloned())
            .collect();
        MagicSearchPayload::Detailed { list, id_list }
    }

    pub fn len(&self) -> usize {
        match self {
            MagicSearchPayload::Empty => 0,
            MagicSearchPayload::IdList(ids) => ids.len(),
            MagicSearchPayload::Detailed { list, .. } => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for MagicSearchPayload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            MagicSearchPayload::Empty => serializer.collect_seq(std::iter::empty::<()>()),
            MagicSearchPayload::IdList(ids) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("idList", ids)?;
                map.end()
            }
            MagicSearchPayload::Detailed { list, id_list } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("list", list)?;
                map.serialize_entry("idList", id_list)?;
                map.end()
            }
        }
    }
}
