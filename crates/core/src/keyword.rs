//! Keyword classification for the magic-search endpoint and caller detection.

/// Marker that routes a magic-search keyword to the OCR index.
pub const OCR_PREFIX: &str = "ocr:";

/// Substring of the mobile app's User-Agent (its HTTP stack is OkHttp).
pub const MOBILE_USER_AGENT_MARKER: &str = "okhttp";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode<'a> {
    /// Plain keyword; the backend handles it natively.
    Native,
    /// OCR search with the prefix removed.
    Ocr(&'a str),
}

/// Strips [`OCR_PREFIX`] exactly once. Everything after the prefix is kept
/// verbatim, including whitespace and a repeated prefix.
pub fn classify_keyword(keyword: &str) -> SearchMode<'_> {
    match keyword.strip_prefix(OCR_PREFIX) {
        Some(text) => SearchMode::Ocr(text),
        None => SearchMode::Native,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientKind {
    Mobile,
    Other,
}

impl ClientKind {
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        match user_agent {
            Some(ua) if ua.contains(MOBILE_USER_AGENT_MARKER) => ClientKind::Mobile,
            _ => ClientKind::Other,
        }
    }

    pub fn is_mobile(self) -> bool {
        matches!(self, ClientKind::Mobile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_prefix_is_stripped_once() {
        assert_eq!(classify_keyword("ocr:cat"), SearchMode::Ocr("cat"));
        assert_eq!(classify_keyword("ocr:"), SearchMode::Ocr(""));
        assert_eq!(classify_keyword("ocr:ocr:cat"), SearchMode::Ocr("ocr:cat"));
        assert_eq!(classify_keyword("ocr: two words "), SearchMode::Ocr(" two words "));
    }

    #[test]
    fn keywords_without_prefix_are_native() {
        assert_eq!(classify_keyword("cat"), SearchMode::Native);
        assert_eq!(classify_keyword(""), SearchMode::Native);
        assert_eq!(classify_keyword("OCR:cat"), SearchMode::Native);
        assert_eq!(classify_keyword(" ocr:cat"), SearchMode::Native);
    }

    #[test]
    fn okhttp_user_agent_is_mobile() {
        assert!(ClientKind::from_user_agent(Some("okhttp/4.12.0")).is_mobile());
        assert!(!ClientKind::from_user_agent(Some("Mozilla/5.0 (X11; Linux x86_64)")).is_mobile());
        assert_eq!(ClientKind::from_user_agent(None), ClientKind::Other);
    }
}
