/// Intercepted fnOS search endpoint (POST only).
pub const MAGIC_SEARCH_PATH: &str = "/p/api/v1/magic-search/do";
/// fnOS single-item detail endpoint, queried as `?id=<id>`.
pub const GALLERY_GET_ONE_PATH: &str = "/p/api/v1/gallery/getOne";
/// Immich metadata search, authenticated with `?apiKey=`.
pub const IMMICH_METADATA_SEARCH_PATH: &str = "/api/search/metadata";

pub const DELEGATE_LOGIN_PATH: &str = "/login";
pub const DELEGATE_SIGN_PATH: &str = "/gen_photo_sign";

/// Header carrying the delegate-generated request signature.
pub const HEADER_SIGNATURE: &str = "authx";
/// Header carrying the caller's fnOS access token.
pub const HEADER_ACCESS_TOKEN: &str = "accesstoken";

/// `status` value the delegate reports for a usable signature.
pub const SIGN_STATUS_SUCCESS: &str = "success";

pub const CODE_OK: i32 = 0;
pub const CODE_ERROR: i32 = 1;
pub const MSG_SUCCESS: &str = "success";

pub const OCR_PAGE: u32 = 1;
pub const OCR_PAGE_SIZE: u32 = 1000;
pub const OCR_LANGUAGE: &str = "en";

/// Path (with query) that is both requested and signed for one detail fetch.
pub fn gallery_item_path(id: i64) -> String {
    format!("{GALLERY_GET_ONE_PATH}?id={id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_path_includes_id_query() {
        assert_eq!(gallery_item_path(42), "/p/api/v1/gallery/getOne?id=42");
        assert_eq!(gallery_item_path(-1), "/p/api/v1/gallery/getOne?id=-1");
    }
}
