//! Core domain model, path rewriting, and the collaborator traits the
//! search pipeline is written against.
//! No IO within this crate.

pub mod errors;
pub mod keyword;
pub mod model;
pub mod paths;
pub mod traits;

pub use crate::errors::ValidationError;
pub use crate::keyword::{classify_keyword, ClientKind, SearchMode, OCR_PREFIX};
pub use crate::model::{Credential, GalleryItem, MagicSearchPayload, PhotoId, SearchHit, Session};
pub use crate::paths::{PathRewriter, PathRule};
pub use crate::traits::{AssetIndex, GalleryFetcher, MetadataStore};
