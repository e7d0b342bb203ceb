//! Request/response shapes exchanged with callers and with the three
//! upstream services (fnOS, Immich, the signing delegate).

pub mod endpoints;
pub mod wire;

pub use endpoints::*;
pub use wire::*;
