use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("path rule prefix must not be empty")]
    EmptyRulePrefix,
    #[error("duplicate path rule prefix: {0}")]
    DuplicateRulePrefix(String),
}
