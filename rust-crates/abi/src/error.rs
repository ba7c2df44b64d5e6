use thiserror::Error;

pub type Result<T, E = AbiError> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("decoding error: {0}")]
    Decoding(String),
    /// Selector or signature disagreement; a deployment problem, never retried.
    #[error("ABI registry error: {0}")]
    Registry(String),
}
