/// Error taxonomy for the tender and bid workflow.
///
/// Only [`Error::Conflict`] is safe for the caller to retry, after re-reading
/// the entity. Everything else is terminal for the current request.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("identity could not be resolved")]
    Unauthenticated,
    #[error("identity is not responsible for the owning organization")]
    Forbidden,
    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("entity was modified concurrently, retry from a fresh read")]
    Conflict,
    #[error("storage failure")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record")]
    Decode(#[from] minicbor::decode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
