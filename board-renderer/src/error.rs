//! Error types for the board renderer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// The host cannot provide something the 3D pipeline needs. Callers treat
    /// this as "feature off for the session" rather than retrying.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_converts() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_unsupported_message() {
        let err = Error::Unsupported("zero-sized surface".to_string());
        assert_eq!(err.to_string(), "Unsupported: zero-sized surface");
    }
}
