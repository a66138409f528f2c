use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}
