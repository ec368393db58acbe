use thiserror::Error;

/// Errors raised while decoding inbound device payloads.
///
/// None of these abort the controller: the message is dropped or the field
/// decodes to unknown, and the error is logged.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload is not JSON at all.
    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Valid JSON, but neither a state nor a sensor message.
    #[error("Unrecognized message type: {0}")]
    UnrecognizedMessage(String),

    /// Known message carrying a token outside the field's vocabulary.
    #[error("Unrecognized value '{value}' for field '{field}'")]
    UnrecognizedField { field: &'static str, value: String },
}

/// Errors raised while encoding outbound commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}
