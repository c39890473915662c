//! Ticker Codec
//!
//! Splits one inbound text payload into its JSON elements. Ticker feeds send
//! a JSON array per message; a lone object is accepted as a one-element batch.
//!
//! Decoding is all-or-nothing at the payload level: if the payload is not
//! well-formed JSON of the expected shape the whole payload is rejected.
//! Interpreting each element is left to the caller so one bad element
//! never affects its siblings.

/// Payload-level decode failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary frame is not UTF-8 text.
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Payload is JSON but neither an array nor an object.
    #[error("invalid payload format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for ticker payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickerCodec;

impl TickerCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text payload into its elements.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON array or object.
    pub fn decode(&self, text: &str) -> Result<Vec<serde_json::Value>, CodecError> {
        let trimmed = text.trim();

        if trimmed.starts_with('[') {
            Ok(serde_json::from_str(trimmed)?)
        } else if trimmed.starts_with('{') {
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            Ok(vec![value])
        } else {
            Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )))
        }
    }

    /// Decode a binary payload carrying UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not UTF-8 or not a JSON array/object.
    pub fn decode_binary(&self, bytes: &[u8]) -> Result<Vec<serde_json::Value>, CodecError> {
        self.decode(std::str::from_utf8(bytes)?)
    }
}
