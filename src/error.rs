use thiserror::Error;

#[derive(Debug, Error)]
pub enum NayaError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("upstream responded {status}: {body}")]
    Upstream { status: u16, body: String },
}

impl NayaError {
    /// Message suitable for an `{"error": ...}` body, without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            NayaError::Config(msg)
            | NayaError::Http(msg)
            | NayaError::Serialization(msg)
            | NayaError::Runtime(msg) => msg.clone(),
            NayaError::Upstream { status, body } => format!("upstream responded {status}: {body}"),
        }
    }
}

impl From<reqwest::Error> for NayaError {
    fn from(err: reqwest::Error) -> Self {
        NayaError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for NayaError {
    fn from(err: serde_json::Error) -> Self {
        NayaError::Serialization(err.to_string())
    }
}

pub use crate::Result;

/// Errors surfaced to a chat front end driving a [`crate::client::ChatSession`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyInput,
    #[error("a reply is already streaming")]
    Busy,
    #[error("turn task failed: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_category_and_detail_drops_it() {
        let err = NayaError::Config("LOVABLE_API_KEY is not configured".to_string());
        assert!(format!("{err}").contains("configuration error"));
        assert_eq!(err.detail(), "LOVABLE_API_KEY is not configured");

        let upstream = NayaError::Upstream {
            status: 503,
            body: "down".to_string(),
        };
        assert_eq!(upstream.detail(), "upstream responded 503: down");
    }

    #[test]
    fn serde_errors_convert_to_serialization() {
        let err: NayaError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, NayaError::Serialization(_)));
    }
}
