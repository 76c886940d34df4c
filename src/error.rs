use thiserror::Error;

/// Maximum characters of a non-JSON error body kept for log output.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 200;

/// Errors that can occur when talking to Kuaipan.
#[derive(Debug, Error)]
pub enum KuaipanError {
    /// Transport failure from reqwest (connect, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Non-200 response whose body is not an error payload.
    ///
    /// Carries the HTTP status line, the only detail available.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Kuaipan returned an error payload (`{"msg": ...}`).
    #[error("API error: {message}")]
    Api { message: String },

    /// A 200 response whose body does not match the expected schema.
    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// The upload payload did not produce exactly the declared number of bytes.
    #[error("upload framing error: {0}")]
    UploadFraming(String),

    /// Local I/O failure while reading an upload source or writing a download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credential not found or invalid.
    #[error("credential error: {0}")]
    Credential(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl KuaipanError {
    /// Returns the server-provided message if this is an API error.
    pub fn api_message(&self) -> Option<&str> {
        match self {
            KuaipanError::Api { message } => Some(message),
            _ => None,
        }
    }

    /// Returns `true` if the error came from the network layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, KuaipanError::HttpClient(_))
    }
}

/// A specialized Result type for Kuaipan operations.
pub type Result<T> = std::result::Result<T, KuaipanError>;

/// Truncates a string to at most `max_chars` characters on a valid UTF-8 boundary.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = KuaipanError::Api {
            message: "invalid signature".to_string(),
        };
        assert_eq!(err.to_string(), "API error: invalid signature");
        assert_eq!(err.api_message(), Some("invalid signature"));
    }

    #[test]
    fn http_error_display() {
        let err = KuaipanError::Http("502 Bad Gateway".to_string());
        assert_eq!(err.to_string(), "HTTP error: 502 Bad Gateway");
        assert!(err.api_message().is_none());
        assert!(!err.is_transport());
    }

    #[test]
    fn framing_error_display() {
        let err = KuaipanError::UploadFraming("payload ended 3 bytes early".to_string());
        assert_eq!(
            err.to_string(),
            "upload framing error: payload ended 3 bytes early"
        );
    }

    #[test]
    fn credential_error_display() {
        let err = KuaipanError::Credential("no credential found".to_string());
        assert_eq!(err.to_string(), "credential error: no credential found");
    }

    #[test]
    fn decode_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = KuaipanError::from(serde_err);
        assert!(matches!(err, KuaipanError::Deserialize(_)));
    }

    #[test]
    fn truncate_str_long() {
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn truncate_str_multibyte() {
        let s = "金山快盘网盘";
        assert_eq!(truncate_str(s, 4), "金山快盘");
    }
}
