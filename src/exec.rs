//! Response classification shared by every call.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::{KuaipanError, MAX_ERROR_BODY_CHARS, Result, truncate_str};
use crate::response::ApiErrorResponse;

/// Parses a successful response body.
pub(crate) fn parse_success_response<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(KuaipanError::from)
}

/// Parses an error response body and returns the matching error.
///
/// A `{"msg": ...}` payload becomes [`KuaipanError::Api`]; anything else
/// falls back to the HTTP status line.
pub(crate) fn parse_error_response(status: StatusCode, body: &[u8]) -> KuaipanError {
    match serde_json::from_slice::<ApiErrorResponse>(body) {
        Ok(api_err) => {
            log::warn!("kuaipan API error ({}): {}", status, api_err.msg);
            KuaipanError::Api {
                message: api_err.msg,
            }
        }
        Err(_) => {
            log::warn!(
                "HTTP {} with body: {}",
                status,
                truncate_str(&String::from_utf8_lossy(body), MAX_ERROR_BODY_CHARS)
            );
            KuaipanError::Http(status.to_string())
        }
    }
}

/// Decodes a JSON body into `T` on 200, or classifies the failure.
pub(crate) fn handle_response<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    if status == StatusCode::OK {
        parse_success_response(body)
    } else {
        Err(parse_error_response(status, body))
    }
}

/// Like [`handle_response`] for calls whose success body is ignored.
pub(crate) fn handle_empty_response(status: StatusCode, body: &[u8]) -> Result<()> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(parse_error_response(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::DirInfo;

    #[test]
    fn ok_body_decodes() {
        let info: DirInfo =
            handle_response(StatusCode::OK, br#"{"path":"/docs","root":"app_folder"}"#).unwrap();
        assert_eq!(info.path, "/docs");
        assert_eq!(info.root, "app_folder");
    }

    #[test]
    fn ok_with_bad_json_is_decode_error() {
        let err = handle_response::<DirInfo>(StatusCode::OK, b"<html>").unwrap_err();
        assert!(matches!(err, KuaipanError::Deserialize(_)));
    }

    #[test]
    fn non_ok_with_msg_is_api_error() {
        let err = handle_response::<DirInfo>(
            StatusCode::UNAUTHORIZED,
            br#"{"msg":"invalid signature"}"#,
        )
        .unwrap_err();
        assert_eq!(err.api_message(), Some("invalid signature"));
    }

    #[test]
    fn non_ok_without_msg_is_protocol_error() {
        let err = handle_response::<DirInfo>(StatusCode::BAD_GATEWAY, b"Bad Gateway").unwrap_err();
        match err {
            KuaipanError::Http(line) => assert_eq!(line, "502 Bad Gateway"),
            other => panic!("expected KuaipanError::Http, got: {:?}", other),
        }
    }

    #[test]
    fn other_2xx_is_not_success() {
        let err = handle_empty_response(StatusCode::ACCEPTED, b"").unwrap_err();
        assert!(matches!(err, KuaipanError::Http(_)));
    }

    #[test]
    fn empty_destination_discards_body() {
        assert!(handle_empty_response(StatusCode::OK, b"anything at all").is_ok());
        let err = handle_empty_response(StatusCode::FORBIDDEN, br#"{"msg":"no"}"#).unwrap_err();
        assert_eq!(err.api_message(), Some("no"));
    }
}
