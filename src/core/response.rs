use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Status object written to v2 clients before the connection closes.
///
/// Serializes as `{"status":"ok"}` or
/// `{"status":"error","cause":"...","error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusResponse {
    Ok,
    Error { cause: String, error: String },
}

impl StatusResponse {
    pub fn ok() -> Self {
        StatusResponse::Ok
    }

    /// Error status carrying the error's kind name and message
    pub fn from_error(err: &ProtocolError) -> Self {
        StatusResponse::Error {
            cause: err.kind().to_string(),
            error: err.to_string(),
        }
    }
}
