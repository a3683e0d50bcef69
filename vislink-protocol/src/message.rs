//! Protocol message types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message kind tag.
///
/// Unrecognized kinds deserialize to [`Kind::Unknown`] instead of failing,
/// so a violating frame keeps its correlation id and can still be answered
/// with an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Kind {
    Get,
    Put,
    Post,
    Listen,
    Unlisten,
    Event,
    Resp,
    Unknown,
}

impl From<String> for Kind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "get" => Kind::Get,
            "put" => Kind::Put,
            "post" => Kind::Post,
            "listen" => Kind::Listen,
            "unlisten" => Kind::Unlisten,
            "event" => Kind::Event,
            "resp" => Kind::Resp,
            _ => Kind::Unknown,
        }
    }
}

/// A single protocol frame.
///
/// | field | present when |
/// |-------|--------------|
/// | `kind`  | always |
/// | `id`    | the sender expects a response, or a resp/event acknowledges one |
/// | `path`  | kind != resp |
/// | `body`  | operation-dependent |
/// | `error` | kind == resp and the operation failed |
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub kind: Kind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<i64>,
}

impl Message {
    /// Create a request frame. `id` is absent for fire-and-forget requests.
    pub fn request(kind: Kind, id: Option<u32>, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            kind,
            id,
            path: Some(path.into()),
            body,
            error: None,
        }
    }

    /// Create a success response
    pub fn resp(id: u32, body: Option<Value>) -> Self {
        Self {
            kind: Kind::Resp,
            id: Some(id),
            path: None,
            body,
            error: None,
        }
    }

    /// Create an error response; the message text travels in `body`
    pub fn error(id: u32, code: i64, message: impl Into<String>) -> Self {
        Self {
            kind: Kind::Resp,
            id: Some(id),
            path: None,
            body: Some(Value::String(message.into())),
            error: Some(code),
        }
    }

    /// Create an event notification
    pub fn event(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            kind: Kind::Event,
            id: None,
            path: Some(path.into()),
            body,
            error: None,
        }
    }
}

/// Numeric error codes carried in failed responses
pub mod codes {
    /// Frame could not be parsed
    pub const PARSE_ERROR: i64 = -32700;
    /// Unknown message kind or malformed request
    pub const INVALID_REQUEST: i64 = -32600;
    /// Path or member does not resolve
    pub const NOT_FOUND: i64 = -32601;
    /// Member access or invocation failed
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Unwrap a message body into positional arguments: an absent body carries
/// no arguments, an array carries one per element, anything else is a single
/// argument.
pub fn unwrap_args(body: Option<Value>) -> Vec<Value> {
    match body {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(value) => vec![value],
    }
}

/// Pack positional arguments into a message body; the inverse of
/// [`unwrap_args`].
pub fn pack_args(mut args: Vec<Value>) -> Option<Value> {
    match args.len() {
        0 => None,
        1 => Some(args.remove(0)),
        _ => Some(Value::Array(args)),
    }
}
