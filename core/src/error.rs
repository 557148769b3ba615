//! Error types for the pnut.io client.
//!
//! # Design
//! A single `PnutError` is returned by every fallible operation. Failures
//! reported by the API itself (`meta.code` outside 200/201) land in
//! `PnutError::Api` with an `ApiErrorKind` callers can match on; transport
//! failures and malformed bodies are kept apart because they say nothing
//! about the request's application-level outcome.

use std::fmt;

use serde_json::Value;

/// Prefix the API puts in front of every 400 error message.
const BAD_REQUEST_PREFIX: &str = "Bad Request: ";

/// Errors returned by the client, the binder and the model layer.
#[derive(Debug, thiserror::Error)]
pub enum PnutError {
    /// Connection failure or unreadable response; never retried.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body was not a valid `{data, meta}` envelope.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The API answered with a non-success `meta.code`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Fewer positional arguments than path placeholders.
    #[error("not enough positional arguments for `{endpoint}`: expects {expected:?}, got {given}")]
    InsufficientArguments {
        endpoint: &'static str,
        expected: Vec<&'static str>,
        given: usize,
    },

    /// A response field could not be normalized (bad id, bad timestamp, wrong shape).
    #[error("cannot convert field `{field}`: {reason}")]
    Conversion { field: String, reason: String },

    /// A request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The reply did not have the shape the typed operation expects.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// A model tried to call back into a client that has been dropped.
    #[error("the client that produced this object is no longer available")]
    ClientDropped,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PnutError {
    pub(crate) fn conversion(field: impl Into<String>, reason: impl fmt::Display) -> Self {
        PnutError::Conversion {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// The application-level failure, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            PnutError::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ApiErrorKind> {
        self.api_error().map(|err| err.kind)
    }

    /// Connection and decoding failures, as opposed to API answers.
    pub fn is_transport(&self) -> bool {
        matches!(self, PnutError::Transport(_) | PnutError::MalformedResponse(_))
    }
}

/// Distinguishable kinds of application failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 429
    RateLimited,
    /// Any other non-success code.
    Other,
}

impl ApiErrorKind {
    /// Classify an application code. `None` means success (200, 201).
    pub fn from_code(code: u16) -> Option<Self> {
        let kind = match code {
            200 | 201 => return None,
            400 => ApiErrorKind::BadRequest,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::Forbidden,
            404 => ApiErrorKind::NotFound,
            429 => ApiErrorKind::RateLimited,
            _ => ApiErrorKind::Other,
        };
        Some(kind)
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiErrorKind::BadRequest => "bad request",
            ApiErrorKind::Unauthorized => "unauthorized",
            ApiErrorKind::Forbidden => "forbidden",
            ApiErrorKind::NotFound => "not found",
            ApiErrorKind::RateLimited => "rate limited",
            ApiErrorKind::Other => "api error",
        };
        f.write_str(name)
    }
}

/// A failure reported by the API in the response envelope.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} ({code}): {message} error_id: {} error_slug: {}", or_none(.error_id), or_none(.error_slug))]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub code: u16,
    pub message: String,
    pub error_id: Option<String>,
    pub error_slug: Option<String>,
    /// The decoded envelope, kept for introspection.
    pub envelope: Value,
}

impl ApiError {
    /// Build the error for `code` from a decoded envelope.
    pub fn from_envelope(kind: ApiErrorKind, code: u16, envelope: Value) -> Self {
        let meta = envelope.get("meta");
        let field = |name: &str| {
            meta.and_then(|m| m.get(name)).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
        };
        let mut message = field("error_message").unwrap_or_default();
        if kind == ApiErrorKind::BadRequest {
            if let Some(stripped) = message.strip_prefix(BAD_REQUEST_PREFIX) {
                message = stripped.to_string();
            }
        }
        Self {
            kind,
            code,
            message,
            error_id: field("error_id"),
            error_slug: field("error_slug"),
            envelope,
        }
    }
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}
