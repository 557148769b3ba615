//! Request dispatch: default headers, API root, transport, envelope checks.
//!
//! # Design
//! Like the rest of the crate this is split into a build step
//! (`Dispatcher::build_request`, pure) and a parse step (`parse_response`,
//! pure), with the transport call in between. `parse_response` is where
//! `meta.code` is mapped onto `ApiErrorKind`; a 204 never reaches the JSON
//! decoder.

use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use crate::config::ClientConfig;
use crate::endpoint::BoundCall;
use crate::error::{ApiError, ApiErrorKind, PnutError};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

const AUTHORIZATION: &str = "Authorization";
const NO_CONTENT: u16 = 204;

/// Outcome of a dispatched request that the API accepted.
#[derive(Debug, Clone)]
pub enum Dispatched {
    /// 204: success without a body.
    NoContent,
    /// The caller asked for the transport response as-is.
    Raw(HttpResponse),
    /// A decoded `{data, meta}` envelope with a success code.
    Envelope(Value),
}

pub(crate) struct Dispatcher {
    api_root: String,
    default_headers: RwLock<Vec<(String, String)>>,
    transport: Box<dyn Transport>,
}

impl Dispatcher {
    pub(crate) fn new(config: &ClientConfig, transport: Box<dyn Transport>) -> Self {
        let mut headers: Vec<(String, String)> = config
            .extra_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(token) = &config.access_token {
            set_header(&mut headers, AUTHORIZATION, bearer(token));
        }
        Self {
            api_root: config.root().to_string(),
            default_headers: RwLock::new(headers),
            transport,
        }
    }

    /// Send `Authorization: Bearer <token>` on every following request.
    pub(crate) fn add_authorization_token(&self, token: &str) {
        let mut headers = self
            .default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        set_header(&mut headers, AUTHORIZATION, bearer(token));
    }

    pub(crate) fn default_headers(&self) -> Vec<(String, String)> {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Absolute request for a bound call. Per-call headers win over defaults.
    pub(crate) fn build_request(&self, call: BoundCall) -> HttpRequest {
        let mut headers = self.default_headers();
        for (name, value) in call.headers {
            set_header(&mut headers, &name, value);
        }
        HttpRequest {
            method: call.method,
            url: format!("{}{}", self.api_root, call.path),
            query: call.query,
            headers,
            body: call.body,
        }
    }

    pub(crate) fn dispatch(&self, call: BoundCall) -> Result<Dispatched, PnutError> {
        if !call.residual.is_empty() {
            let keys: Vec<&str> = call.residual.keys().map(String::as_str).collect();
            tracing::debug!(endpoint = call.endpoint, ?keys, "ignoring keywords outside the allow-list");
        }
        let raw = call.raw_response;
        let request = self.build_request(call);
        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.execute(&request)?;
        tracing::debug!(status = response.status, "response received");
        parse_response(response, raw)
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Replace any header named `name` (case-insensitively) with `value`.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

/// Interpret a transport response.
///
/// `raw` short-circuits before any inspection. Otherwise a 204 is a bodiless
/// success, and everything else must be an envelope whose `meta.code` is 200
/// or 201.
pub fn parse_response(response: HttpResponse, raw: bool) -> Result<Dispatched, PnutError> {
    if raw {
        return Ok(Dispatched::Raw(response));
    }
    if response.status == NO_CONTENT {
        return Ok(Dispatched::NoContent);
    }

    let envelope: Value = serde_json::from_slice(&response.body).map_err(|e| {
        PnutError::MalformedResponse(format!("HTTP {} body is not JSON: {e}", response.status))
    })?;
    let code = envelope
        .get("meta")
        .and_then(|meta| meta.get("code"))
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| {
            PnutError::MalformedResponse(format!("HTTP {} envelope has no meta.code", response.status))
        })?;

    if let Some(kind) = ApiErrorKind::from_code(code) {
        let error = ApiError::from_envelope(kind, code, envelope);
        tracing::warn!(code, kind = %error.kind, message = %error.message, "api request failed");
        return Err(error.into());
    }
    Ok(Dispatched::Envelope(envelope))
}
