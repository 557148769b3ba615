//! The I/O boundary: executing an `HttpRequest`.
//!
//! # Design
//! `Transport` is the only place the client touches the network. Tests and
//! embedders plug in their own implementation; `UreqTransport` is the
//! blocking default. Status codes are returned as data, never as errors, so
//! the dispatcher sees every API answer. Only connection-level problems
//! become `PnutError::Transport`.

use std::io::Read;

use multipart::client::lazy::Multipart;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::PnutError;
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PnutError>;
}

/// Blocking transport on a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    body_limit: u64,
}

impl UreqTransport {
    /// Response bodies are read in full, whatever their size.
    pub fn new(verify_ssl: bool) -> Self {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!verify_ssl)
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .new_agent();
        Self {
            agent,
            body_limit: u64::MAX,
        }
    }

    /// Fail with `PnutError::Transport` on response bodies longer than `limit` bytes.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PnutError> {
        let url = request.url.as_str();
        let result = match request.method {
            HttpMethod::Get => send_without_body(prepare(self.agent.get(url), request), request),
            HttpMethod::Delete => send_without_body(prepare(self.agent.delete(url), request), request),
            HttpMethod::Post => send_with_body(prepare(self.agent.post(url), request), &request.body)?,
            HttpMethod::Put => send_with_body(prepare(self.agent.put(url), request), &request.body)?,
            HttpMethod::Patch => send_with_body(prepare(self.agent.patch(url), request), &request.body)?,
        };
        let mut response = result.map_err(|e| PnutError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()
            .map_err(|e| PnutError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn prepare<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    builder
}

type UreqResult = Result<ureq::http::Response<ureq::Body>, ureq::Error>;

fn send_without_body(builder: RequestBuilder<WithoutBody>, request: &HttpRequest) -> UreqResult {
    if !request.body.is_empty() {
        tracing::warn!(method = %request.method, url = %request.url, "dropping request body on body-less verb");
    }
    builder.call()
}

fn send_with_body(builder: RequestBuilder<WithBody>, body: &RequestBody) -> Result<UreqResult, PnutError> {
    Ok(match body {
        RequestBody::Empty => builder.send_empty(),
        RequestBody::Json(text) => builder.send(text.as_bytes()),
        RequestBody::Form(fields) => {
            builder.send_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        }
        RequestBody::Multipart { fields, files } => {
            let (content_type, bytes) = encode_multipart(fields, files)?;
            builder.content_type(content_type).send(bytes.as_slice())
        }
        RequestBody::Bytes(bytes) => builder.send(bytes.as_slice()),
    })
}

/// Encode a `multipart/form-data` body. Returns the content-type (with its
/// boundary) and the body bytes.
///
/// Names and filenames are written into quoted header parameters, so `"`,
/// CR and LF are percent-encoded. A file whose content type does not parse
/// as a MIME type is sent as `application/octet-stream`.
pub fn encode_multipart(fields: &[(String, String)], files: &[FilePart]) -> Result<(String, Vec<u8>), PnutError> {
    let mut form = Multipart::new();
    for (name, value) in fields {
        form.add_text(header_param(name), value.as_str());
    }
    for file in files {
        let content_type = file
            .content_type
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        form.add_stream(
            header_param(&file.field),
            file.bytes.as_slice(),
            Some(header_param(&file.filename)),
            Some(content_type),
        );
    }
    let mut prepared = form
        .prepare()
        .map_err(|e| PnutError::Transport(format!("multipart encoding: {}", e.error)))?;
    let content_type = format!("multipart/form-data; boundary={}", prepared.boundary());
    let mut body = Vec::new();
    prepared
        .read_to_end(&mut body)
        .map_err(|e| PnutError::Transport(format!("multipart encoding: {e}")))?;
    Ok((content_type, body))
}

fn header_param(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[(&str, &str)], files: &[FilePart]) -> (String, String) {
        let fields: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let (content_type, body) = encode_multipart(&fields, files).unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        (boundary, String::from_utf8(body).unwrap())
    }

    #[test]
    fn multipart_contains_fields_and_files() {
        let (boundary, text) = encode(
            &[("type", "com.example.test")],
            &[FilePart::new("content", "a.png", "image/png", b"PNGDATA".to_vec())],
        );
        assert!(!boundary.is_empty());
        assert!(text.contains(&format!("--{boundary}")));
        assert!(text.contains("name=\"type\""));
        assert!(text.contains("com.example.test"));
        assert!(text.contains("name=\"content\"; filename=\"a.png\""));
        assert!(text.contains("Content-Type: image/png"));
        assert!(text.contains("PNGDATA"));
        assert!(text.trim_end().ends_with(&format!("--{boundary}--")));
    }

    #[test]
    fn boundaries_differ_between_bodies() {
        let (a, _) = encode(&[], &[]);
        let (b, _) = encode(&[], &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn line_breaks_in_filenames_stay_inside_the_header() {
        let (_, text) = encode(
            &[("ty\"pe", "v")],
            &[FilePart::new("content", "a.png\r\nX-Injected: yes", "image/png", b"x".to_vec())],
        );
        assert!(!text.contains("\r\nX-Injected: yes"));
        assert!(text.contains("filename=\"a.png%0D%0AX-Injected: yes\""));
        assert!(text.contains("name=\"ty%22pe\""));
    }

    #[test]
    fn invalid_content_types_fall_back_to_octet_stream() {
        let (_, text) = encode(
            &[],
            &[FilePart::new("content", "a.bin", "image/png\r\nX-Injected: yes", b"x".to_vec())],
        );
        assert!(!text.contains("X-Injected"));
        assert!(text.contains("Content-Type: application/octet-stream"));
    }
}
