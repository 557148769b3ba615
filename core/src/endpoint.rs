//! Endpoint descriptors and the binder that turns a call into a request.
//!
//! # Design
//! An `Endpoint` is static data: path template, verb, query allow-list,
//! payload kind. `Endpoint::bind` is the interpreter for one call. It takes
//! the positional path arguments and the keyword arguments (`Args`) and
//! produces a `BoundCall`:
//!
//! - keywords on the allow-list become query parameters, booleans as `1`/`0`;
//! - `{placeholders}` are filled from the positional arguments in template
//!   order, resources contributing their id;
//! - everything else stays with the call: the body, files, extra headers,
//!   the raw-response switch, and unknown keywords as residuals.
//!
//! The allow-list is a filter, not a validator: unknown keywords are never
//! an error and never reach the query string.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::PnutError;
use crate::http::{FilePart, HttpMethod, RequestBody};
use crate::model::{Model, ModelValue};
use crate::types::{Channel, ExploreStream, File, Message, PayloadKind, Post, User};

pub type ParamGroup = &'static [&'static str];

/// How a request body is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentKind {
    #[default]
    Json,
    Multipart,
}

/// Static description of one remote operation.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub name: &'static str,
    pub path: &'static str,
    pub method: HttpMethod,
    /// Query allow-list, as the union of these groups.
    pub params: &'static [ParamGroup],
    pub payload: PayloadKind,
    pub list: bool,
    /// Informational; the server enforces authentication.
    pub requires_auth: bool,
    pub content: ContentKind,
    /// Always hand back the transport response unprocessed.
    pub raw_response: bool,
}

impl Endpoint {
    /// Placeholder names in template order.
    pub fn placeholders(&self) -> Vec<&'static str> {
        placeholders(self.path)
    }

    pub fn allows(&self, key: &str) -> bool {
        self.params.iter().any(|group| group.contains(&key))
    }

    /// Bind positional path arguments and keyword arguments to this endpoint.
    pub fn bind(&self, path_args: &[PathArg], args: Args) -> Result<BoundCall, PnutError> {
        let Args {
            keywords,
            data,
            files,
            mut headers,
            raw_response,
        } = args;

        let mut query = Vec::new();
        let mut residual = BTreeMap::new();
        for (key, value) in keywords {
            if self.allows(&key) {
                query.push((key, value.to_query()));
            } else {
                residual.insert(key, value);
            }
        }

        let path = self.substitute(path_args)?;

        let body = match data {
            Some(Data::Json(value)) if self.method.has_body() && self.content == ContentKind::Json => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                RequestBody::Json(serde_json::to_string(&value)?)
            }
            data => forward_body(data, files)?,
        };

        Ok(BoundCall {
            endpoint: self.name,
            method: self.method,
            path,
            query,
            headers,
            body,
            raw_response: raw_response || self.raw_response,
            residual,
        })
    }

    fn substitute(&self, path_args: &[PathArg]) -> Result<String, PnutError> {
        let mut args = path_args.iter();
        let mut out = String::with_capacity(self.path.len());
        let mut rest = self.path;
        while let Some((before, _, after)) = next_placeholder(rest) {
            let arg = args.next().ok_or_else(|| PnutError::InsufficientArguments {
                endpoint: self.name,
                expected: self.placeholders(),
                given: path_args.len(),
            })?;
            out.push_str(before);
            out.push_str(arg.as_str());
            rest = after;
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn placeholders(template: &'static str) -> Vec<&'static str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some((_, name, after)) = next_placeholder(rest) {
        names.push(name);
        rest = after;
    }
    names
}

/// Split at the next `{word}` placeholder: text before, the name, text after.
fn next_placeholder(s: &str) -> Option<(&str, &str, &str)> {
    let mut offset = 0;
    while let Some(open) = s[offset..].find('{').map(|i| i + offset) {
        let tail = &s[open + 1..];
        if let Some(close) = tail.find('}') {
            let name = &tail[..close];
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Some((&s[..open], name, &tail[close + 1..]));
            }
        }
        offset = open + 1;
    }
    None
}

fn forward_body(data: Option<Data>, files: Vec<FilePart>) -> Result<RequestBody, PnutError> {
    if !files.is_empty() {
        let fields = match data {
            None => Vec::new(),
            Some(Data::Json(value)) => form_fields(value),
            Some(Data::Bytes(_)) => {
                return Err(PnutError::conversion(
                    "data",
                    "raw bytes cannot be combined with file parts",
                ))
            }
        };
        return Ok(RequestBody::Multipart { fields, files });
    }
    Ok(match data {
        None => RequestBody::Empty,
        Some(Data::Json(value @ Value::Object(_))) => RequestBody::Form(form_fields(value)),
        Some(Data::Json(value)) => RequestBody::Bytes(value.to_string().into_bytes()),
        Some(Data::Bytes(bytes)) => RequestBody::Bytes(bytes),
    })
}

fn form_fields(value: Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect(),
        Value::Null => Vec::new(),
        other => vec![("data".to_string(), other.to_string())],
    }
}

/// A call with its arguments partitioned, ready for the dispatcher.
#[derive(Debug, Clone)]
pub struct BoundCall {
    pub endpoint: &'static str,
    pub method: HttpMethod,
    /// Path relative to the API root.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub raw_response: bool,
    /// Keywords that were not on the allow-list.
    pub residual: BTreeMap<String, ParamValue>,
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// One positional path argument, already rendered to its path form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArg(String);

impl PathArg {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! path_arg_display {
    ($($ty:ty),*) => {$(
        impl From<$ty> for PathArg {
            fn from(value: $ty) -> Self {
                PathArg(value.to_string())
            }
        }
    )*};
}

path_arg_display!(u64, u32, i64, i32, usize, &str, String, &String);

macro_rules! path_arg_numeric_id {
    ($($ty:ty),*) => {$(
        impl From<&$ty> for PathArg {
            fn from(value: &$ty) -> Self {
                PathArg(value.id.to_string())
            }
        }
    )*};
}

path_arg_numeric_id!(User, Post, Message);

impl From<&Channel> for PathArg {
    fn from(channel: &Channel) -> Self {
        PathArg::from(&**channel)
    }
}

impl From<&File> for PathArg {
    fn from(file: &File) -> Self {
        PathArg::from(&**file)
    }
}

impl From<&ExploreStream> for PathArg {
    fn from(stream: &ExploreStream) -> Self {
        PathArg(stream.slug().unwrap_or_default().to_string())
    }
}

/// A generic model contributes its `id` field.
impl From<&Model> for PathArg {
    fn from(model: &Model) -> Self {
        let rendered = match model.get("id") {
            Some(ModelValue::Scalar(Value::String(s))) => s.clone(),
            Some(other) => other.serialize().to_string(),
            None => String::new(),
        };
        PathArg(rendered)
    }
}

/// A keyword argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ParamValue {
    /// Query-string form. The API has no boolean literal, so booleans are `1`/`0`.
    pub fn to_query(&self) -> String {
        match self {
            ParamValue::Bool(true) => "1".to_string(),
            ParamValue::Bool(false) => "0".to_string(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

macro_rules! param_value_int {
    ($($ty:ty),*) => {$(
        impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::Int(value as i64)
            }
        }
    )*};
}

param_value_int!(i32, i64, u32, u16, u8);

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => ParamValue::Int(n),
            Err(_) => ParamValue::Text(value.to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Request body supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Json(Value),
    Bytes(Vec<u8>),
}

/// Keyword arguments of a bound call.
#[derive(Debug, Clone, Default)]
pub struct Args {
    keywords: BTreeMap<String, ParamValue>,
    data: Option<Data>,
    files: Vec<FilePart>,
    headers: Vec<(String, String)>,
    raw_response: bool,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// A keyword argument; sent as a query parameter when the endpoint allows it.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.keywords.insert(key.into(), value.into());
        self
    }

    /// Request body. JSON-encoded on POST/PUT/PATCH of JSON endpoints,
    /// sent as form fields otherwise.
    pub fn data(mut self, body: Value) -> Self {
        self.data = Some(Data::Json(body));
        self
    }

    pub fn data_from<T: Serialize>(self, body: &T) -> Result<Self, PnutError> {
        Ok(self.data(serde_json::to_value(body)?))
    }

    /// Raw request body, e.g. file content with an explicit content-type header.
    pub fn bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.data = Some(Data::Bytes(body.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Return the transport response unprocessed.
    pub fn raw_response(mut self) -> Self {
        self.raw_response = true;
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.keywords.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientHandle;
    use crate::types::FromResponseData;
    use serde_json::json;

    const PAGING: ParamGroup = &["since_id", "before_id", "count"];
    const INCLUDES: ParamGroup = &["include_raw", "include_counts"];

    fn endpoint(path: &'static str, method: HttpMethod) -> Endpoint {
        Endpoint {
            name: "test_op",
            path,
            method,
            params: &[PAGING, INCLUDES],
            payload: PayloadKind::Post,
            list: false,
            requires_auth: false,
            content: ContentKind::Json,
            raw_response: false,
        }
    }

    #[test]
    fn placeholders_in_template_order() {
        let ep = endpoint("/channels/{channel_id}/messages/{message_id}/sticky", HttpMethod::Put);
        assert_eq!(ep.placeholders(), vec!["channel_id", "message_id"]);
        assert!(endpoint("/posts", HttpMethod::Get).placeholders().is_empty());
    }

    #[test]
    fn positional_args_fill_placeholders_in_order() {
        let ep = endpoint("/{a}/{b}", HttpMethod::Get);
        let call = ep.bind(&["X".into(), "Y".into()], Args::new()).unwrap();
        assert_eq!(call.path, "/X/Y");
        let call = ep.bind(&["Y".into(), "X".into()], Args::new()).unwrap();
        assert_eq!(call.path, "/Y/X");
    }

    #[test]
    fn extra_positional_args_are_ignored() {
        let ep = endpoint("/posts/{post_id}", HttpMethod::Get);
        let call = ep.bind(&[1u64.into(), 2u64.into()], Args::new()).unwrap();
        assert_eq!(call.path, "/posts/1");
    }

    #[test]
    fn resources_substitute_their_id() {
        let post = Post::from_response_data(
            json!({"id": "42", "created_at": "2020-01-01T00:00:00Z"}),
            &ClientHandle::detached(),
        )
        .unwrap();
        let ep = endpoint("/posts/{post_id}/repost", HttpMethod::Put);
        let call = ep.bind(&[(&post).into()], Args::new()).unwrap();
        assert_eq!(call.path, "/posts/42/repost");
    }

    #[test]
    fn generic_model_substitutes_id_field() {
        let model = Model::from_value(json!({"id": "abc"}), &ClientHandle::detached()).unwrap();
        assert_eq!(PathArg::from(&model).as_str(), "abc");
        let numeric = Model::from_value(json!({"id": 7}), &ClientHandle::detached()).unwrap();
        assert_eq!(PathArg::from(&numeric).as_str(), "7");
    }

    #[test]
    fn too_few_positional_args_fail() {
        let ep = endpoint("/channels/{channel_id}/messages/{message_id}", HttpMethod::Get);
        let err = ep.bind(&[178u64.into()], Args::new()).unwrap_err();
        match err {
            PnutError::InsufficientArguments { endpoint, expected, given } => {
                assert_eq!(endpoint, "test_op");
                assert_eq!(expected, vec!["channel_id", "message_id"]);
                assert_eq!(given, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn allowed_keywords_become_query_params() {
        let ep = endpoint("/posts/streams/global", HttpMethod::Get);
        let call = ep
            .bind(&[], Args::new().param("count", 5).param("foo", "bar"))
            .unwrap();
        assert_eq!(call.query, vec![("count".to_string(), "5".to_string())]);
        assert_eq!(call.residual.get("foo"), Some(&ParamValue::Text("bar".into())));
    }

    #[test]
    fn booleans_are_sent_as_digits() {
        let ep = endpoint("/posts", HttpMethod::Get);
        let call = ep.bind(&[], Args::new().param("include_raw", true)).unwrap();
        assert_eq!(call.query, vec![("include_raw".to_string(), "1".to_string())]);
        let call = ep.bind(&[], Args::new().param("include_raw", false)).unwrap();
        assert_eq!(call.query, vec![("include_raw".to_string(), "0".to_string())]);
    }

    #[test]
    fn json_body_on_write_verbs() {
        let ep = endpoint("/posts", HttpMethod::Post);
        let call = ep.bind(&[], Args::new().data(json!({"text": "hi"}))).unwrap();
        assert_eq!(call.body, RequestBody::Json(r#"{"text":"hi"}"#.to_string()));
        assert_eq!(
            call.headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn data_on_body_less_verb_is_forwarded_as_is() {
        let ep = endpoint("/posts/{post_id}", HttpMethod::Delete);
        let call = ep.bind(&[1u64.into()], Args::new().data(json!({"reason": "spam"}))).unwrap();
        assert_eq!(call.body, RequestBody::Form(vec![("reason".into(), "spam".into())]));
        assert!(call.headers.is_empty());
    }

    #[test]
    fn multipart_endpoint_with_files() {
        let mut ep = endpoint("/files", HttpMethod::Post);
        ep.content = ContentKind::Multipart;
        let part = FilePart::new("content", "a.png", "image/png", vec![1, 2, 3]);
        let call = ep
            .bind(
                &[],
                Args::new()
                    .data(json!({"type": "com.example.test", "is_public": true}))
                    .file(part.clone()),
            )
            .unwrap();
        assert_eq!(
            call.body,
            RequestBody::Multipart {
                fields: vec![
                    ("is_public".into(), "true".into()),
                    ("type".into(), "com.example.test".into())
                ],
                files: vec![part],
            }
        );
        assert!(call.headers.is_empty());
    }

    #[test]
    fn raw_bytes_are_forwarded() {
        let mut ep = endpoint("/files/{file_id}/content", HttpMethod::Put);
        ep.content = ContentKind::Multipart;
        let call = ep
            .bind(
                &["7".into()],
                Args::new().bytes(vec![9, 9]).header("Content-Type", "image/png"),
            )
            .unwrap();
        assert_eq!(call.body, RequestBody::Bytes(vec![9, 9]));
        assert_eq!(call.headers, vec![("Content-Type".into(), "image/png".into())]);
    }

    #[test]
    fn raw_response_from_call_or_descriptor() {
        let mut ep = endpoint("/files/{file_id}/content", HttpMethod::Get);
        assert!(!ep.bind(&["1".into()], Args::new()).unwrap().raw_response);
        assert!(ep.bind(&["1".into()], Args::new().raw_response()).unwrap().raw_response);
        ep.raw_response = true;
        assert!(ep.bind(&["1".into()], Args::new()).unwrap().raw_response);
    }

    #[test]
    fn literal_braces_are_not_placeholders() {
        assert_eq!(placeholders("/a/{}/{b-c}/{d}"), vec!["d"]);
    }
}
