//! The pnut.io client: configuration, dispatcher and the generic call path.
//!
//! # Design
//! `Client` is a cheap handle around shared state (`Arc<ClientInner>`).
//! Every generated endpoint method funnels into `Client::call`, which binds
//! the arguments (`Endpoint::bind`), dispatches the request and materializes
//! the reply according to the endpoint's payload kind.
//!
//! For hosts that run their own I/O, `build_request` and `parse_response`
//! expose the two halves of `call` without a transport in between.
//!
//! Models keep a `ClientHandle`, a weak reference back to the client, so
//! `post.delete()` works without the model keeping the client alive.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::config::ClientConfig;
use crate::dispatch::{self, Dispatched, Dispatcher};
use crate::endpoint::{Args, Endpoint, PathArg};
use crate::error::PnutError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{FromResource, FromResponseData, Meta, Resource};

pub(crate) struct ClientInner {
    config: ClientConfig,
    dispatcher: Dispatcher,
}

/// Blocking client for the pnut.io API.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Client on the default `ureq` transport.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.verify_ssl);
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        let dispatcher = Dispatcher::new(&config, Box::new(transport));
        Self {
            inner: Arc::new(ClientInner { config, dispatcher }),
        }
    }

    /// Client configured from `PNUT_*` environment variables.
    pub fn from_env() -> Result<Self, PnutError> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Authenticate every following request with `token`.
    pub fn add_authorization_token(&self, token: &str) {
        self.inner.dispatcher.add_authorization_token(token);
    }

    /// A non-owning handle, as stored in materialized models.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle(Some(Arc::downgrade(&self.inner)))
    }

    /// Run `endpoint` with positional path arguments and keyword arguments.
    pub fn call(&self, endpoint: &Endpoint, path_args: &[PathArg], args: Args) -> Result<Reply, PnutError> {
        let _span = tracing::debug_span!("pnut_call", endpoint = endpoint.name).entered();
        let call = endpoint.bind(path_args, args)?;
        let dispatched = self.inner.dispatcher.dispatch(call)?;
        self.materialize(endpoint, dispatched)
    }

    /// The request `call` would send, without sending it.
    pub fn build_request(
        &self,
        endpoint: &Endpoint,
        path_args: &[PathArg],
        args: Args,
    ) -> Result<HttpRequest, PnutError> {
        let call = endpoint.bind(path_args, args)?;
        Ok(self.inner.dispatcher.build_request(call))
    }

    /// Interpret a response to a request made with `build_request`.
    pub fn parse_response(
        &self,
        endpoint: &Endpoint,
        response: HttpResponse,
        raw_response: bool,
    ) -> Result<Reply, PnutError> {
        let dispatched = dispatch::parse_response(response, raw_response || endpoint.raw_response)?;
        self.materialize(endpoint, dispatched)
    }

    fn materialize(&self, endpoint: &Endpoint, dispatched: Dispatched) -> Result<Reply, PnutError> {
        let envelope = match dispatched {
            Dispatched::NoContent => return Ok(Reply::NoContent),
            Dispatched::Raw(response) => return Ok(Reply::Raw(response)),
            Dispatched::Envelope(envelope) => envelope,
        };
        let Value::Object(mut envelope) = envelope else {
            return Err(PnutError::MalformedResponse("envelope is not an object".into()));
        };
        let handle = self.handle();
        let data = envelope.remove("data").unwrap_or(Value::Null);
        let meta = Meta::from_response_data(envelope.remove("meta").unwrap_or(Value::Null), &handle)?;

        let data = if endpoint.list {
            let items = match data {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => {
                    return Err(PnutError::MalformedResponse(format!(
                        "`{}` expects a list of {:?}, got {other}",
                        endpoint.name, endpoint.payload
                    )))
                }
            };
            let items = items
                .into_iter()
                .map(|item| Resource::normalize(endpoint.payload, item, &handle))
                .collect::<Result<Vec<_>, _>>()?;
            Payload::Many(items)
        } else {
            Payload::One(Resource::normalize(endpoint.payload, data, &handle)?)
        };
        Ok(Reply::Data { data, meta })
    }
}

impl Default for Client {
    /// Unauthenticated client against the production API.
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").field("config", &self.inner.config).finish()
    }
}

/// Weak back-reference from a model to the client that produced it.
#[derive(Clone, Default)]
pub struct ClientHandle(Option<Weak<ClientInner>>);

impl ClientHandle {
    /// A handle that is not attached to any client.
    pub fn detached() -> Self {
        Self(None)
    }

    pub fn upgrade(&self) -> Result<Client, PnutError> {
        self.0
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Client { inner })
            .ok_or(PnutError::ClientDropped)
    }

    pub fn is_attached(&self) -> bool {
        self.0.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Materialized `data` of a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Resource),
    Many(Vec<Resource>),
}

/// What a call produced.
#[derive(Debug, Clone)]
pub enum Reply {
    Data { data: Payload, meta: Meta },
    /// 204; the API sent no body.
    NoContent,
    Raw(HttpResponse),
}

impl Reply {
    pub fn into_one<T: FromResource>(self) -> Result<(T, Meta), PnutError> {
        match self {
            Reply::Data {
                data: Payload::One(resource),
                meta,
            } => Ok((T::from_resource(resource)?, meta)),
            other => Err(unexpected("a single resource", &other)),
        }
    }

    pub fn into_many<T: FromResource>(self) -> Result<(Vec<T>, Meta), PnutError> {
        match self {
            Reply::Data {
                data: Payload::Many(resources),
                meta,
            } => {
                let items = resources
                    .into_iter()
                    .map(T::from_resource)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((items, meta))
            }
            other => Err(unexpected("a list of resources", &other)),
        }
    }

    pub fn into_raw(self) -> Result<HttpResponse, PnutError> {
        match self {
            Reply::Raw(response) => Ok(response),
            other => Err(unexpected("a raw response", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &Reply) -> PnutError {
    let got = match got {
        Reply::Data { data: Payload::One(_), .. } => "a single resource",
        Reply::Data { data: Payload::Many(_), .. } => "a list of resources",
        Reply::NoContent => "no content",
        Reply::Raw(_) => "a raw response",
    };
    PnutError::UnexpectedReply(format!("wanted {wanted}, got {got}"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::endpoint::ContentKind;
    use crate::error::ApiErrorKind;
    use crate::http::HttpMethod;
    use crate::types::{PayloadKind, Post, User};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every request and answers from a queue of canned responses.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingTransport {
        pub requests: Arc<Mutex<Vec<HttpRequest>>>,
        responses: Arc<Mutex<VecDeque<HttpResponse>>>,
    }

    impl RecordingTransport {
        pub fn respond(&self, status: u16, body: Value) -> &Self {
            self.responses.lock().unwrap().push_back(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.to_string().into_bytes(),
            });
            self
        }

        pub fn sent(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PnutError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| PnutError::Transport("no canned response left".into()))
        }
    }

    pub(crate) fn client(transport: &RecordingTransport) -> Client {
        Client::with_transport(ClientConfig::new("https://api.test/v0"), transport.clone())
    }

    const GET_POST: Endpoint = Endpoint {
        name: "get_post",
        path: "/posts/{post_id}",
        method: HttpMethod::Get,
        params: &[&["include_raw"]],
        payload: PayloadKind::Post,
        list: false,
        requires_auth: false,
        content: ContentKind::Json,
        raw_response: false,
    };

    fn post_envelope() -> Value {
        json!({
            "data": {"id": "42", "created_at": "2020-01-01T00:00:00Z", "text": "hi"},
            "meta": {"code": 200}
        })
    }

    #[test]
    fn get_post_end_to_end() {
        let transport = RecordingTransport::default();
        transport.respond(200, post_envelope());
        let client = client(&transport);

        let (post, meta): (Post, Meta) = client
            .call(&GET_POST, &[42u64.into()], Args::new())
            .unwrap()
            .into_one()
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].url, "https://api.test/v0/posts/42");
        assert_eq!(post.id, 42);
        assert_eq!(post.created_at, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(post.get_str("text"), Some("hi"));
        assert_eq!(meta.code, 200);
    }

    #[test]
    fn insufficient_arguments_never_hit_the_network() {
        let transport = RecordingTransport::default();
        let err = client(&transport).call(&GET_POST, &[], Args::new()).unwrap_err();
        assert!(matches!(err, PnutError::InsufficientArguments { .. }));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn list_endpoint_materializes_each_item() {
        let transport = RecordingTransport::default();
        transport.respond(
            200,
            json!({
                "data": [
                    {"id": "1", "created_at": "2020-01-01T00:00:00Z"},
                    {"id": "2", "created_at": "2020-01-01T00:00:00Z"}
                ],
                "meta": {"code": 200, "min_id": "1", "max_id": "2"}
            }),
        );
        let endpoint = Endpoint {
            list: true,
            payload: PayloadKind::User,
            ..GET_POST
        };
        let (users, meta): (Vec<User>, Meta) = client(&transport)
            .call(&endpoint, &["x".into()], Args::new())
            .unwrap()
            .into_many()
            .unwrap();
        assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(meta.min_id().as_deref(), Some("1"));
    }

    #[test]
    fn api_errors_keep_the_envelope() {
        let transport = RecordingTransport::default();
        transport.respond(
            404,
            json!({"meta": {"code": 404, "error_message": "Post not found", "error_slug": "not-found"}}),
        );
        let err = client(&transport)
            .call(&GET_POST, &[1u64.into()], Args::new())
            .unwrap_err();
        let api = err.api_error().unwrap();
        assert_eq!(api.kind, ApiErrorKind::NotFound);
        assert_eq!(api.message, "Post not found");
        assert_eq!(api.error_slug.as_deref(), Some("not-found"));
    }

    #[test]
    fn no_content_reply() {
        let transport = RecordingTransport::default();
        transport.respond(204, Value::Null);
        let reply = client(&transport)
            .call(&GET_POST, &[1u64.into()], Args::new())
            .unwrap();
        assert!(matches!(reply, Reply::NoContent));
        assert!(matches!(reply.into_one::<Post>(), Err(PnutError::UnexpectedReply(_))));
    }

    #[test]
    fn raw_override_returns_transport_response() {
        let transport = RecordingTransport::default();
        transport.respond(200, json!("file bytes"));
        let response = client(&transport)
            .call(&GET_POST, &[1u64.into()], Args::new().raw_response())
            .unwrap()
            .into_raw()
            .unwrap();
        assert_eq!(response.text(), "\"file bytes\"");
    }

    #[test]
    fn residual_keywords_stay_out_of_the_query() {
        let transport = RecordingTransport::default();
        transport.respond(200, post_envelope());
        client(&transport)
            .call(
                &GET_POST,
                &[1u64.into()],
                Args::new().param("include_raw", true).param("foo", "bar"),
            )
            .unwrap();
        let sent = transport.sent();
        assert_eq!(sent[0].query, vec![("include_raw".to_string(), "1".to_string())]);
        assert!(sent[0].query_param("foo").is_none());
    }

    #[test]
    fn models_hold_a_weak_handle() {
        let transport = RecordingTransport::default();
        transport.respond(200, post_envelope());
        let client = client(&transport);
        let (post, _): (Post, Meta) = client
            .call(&GET_POST, &[42u64.into()], Args::new())
            .unwrap()
            .into_one()
            .unwrap();
        assert!(post.client().is_attached());
        drop(client);
        assert!(!post.client().is_attached());
        assert!(matches!(post.delete(), Err(PnutError::ClientDropped)));
    }

    #[test]
    fn build_and_parse_without_transport() {
        let transport = RecordingTransport::default();
        let client = client(&transport);
        let request = client
            .build_request(&GET_POST, &[7u64.into()], Args::new().param("include_raw", false))
            .unwrap();
        assert_eq!(request.url, "https://api.test/v0/posts/7");
        assert_eq!(request.query_param("include_raw"), Some("0"));

        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: post_envelope().to_string().into_bytes(),
        };
        let (post, _): (Post, Meta) = client
            .parse_response(&GET_POST, response, false)
            .unwrap()
            .into_one()
            .unwrap();
        assert_eq!(post.id, 42);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn add_authorization_token_applies_to_later_calls() {
        let transport = RecordingTransport::default();
        transport.respond(200, post_envelope());
        let client = client(&transport);
        client.add_authorization_token("tok");
        client.call(&GET_POST, &[1u64.into()], Args::new()).unwrap();
        assert_eq!(transport.sent()[0].header("Authorization"), Some("Bearer tok"));
    }
}
