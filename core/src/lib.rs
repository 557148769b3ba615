//! Blocking client for the pnut.io REST API.
//!
//! # Overview
//! Every remote operation is a static `Endpoint` descriptor (path template,
//! verb, query allow-list, payload kind). `Client::call` interprets a
//! descriptor: it binds positional and keyword arguments, dispatches the
//! request through a `Transport`, maps `meta.code` onto `PnutError`, and
//! materializes `data` into typed resources. The typed methods on `Client`
//! (`get_post`, `follow_user`, ...) are generated from the same table.
//!
//! # Design
//! - `Client` is a cheap clone around shared state; models hold a weak
//!   `ClientHandle` so `post.delete()` reaches back to the client that
//!   produced it.
//! - The I/O boundary is the `Transport` trait. `build_request` and
//!   `parse_response` expose the pure halves for hosts that run their own I/O.
//! - Resources keep every wire field in a `Model`; ids, timestamps and nested
//!   resources are normalized into struct fields.
//!
//! ```no_run
//! use pnut_core::{Args, Client, ClientConfig};
//!
//! let client = Client::new(ClientConfig::default().with_access_token("token"));
//! let (post, _meta) = client.get_post(42u64, Args::new().param("include_raw", true))?;
//! println!("{}", post.text().unwrap_or_default());
//! # Ok::<(), pnut_core::PnutError>(())
//! ```

pub mod client;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod endpoint;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod model;
pub mod transport;
pub mod types;

pub use client::{Client, ClientHandle, Payload, Reply};
pub use config::ClientConfig;
pub use cursor::{Cursor, Direction};
pub use endpoint::{Args, ContentKind, Endpoint, ParamValue, PathArg};
pub use endpoints::{api, ENDPOINTS};
pub use error::{ApiError, ApiErrorKind, PnutError};
pub use http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use model::{FieldMut, Model, ModelValue};
pub use transport::{Transport, UreqTransport};
pub use types::{
    Channel, ExploreStream, File, FromResource, FromResponseData, Interaction, InteractionObject, Message, Meta,
    PayloadKind, Post, Resource, Token, User,
};
