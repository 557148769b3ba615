//! In-memory stand-in for a slice of the pnut.io API.
//!
//! Every answer is wrapped in the `{meta, data}` envelope with `meta.code`
//! mirroring the HTTP status. Authentication is a bearer token looked up in
//! a fixed table. A few routes exist only to produce a specific shape of
//! answer: `/sys/stats` is always rate limited, unmuting a channel answers
//! 204, and file content is served as raw bytes, 11 MiB of it for
//! `LARGE_FILE_ID`.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// Token of the seeded user `alice` (id 1).
pub const ALICE_TOKEN: &str = "alice-token";
/// Token of the seeded user `bob` (id 2).
pub const BOB_TOKEN: &str = "bob-token";
/// File whose content is `LARGE_FILE_LEN` bytes of `b'x'`.
pub const LARGE_FILE_ID: &str = "large";
pub const LARGE_FILE_LEN: usize = 11 * 1024 * 1024;

const DEFAULT_COUNT: usize = 20;
const MAX_COUNT: usize = 200;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub text: String,
    #[serde(default)]
    pub entities: Value,
}

#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct PostRecord {
    pub id: u64,
    pub user_id: u64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[derive(Debug, Default)]
pub struct Store {
    pub users: BTreeMap<u64, UserRecord>,
    pub posts: BTreeMap<u64, PostRecord>,
    pub tokens: BTreeMap<String, u64>,
    /// (follower, followed)
    pub follows: BTreeSet<(u64, u64)>,
    /// (user, post)
    pub bookmarks: BTreeSet<(u64, u64)>,
    pub reposts: BTreeSet<(u64, u64)>,
    pub presence: BTreeMap<u64, String>,
}

impl Store {
    /// Two users and five posts by alice, ids 1 through 5.
    pub fn seeded() -> Self {
        let epoch = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().unwrap_or_default();
        let mut store = Store::default();
        for (id, username, name) in [(1, "alice", "Alice"), (2, "bob", "Bob")] {
            store.users.insert(
                id,
                UserRecord {
                    id,
                    username: username.to_string(),
                    name: name.to_string(),
                    bio: format!("I am {name}"),
                    created_at: epoch,
                },
            );
        }
        store.tokens.insert(ALICE_TOKEN.to_string(), 1);
        store.tokens.insert(BOB_TOKEN.to_string(), 2);
        for id in 1..=5 {
            store.posts.insert(
                id,
                PostRecord {
                    id,
                    user_id: 1,
                    text: format!("post number {id}"),
                    created_at: epoch + chrono::Duration::minutes(id as i64),
                    is_deleted: false,
                },
            );
        }
        store
    }

    fn next_post_id(&self) -> u64 {
        self.posts.keys().next_back().copied().unwrap_or(0) + 1
    }

    fn resolve_user(&self, key: &str, viewer: Option<u64>) -> Result<u64, ApiFailure> {
        let found = match key {
            "me" => viewer,
            _ => match key.strip_prefix('@') {
                Some(username) => self
                    .users
                    .values()
                    .find(|u| u.username == username)
                    .map(|u| u.id),
                None => key.parse().ok().filter(|id| self.users.contains_key(id)),
            },
        };
        found.ok_or_else(|| ApiFailure::not_found("User not found"))
    }

    fn render_user(&self, id: u64, viewer: Option<u64>) -> Value {
        let Some(user) = self.users.get(&id) else {
            return Value::Null;
        };
        let followers = self.follows.iter().filter(|(_, followed)| *followed == id).count();
        let following = self.follows.iter().filter(|(follower, _)| *follower == id).count();
        let posts = self.posts.values().filter(|p| p.user_id == id && !p.is_deleted).count();
        let mut value = json!({
            "id": id.to_string(),
            "username": user.username,
            "name": user.name,
            "type": "human",
            "created_at": timestamp(&user.created_at),
            "content": {
                "text": user.bio,
                "entities": {"mentions": [], "tags": [], "links": []}
            },
            "counts": {"followers": followers, "following": following, "posts": posts},
            "presence": self.presence.get(&id).cloned().unwrap_or_else(|| "offline".to_string()),
        });
        if let Some(viewer) = viewer {
            value["follows_you"] = json!(self.follows.contains(&(id, viewer)));
            value["you_follow"] = json!(self.follows.contains(&(viewer, id)));
        }
        value
    }

    fn render_post(&self, post: &PostRecord, viewer: Option<u64>) -> Value {
        let mut value = json!({
            "id": post.id.to_string(),
            "created_at": timestamp(&post.created_at),
            "user": self.render_user(post.user_id, viewer),
            "thread_id": post.id.to_string(),
            "source": {"name": "mock-server", "link": "https://example.invalid"},
            "counts": {
                "bookmarks": self.bookmarks.iter().filter(|(_, p)| *p == post.id).count(),
                "reposts": self.reposts.iter().filter(|(_, p)| *p == post.id).count(),
                "replies": 0,
                "threads": 0
            },
        });
        if post.is_deleted {
            value["is_deleted"] = json!(true);
        } else {
            value["content"] = json!({
                "text": post.text,
                "html": format!("<span>{}</span>", post.text),
                "entities": {"mentions": [], "tags": [], "links": []}
            });
        }
        if let Some(viewer) = viewer {
            value["you_bookmarked"] = json!(self.bookmarks.contains(&(viewer, post.id)));
            value["you_reposted"] = json!(self.reposts.contains(&(viewer, post.id)));
        }
        value
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub type Db = Arc<RwLock<Store>>;

/// An application failure, rendered as an envelope carrying `error_message`.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, format!("Bad Request: {message}"))
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Call requires authentication")
    }

    fn forbidden(message: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        tracing::info!(status = %self.status, message = %self.message, "request failed");
        let body = json!({
            "meta": {
                "code": self.status.as_u16(),
                "error_message": self.message,
                "error_id": format!("mock-{}", self.status.as_u16()),
            }
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, ApiFailure>;

fn envelope(status: StatusCode, data: Value, mut meta: Value) -> Response {
    meta["code"] = json!(status.as_u16());
    (status, Json(json!({"meta": meta, "data": data}))).into_response()
}

fn ok(data: Value) -> ApiResult {
    Ok(envelope(StatusCode::OK, data, json!({})))
}

fn viewer(headers: &HeaderMap, store: &Store) -> Option<u64> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    store.tokens.get(token).copied()
}

fn authenticate(headers: &HeaderMap, store: &Store) -> Result<u64, ApiFailure> {
    viewer(headers, store).ok_or_else(ApiFailure::unauthorized)
}

fn parse_post_id(raw: &str) -> Result<u64, ApiFailure> {
    raw.parse()
        .map_err(|_| ApiFailure::bad_request("post_id must be numeric"))
}

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/posts", axum::routing::post(create_post))
        .route("/posts/streams/global", get(global_stream))
        .route("/posts/{post_id}", get(get_post).delete(delete_post))
        .route("/posts/{post_id}/bookmark", put(bookmark_post).delete(unbookmark_post))
        .route("/posts/{post_id}/repost", put(repost_post).delete(unrepost_post))
        .route("/users/{user_id}", get(get_user).put(update_user))
        .route("/users/{user_id}/follow", put(follow_user).delete(unfollow_user))
        .route("/users/{user_id}/presence", get(get_presence).put(update_presence))
        .route("/channels/{channel_id}/mute", delete(unmute_channel))
        .route("/files/{file_id}/content", get(file_content))
        .route("/token", get(get_token))
        .route("/sys/stats", get(rate_limited))
        .with_state(db);
    Router::new().nest("/v0", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreatePost {
    pub text: Option<String>,
}

async fn create_post(State(db): State<Db>, headers: HeaderMap, body: Option<Json<CreatePost>>) -> ApiResult {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    let text = body
        .and_then(|Json(input)| input.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ApiFailure::bad_request("text is required"))?;
    let post = PostRecord {
        id: store.next_post_id(),
        user_id,
        text,
        created_at: Utc::now(),
        is_deleted: false,
    };
    store.posts.insert(post.id, post.clone());
    tracing::debug!(post_id = post.id, user_id, "post created");
    Ok(envelope(StatusCode::CREATED, store.render_post(&post, Some(user_id)), json!({})))
}

async fn get_post(State(db): State<Db>, headers: HeaderMap, Path(post_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    let viewer = viewer(&headers, &store);
    let post = store
        .posts
        .get(&parse_post_id(&post_id)?)
        .ok_or_else(|| ApiFailure::not_found("Post not found"))?;
    ok(store.render_post(post, viewer))
}

async fn delete_post(State(db): State<Db>, headers: HeaderMap, Path(post_id): Path<String>) -> ApiResult {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    let post = store
        .posts
        .get_mut(&parse_post_id(&post_id)?)
        .ok_or_else(|| ApiFailure::not_found("Post not found"))?;
    if post.user_id != user_id {
        return Err(ApiFailure::forbidden("Cannot delete another user's post"));
    }
    post.is_deleted = true;
    let post = post.clone();
    ok(store.render_post(&post, Some(user_id)))
}

async fn bookmark_post(State(db): State<Db>, headers: HeaderMap, Path(post_id): Path<String>) -> ApiResult {
    toggle_post(db, headers, post_id, |store| &mut store.bookmarks, true).await
}

async fn unbookmark_post(State(db): State<Db>, headers: HeaderMap, Path(post_id): Path<String>) -> ApiResult {
    toggle_post(db, headers, post_id, |store| &mut store.bookmarks, false).await
}

async fn repost_post(State(db): State<Db>, headers: HeaderMap, Path(post_id): Path<String>) -> ApiResult {
    toggle_post(db, headers, post_id, |store| &mut store.reposts, true).await
}

async fn unrepost_post(State(db): State<Db>, headers: HeaderMap, Path(post_id): Path<String>) -> ApiResult {
    toggle_post(db, headers, post_id, |store| &mut store.reposts, false).await
}

async fn toggle_post(
    db: Db,
    headers: HeaderMap,
    post_id: String,
    relation: fn(&mut Store) -> &mut BTreeSet<(u64, u64)>,
    on: bool,
) -> ApiResult {
    let mut store = db.write().await;
    let user_id = authenticate(&headers, &store)?;
    let post_id = parse_post_id(&post_id)?;
    let post = store
        .posts
        .get(&post_id)
        .cloned()
        .ok_or_else(|| ApiFailure::not_found("Post not found"))?;
    let set = relation(&mut store);
    if on {
        set.insert((user_id, post_id));
    } else {
        set.remove(&(user_id, post_id));
    }
    ok(store.render_post(&post, Some(user_id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    pub before_id: Option<u64>,
    pub since_id: Option<u64>,
    pub count: Option<usize>,
}

/// Newest first. `before_id` and `since_id` are exclusive bounds.
async fn global_stream(State(db): State<Db>, headers: HeaderMap, Query(paging): Query<Paging>) -> ApiResult {
    let store = db.read().await;
    let viewer = viewer(&headers, &store);
    let count = paging.count.unwrap_or(DEFAULT_COUNT).clamp(1, MAX_COUNT);
    let mut matching = store
        .posts
        .values()
        .rev()
        .filter(|p| !p.is_deleted)
        .filter(|p| paging.before_id.map_or(true, |before| p.id < before))
        .filter(|p| paging.since_id.map_or(true, |since| p.id > since));
    let page: Vec<&PostRecord> = matching.by_ref().take(count).collect();
    let more = matching.next().is_some();

    let mut meta = json!({"more": more});
    if let (Some(first), Some(last)) = (page.first(), page.last()) {
        meta["max_id"] = json!(first.id.to_string());
        meta["min_id"] = json!(last.id.to_string());
    }
    let data: Vec<Value> = page.iter().map(|p| store.render_post(p, viewer)).collect();
    Ok(envelope(StatusCode::OK, Value::Array(data), meta))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

async fn get_user(State(db): State<Db>, headers: HeaderMap, Path(user_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    let viewer = viewer(&headers, &store);
    let id = store.resolve_user(&user_id, viewer)?;
    ok(store.render_user(id, viewer))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub content: Option<Content>,
}

async fn update_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(input): Json<UpdateUser>,
) -> ApiResult {
    let mut store = db.write().await;
    let viewer = authenticate(&headers, &store)?;
    if store.resolve_user(&user_id, Some(viewer))? != viewer {
        return Err(ApiFailure::forbidden("Cannot update another user"));
    }
    if let Some(user) = store.users.get_mut(&viewer) {
        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(content) = input.content {
            user.bio = content.text;
        }
    }
    ok(store.render_user(viewer, Some(viewer)))
}

async fn follow_user(State(db): State<Db>, headers: HeaderMap, Path(user_id): Path<String>) -> ApiResult {
    set_follow(db, headers, user_id, true).await
}

async fn unfollow_user(State(db): State<Db>, headers: HeaderMap, Path(user_id): Path<String>) -> ApiResult {
    set_follow(db, headers, user_id, false).await
}

async fn set_follow(db: Db, headers: HeaderMap, user_id: String, on: bool) -> ApiResult {
    let mut store = db.write().await;
    let viewer = authenticate(&headers, &store)?;
    let target = store.resolve_user(&user_id, Some(viewer))?;
    if target == viewer {
        return Err(ApiFailure::bad_request("cannot follow yourself"));
    }
    if on {
        store.follows.insert((viewer, target));
    } else {
        store.follows.remove(&(viewer, target));
    }
    ok(store.render_user(target, Some(viewer)))
}

async fn get_presence(State(db): State<Db>, headers: HeaderMap, Path(user_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    let viewer = authenticate(&headers, &store)?;
    let id = store.resolve_user(&user_id, Some(viewer))?;
    let presence = store.presence.get(&id).cloned().unwrap_or_else(|| "offline".to_string());
    ok(json!({"id": id.to_string(), "presence": presence}))
}

#[derive(Debug, Deserialize)]
pub struct PresenceQuery {
    pub presence: Option<String>,
}

async fn update_presence(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<PresenceQuery>,
) -> ApiResult {
    let mut store = db.write().await;
    let viewer = authenticate(&headers, &store)?;
    if store.resolve_user(&user_id, Some(viewer))? != viewer {
        return Err(ApiFailure::forbidden("Cannot set another user's presence"));
    }
    let presence = query.presence.unwrap_or_else(|| "1".to_string());
    store.presence.insert(viewer, presence.clone());
    ok(json!({"id": viewer.to_string(), "presence": presence}))
}

// ---------------------------------------------------------------------------
// Everything else
// ---------------------------------------------------------------------------

async fn unmute_channel(State(db): State<Db>, headers: HeaderMap, Path(_channel_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    authenticate(&headers, &store)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn file_content(State(db): State<Db>, headers: HeaderMap, Path(file_id): Path<String>) -> ApiResult {
    let store = db.read().await;
    authenticate(&headers, &store)?;
    if file_id == LARGE_FILE_ID {
        let body = vec![b'x'; LARGE_FILE_LEN];
        return Ok(([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response());
    }
    let body = format!("content of file {file_id}");
    Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

async fn get_token(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    let store = db.read().await;
    let user_id = authenticate(&headers, &store)?;
    ok(json!({
        "app": {"id": "mock-app", "name": "Mock", "link": "https://example.invalid"},
        "scopes": ["basic", "stream", "write_post", "follow"],
        "user": store.render_user(user_id, Some(user_id)),
    }))
}

async fn rate_limited() -> ApiResult {
    Err(ApiFailure::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests"))
}
