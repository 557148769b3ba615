//! Resource types returned by the API.
//!
//! # Design
//! Every resource is a `Model` plus the handful of fields its kind
//! normalizes at construction: numeric ids, parsed timestamps and nested
//! resources (a post's `user`, a post's `repost_of`, an interaction's
//! `objects`). Normalized fields are pulled out of the raw mapping before the
//! rest is materialized, and written back in wire form by `serialize`, so a
//! resource can be edited and re-submitted as a request body.
//!
//! Resources deref to their `Model` for every field that is not normalized.
//! The closed `Resource` enum is what the binder produces; the endpoint's
//! `PayloadKind` picks the variant.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::client::{Client, ClientHandle};
use crate::endpoint::Args;
use crate::error::PnutError;
use crate::model::{Model, ModelValue};

/// Normalizing constructor shared by every payload type.
pub trait FromResponseData: Sized {
    fn from_response_data(raw: Value, client: &ClientHandle) -> Result<Self, PnutError>;

    /// Plain JSON in wire form.
    fn to_json(&self) -> Value;
}

/// Extraction of a concrete payload type from a materialized `Resource`.
pub trait FromResource: Sized {
    fn from_resource(resource: Resource) -> Result<Self, PnutError>;
}

macro_rules! resources {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// Which resource type an endpoint's `data` is materialized as.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PayloadKind {
            $($variant),*
        }

        /// A materialized payload item.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Resource {
            $($variant($ty)),*
        }

        impl Resource {
            /// Run the normalization hook of `kind` over `raw`.
            pub fn normalize(kind: PayloadKind, raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
                match kind {
                    $(PayloadKind::$variant => <$ty>::from_response_data(raw, client).map(Resource::$variant)),*
                }
            }

            pub fn kind(&self) -> PayloadKind {
                match self {
                    $(Resource::$variant(_) => PayloadKind::$variant),*
                }
            }

            pub fn serialize(&self) -> Value {
                match self {
                    $(Resource::$variant(inner) => FromResponseData::to_json(inner)),*
                }
            }
        }

        $(
            impl FromResource for $ty {
                fn from_resource(resource: Resource) -> Result<Self, PnutError> {
                    match resource {
                        Resource::$variant(inner) => Ok(inner),
                        other => Err(PnutError::UnexpectedReply(format!(
                            "expected {:?} payload, got {:?}",
                            PayloadKind::$variant,
                            other.kind()
                        ))),
                    }
                }
            }
        )*
    };
}

resources! {
    Model => Model,
    Value => Value,
    User => User,
    Post => Post,
    Message => Message,
    Channel => Channel,
    File => File,
    Token => Token,
    Interaction => Interaction,
    ExploreStream => ExploreStream,
}

macro_rules! model_access {
    ($($ty:ident),*) => {$(
        impl Deref for $ty {
            type Target = Model;

            fn deref(&self) -> &Model {
                &self.fields
            }
        }

        impl DerefMut for $ty {
            fn deref_mut(&mut self) -> &mut Model {
                &mut self.fields
            }
        }

        impl FromResponseData for $ty {
            fn from_response_data(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
                $ty::normalize(raw, client)
            }

            fn to_json(&self) -> Value {
                self.serialize()
            }
        }
    )*};
}

model_access!(User, Post, Message, Channel, File, Token, Interaction, ExploreStream);

impl FromResponseData for Model {
    fn from_response_data(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        Model::from_value(raw, client)
    }

    fn to_json(&self) -> Value {
        self.serialize()
    }
}

/// Pass-through payloads such as presence lists and unread counts.
impl FromResponseData for Value {
    fn from_response_data(raw: Value, _client: &ClientHandle) -> Result<Self, PnutError> {
        Ok(raw)
    }

    fn to_json(&self) -> Value {
        self.clone()
    }
}

// ---------------------------------------------------------------------------
// Field normalization helpers
// ---------------------------------------------------------------------------

fn into_object(raw: Value, kind: &str) -> Result<Map<String, Value>, PnutError> {
    match raw {
        Value::Object(map) => Ok(map),
        other => Err(PnutError::conversion(kind, format!("expected an object, got {other}"))),
    }
}

/// Ids arrive as decimal strings; numbers are accepted too.
pub(crate) fn parse_id(field: &str, value: &Value) -> Result<u64, PnutError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| PnutError::conversion(field, format!("`{s}` is not an id: {e}"))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| PnutError::conversion(field, format!("`{n}` is not an id"))),
        other => Err(PnutError::conversion(field, format!("`{other}` is not an id"))),
    }
}

fn take_id(map: &mut Map<String, Value>, field: &str) -> Result<u64, PnutError> {
    let value = map
        .remove(field)
        .ok_or_else(|| PnutError::conversion(field, "missing"))?;
    parse_id(field, &value)
}

fn take_timestamp(map: &mut Map<String, Value>, field: &str) -> Result<DateTime<Utc>, PnutError> {
    match map.remove(field) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| PnutError::conversion(field, format!("`{s}`: {e}"))),
        Some(other) => Err(PnutError::conversion(field, format!("`{other}` is not a timestamp"))),
        None => Err(PnutError::conversion(field, "missing")),
    }
}

/// Absent and `null` both mean "no nested resource".
fn take_nested<T: FromResponseData>(
    map: &mut Map<String, Value>,
    field: &str,
    client: &ClientHandle,
) -> Result<Option<T>, PnutError> {
    match map.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => T::from_response_data(raw, client).map(Some),
    }
}

fn take_nested_list<T: FromResponseData>(
    map: &mut Map<String, Value>,
    field: &str,
    client: &ClientHandle,
) -> Result<Option<Vec<T>>, PnutError> {
    match map.remove(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| T::from_response_data(item, client))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(PnutError::conversion(field, format!("expected a list, got {other}"))),
    }
}

fn wire_timestamp(value: &DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn wire_list<T: FromResponseData>(items: &[T]) -> Value {
    Value::Array(items.iter().map(FromResponseData::to_json).collect())
}

fn upgrade(fields: &Model) -> Result<Client, PnutError> {
    fields.client().upgrade()
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    fields: Model,
}

impl User {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "user")?;
        let id = take_id(&mut map, "id")?;
        let created_at = take_timestamp(&mut map, "created_at")?;
        Ok(Self {
            id,
            created_at,
            fields: Model::from_map(map, client),
        })
    }

    pub fn username(&self) -> Option<&str> {
        self.fields.get_str("username")
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get_str("name")
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert("created_at".into(), wire_timestamp(&self.created_at));
        Value::Object(map)
    }

    /// Save the current state of this user as the authenticated user's profile.
    ///
    /// `content.entities` is server-generated and is dropped from the body.
    pub fn update_user(&self) -> Result<(User, Meta), PnutError> {
        let mut body = self.serialize();
        if let Some(content) = body.get_mut("content").and_then(Value::as_object_mut) {
            content.remove("entities");
        }
        upgrade(&self.fields)?.update_user("me", Args::new().data(body))
    }

    pub fn follow_user(&self) -> Result<(User, Meta), PnutError> {
        upgrade(&self.fields)?.follow_user(self, Args::new())
    }

    pub fn unfollow_user(&self) -> Result<(User, Meta), PnutError> {
        upgrade(&self.fields)?.unfollow_user(self, Args::new())
    }

    pub fn mute_user(&self) -> Result<(User, Meta), PnutError> {
        upgrade(&self.fields)?.mute_user(self, Args::new())
    }

    pub fn unmute_user(&self) -> Result<(User, Meta), PnutError> {
        upgrade(&self.fields)?.unmute_user(self, Args::new())
    }

    pub fn block_user(&self) -> Result<(User, Meta), PnutError> {
        upgrade(&self.fields)?.block_user(self, Args::new())
    }

    pub fn unblock_user(&self) -> Result<(User, Meta), PnutError> {
        upgrade(&self.fields)?.unblock_user(self, Args::new())
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub user: Option<User>,
    pub repost_of: Option<Box<Post>>,
    pub bookmarked_by: Option<Vec<User>>,
    pub reposted_by: Option<Vec<User>>,
    fields: Model,
}

impl Post {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "post")?;
        let id = take_id(&mut map, "id")?;
        let created_at = take_timestamp(&mut map, "created_at")?;
        let user = take_nested(&mut map, "user", client)?;
        let repost_of = take_nested::<Post>(&mut map, "repost_of", client)?.map(Box::new);
        let bookmarked_by = take_nested_list(&mut map, "bookmarked_by", client)?;
        let reposted_by = take_nested_list(&mut map, "reposted_by", client)?;
        Ok(Self {
            id,
            created_at,
            user,
            repost_of,
            bookmarked_by,
            reposted_by,
            fields: Model::from_map(map, client),
        })
    }

    /// `content.text`, absent for deleted posts.
    pub fn text(&self) -> Option<&str> {
        self.fields.get_model("content")?.get_str("text")
    }

    pub fn is_deleted(&self) -> bool {
        self.fields.get_bool("is_deleted").unwrap_or(false)
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert("created_at".into(), wire_timestamp(&self.created_at));
        if let Some(user) = &self.user {
            map.insert("user".into(), user.serialize());
        }
        if let Some(repost_of) = &self.repost_of {
            map.insert("repost_of".into(), repost_of.serialize());
        }
        if let Some(users) = &self.bookmarked_by {
            map.insert("bookmarked_by".into(), wire_list(users));
        }
        if let Some(users) = &self.reposted_by {
            map.insert("reposted_by".into(), wire_list(users));
        }
        Value::Object(map)
    }

    pub fn delete(&self) -> Result<(Post, Meta), PnutError> {
        upgrade(&self.fields)?.delete_post(self, Args::new())
    }

    pub fn repost(&self) -> Result<(Post, Meta), PnutError> {
        upgrade(&self.fields)?.repost_post(self, Args::new())
    }

    pub fn unrepost(&self) -> Result<(Post, Meta), PnutError> {
        upgrade(&self.fields)?.unrepost_post(self, Args::new())
    }

    pub fn bookmark(&self) -> Result<(Post, Meta), PnutError> {
        upgrade(&self.fields)?.bookmark_post(self, Args::new())
    }

    pub fn unbookmark(&self) -> Result<(Post, Meta), PnutError> {
        upgrade(&self.fields)?.unbookmark_post(self, Args::new())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub user: Option<User>,
    fields: Model,
}

impl Message {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "message")?;
        let id = take_id(&mut map, "id")?;
        let created_at = take_timestamp(&mut map, "created_at")?;
        let user = take_nested(&mut map, "user", client)?;
        Ok(Self {
            id,
            created_at,
            user,
            fields: Model::from_map(map, client),
        })
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.fields.get_str("channel_id")
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert("created_at".into(), wire_timestamp(&self.created_at));
        if let Some(user) = &self.user {
            map.insert("user".into(), user.serialize());
        }
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Channel, File, Token
// ---------------------------------------------------------------------------

/// A channel. Its id stays a string, as on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub owner: Option<User>,
    fields: Model,
}

impl Channel {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "channel")?;
        let owner = take_nested(&mut map, "owner", client)?;
        Ok(Self {
            owner,
            fields: Model::from_map(map, client),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get_str("id")
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        if let Some(owner) = &self.owner {
            map.insert("owner".into(), owner.serialize());
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub user: Option<User>,
    fields: Model,
}

impl File {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "file")?;
        let user = take_nested(&mut map, "user", client)?;
        Ok(Self {
            user,
            fields: Model::from_map(map, client),
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get_str("id")
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        if let Some(user) = &self.user {
            map.insert("user".into(), user.serialize());
        }
        Value::Object(map)
    }
}

/// The token in use, with the user and app it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub user: Option<User>,
    fields: Model,
}

impl Token {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "token")?;
        let user = take_nested(&mut map, "user", client)?;
        Ok(Self {
            user,
            fields: Model::from_map(map, client),
        })
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        if let Some(user) = &self.user {
            map.insert("user".into(), user.serialize());
        }
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

/// What an interaction acted on; `follow` interactions act on users.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionObject {
    User(User),
    Post(Post),
}

impl InteractionObject {
    pub fn serialize(&self) -> Value {
        match self {
            InteractionObject::User(user) => user.serialize(),
            InteractionObject::Post(post) => post.serialize(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub event_date: DateTime<Utc>,
    pub objects: Vec<InteractionObject>,
    pub users: Vec<User>,
    fields: Model,
}

impl Interaction {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "interaction")?;
        let follows = map.get("action").and_then(Value::as_str) == Some("follow");
        let objects = if follows {
            take_nested_list::<User>(&mut map, "objects", client)?
                .unwrap_or_default()
                .into_iter()
                .map(InteractionObject::User)
                .collect()
        } else {
            take_nested_list::<Post>(&mut map, "objects", client)?
                .unwrap_or_default()
                .into_iter()
                .map(InteractionObject::Post)
                .collect()
        };
        let users = take_nested_list(&mut map, "users", client)?.unwrap_or_default();
        let event_date = take_timestamp(&mut map, "event_date")?;
        Ok(Self {
            event_date,
            objects,
            users,
            fields: Model::from_map(map, client),
        })
    }

    pub fn action(&self) -> Option<&str> {
        self.fields.get_str("action")
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        map.insert("event_date".into(), wire_timestamp(&self.event_date));
        map.insert(
            "objects".into(),
            Value::Array(self.objects.iter().map(InteractionObject::serialize).collect()),
        );
        map.insert("users".into(), wire_list(&self.users));
        Value::Object(map)
    }
}

// ---------------------------------------------------------------------------
// ExploreStream
// ---------------------------------------------------------------------------

/// An explore stream; addressed by its `slug`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExploreStream {
    fields: Model,
}

impl ExploreStream {
    fn normalize(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        Ok(Self {
            fields: Model::from_value(raw, client)?,
        })
    }

    pub fn slug(&self) -> Option<&str> {
        self.fields.get_str("slug")
    }

    pub fn serialize(&self) -> Value {
        self.fields.serialize()
    }
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

/// Response metadata: the application code plus pagination and error details.
#[derive(Debug, Clone, PartialEq)]
pub struct Meta {
    pub code: u16,
    fields: Model,
}

impl Meta {
    pub fn min_id(&self) -> Option<String> {
        self.id_field("min_id")
    }

    pub fn max_id(&self) -> Option<String> {
        self.id_field("max_id")
    }

    pub fn more(&self) -> Option<bool> {
        self.fields.get_bool("more")
    }

    pub fn error_message(&self) -> Option<&str> {
        self.fields.get_str("error_message")
    }

    fn id_field(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            ModelValue::Scalar(Value::String(s)) => Some(s.clone()),
            ModelValue::Scalar(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn serialize(&self) -> Value {
        let mut map = self.fields.serialize_map();
        map.insert("code".into(), Value::from(self.code));
        Value::Object(map)
    }
}

impl Deref for Meta {
    type Target = Model;

    fn deref(&self) -> &Model {
        &self.fields
    }
}

impl FromResponseData for Meta {
    fn from_response_data(raw: Value, client: &ClientHandle) -> Result<Self, PnutError> {
        let mut map = into_object(raw, "meta")?;
        let code = map
            .remove("code")
            .and_then(|v| v.as_u64())
            .and_then(|c| u16::try_from(c).ok())
            .ok_or_else(|| PnutError::conversion("meta.code", "missing or not a status code"))?;
        Ok(Self {
            code,
            fields: Model::from_map(map, client),
        })
    }

    fn to_json(&self) -> Value {
        self.serialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn detached() -> ClientHandle {
        ClientHandle::detached()
    }

    fn user_json(id: &str) -> Value {
        json!({
            "id": id,
            "username": format!("user{id}"),
            "created_at": "2016-05-01T12:00:00Z",
            "content": {"text": "bio", "entities": {"mentions": []}}
        })
    }

    #[test]
    fn user_id_and_timestamp_are_normalized() {
        let user = User::from_response_data(user_json("9"), &detached()).unwrap();
        assert_eq!(user.id, 9);
        assert_eq!(user.created_at, Utc.with_ymd_and_hms(2016, 5, 1, 12, 0, 0).unwrap());
        assert_eq!(user.username(), Some("user9"));
    }

    #[test]
    fn user_serializes_back_to_wire_form() {
        let raw = user_json("9");
        let user = User::from_response_data(raw.clone(), &detached()).unwrap();
        assert_eq!(user.serialize(), raw);
    }

    #[test]
    fn post_hydrates_nested_user_and_repost() {
        let raw = json!({
            "id": "42",
            "created_at": "2020-01-01T00:00:00Z",
            "user": user_json("1"),
            "content": {"text": "repost"},
            "repost_of": {
                "id": "41",
                "created_at": "2019-12-31T23:59:59Z",
                "user": user_json("2"),
                "content": {"text": "original"}
            },
            "bookmarked_by": [user_json("3")]
        });
        let post = Post::from_response_data(raw, &detached()).unwrap();
        assert_eq!(post.id, 42);
        assert_eq!(post.user.as_ref().unwrap().id, 1);
        assert_eq!(post.text(), Some("repost"));
        let original = post.repost_of.as_ref().unwrap();
        assert_eq!(original.id, 41);
        assert_eq!(original.user.as_ref().unwrap().id, 2);
        assert_eq!(original.text(), Some("original"));
        assert_eq!(post.bookmarked_by.as_ref().unwrap()[0].id, 3);
        assert!(post.reposted_by.is_none());
    }

    #[test]
    fn post_without_user_tolerated() {
        let raw = json!({"id": 5, "created_at": "2020-01-01T00:00:00Z", "is_deleted": true});
        let post = Post::from_response_data(raw, &detached()).unwrap();
        assert!(post.user.is_none());
        assert!(post.is_deleted());
        assert!(post.text().is_none());
    }

    #[test]
    fn post_round_trips_modulo_id_form() {
        let raw = json!({
            "id": "42",
            "created_at": "2020-01-01T00:00:00Z",
            "user": user_json("1"),
            "content": {"text": "hi"},
            "counts": {"replies": 0}
        });
        let post = Post::from_response_data(raw.clone(), &detached()).unwrap();
        assert_eq!(post.serialize(), raw);
    }

    #[test]
    fn malformed_id_is_a_conversion_error() {
        let raw = json!({"id": "forty-two", "created_at": "2020-01-01T00:00:00Z"});
        let err = Post::from_response_data(raw, &detached()).unwrap_err();
        assert!(matches!(err, PnutError::Conversion { ref field, .. } if field == "id"));
    }

    #[test]
    fn bad_timestamp_is_a_conversion_error() {
        let raw = json!({"id": "1", "created_at": "yesterday"});
        let err = User::from_response_data(raw, &detached()).unwrap_err();
        assert!(matches!(err, PnutError::Conversion { ref field, .. } if field == "created_at"));
    }

    #[test]
    fn message_hydrates_user() {
        let raw = json!({
            "id": "100",
            "channel_id": "7",
            "created_at": "2020-02-02T02:02:02Z",
            "user": user_json("4"),
            "content": {"text": "hello"}
        });
        let message = Message::from_response_data(raw, &detached()).unwrap();
        assert_eq!(message.id, 100);
        assert_eq!(message.channel_id(), Some("7"));
        assert_eq!(message.user.unwrap().id, 4);
    }

    #[test]
    fn channel_owner_is_user_and_id_stays_string() {
        let raw = json!({"id": "951", "type": "io.pnut.core.chat", "owner": user_json("9")});
        let channel = Channel::from_response_data(raw, &detached()).unwrap();
        assert_eq!(channel.id(), Some("951"));
        assert_eq!(channel.owner.as_ref().unwrap().id, 9);
        let plain = Channel::from_response_data(json!({"id": "1"}), &detached()).unwrap();
        assert!(plain.owner.is_none());
    }

    #[test]
    fn file_and_token_users_are_optional() {
        let file = File::from_response_data(json!({"id": "3", "name": "a.png"}), &detached()).unwrap();
        assert!(file.user.is_none());
        let token = Token::from_response_data(
            json!({"app": {"id": "x"}, "user": user_json("8")}),
            &detached(),
        )
        .unwrap();
        assert_eq!(token.user.unwrap().id, 8);
    }

    #[test]
    fn follow_interaction_objects_are_users() {
        let raw = json!({
            "action": "follow",
            "event_date": "2020-03-03T03:03:03Z",
            "objects": [user_json("1")],
            "users": [user_json("2")]
        });
        let interaction = Interaction::from_response_data(raw, &detached()).unwrap();
        assert_eq!(interaction.action(), Some("follow"));
        assert!(matches!(interaction.objects[0], InteractionObject::User(ref u) if u.id == 1));
        assert_eq!(interaction.users[0].id, 2);
    }

    #[test]
    fn other_interaction_objects_are_posts() {
        let raw = json!({
            "action": "bookmark",
            "event_date": "2020-03-03T03:03:03Z",
            "objects": [{"id": "55", "created_at": "2020-03-03T00:00:00Z"}],
            "users": []
        });
        let interaction = Interaction::from_response_data(raw, &detached()).unwrap();
        assert!(matches!(interaction.objects[0], InteractionObject::Post(ref p) if p.id == 55));
    }

    #[test]
    fn explore_stream_keeps_fields() {
        let raw = json!({"slug": "photos", "title": "Photos"});
        let stream = ExploreStream::from_response_data(raw.clone(), &detached()).unwrap();
        assert_eq!(stream.slug(), Some("photos"));
        assert_eq!(stream.serialize(), raw);
    }

    #[test]
    fn meta_exposes_pagination() {
        let meta = Meta::from_response_data(
            json!({"code": 200, "min_id": "10", "max_id": 20, "more": true}),
            &detached(),
        )
        .unwrap();
        assert_eq!(meta.code, 200);
        assert_eq!(meta.min_id().as_deref(), Some("10"));
        assert_eq!(meta.max_id().as_deref(), Some("20"));
        assert_eq!(meta.more(), Some(true));
    }

    #[test]
    fn normalize_dispatches_on_kind() {
        let resource = Resource::normalize(PayloadKind::User, user_json("3"), &detached()).unwrap();
        assert_eq!(resource.kind(), PayloadKind::User);
        let user = User::from_resource(resource.clone()).unwrap();
        assert_eq!(user.id, 3);
        let err = Post::from_resource(resource).unwrap_err();
        assert!(matches!(err, PnutError::UnexpectedReply(_)));
    }

    #[test]
    fn value_kind_passes_through() {
        let raw = json!([{"id": "1", "presence": "online"}]);
        let resource = Resource::normalize(PayloadKind::Value, raw.clone(), &detached()).unwrap();
        assert_eq!(resource.serialize(), raw);
    }

    #[test]
    fn self_operations_need_a_live_client() {
        let user = User::from_response_data(user_json("9"), &detached()).unwrap();
        assert!(matches!(user.follow_user(), Err(PnutError::ClientDropped)));
    }
}
