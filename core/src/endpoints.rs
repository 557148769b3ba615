//! The pnut.io endpoint table.
//!
//! One `endpoints!` invocation declares every operation. From it the macro
//! generates:
//! - a static `Endpoint` descriptor per operation in [`api`];
//! - the [`ENDPOINTS`] registry, used for lookup by name;
//! - a typed `Client` method per operation, taking one `impl Into<PathArg>`
//!   per path placeholder followed by `Args`.
//!
//! Placeholder names are repeated next to the operation name because the
//! macro cannot read them out of the path literal. A unit test keeps the two
//! in sync.

use serde_json::Value;

use crate::client::Client;
use crate::endpoint::{Args, ContentKind, Endpoint, ParamGroup, PathArg};
use crate::error::PnutError;
use crate::http::{HttpMethod, HttpResponse};
use crate::model::Model;
use crate::types::{Channel, ExploreStream, File, Interaction, Message, Meta, PayloadKind, Post, Token, User};

pub const PAGINATION: ParamGroup = &["since_id", "before_id", "count"];

pub const POST: ParamGroup = &[
    "include_deleted",
    "include_client",
    "include_counts",
    "include_html",
    "include_post_html",
    "include_bookmarked_by",
    "include_reposted_by",
    "include_directed_posts",
    "include_copy_mentions",
    "include_muted",
    "include_raw",
    "include_post_raw",
    "include_user",
    "include_user_html",
    "include_presence",
    "include_user_raw",
];

pub const USER: ParamGroup = &[
    "include_html",
    "include_user_html",
    "include_counts",
    "include_user",
    "include_presence",
    "include_raw",
    "include_user_raw",
];

pub const CHANNEL: ParamGroup = &[
    "include_read",
    "channel_types",
    "exclude_channel_types",
    "include_marker",
    "include_inactive",
    "include_raw",
    "include_channel_raw",
    "include_recent_message",
    "include_limited_users",
    "include_message_raw",
    "include_html",
    "include_user_html",
    "include_counts",
    "include_user",
    "include_presence",
    "include_user_raw",
];

pub const MESSAGE: ParamGroup = &[
    "include_deleted",
    "include_html",
    "include_message_html",
    "include_raw",
    "include_message_raw",
    "include_client",
    "include_user_html",
    "include_counts",
    "include_user",
    "include_presence",
    "include_user_raw",
];

pub const FILE: ParamGroup = &[
    "file_types",
    "include_incomplete",
    "include_private",
    "include_raw",
    "include_file_raw",
    "include_html",
    "include_user_html",
    "include_counts",
    "include_user",
    "include_presence",
    "include_user_raw",
];

pub const IDS: ParamGroup = &["ids"];

pub const PRESENCE: ParamGroup = &["presence"];

pub const POST_SEARCH: ParamGroup = &[
    "q",
    "tags",
    "index",
    "order",
    "query",
    "text",
    "hashtags",
    "links",
    "link_domains",
    "mentions",
    "leading_mentions",
    "annotation_types",
    "attachment_types",
    "crosspost_url",
    "crosspost_domain",
    "place_id",
    "is_reply",
    "is_directed",
    "has_location",
    "has_checkin",
    "is_crosspost",
    "has_attachment",
    "has_oembed_photo",
    "has_oembed_video",
    "has_oembed_html5video",
    "has_oembed_rich",
    "language",
    "client_id",
    "creator_id",
    "reply_to",
    "thread_id",
];

pub const USER_SEARCH: ParamGroup = &["q", "count", "types"];

pub const CHANNEL_SEARCH: ParamGroup = &[
    "q",
    "order",
    "categories",
    "channel_types",
    "exclude_channel_types",
    "creator_id",
    "tags",
    "is_private",
    "is_public",
];

pub const MESSAGE_SEARCH: ParamGroup = &["q", "order", "channel_ids", "creator_id", "tags"];

const BASE: Endpoint = Endpoint {
    name: "",
    path: "",
    method: HttpMethod::Get,
    params: &[],
    payload: PayloadKind::Model,
    list: false,
    requires_auth: true,
    content: ContentKind::Json,
    raw_response: false,
};

macro_rules! list_flag {
    (one) => {
        false
    };
    (many) => {
        true
    };
    (raw) => {
        false
    };
}

macro_rules! auth_flag {
    (auth) => {
        true
    };
    (public) => {
        false
    };
}

macro_rules! typed_method {
    (one $payload:ident $name:ident ($($arg:ident),*) $method:ident $path:literal) => {
        #[doc = concat!("`", stringify!($method), " ", $path, "`")]
        pub fn $name(&self, $($arg: impl Into<PathArg>,)* args: Args) -> Result<($payload, Meta), PnutError> {
            self.call(&api::$name, &[$($arg.into()),*], args)?.into_one()
        }
    };
    (many $payload:ident $name:ident ($($arg:ident),*) $method:ident $path:literal) => {
        #[doc = concat!("`", stringify!($method), " ", $path, "`")]
        pub fn $name(&self, $($arg: impl Into<PathArg>,)* args: Args) -> Result<(Vec<$payload>, Meta), PnutError> {
            self.call(&api::$name, &[$($arg.into()),*], args)?.into_many()
        }
    };
    (raw $payload:ident $name:ident ($($arg:ident),*) $method:ident $path:literal) => {
        #[doc = concat!("`", stringify!($method), " ", $path, "`, unprocessed.")]
        pub fn $name(&self, $($arg: impl Into<PathArg>,)* args: Args) -> Result<HttpResponse, PnutError> {
            self.call(&api::$name, &[$($arg.into()),*], args)?.into_raw()
        }
    };
}

macro_rules! endpoints {
    ($(
        $name:ident($($arg:ident),*) $method:ident $path:literal
            => $shape:ident $payload:ident [$($group:ident),*] $auth:ident
            $(, $field:ident = $value:expr)*;
    )*) => {
        /// One static descriptor per operation.
        #[allow(non_upper_case_globals)]
        pub mod api {
            use super::*;

            $(
                pub static $name: Endpoint = Endpoint {
                    name: stringify!($name),
                    path: $path,
                    method: HttpMethod::$method,
                    params: &[$($group),*],
                    payload: PayloadKind::$payload,
                    list: list_flag!($shape),
                    requires_auth: auth_flag!($auth),
                    $($field: $value,)*
                    ..BASE
                };
            )*
        }

        /// Every operation, in declaration order.
        pub static ENDPOINTS: &[&Endpoint] = &[$(&api::$name),*];

        #[cfg(test)]
        const SIGNATURES: &[(&str, &[&str])] = &[$((stringify!($name), &[$(stringify!($arg)),*])),*];

        impl Client {
            $(typed_method!($shape $payload $name ($($arg),*) $method $path);)*
        }
    };
}

endpoints! {
    // Posts
    create_post() Post "/posts" => one Post [POST] auth;
    get_post(post_id) Get "/posts/{post_id}" => one Post [POST] public;
    delete_post(post_id) Delete "/posts/{post_id}" => one Post [POST] auth;
    repost_post(post_id) Put "/posts/{post_id}/repost" => one Post [POST] auth;
    unrepost_post(post_id) Delete "/posts/{post_id}/repost" => one Post [POST] auth;
    bookmark_post(post_id) Put "/posts/{post_id}/bookmark" => one Post [POST] auth;
    unbookmark_post(post_id) Delete "/posts/{post_id}/bookmark" => one Post [POST] auth;
    get_posts() Get "/posts" => many Post [PAGINATION, POST, IDS] auth;
    users_posts(user_id) Get "/users/{user_id}/posts" => many Post [PAGINATION, POST] auth;
    users_bookmarked_posts(user_id) Get "/users/{user_id}/bookmarks" => many Post [PAGINATION, POST] auth;
    users_mentioned_posts(user_id) Get "/users/{user_id}/mentions" => many Post [PAGINATION, POST] auth;
    posts_with_hashtag(hashtag) Get "/posts/tag/{hashtag}" => many Post [PAGINATION, POST] public;
    posts_thread(post_id) Get "/posts/{post_id}/thread" => many Post [PAGINATION, POST] auth;
    users_post_streams_me() Get "/posts/streams/me" => many Post [PAGINATION, POST] auth;
    users_post_streams_unified() Get "/posts/streams/unified" => many Post [PAGINATION, POST] auth;
    posts_streams_global() Get "/posts/streams/global" => many Post [PAGINATION, POST] public;
    post_search() Get "/posts/search" => many Post [PAGINATION, POST, POST_SEARCH] auth;

    // Users
    get_user(user_id) Get "/users/{user_id}" => one User [USER] public;
    get_users() Get "/users" => many User [PAGINATION, USER, IDS] public;
    update_user(user_id) Put "/users/{user_id}" => one User [USER] auth;
    patch_user(user_id) Patch "/users/{user_id}" => one User [USER] auth;
    update_avatar() Post "/users/me/avatar" => one User [USER] auth;
    update_cover() Post "/users/me/cover" => one User [USER] auth;
    follow_user(user_id) Put "/users/{user_id}/follow" => one User [USER] auth;
    unfollow_user(user_id) Delete "/users/{user_id}/follow" => one User [USER] auth;
    mute_user(user_id) Put "/users/{user_id}/mute" => one User [USER] auth;
    unmute_user(user_id) Delete "/users/{user_id}/mute" => one User [USER] auth;
    block_user(user_id) Put "/users/{user_id}/block" => one User [USER] auth;
    unblock_user(user_id) Delete "/users/{user_id}/block" => one User [USER] auth;
    users_following(user_id) Get "/users/{user_id}/following" => many User [PAGINATION, USER] auth;
    users_followers(user_id) Get "/users/{user_id}/followers" => many User [PAGINATION, USER] auth;
    users_muted_users(user_id) Get "/users/{user_id}/muted" => many User [PAGINATION, USER] auth;
    users_muted_users_ids(user_id) Get "/users/{user_id}/muted" => many User [PAGINATION, USER] auth;
    users_blocked_users(user_id) Get "/users/{user_id}/blocked" => many User [PAGINATION, USER] auth;
    user_search() Get "/users/search" => many User [PAGINATION, USER, USER_SEARCH] auth;
    user_presence() Get "/presence" => many Value [USER] auth;
    get_users_presence(user_id) Get "/users/{user_id}/presence" => one Value [USER] auth;
    update_users_presence(user_id) Put "/users/{user_id}/presence" => one Value [USER, PRESENCE] auth;

    // Channels
    subscribed_channels() Get "/users/me/channels/subscribed" => many Channel [PAGINATION, CHANNEL] auth;
    existing_pm() Get "/users/me/channels/existing_pm" => one Channel [PAGINATION, CHANNEL, IDS] auth;
    create_channel() Post "/channels" => one Channel [CHANNEL] auth;
    get_channel(channel_id) Get "/channels/{channel_id}" => one Channel [CHANNEL] auth;
    get_channels() Get "/channels" => many Channel [PAGINATION, CHANNEL, IDS] auth;
    users_channels() Get "/users/me/channels" => many Channel [PAGINATION, CHANNEL] auth;
    num_unread_pm_channels() Get "/users/me/channels/num_unread/pm" => one Value [CHANNEL] auth;
    update_channel(channel_id) Put "/channels/{channel_id}" => one Channel [CHANNEL] auth;
    subscribe_channel(channel_id) Put "/channels/{channel_id}/subscribe" => one Channel [CHANNEL] auth;
    unsubscribe_channel(channel_id) Delete "/channels/{channel_id}/subscribe" => one Channel [CHANNEL] auth;
    subscribed_users(channel_id) Get "/channels/{channel_id}/subscribers" => many User [PAGINATION, CHANNEL] auth;
    mute_channel(channel_id) Put "/channels/{channel_id}/mute" => one Channel [CHANNEL] auth;
    unmute_channel(channel_id) Delete "/channels/{channel_id}/mute" => one Channel [CHANNEL] auth;
    muted_channels() Get "/users/me/channels/muted" => many Channel [PAGINATION, CHANNEL] auth;
    channel_search() Get "/channels/search" => many Channel [PAGINATION, CHANNEL, CHANNEL_SEARCH] auth;

    // Messages
    get_channel_messages(channel_id) Get "/channels/{channel_id}/messages" => many Message [PAGINATION, MESSAGE] auth;
    create_message(channel_id) Post "/channels/{channel_id}/messages" => one Message [MESSAGE] auth;
    get_message(channel_id, message_id) Get "/channels/{channel_id}/messages/{message_id}" => one Message [MESSAGE] auth;
    get_messages() Get "/channels/messages" => many Message [PAGINATION, MESSAGE, IDS] auth;
    users_messages() Get "/users/me/messages" => many Message [PAGINATION, MESSAGE] auth;
    delete_message(channel_id, message_id) Delete "/channels/{channel_id}/messages/{message_id}"
        => one Message [PAGINATION, MESSAGE, IDS] auth;
    message_search() Get "/channels/messages/search" => many Message [PAGINATION, MESSAGE, MESSAGE_SEARCH] auth;
    sticky_messages(channel_id) Get "/channels/{channel_id}/sticky_messages" => many Message [PAGINATION, MESSAGE] auth;
    stick_message(channel_id, message_id) Put "/channels/{channel_id}/messages/{message_id}/sticky"
        => one Message [MESSAGE] auth;
    unstick_message(channel_id, message_id) Delete "/channels/{channel_id}/messages/{message_id}/sticky"
        => one Message [MESSAGE] auth;

    // Files
    create_file() Post "/files" => one File [FILE] auth, content = ContentKind::Multipart;
    update_file(file_id) Put "/files/{file_id}" => one File [FILE] auth;
    set_file_content(file_id) Put "/files/{file_id}/content" => one File [FILE] auth, content = ContentKind::Multipart;
    get_file_content(file_id) Get "/files/{file_id}/content" => raw File [FILE] auth, raw_response = true;
    get_file(file_id) Get "/files/{file_id}" => one File [FILE] auth;
    get_files() Get "/files" => many File [FILE, IDS] auth;
    delete_file(file_id) Delete "/files/{file_id}" => one File [FILE] auth;
    get_my_files() Get "/users/me/files" => many File [FILE, PAGINATION] auth;

    // Interactions
    interactions_with_user() Get "/users/me/actions" => many Interaction [PAGINATION] auth;

    // Text processing
    text_process() Post "/text/process" => one Model [] auth;

    // Token
    get_token() Get "/token" => one Token [] auth;

    // System
    get_config() Get "/sys/config" => one Model [] auth;
    get_stats() Get "/sys/stats" => one Model [] auth;

    // Explore streams
    get_explore_streams() Get "/posts/streams/explore" => many ExploreStream [] public;
    get_explore_stream(slug) Get "/posts/streams/explore/{slug}" => many Post [PAGINATION, POST] public;
}

impl Endpoint {
    /// The registered descriptor called `name`.
    pub fn lookup(name: &str) -> Option<&'static Endpoint> {
        ENDPOINTS.iter().copied().find(|endpoint| endpoint.name == name)
    }
}
