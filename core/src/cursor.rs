//! Lazy pagination over list endpoints.
//!
//! A `Cursor` calls a list operation, yields the items of the page, then asks
//! for the next page with `before_id` set from `meta.min_id` (or `since_id`
//! from `meta.max_id` when walking towards newer items). It stops on an
//! empty page, when `meta` has no token to continue from, when `meta.more`
//! is `false`, or after yielding an error.

use std::collections::VecDeque;

use crate::client::Client;
use crate::endpoint::{Args, Endpoint, PathArg};
use crate::error::PnutError;
use crate::types::{FromResource, Meta};

/// Which way a cursor walks the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Back in time, via `before_id`.
    #[default]
    Older,
    /// Forward in time, via `since_id`.
    Newer,
}

impl Direction {
    fn param(self) -> &'static str {
        match self {
            Direction::Older => "before_id",
            Direction::Newer => "since_id",
        }
    }

    fn token(self, meta: &Meta) -> Option<String> {
        match self {
            Direction::Older => meta.min_id(),
            Direction::Newer => meta.max_id(),
        }
    }
}

pub struct Cursor<T, F> {
    fetch: F,
    args: Args,
    direction: Direction,
    token: Option<String>,
    buffer: VecDeque<T>,
    done: bool,
}

impl<T, F> Cursor<T, F>
where
    F: FnMut(Args) -> Result<(Vec<T>, Meta), PnutError>,
{
    /// Page through `fetch`, starting from `args`.
    pub fn new(fetch: F, args: Args) -> Self {
        Self {
            fetch,
            args,
            direction: Direction::Older,
            token: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    fn next_page(&mut self) -> Result<(), PnutError> {
        let mut args = self.args.clone();
        if let Some(token) = &self.token {
            args = args.param(self.direction.param(), token.as_str());
        }
        let (items, meta) = (self.fetch)(args)?;
        if items.is_empty() {
            self.done = true;
            return Ok(());
        }
        tracing::debug!(items = items.len(), min_id = ?meta.min_id(), max_id = ?meta.max_id(), "cursor page");
        self.token = self.direction.token(&meta);
        if self.token.is_none() || meta.more() == Some(false) {
            self.done = true;
        }
        self.buffer.extend(items);
        Ok(())
    }
}

impl<T, F> Iterator for Cursor<T, F>
where
    F: FnMut(Args) -> Result<(Vec<T>, Meta), PnutError>,
{
    type Item = Result<T, PnutError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.next_page() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

impl Client {
    /// Iterate every item of a list endpoint, page by page.
    pub fn cursor<T: FromResource>(
        &self,
        endpoint: &'static Endpoint,
        path_args: Vec<PathArg>,
        args: Args,
    ) -> Cursor<T, impl FnMut(Args) -> Result<(Vec<T>, Meta), PnutError>> {
        let client = self.clone();
        Cursor::new(
            move |args| client.call(endpoint, &path_args, args)?.into_many(),
            args,
        )
    }
}
