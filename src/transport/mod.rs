//! Forum transport abstraction: trait + Reddit and mock implementations.
//!
//! `ForumTransport` is everything the bot needs from the forum: a stream of
//! new comments, a way to reply, and the "handled" marker that keeps a
//! comment from being answered twice.
//! - `RedditTransport` speaks the Reddit OAuth API over ureq (sync HTTP).
//! - `MockTransport` provides an in-memory queue for tests.

pub mod reddit;

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

pub use reddit::RedditTransport;

// ── Comment ─────────────────────────────────────────────────────────────

/// A comment as seen on the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Transport-assigned identifier.
    pub id: String,
    pub body: String,
    /// Author account name.
    pub author: String,
    /// Whether the handled marker was already set when the comment was read.
    pub handled: bool,
}

impl Comment {
    pub fn new(id: impl Into<String>, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            author: author.into(),
            handled: false,
        }
    }
}

// ── ForumTransport trait ────────────────────────────────────────────────

/// The stream source, poster and handled marker, as one collaborator.
pub trait ForumTransport {
    /// Account name the bot posts as. Comments by this author are skipped.
    fn identity(&self) -> &str;

    /// Block until the next new comment. `Ok(None)` ends the stream, either
    /// because the source is exhausted or because shutdown was requested.
    fn next_comment(&mut self) -> TransportResult<Option<Comment>>;

    /// Post `body` as a reply to the comment.
    fn reply(&mut self, comment_id: &str, body: &str) -> TransportResult<()>;

    /// Set the handled marker on the comment.
    fn mark_handled(&mut self, comment_id: &str) -> TransportResult<()>;
}

// ── MockTransport ───────────────────────────────────────────────────────

/// In-memory transport. Comments are served from a queue; replies and
/// handled markers are recorded. Faults can be queued per operation and are
/// returned by the next call of that operation.
#[derive(Debug, Default)]
pub struct MockTransport {
    identity: String,
    inbox: VecDeque<Comment>,
    replies: Vec<(String, String)>,
    handled: HashSet<String>,
    handled_order: Vec<String>,
    poll_faults: VecDeque<TransportError>,
    reply_faults: VecDeque<TransportError>,
    mark_faults: VecDeque<TransportError>,
}

impl MockTransport {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Queue a comment for delivery.
    pub fn push_comment(&mut self, comment: Comment) {
        self.inbox.push_back(comment);
    }

    /// Make the next `next_comment` call fail.
    pub fn fail_next_poll(&mut self, error: TransportError) {
        self.poll_faults.push_back(error);
    }

    /// Make the next `reply` call fail.
    pub fn fail_next_reply(&mut self, error: TransportError) {
        self.reply_faults.push_back(error);
    }

    /// Make the next `mark_handled` call fail.
    pub fn fail_next_mark(&mut self, error: TransportError) {
        self.mark_faults.push_back(error);
    }

    /// `(comment_id, body)` for every successful reply, in order.
    pub fn replies(&self) -> &[(String, String)] {
        &self.replies
    }

    /// Comment ids marked handled, in order.
    pub fn handled(&self) -> &[String] {
        &self.handled_order
    }

    pub fn is_handled(&self, comment_id: &str) -> bool {
        self.handled.contains(comment_id)
    }

    /// Comments still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl ForumTransport for MockTransport {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn next_comment(&mut self) -> TransportResult<Option<Comment>> {
        if let Some(err) = self.poll_faults.pop_front() {
            return Err(err);
        }
        Ok(self.inbox.pop_front().map(|mut c| {
            c.handled |= self.handled.contains(&c.id);
            c
        }))
    }

    fn reply(&mut self, comment_id: &str, body: &str) -> TransportResult<()> {
        if let Some(err) = self.reply_faults.pop_front() {
            return Err(err);
        }
        self.replies.push((comment_id.to_string(), body.to_string()));
        Ok(())
    }

    fn mark_handled(&mut self, comment_id: &str) -> TransportResult<()> {
        if let Some(err) = self.mark_faults.pop_front() {
            return Err(err);
        }
        if self.handled.insert(comment_id.to_string()) {
            self.handled_order.push(comment_id.to_string());
        }
        Ok(())
    }
}
