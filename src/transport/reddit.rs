//! Reddit transport over the OAuth API.
//!
//! Authentication uses the password grant for script apps. New comments are
//! found by polling `/r/{sub}/comments`; everything present at startup is
//! skipped. The account's `saved` flag is the handled marker.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use super::{Comment, ForumTransport};
use crate::backoff::{Sleeper, ThreadSleeper};
use crate::config::RedditCredentials;
use crate::error::{TransportError, TransportResult};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Refresh the token this long before Reddit says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);
/// Ids remembered for de-duplication across polls.
const SEEN_CAPACITY: usize = 4096;
const POLL_LIMIT: u32 = 100;

/// Polling Reddit client.
pub struct RedditTransport {
    agent: ureq::Agent,
    credentials: RedditCredentials,
    subreddit: String,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
    sleeper: ThreadSleeper,
    token: String,
    token_expires: Instant,
    buffer: VecDeque<Comment>,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    primed: bool,
}

impl RedditTransport {
    /// Authenticate and prepare to stream `subreddit`.
    pub fn connect(
        credentials: RedditCredentials,
        subreddit: impl Into<String>,
        user_agent: &str,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> TransportResult<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout(HTTP_TIMEOUT)
            .user_agent(user_agent)
            .build();

        let mut transport = Self {
            agent,
            credentials,
            subreddit: subreddit.into(),
            poll_interval,
            sleeper: ThreadSleeper::interruptible(Arc::clone(&shutdown)),
            shutdown,
            token: String::new(),
            token_expires: Instant::now(),
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            primed: false,
        };
        transport.authenticate()?;
        tracing::info!(
            user = %transport.credentials.username,
            subreddit = %transport.subreddit,
            "authenticated with reddit"
        );
        Ok(transport)
    }

    fn authenticate(&mut self) -> TransportResult<()> {
        let auth = basic_auth(&self.credentials.client_id, &self.credentials.client_secret);
        let response = self
            .agent
            .post(TOKEN_URL)
            .set("Authorization", &auth)
            .send_form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .map_err(|e| TransportError::Auth {
                message: e.to_string(),
            })?;

        let body: Value = response.into_json().map_err(|e| TransportError::Decode {
            url: TOKEN_URL.into(),
            message: e.to_string(),
        })?;

        if let Some(error) = body["error"].as_str() {
            return Err(TransportError::Auth {
                message: error.to_string(),
            });
        }
        let token = body["access_token"]
            .as_str()
            .ok_or_else(|| TransportError::Auth {
                message: "token response has no access_token".into(),
            })?;
        let lifetime = Duration::from_secs(body["expires_in"].as_u64().unwrap_or(3600));

        self.token = format!("bearer {token}");
        self.token_expires = Instant::now() + lifetime.saturating_sub(TOKEN_SLACK);
        Ok(())
    }

    fn ensure_token(&mut self) -> TransportResult<()> {
        if Instant::now() >= self.token_expires {
            tracing::debug!("refreshing reddit access token");
            self.authenticate()?;
        }
        Ok(())
    }

    fn get(&mut self, path: &str) -> TransportResult<Value> {
        self.ensure_token()?;
        let url = format!("{API_BASE}{path}");
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &self.token)
            .call()
            .map_err(|e| http_error(&url, e))?;
        response.into_json().map_err(|e| TransportError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn post(&mut self, path: &str, form: &[(&str, &str)]) -> TransportResult<Value> {
        self.ensure_token()?;
        let url = format!("{API_BASE}{path}");
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &self.token)
            .send_form(form)
            .map_err(|e| http_error(&url, e))?;
        response.into_json().map_err(|e| TransportError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Fetch the newest comments and buffer the unseen ones, oldest first.
    fn poll(&mut self) -> TransportResult<()> {
        let path = format!("/r/{}/comments?limit={POLL_LIMIT}&raw_json=1", self.subreddit);
        let listing = self.get(&path)?;
        let comments = parse_comment_listing(&listing);

        let mut fresh = Vec::new();
        for comment in comments {
            if self.remember(&comment.id) && self.primed {
                fresh.push(comment);
            }
        }
        if !self.primed {
            tracing::info!(skipped = self.seen.len(), "skipping existing comments");
            self.primed = true;
        }
        // Listings are newest first.
        self.buffer.extend(fresh.into_iter().rev());
        Ok(())
    }

    /// Record `id`; false when it was already seen.
    fn remember(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.seen_order.push_back(id.to_string());
        if self.seen_order.len() > SEEN_CAPACITY {
            if let Some(old) = self.seen_order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl ForumTransport for RedditTransport {
    fn identity(&self) -> &str {
        &self.credentials.username
    }

    fn next_comment(&mut self) -> TransportResult<Option<Comment>> {
        loop {
            if let Some(comment) = self.buffer.pop_front() {
                return Ok(Some(comment));
            }
            if self.stopping() {
                return Ok(None);
            }
            self.poll()?;
            if self.buffer.is_empty() {
                self.sleeper.sleep(self.poll_interval);
            }
        }
    }

    fn reply(&mut self, comment_id: &str, body: &str) -> TransportResult<()> {
        let thing = fullname(comment_id);
        let response = self.post(
            "/api/comment",
            &[("api_type", "json"), ("thing_id", thing.as_str()), ("text", body)],
        )?;
        match api_error(&response) {
            Some(message) => Err(TransportError::Api { message }),
            None => Ok(()),
        }
    }

    fn mark_handled(&mut self, comment_id: &str) -> TransportResult<()> {
        let thing = fullname(comment_id);
        self.post("/api/save", &[("id", thing.as_str())])?;
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn basic_auth(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

/// `abc123` → `t1_abc123`.
fn fullname(comment_id: &str) -> String {
    if comment_id.starts_with("t1_") {
        comment_id.to_string()
    } else {
        format!("t1_{comment_id}")
    }
}

fn http_error(url: &str, error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => TransportError::Auth {
            message: format!("{url} rejected the access token"),
        },
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let preview: String = body.chars().take(300).collect();
            TransportError::Http {
                url: url.into(),
                message: format!("HTTP {code}: {preview}"),
            }
        }
        ureq::Error::Transport(transport) => TransportError::Http {
            url: url.into(),
            message: transport.to_string(),
        },
    }
}

/// Comments out of a `Listing` JSON document. Children that are not comments
/// or lack an id are dropped.
fn parse_comment_listing(listing: &Value) -> Vec<Comment> {
    let Some(children) = listing["data"]["children"].as_array() else {
        return Vec::new();
    };
    children
        .iter()
        .filter(|child| child["kind"].as_str() == Some("t1"))
        .filter_map(|child| {
            let data = &child["data"];
            let id = data["id"].as_str()?;
            Some(Comment {
                id: id.to_string(),
                body: data["body"].as_str().unwrap_or_default().to_string(),
                author: data["author"].as_str().unwrap_or("[deleted]").to_string(),
                handled: data["saved"].as_bool().unwrap_or(false),
            })
        })
        .collect()
}

/// First entry of `json.errors`, rendered `KIND: 'message' on field 'field'`.
fn api_error(response: &Value) -> Option<String> {
    let first = response["json"]["errors"].as_array()?.first()?.as_array()?;
    let part = |i: usize| first.get(i).and_then(Value::as_str).unwrap_or_default();
    let (kind, message, field) = (part(0), part(1), part(2));
    Some(if field.is_empty() {
        format!("{kind}: '{message}'")
    } else {
        format!("{kind}: '{message}' on field '{field}'")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic_auth_header() {
        assert_eq!(basic_auth("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn fullname_prefixes_once() {
        assert_eq!(fullname("abc"), "t1_abc");
        assert_eq!(fullname("t1_abc"), "t1_abc");
    }

    #[test]
    fn parses_comment_listing() {
        let listing = json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t1", "data": {"id": "b2", "body": "CPUBot! Ryzen 5 3600", "author": "alice", "saved": false}},
                {"kind": "t3", "data": {"id": "post"}},
                {"kind": "t1", "data": {"id": "a1", "body": "thanks", "author": "PCSX2-Wiki-Bot", "saved": true}}
            ]}
        });
        let comments = parse_comment_listing(&listing);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, "b2");
        assert_eq!(comments[0].author, "alice");
        assert!(!comments[0].handled);
        assert!(comments[1].handled);
    }

    #[test]
    fn malformed_listing_is_empty() {
        assert!(parse_comment_listing(&json!({"error": 500})).is_empty());
    }

    #[test]
    fn api_error_matches_rate_limit_wording() {
        let response = json!({"json": {"errors": [[
            "RATELIMIT",
            "Looks like you've been doing that a lot. Take a break for 3 minutes before trying again.",
            "ratelimit"
        ]]}});
        assert_eq!(
            api_error(&response).unwrap(),
            "RATELIMIT: 'Looks like you've been doing that a lot. Take a break for 3 minutes \
             before trying again.' on field 'ratelimit'"
        );
    }

    #[test]
    fn no_api_error_on_success() {
        let response = json!({"json": {"errors": [], "data": {"things": []}}});
        assert!(api_error(&response).is_none());
    }
}
