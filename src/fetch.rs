//! Talks to the blog platform's public API. The [`Fetcher`] issues exactly one
//! request per operation (no retry, no backoff) through a [`Transport`] and
//! degrades to an empty result on failure. Posts that aren't this blog's own
//! (see [`crate::post::is_excluded`]) are dropped here, and notes are narrowed
//! to comments.

use crate::comment::Comment;
use crate::post::{is_excluded, Post};
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::Duration;
use url::Url;

/// The prefix for all blog API endpoints.
pub const API_BASE: &str = "https://api.tumblr.com/v2/blog/";

/// The `meta.status` value of a successful API envelope.
const STATUS_OK: u64 = 200;

/// Performs HTTP GETs that return JSON documents.
pub trait Transport {
    fn get_json(&self, url: &Url) -> Result<JsonValue>;
}

/// A [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<HttpTransport> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rocktobot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &Url) -> Result<JsonValue> {
        log::debug!("GET {}", redact(url));
        let resp = self.client.get(url.as_str()).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }
        Ok(resp.json::<JsonValue>()?)
    }
}

/// Issues post and note requests for a single blog.
pub struct Fetcher<'a> {
    transport: &'a dyn Transport,

    /// The normalized blog identifier, e.g., `rocktobot.tumblr.com`.
    blog: String,

    api_key: String,
}

impl<'a> Fetcher<'a> {
    pub fn new(transport: &'a dyn Transport, blog: &str, api_key: &str) -> Fetcher<'a> {
        Fetcher {
            transport,
            blog: normalize_blog(blog),
            api_key: api_key.to_owned(),
        }
    }

    fn api_key(&self) -> Result<&str> {
        match self.api_key.trim().is_empty() {
            true => Err(Error::MissingApiKey),
            false => Ok(&self.api_key),
        }
    }

    /// The post-listing URL for one page of `limit` posts starting at
    /// `offset`.
    pub fn posts_url(&self, limit: usize, offset: usize) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}{}/posts", API_BASE, self.blog),
            &[
                ("api_key", self.api_key()?),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
                ("reblog_info", "true"),
            ],
        )?)
    }

    /// The notes URL for a single post.
    pub fn notes_url(&self, post_id: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}{}/notes", API_BASE, self.blog),
            &[
                ("id", post_id),
                ("mode", "conversation"),
                ("api_key", self.api_key()?),
            ],
        )?)
    }

    /// Fetches one page of the blog's own posts, propagating failures.
    pub fn try_fetch_posts(&self, limit: usize, offset: usize) -> Result<Vec<Post>> {
        let envelope = self.transport.get_json(&self.posts_url(limit, offset)?)?;
        let raw = collection(envelope, "posts")?;
        let total = raw.len();
        let posts: Vec<Post> = raw
            .into_iter()
            .filter(|post| !is_excluded(post))
            .filter_map(|post| match serde_json::from_value::<Post>(post) {
                Ok(post) => Some(post),
                Err(e) => {
                    log::warn!("Skipping malformed post: {}", e);
                    None
                }
            })
            .collect();
        log::info!(
            "Fetched {} posts from {} ({} excluded or skipped)",
            posts.len(),
            self.blog,
            total - posts.len()
        );
        Ok(posts)
    }

    /// Fetches one page of the blog's own posts. Any failure is logged and
    /// yields an empty sequence.
    pub fn fetch_posts(&self, limit: usize, offset: usize) -> Vec<Post> {
        self.try_fetch_posts(limit, offset).unwrap_or_else(|e| {
            log::error!("Error fetching posts from {}: {}", self.blog, e);
            Vec::new()
        })
    }

    /// Fetches the comments on a post, propagating failures.
    pub fn try_fetch_notes(&self, post_id: &str) -> Result<Vec<Comment>> {
        let envelope = self.transport.get_json(&self.notes_url(post_id)?)?;
        Ok(collection(envelope, "notes")?
            .into_iter()
            .filter(Comment::is_comment)
            .filter_map(|note| match serde_json::from_value::<Comment>(note) {
                Ok(comment) => Some(comment),
                Err(e) => {
                    log::warn!("Skipping malformed note on post {}: {}", post_id, e);
                    None
                }
            })
            .collect())
    }

    /// Fetches the comments on a post. Any failure is logged and yields an
    /// empty sequence.
    pub fn fetch_notes(&self, post_id: &str) -> Vec<Comment> {
        self.try_fetch_notes(post_id).unwrap_or_else(|e| {
            log::error!("Error fetching comments for post {}: {}", post_id, e);
            Vec::new()
        })
    }
}

/// Unwraps the `response.{key}` array from an API envelope, checking
/// `meta.status`.
fn collection(envelope: JsonValue, key: &'static str) -> Result<Vec<JsonValue>> {
    let status = envelope
        .get("meta")
        .and_then(|meta| meta.get("status"))
        .and_then(JsonValue::as_u64);
    if status != Some(STATUS_OK) {
        let msg = envelope
            .get("meta")
            .and_then(|meta| meta.get("msg"))
            .and_then(JsonValue::as_str)
            .unwrap_or("missing status")
            .to_owned();
        return Err(Error::Api {
            status: status.unwrap_or(0),
            msg,
        });
    }

    match envelope
        .get("response")
        .and_then(|response| response.get(key))
    {
        Some(JsonValue::Array(items)) => Ok(items.clone()),
        _ => Err(Error::MissingCollection(key)),
    }
}

/// Normalizes a blog identifier: strips the scheme and trailing slash, and
/// appends `.tumblr.com` to bare blog names.
pub fn normalize_blog(blog: &str) -> String {
    let s = blog.trim();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s);
    let s = s.trim_end_matches('/');
    match s.contains('.') {
        true => s.to_owned(),
        false => format!("{}.tumblr.com", s),
    }
}

/// Renders a URL for logs without its API key.
fn redact(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "api_key")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed API request.
#[derive(Debug)]
pub enum Error {
    /// Returned for transport-level failures (DNS, TLS, timeouts, bodies that
    /// aren't JSON).
    Http(reqwest::Error),

    /// Returned when the server answers with a non-success HTTP status.
    Status(u16),

    /// Returned when the API envelope reports a non-success status.
    Api { status: u64, msg: String },

    /// Returned when a successful envelope lacks the expected collection.
    MissingCollection(&'static str),

    /// Returned when a request URL can't be built.
    UrlParse(url::ParseError),

    /// Returned when no API key is configured.
    MissingApiKey,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(err) => err.fmt(f),
            Error::Status(code) => write!(f, "HTTP status {}", code),
            Error::Api { status, msg } => write!(f, "API status {}: {}", status, msg),
            Error::MissingCollection(key) => {
                write!(f, "API response is missing `response.{}`", key)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::MissingApiKey => write!(
                f,
                "No API key: set `api_key` in the project file or the {} environment variable",
                crate::config::API_KEY_VAR
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Status(_)
            | Error::Api { .. }
            | Error::MissingCollection(_)
            | Error::MissingApiKey => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts [`reqwest::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts [`url::ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// A [`Transport`] that answers from a fixed table of URLs and records
    /// every request. Unknown URLs answer with HTTP 404.
    #[derive(Default)]
    pub struct CannedTransport {
        responses: HashMap<String, JsonValue>,
        pub requests: RefCell<Vec<String>>,
    }

    impl CannedTransport {
        pub fn new() -> CannedTransport {
            CannedTransport::default()
        }

        pub fn with(mut self, url: &str, response: JsonValue) -> CannedTransport {
            self.responses.insert(url.to_owned(), response);
            self
        }
    }

    impl Transport for CannedTransport {
        fn get_json(&self, url: &Url) -> Result<JsonValue> {
            self.requests.borrow_mut().push(url.to_string());
            self.responses
                .get(url.as_str())
                .cloned()
                .ok_or(Error::Status(404))
        }
    }

    pub fn envelope(key: &str, items: JsonValue) -> JsonValue {
        let mut response = serde_json::Map::new();
        response.insert(key.to_owned(), items);
        json!({"meta": {"status": 200, "msg": "OK"}, "response": response})
    }

    fn posts_url(limit: usize) -> String {
        let transport = CannedTransport::new();
        Fetcher::new(&transport, "rocktobot", "KEY")
            .posts_url(limit, 0)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_fetch_posts_excludes_reblogs() {
        let transport = CannedTransport::new().with(
            &posts_url(20),
            envelope(
                "posts",
                json!([
                    {"id_string": "1", "type": "text", "timestamp": 100, "body": "<p>mine</p>"},
                    {"id_string": "2", "type": "text", "timestamp": 200, "body": "<p>theirs</p>",
                     "reblogged_from_name": "someone"},
                    {"id_string": "3", "type": "photo", "timestamp": 300, "caption": "",
                     "reblogged_root_id": "99"},
                    {"id_string": "4", "type": "answer", "timestamp": 400, "question": "?"},
                    {"id_string": "5", "type": "quote", "timestamp": 500, "text": "q"},
                ]),
            ),
        );
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        let ids: Vec<String> = fetcher.fetch_posts(20, 0).into_iter().map(|p| p.id).collect();
        assert_eq!(vec!["1", "5"], ids);
    }

    #[test]
    fn test_fetch_posts_skips_malformed() {
        let transport = CannedTransport::new().with(
            &posts_url(20),
            envelope(
                "posts",
                json!([
                    {"id_string": "1", "type": "text", "body": "no timestamp"},
                    {"id_string": "2", "type": "text", "timestamp": 1, "body": "ok"},
                ]),
            ),
        );
        let posts = Fetcher::new(&transport, "rocktobot", "KEY").fetch_posts(20, 0);
        assert_eq!(1, posts.len());
        assert_eq!("2", posts[0].id);
    }

    #[test]
    fn test_fetch_posts_failure_is_empty_without_retry() {
        let transport = CannedTransport::new();
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        assert!(fetcher.fetch_posts(20, 0).is_empty());
        assert_eq!(1, transport.requests.borrow().len());
        assert!(matches!(fetcher.try_fetch_posts(20, 0), Err(Error::Status(404))));
    }

    #[test]
    fn test_fetch_posts_api_status_failure() {
        let transport = CannedTransport::new().with(
            &posts_url(20),
            json!({"meta": {"status": 401, "msg": "Unauthorized"}, "response": []}),
        );
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        assert!(fetcher.fetch_posts(20, 0).is_empty());
        match fetcher.try_fetch_posts(20, 0) {
            Err(Error::Api { status, msg }) => {
                assert_eq!(401, status);
                assert_eq!("Unauthorized", msg);
            }
            other => panic!("wanted an API error; found {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_fetch_notes_keeps_comments_only() {
        let transport = CannedTransport::new();
        let url = Fetcher::new(&transport, "rocktobot", "KEY")
            .notes_url("42")
            .unwrap();
        let transport = transport.with(
            url.as_str(),
            envelope(
                "notes",
                json!([
                    {"type": "like", "timestamp": 1, "blog_name": "a"},
                    {"type": "reblog", "timestamp": 2, "blog_name": "b"},
                    {"type": "reply", "timestamp": 3, "blog": {"name": "c"}, "content": "nice"},
                    {"type": "comment", "timestamp": 4, "blog": {"name": "d"}, "reply_text": "hey"},
                ]),
            ),
        );
        let comments = Fetcher::new(&transport, "rocktobot", "KEY").fetch_notes("42");
        let names: Vec<&str> = comments.iter().map(|c| c.blog.name.as_str()).collect();
        assert_eq!(vec!["c", "d"], names);
        assert_eq!("hey", comments[1].content);
    }

    #[test]
    fn test_fetch_notes_failure_is_empty() {
        let transport = CannedTransport::new();
        assert!(Fetcher::new(&transport, "rocktobot", "KEY").fetch_notes("42").is_empty());
    }

    #[test]
    fn test_missing_api_key_skips_request() {
        let transport = CannedTransport::new();
        let fetcher = Fetcher::new(&transport, "rocktobot", " ");
        assert!(matches!(fetcher.try_fetch_posts(20, 0), Err(Error::MissingApiKey)));
        assert!(fetcher.fetch_notes("42").is_empty());
        assert!(transport.requests.borrow().is_empty());
    }

    #[test]
    fn test_normalize_blog() {
        assert_eq!("rocktobot.tumblr.com", normalize_blog("rocktobot"));
        assert_eq!("rocktobot.tumblr.com", normalize_blog("https://rocktobot.tumblr.com/"));
        assert_eq!("blog.example.org", normalize_blog("http://blog.example.org"));
    }

    #[test]
    fn test_urls() -> Result<()> {
        let transport = CannedTransport::new();
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        assert_eq!(
            "https://api.tumblr.com/v2/blog/rocktobot.tumblr.com/posts?api_key=KEY&limit=50&offset=0&reblog_info=true",
            fetcher.posts_url(50, 0)?.as_str()
        );
        assert_eq!(
            "https://api.tumblr.com/v2/blog/rocktobot.tumblr.com/notes?id=42&mode=conversation&api_key=KEY",
            fetcher.notes_url("42")?.as_str()
        );
        assert!(!redact(&fetcher.posts_url(50, 0)?).contains("KEY"));
        Ok(())
    }
}
