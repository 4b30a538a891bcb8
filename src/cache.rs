//! A single-entry, time-limited cache of the fetched post collection. The
//! cache is two files in a directory: the serialized posts and the time they
//! were fetched (milliseconds since the Unix epoch).

use crate::fetch::{Error as FetchError, Fetcher};
use crate::post::Post;
use std::fmt;
use std::path::{Path, PathBuf};

/// The key holding the serialized post collection.
pub const POSTS_KEY: &str = "tumblr-posts-cache";

/// The key holding the fetch time of [`POSTS_KEY`].
pub const TIME_KEY: &str = "tumblr-posts-cache-time";

/// One hour, in milliseconds.
pub const DEFAULT_TTL_MILLIS: i64 = 3_600_000;

pub struct PostCache {
    directory: PathBuf,
    ttl_millis: i64,
}

impl PostCache {
    pub fn new(directory: &Path, ttl_millis: i64) -> PostCache {
        PostCache {
            directory: directory.to_owned(),
            ttl_millis,
        }
    }

    /// Returns the cached posts if both keys are present and the entry is
    /// younger than the TTL. Unreadable entries count as a miss.
    pub fn load(&self, now_millis: i64) -> Option<Vec<Post>> {
        match self.try_load(now_millis) {
            Ok(posts) => posts,
            Err(e) => {
                log::warn!("Ignoring unreadable post cache: {}", e);
                None
            }
        }
    }

    fn try_load(&self, now_millis: i64) -> Result<Option<Vec<Post>>> {
        let (posts_path, time_path) = (self.path(POSTS_KEY), self.path(TIME_KEY));
        if !posts_path.is_file() || !time_path.is_file() {
            return Ok(None);
        }

        let fetched_at: i64 = std::fs::read_to_string(&time_path)?
            .trim()
            .parse()
            .map_err(|_| Error::InvalidTime(time_path.clone()))?;
        if now_millis - fetched_at >= self.ttl_millis {
            log::debug!("Post cache expired ({} ms old)", now_millis - fetched_at);
            return Ok(None);
        }

        let file = std::fs::File::open(&posts_path)?;
        Ok(Some(serde_json::from_reader(std::io::BufReader::new(file))?))
    }

    /// Replaces the cached posts and stamps them with `now_millis`.
    pub fn store(&self, posts: &[Post], now_millis: i64) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;
        std::fs::write(self.path(POSTS_KEY), serde_json::to_vec(posts)?)?;
        std::fs::write(self.path(TIME_KEY), now_millis.to_string())?;
        Ok(())
    }

    fn path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

/// Loads the post collection for a view: from the cache when it is fresh,
/// otherwise with a single fetch of `limit` posts. Only successful fetches are
/// cached; a failed fetch leaves any existing entry alone.
pub fn load_posts(
    cache: Option<&PostCache>,
    fetcher: &Fetcher,
    limit: usize,
    now_millis: i64,
) -> std::result::Result<Vec<Post>, FetchError> {
    if let Some(posts) = cache.and_then(|c| c.load(now_millis)) {
        log::info!("Using {} cached posts", posts.len());
        return Ok(posts);
    }

    refresh_posts(cache, fetcher, limit, now_millis)
}

/// Fetches the post collection without consulting the cache, then stores it
/// if the fetch succeeded.
pub fn refresh_posts(
    cache: Option<&PostCache>,
    fetcher: &Fetcher,
    limit: usize,
    now_millis: i64,
) -> std::result::Result<Vec<Post>, FetchError> {
    let posts = fetcher.try_fetch_posts(limit, 0)?;
    if let Some(cache) = cache {
        if let Err(e) = cache.store(&posts, now_millis) {
            log::warn!("Could not write post cache: {}", e);
        }
    }
    Ok(posts)
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem reading or writing the cache.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),

    Json(serde_json::Error),

    /// Returned when the time key doesn't hold an integer.
    InvalidTime(PathBuf),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
            Error::InvalidTime(path) => {
                write!(f, "invalid cache time in '{}'", path.display())
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::InvalidTime(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fetch::test::{envelope, CannedTransport};
    use crate::post::PostKind;
    use serde_json::json;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_owned(),
            timestamp: 100,
            title: Some(String::from("Hello")),
            tags: vec![String::from("ai")],
            post_url: None,
            kind: PostKind::Quote {
                text: String::from("q"),
                source: None,
            },
        }
    }

    #[test]
    fn test_store_then_load_within_ttl() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = PostCache::new(dir.path(), DEFAULT_TTL_MILLIS);
        cache.store(&[post("1")], 1_000)?;

        assert_eq!(Some(vec![post("1")]), cache.load(1_000 + DEFAULT_TTL_MILLIS - 1));
        assert_eq!(None, cache.load(1_000 + DEFAULT_TTL_MILLIS));
        Ok(())
    }

    #[test]
    fn test_missing_or_corrupt_entries_miss() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = PostCache::new(dir.path(), DEFAULT_TTL_MILLIS);
        assert_eq!(None, cache.load(0));

        std::fs::write(dir.path().join(POSTS_KEY), "[]")?;
        assert_eq!(None, cache.load(0));

        std::fs::write(dir.path().join(TIME_KEY), "yesterday")?;
        assert_eq!(None, cache.load(0));

        std::fs::write(dir.path().join(TIME_KEY), "0")?;
        std::fs::write(dir.path().join(POSTS_KEY), "{not json")?;
        assert_eq!(None, cache.load(0));
        Ok(())
    }

    #[test]
    fn test_load_posts_prefers_fresh_cache() -> TestResult {
        let dir = tempfile::tempdir()?;
        let cache = PostCache::new(dir.path(), DEFAULT_TTL_MILLIS);
        cache.store(&[post("cached")], 0)?;

        let transport = CannedTransport::new();
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        let posts = load_posts(Some(&cache), &fetcher, 50, 10)?;
        assert_eq!("cached", posts[0].id);
        assert!(transport.requests.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_load_posts_fetches_and_stores() -> TestResult {
        let dir = tempfile::tempdir()?;
        let cache = PostCache::new(dir.path(), DEFAULT_TTL_MILLIS);

        let url = {
            let transport = CannedTransport::new();
            let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
            fetcher.posts_url(50, 0)?.to_string()
        };
        let transport = CannedTransport::new().with(
            &url,
            envelope(
                "posts",
                json!([{"id_string": "9", "type": "text", "timestamp": 5, "body": "b"}]),
            ),
        );
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        let posts = load_posts(Some(&cache), &fetcher, 50, 42)?;
        assert_eq!("9", posts[0].id);
        assert_eq!("42", std::fs::read_to_string(dir.path().join(TIME_KEY))?);
        assert_eq!(Some(posts), cache.load(43));
        Ok(())
    }

    #[test]
    fn test_refresh_bypasses_fresh_cache() -> TestResult {
        let dir = tempfile::tempdir()?;
        let cache = PostCache::new(dir.path(), DEFAULT_TTL_MILLIS);
        cache.store(&[post("cached")], 0)?;

        let transport = CannedTransport::new();
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        assert!(refresh_posts(Some(&cache), &fetcher, 50, 10).is_err());
        assert_eq!(1, transport.requests.borrow().len());
        assert_eq!(Some(vec![post("cached")]), cache.load(10));
        Ok(())
    }

    #[test]
    fn test_failed_fetch_keeps_stale_entry() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = PostCache::new(dir.path(), DEFAULT_TTL_MILLIS);
        cache.store(&[post("stale")], 0)?;

        let transport = CannedTransport::new();
        let fetcher = Fetcher::new(&transport, "rocktobot", "KEY");
        assert!(load_posts(Some(&cache), &fetcher, 50, DEFAULT_TTL_MILLIS * 2).is_err());
        assert_eq!("0", std::fs::read_to_string(dir.path().join(TIME_KEY))?);
        Ok(())
    }
}
