//! Resolves the per-post metadata overrides. The effective table starts from
//! the overrides bundled in the project file and is overlaid with a separately
//! maintained JSON document, either a local file or a remote URL. See
//! [`resolve_metadata`].

use crate::fetch::{Error as FetchError, Transport};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Keys in the metadata document that document its format rather than
/// describe a post.
const SENTINEL_KEYS: &[&str] = &["_comment", "example-post-id"];

/// A manually curated replacement for a post's title and/or tags.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Override {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// The effective metadata override table, keyed by post identifier. It is
/// resolved once per build and then only read.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Metadata(HashMap<String, Override>);

impl Metadata {
    pub fn get(&self, post_id: &str) -> Option<&Override> {
        self.0.get(post_id)
    }

    pub fn insert(&mut self, post_id: impl Into<String>, entry: Override) {
        self.0.insert(post_id.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new table with `other`'s entries laid over this one's;
    /// `other` wins on conflicting keys.
    pub fn overlay(&self, other: Metadata) -> Metadata {
        let mut merged = self.clone();
        merged.0.extend(other.0);
        merged
    }
}

/// Where the metadata document lives.
#[derive(Clone, Debug)]
pub enum Source {
    File(PathBuf),
    Url(Url),
}

/// Produces the effective metadata table. On any failure to load the
/// document the bundled table is returned unchanged and the failure is only
/// logged.
pub fn resolve_metadata(
    bundled: &Metadata,
    source: Option<&Source>,
    transport: &dyn Transport,
) -> Metadata {
    let source = match source {
        Some(source) => source,
        None => return bundled.clone(),
    };
    match load_document(source, transport) {
        Ok(document) => {
            log::info!("Loaded {} metadata overrides from {}", document.len(), source);
            bundled.overlay(document)
        }
        Err(e) => {
            log::info!("Using bundled metadata overrides ({}): {}", source, e);
            bundled.clone()
        }
    }
}

fn load_document(source: &Source, transport: &dyn Transport) -> Result<Metadata> {
    let document = match source {
        Source::File(path) => {
            let file = std::fs::File::open(path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        }
        Source::Url(url) => transport.get_json(url)?,
    };
    parse_document(document)
}

/// Converts a metadata document into a table, dropping sentinel keys and
/// skipping malformed entries.
pub fn parse_document(document: JsonValue) -> Result<Metadata> {
    let entries = match document {
        JsonValue::Object(entries) => entries,
        _ => return Err(Error::NotAnObject),
    };

    let mut metadata = Metadata::default();
    for (post_id, entry) in entries {
        if SENTINEL_KEYS.contains(&post_id.as_str()) {
            continue;
        }
        match serde_json::from_value::<Override>(entry) {
            Ok(entry) => metadata.insert(post_id, entry),
            Err(e) => log::warn!("Skipping metadata entry `{}`: {}", post_id, e),
        }
    }
    Ok(metadata)
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Url(url) => write!(f, "{}", url),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to load the metadata document.
#[derive(Debug)]
pub enum Error {
    /// Returned when the document file can't be read.
    Io(std::io::Error),

    /// Returned when the document isn't valid JSON.
    Json(serde_json::Error),

    /// Returned when the remote document can't be fetched.
    Fetch(FetchError),

    /// Returned when the document's top level isn't a JSON object.
    NotAnObject,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
            Error::Fetch(err) => err.fmt(f),
            Error::NotAnObject => write!(f, "metadata document must be a JSON object"),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Fetch(err) => Some(err),
            Error::NotAnObject => None,
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

impl From<FetchError> for Error {
    /// Converts [`FetchError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FetchError) -> Error {
        Error::Fetch(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fetch::test::CannedTransport;
    use serde_json::json;

    fn bundled() -> Metadata {
        let mut metadata = Metadata::default();
        metadata.insert(
            "1",
            Override {
                title: Some(String::from("Bundled One")),
                tags: None,
            },
        );
        metadata.insert(
            "2",
            Override {
                title: Some(String::from("Bundled Two")),
                tags: None,
            },
        );
        metadata
    }

    #[test]
    fn test_remote_wins_and_sentinels_dropped() {
        let url = Url::parse("https://example.org/data/post-metadata.json").unwrap();
        let transport = CannedTransport::new().with(
            url.as_str(),
            json!({
                "_comment": "format: id -> {title, tags}",
                "example-post-id": {"title": "Example"},
                "2": {"title": "Remote Two", "tags": ["#ai"]},
                "3": {"tags": ["#life"]},
            }),
        );

        let resolved = resolve_metadata(&bundled(), Some(&Source::Url(url)), &transport);
        assert_eq!(3, resolved.len());
        assert_eq!(Some("Bundled One"), resolved.get("1").and_then(|o| o.title.as_deref()));
        assert_eq!(Some("Remote Two"), resolved.get("2").and_then(|o| o.title.as_deref()));
        assert_eq!(None, resolved.get("example-post-id"));
        assert_eq!(None, resolved.get("_comment"));
    }

    #[test]
    fn test_fetch_failure_falls_back_to_bundled() {
        let url = Url::parse("https://example.org/missing.json").unwrap();
        let resolved = resolve_metadata(&bundled(), Some(&Source::Url(url)), &CannedTransport::new());
        assert_eq!(bundled(), resolved);
    }

    #[test]
    fn test_missing_file_falls_back_to_bundled() {
        let source = Source::File(PathBuf::from("/nonexistent/post-metadata.json"));
        let resolved = resolve_metadata(&bundled(), Some(&source), &CannedTransport::new());
        assert_eq!(bundled(), resolved);
    }

    #[test]
    fn test_file_document() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("post-metadata.json");
        std::fs::write(&path, r#"{"1": {"title": "From File"}, "bad": {"tags": "nope"}}"#)?;

        let resolved = resolve_metadata(&bundled(), Some(&Source::File(path)), &CannedTransport::new());
        assert_eq!(Some("From File"), resolved.get("1").and_then(|o| o.title.as_deref()));
        assert_eq!(None, resolved.get("bad"));
        Ok(())
    }

    #[test]
    fn test_document_must_be_object() {
        assert!(matches!(parse_document(json!(["nope"])), Err(Error::NotAnObject)));
    }
}
