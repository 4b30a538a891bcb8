//! Defines the [`Tag`] type, which represents a resolved [`crate::post::Post`]
//! tag.

use gtmpl_value::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use url::Url;

/// The marker character Tumblr-style tags are displayed with (`#ai`).
pub const TAG_MARKER: char = '#';

/// Represents a resolved post tag. Tags are displayed with their leading
/// marker (`#ai`) but matched and linked by their [`Tag::key`] (`ai`).
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag as it should be displayed, e.g., `#AI`.
    pub name: String,
}

impl Tag {
    /// Creates a tag from its stored form, leaving the marker as given.
    pub fn new(name: impl Into<String>) -> Tag {
        Tag { name: name.into() }
    }

    /// Creates a tag from a native API tag, which never carries the marker.
    pub fn from_native(name: &str) -> Tag {
        if name.starts_with(TAG_MARKER) {
            Tag::new(name)
        } else {
            Tag::new(format!("{}{}", TAG_MARKER, name))
        }
    }

    /// The lowercase form without the leading marker. Two tags with the same
    /// key are the same tag.
    pub fn key(&self) -> String {
        strip_marker(&self.name).to_lowercase()
    }

    /// A path-safe form of the key, used for the tag's index directory.
    /// Distinct keys always get distinct slugs. Keys made of lowercase
    /// letters, digits, and single interior spaces slug readably
    /// (`machine learning` is `machine-learning`); any other key gets its
    /// slugified form followed by `--` and the hex of its UTF-8 bytes, so
    /// `c` and `c++` don't share a directory.
    pub fn slug(&self) -> String {
        let key = self.key();
        let slug = slug::slugify(&key);
        if !key.contains('-') && slug == key.replace(' ', "-") {
            return slug;
        }
        let hex: String = key.bytes().map(|b| format!("{:02x}", b)).collect();
        match slug.is_empty() {
            true => format!("untitled--{}", hex),
            false => format!("{}--{}", slug, hex),
        }
    }

    /// Reports whether `filter` selects this tag. The comparison is
    /// case-insensitive and accepts either the stored form (`#ai`) or the form
    /// without the leading marker (`ai`).
    pub fn matches(&self, filter: &str) -> bool {
        let filter = filter.to_lowercase();
        self.name.to_lowercase() == filter || self.key() == filter
    }

    /// The URL of the first index page for this tag, given the base URL for
    /// index pages (which must end in a trailing slash).
    pub fn url(&self, index_url: &Url) -> Url {
        index_url
            .join(&format!("tag/{}/index.html", self.slug()))
            // the slug is path-safe so joining can't fail
            .unwrap_or_else(|_| index_url.clone())
    }

    /// Converts the tag into a template [`Value`] with fields `tag`, `key`, and
    /// `url`.
    pub fn to_value(&self, index_url: &Url) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("tag".to_owned(), Value::String(self.name.clone()));
        m.insert("key".to_owned(), Value::String(self.key()));
        m.insert("url".to_owned(), Value::String(self.url(index_url).to_string()));
        Value::Object(m)
    }
}

/// Removes a single leading marker character, if present.
pub fn strip_marker(s: &str) -> &str {
    s.strip_prefix(TAG_MARKER).unwrap_or(s)
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating to [`Tag::key`].
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating to
    /// [`Tag::key`].
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Tag {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_native_adds_marker_once() {
        assert_eq!("#ai", Tag::from_native("ai").name);
        assert_eq!("#ai", Tag::from_native("#ai").name);
    }

    #[test]
    fn test_matches_either_form() {
        let tag = Tag::new("#AI");
        assert!(tag.matches("ai"));
        assert!(tag.matches("#ai"));
        assert!(tag.matches("AI"));
        assert!(!tag.matches("art"));

        let unmarked = Tag::new("Theology");
        assert!(unmarked.matches("theology"));
    }

    #[test]
    fn test_equality_ignores_case_and_marker() {
        assert_eq!(Tag::new("#Life"), Tag::new("life"));
        assert_ne!(Tag::new("#life"), Tag::new("#lift"));
    }

    #[test]
    fn test_slugs_are_distinct_per_key() {
        assert_eq!("c", Tag::new("#c").slug());
        assert_eq!("c--632b2b", Tag::new("#c++").slug());
        assert_eq!("a-b", Tag::new("#A B").slug());
        assert_eq!("a-b--612d62", Tag::new("#a-b").slug());
        assert!(Tag::new("#\u{1f3a8}").slug().ends_with("--f09f8ea8"));
        assert_ne!(Tag::new("#\u{1f3a8}").slug(), Tag::new("#\u{1f308}").slug());
        assert_eq!(Tag::new("#C++").slug(), Tag::new("c++").slug());
    }

    #[test]
    fn test_url_uses_slug() -> Result<(), url::ParseError> {
        let index_url = Url::parse("https://example.org/posts/")?;
        assert_eq!(
            "https://example.org/posts/tag/machine-learning/index.html",
            Tag::new("#Machine Learning").url(&index_url).as_str()
        );
        Ok(())
    }
}
