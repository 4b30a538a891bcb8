//! Defines the [`Post`] type as it arrives from the blog platform's API, the
//! exclusion predicate applied to raw API posts, and the title/tag resolution
//! rules. A post's shape depends on its declared type, which is modeled by the
//! [`PostKind`] tagged union.

use crate::metadata::Metadata;
use crate::tag::Tag;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single post from the blog platform. Posts are immutable once fetched;
/// every view derives new values from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// The post identifier. The API also returns a numeric `id`, but it
    /// overflows JavaScript-era clients so the string form is canonical.
    #[serde(rename = "id_string")]
    pub id: String,

    /// Seconds since the Unix epoch.
    pub timestamp: i64,

    /// The native title, if the post type has one and the author set it.
    #[serde(default)]
    pub title: Option<String>,

    /// The native tags. These never carry the `#` marker.
    #[serde(default)]
    pub tags: Vec<String>,

    /// The post's permalink on the platform.
    #[serde(default)]
    pub post_url: Option<String>,

    /// The type-dependent part of the post.
    #[serde(flatten)]
    pub kind: PostKind,
}

/// The type-dependent fields of a [`Post`], tagged by the API's `type` field.
/// HTML-bearing fields (`body`, `caption`, `text`, `description`) arrive
/// pre-escaped from the platform; everything else is plain text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PostKind {
    Text {
        #[serde(default)]
        body: String,
    },
    Photo {
        #[serde(default)]
        caption: String,
        #[serde(default)]
        photos: Vec<Photo>,
    },
    Quote {
        #[serde(default)]
        text: String,
        #[serde(default)]
        source: Option<String>,
    },
    Link {
        #[serde(default)]
        url: String,
        #[serde(default)]
        description: String,
    },
    Video {
        #[serde(default)]
        caption: String,
        #[serde(default)]
        video_url: Option<String>,
        #[serde(default)]
        player: Vec<Player>,
    },
    Audio {
        #[serde(default)]
        caption: String,
        #[serde(default)]
        player: Option<String>,
        #[serde(default)]
        track_name: Option<String>,
        #[serde(default)]
        artist: Option<String>,
    },
    Chat {
        #[serde(default)]
        body: String,
        #[serde(default)]
        dialogue: Vec<Dialogue>,
    },
    /// Any type this site doesn't know how to render.
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub original_size: PhotoSize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub url: String,
}

/// A video embed. The platform reports `embed_code: false` for videos that
/// can't be embedded, so the code is kept as a raw JSON value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub width: JsonValue,
    #[serde(default)]
    pub embed_code: JsonValue,
}

impl Player {
    pub fn embed_code(&self) -> Option<&str> {
        self.embed_code.as_str().filter(|code| !code.trim().is_empty())
    }

    pub fn width(&self) -> u64 {
        self.width.as_u64().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub phrase: String,
}

/// The fields whose presence marks a post as re-shared from another blog.
const REBLOG_FIELDS: &[&str] = &[
    "reblogged_from_name",
    "reblogged_root_name",
    "reblogged_from_id",
    "reblogged_root_id",
    "reblogged_from_url",
];

/// Reports whether a raw API post should be dropped from this blog's own post
/// stream: reblogs, answers, and empty replies. The platform doesn't promise
/// that these fields are exhaustive, so this is a best-effort filter.
pub fn is_excluded(post: &JsonValue) -> bool {
    let is_set = |field: &str| match post.get(field) {
        None | Some(JsonValue::Null) | Some(JsonValue::Bool(false)) => false,
        Some(JsonValue::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    };

    if REBLOG_FIELDS.iter().any(|field| is_set(field)) {
        return true;
    }

    let kind = post.get("type").and_then(JsonValue::as_str).unwrap_or("");
    if kind == "answer" || is_set("asking_name") {
        return true;
    }

    // An empty reply: a text post with neither a title nor any body.
    let blank = |field: &str| {
        post.get(field)
            .and_then(JsonValue::as_str)
            .map(|s| s.trim().is_empty())
            .unwrap_or(true)
    };
    kind == "text" && blank("title") && blank("body")
}

/// Formats a Unix timestamp as a long US-style date, e.g., `March 5, 2024`.
pub fn format_date(timestamp: i64) -> String {
    match utc(timestamp) {
        Some(date) => date.format("%B %-d, %Y").to_string(),
        None => String::new(),
    }
}

/// Converts a Unix timestamp into a UTC date-time, if it is in range.
pub fn utc(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single()
}

impl Post {
    /// The displayed title: a non-blank metadata override wins, then a
    /// non-blank native title, then the formatted post date.
    pub fn resolved_title(&self, metadata: &Metadata) -> String {
        let title = metadata
            .get(&self.id)
            .and_then(|o| o.title.as_ref())
            .filter(|title| !title.trim().is_empty());
        if let Some(title) = title {
            return title.clone();
        }
        match &self.title {
            Some(title) if !title.trim().is_empty() => title.clone(),
            _ => format_date(self.timestamp),
        }
    }

    /// The displayed tags: metadata override tags verbatim, otherwise the
    /// native tags with the `#` marker added.
    pub fn resolved_tags(&self, metadata: &Metadata) -> Vec<Tag> {
        if let Some(tags) = metadata.get(&self.id).and_then(|o| o.tags.as_ref()) {
            return tags.iter().map(Tag::new).collect();
        }
        self.tags.iter().map(|t| Tag::from_native(t)).collect()
    }

    /// The API's name for this post's type.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            PostKind::Text { .. } => "text",
            PostKind::Photo { .. } => "photo",
            PostKind::Quote { .. } => "quote",
            PostKind::Link { .. } => "link",
            PostKind::Video { .. } => "video",
            PostKind::Audio { .. } => "audio",
            PostKind::Chat { .. } => "chat",
            PostKind::Other => "other",
        }
    }
}
