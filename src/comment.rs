//! Defines [`Comment`], the subset of a post's notes that are replies.

use crate::post::utc;
use gtmpl_value::Value;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Shown for commenters without an avatar.
pub const DEFAULT_AVATAR: &str = "/assets/images/default-avatar.png";

/// Note types that count as comments.
const COMMENT_TYPES: &[&str] = &["reply", "comment"];

/// A reply left on a post by another blog.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Comment {
    pub blog: Blog,

    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,

    /// The reply as an HTML fragment.
    #[serde(default, alias = "reply_text")]
    pub content: String,
}

/// The identity of a commenter.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Blog {
    pub name: String,

    #[serde(default)]
    pub avatar: Vec<Avatar>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Avatar {
    pub url: String,
}

impl Comment {
    /// Reports whether a raw note is a reply/comment.
    pub fn is_comment(note: &JsonValue) -> bool {
        note.get("type")
            .and_then(JsonValue::as_str)
            .map(|kind| COMMENT_TYPES.contains(&kind))
            .unwrap_or(false)
    }

    pub fn avatar_url(&self) -> &str {
        self.blog
            .avatar
            .first()
            .map(|a| a.url.as_str())
            .unwrap_or(DEFAULT_AVATAR)
    }

    pub fn blog_url(&self) -> String {
        format!("https://{}.tumblr.com", self.blog.name)
    }

    /// e.g., `Mar 5, 2024, 03:04 PM`
    pub fn formatted_date(&self) -> String {
        match utc(self.timestamp) {
            Some(date) => date.format("%b %-d, %Y, %I:%M %p").to_string(),
            None => String::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("author".to_owned(), Value::String(self.blog.name.clone()));
        m.insert("author_url".to_owned(), Value::String(self.blog_url()));
        m.insert("avatar".to_owned(), Value::String(self.avatar_url().to_owned()));
        m.insert("date".to_owned(), Value::String(self.formatted_date()));
        m.insert("content".to_owned(), Value::String(self.content.clone()));
        Value::Object(m)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_avatar_fallback() -> serde_json::Result<()> {
        let bare: Comment = serde_json::from_value(json!({
            "type": "reply",
            "timestamp": 1709650800,
            "blog": {"name": "friend"},
            "content": "<p>hi</p>",
        }))?;
        assert_eq!(DEFAULT_AVATAR, bare.avatar_url());
        assert_eq!("https://friend.tumblr.com", bare.blog_url());

        let with_avatar: Comment = serde_json::from_value(json!({
            "type": "reply",
            "timestamp": 0,
            "blog": {"name": "friend", "avatar": [{"url": "https://a/64.png"}, {"url": "https://a/128.png"}]},
        }))?;
        assert_eq!("https://a/64.png", with_avatar.avatar_url());
        Ok(())
    }

    #[test]
    fn test_formatted_date() -> serde_json::Result<()> {
        let comment: Comment = serde_json::from_value(json!({
            "timestamp": 1709650800,
            "blog": {"name": "friend"},
        }))?;
        assert_eq!("Mar 5, 2024, 03:00 PM", comment.formatted_date());
        Ok(())
    }

    #[test]
    fn test_is_comment() {
        assert!(Comment::is_comment(&json!({"type": "reply"})));
        assert!(Comment::is_comment(&json!({"type": "comment"})));
        assert!(!Comment::is_comment(&json!({"type": "like"})));
        assert!(!Comment::is_comment(&json!({})));
    }
}
