//! The single post view: the normalized post, its comments, and the contact
//! form. The contact form has no server behind it; it only builds a `mailto:`
//! link (see [`mailto_link`]).

use crate::comment::Comment;
use crate::listing::ListUrls;
use crate::metadata::Metadata;
use crate::normalize::Normalizer;
use crate::post::{format_date, utc, Post};
use chrono::SecondsFormat;
use gtmpl_value::Value;
use std::collections::HashMap;

pub const POST_NOT_FOUND: &str = "Post not found.";

pub const MISSING_POST_ID: &str = "Post ID not found. Please provide a post ID in the URL.";

pub const NO_COMMENTS: &str = "No comments yet.";

/// The post selection carried by the `id` query parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetailQuery {
    pub id: Option<String>,
}

impl DetailQuery {
    /// Parses a query string such as `id=123`. A leading `?` is allowed.
    pub fn parse(query: &str) -> DetailQuery {
        let id = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .find(|(key, value)| key == "id" && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_owned());
        DetailQuery { id }
    }
}

/// The outcome of looking up a post for the detail view.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Post),
    NotFound,
    MissingId,
}

impl<'a> Lookup<'a> {
    pub fn find(posts: &'a [Post], query: &DetailQuery) -> Lookup<'a> {
        match &query.id {
            None => Lookup::MissingId,
            Some(id) => posts
                .iter()
                .find(|post| &post.id == id)
                .map(Lookup::Found)
                .unwrap_or(Lookup::NotFound),
        }
    }

    /// The inline message for lookups that found nothing.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Lookup::Found(_) => None,
            Lookup::NotFound => Some(POST_NOT_FOUND),
            Lookup::MissingId => Some(MISSING_POST_ID),
        }
    }
}

/// Builds the `mailto:` link the contact form submits to. A blank subject
/// becomes `Re: {post_title}`; the body is prefixed with the post title.
pub fn mailto_link(email: &str, subject: &str, message: &str, post_title: &str) -> String {
    let subject = match subject.trim().is_empty() {
        true => format!("Re: {}", post_title),
        false => subject.to_owned(),
    };
    let body = format!("Regarding: {}\n\n{}", post_title, message);
    format!(
        "mailto:{}?subject={}&body={}",
        email,
        urlencoding::encode(&subject),
        urlencoding::encode(&body),
    )
}

/// Everything the post page template needs.
pub struct PostPage<'a> {
    pub post: &'a Post,
    pub comments: &'a [Comment],
    pub metadata: &'a Metadata,
    pub normalizer: &'a Normalizer,
    pub contact_email: Option<&'a str>,
}

impl PostPage<'_> {
    /// Converts the page into a template [`Value`] with fields `id`, `title`,
    /// `date`, `datetime`, `tags`, `has_tags`, `content`, `comments`,
    /// `has_comments`, `comments_message`, `post_url`, `contact_email`, and
    /// `mailto`.
    pub fn to_value(&self, urls: &ListUrls) -> Value {
        let post = self.post;
        let title = post.resolved_title(self.metadata);
        let tags: Vec<Value> = post
            .resolved_tags(self.metadata)
            .iter()
            .map(|tag| tag.to_value(urls.index_url))
            .collect();
        let comments: Vec<Value> = self.comments.iter().map(Comment::to_value).collect();

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(post.id.clone()));
        m.insert("date".to_owned(), Value::String(format_date(post.timestamp)));
        m.insert(
            "datetime".to_owned(),
            Value::String(
                utc(post.timestamp)
                    .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
                    .unwrap_or_default(),
            ),
        );
        m.insert("has_tags".to_owned(), Value::Bool(!tags.is_empty()));
        m.insert("tags".to_owned(), Value::Array(tags));
        m.insert(
            "content".to_owned(),
            Value::String(self.normalizer.render_content(post)),
        );
        m.insert("has_comments".to_owned(), Value::Bool(!comments.is_empty()));
        m.insert(
            "comments_message".to_owned(),
            Value::String(match comments.is_empty() {
                true => NO_COMMENTS.to_owned(),
                false => String::new(),
            }),
        );
        m.insert("comments".to_owned(), Value::Array(comments));
        m.insert(
            "post_url".to_owned(),
            post.post_url.clone().map(Value::String).unwrap_or(Value::Nil),
        );
        match self.contact_email {
            Some(email) => {
                m.insert("contact_email".to_owned(), Value::String(email.to_owned()));
                m.insert(
                    "mailto".to_owned(),
                    Value::String(mailto_link(email, "", "", &title)),
                );
            }
            None => {
                m.insert("contact_email".to_owned(), Value::Nil);
                m.insert("mailto".to_owned(), Value::Nil);
            }
        }
        m.insert("title".to_owned(), Value::String(title));
        Value::Object(m)
    }
}
