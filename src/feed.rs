//! Support for creating an Atom feed from the fetched posts.

use crate::config::Author;
use crate::listing::{sort_posts, ListUrls, SortOrder};
use crate::metadata::Metadata;
use crate::normalize::Normalizer;
use crate::post::{utc, Post};
use atom_syndication::{Category, Content, Entry, Error as AtomError, Feed, Link, Person};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::fmt;
use std::io::Write;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: &'a Url,
    pub urls: ListUrls<'a>,
    pub metadata: &'a Metadata,
    pub normalizer: &'a Normalizer,
}

/// Creates a feed of `posts`, newest first, and writes it to `w`.
pub fn write_feed<W: Write>(config: &FeedConfig, posts: &[Post], w: W) -> Result<()> {
    feed(config, posts).write_to(w)?;
    Ok(())
}

fn feed(config: &FeedConfig, posts: &[Post]) -> Feed {
    let refs: Vec<&Post> = posts.iter().collect();
    let entries: Vec<Entry> = sort_posts(&refs, SortOrder::DateDesc, config.metadata)
        .into_iter()
        .map(|post| entry(config, post))
        .collect();
    let updated = entries
        .first()
        .map(|entry| entry.updated)
        .unwrap_or_else(|| utc_offset(Utc::now()));

    Feed {
        title: config.title.clone().into(),
        id: config.id.clone(),
        updated,
        authors: author_to_people(config.author.clone()),
        links: vec![alternate(config.home_page.as_str())],
        entries,
        ..Default::default()
    }
}

fn entry(config: &FeedConfig, post: &Post) -> Entry {
    let url = config.urls.post(post);
    let date = utc(post.timestamp)
        .map(utc_offset)
        .unwrap_or_else(|| utc_offset(Utc::now()));
    Entry {
        id: url.clone(),
        title: post.resolved_title(config.metadata).into(),
        updated: date,
        published: Some(date),
        authors: author_to_people(config.author.clone()),
        categories: post
            .resolved_tags(config.metadata)
            .iter()
            .map(|tag| Category {
                term: tag.key(),
                label: Some(tag.name.clone()),
                ..Default::default()
            })
            .collect(),
        links: vec![alternate(&url)],
        content: Some(Content {
            value: Some(config.normalizer.render_content(post)),
            content_type: Some(String::from("html")),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn alternate(href: &str) -> Link {
    Link {
        href: href.to_owned(),
        rel: String::from("alternate"),
        ..Default::default()
    }
}

fn utc_offset(date: DateTime<Utc>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(0) {
        Some(offset) => offset.from_utc_datetime(&date.naive_utc()),
        None => date.into(),
    }
}

fn author_to_people(author: Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![Person {
            name: author.name,
            email: author.email,
            uri: None,
        }],
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem writing a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when there is an Atom-related error.
    Atom(AtomError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Atom(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Atom(err) => Some(err),
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

impl From<AtomError> for Error {
    /// Converts [`AtomError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: AtomError) -> Error {
        Error::Atom(err)
    }
}
