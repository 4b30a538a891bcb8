//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the posts through the
//! cache ([`crate::cache`]), resolving the metadata overrides
//! ([`crate::metadata`]), rendering list, post, and portfolio pages
//! ([`crate::write`]), copying the theme's static directory into the output
//! directory, and generating the Atom feed.

use crate::cache::{load_posts, refresh_posts, PostCache};
use crate::config::Config;
use crate::feed::{write_feed, Error as FeedError, FeedConfig};
use crate::fetch::{Error as FetchError, Fetcher, HttpTransport, Transport};
use crate::listing::{sort_posts, ListQuery, ListUrls, ListView, SortOrder};
use crate::metadata::{resolve_metadata, Metadata};
use crate::normalize::Normalizer;
use crate::portfolio::load_projects;
use crate::post::Post;
use crate::write::{Error as WriteError, Writer};
use gtmpl::Template;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Builds the site from a [`Config`] object, talking to the API over HTTP.
/// With `refresh`, the cached posts are ignored (but still replaced by a
/// successful fetch).
pub fn build_site(config: &Config, refresh: bool) -> Result<()> {
    let transport = HttpTransport::new(config.http_timeout)?;
    build_site_with(config, &transport, refresh, chrono::Utc::now().timestamp_millis())
}

/// Builds the site through the provided [`Transport`]. `now_millis` is the
/// time cache entries are checked against and stamped with.
pub fn build_site_with(
    config: &Config,
    transport: &dyn Transport,
    refresh: bool,
    now_millis: i64,
) -> Result<()> {
    let fetcher = Fetcher::new(transport, &config.blog, &config.api_key);
    let loaded = fetch_posts(config, &fetcher, refresh, now_millis);
    let metadata = effective_metadata(config, transport);
    let normalizer = Normalizer::new(&config.platform_host, config.site_host.as_deref());

    // Parse the template files.
    let list_template = parse_template(config.list_template.iter())?;
    let post_template = parse_template(config.post_template.iter())?;
    let portfolio_template = parse_optional_template(&config.portfolio_template)?;
    let project_template = parse_optional_template(&config.project_template)?;

    // Blow away the old output directories so we don't have any collisions.
    // The root output directory itself is left alone in case the user passed
    // the wrong directory.
    rmdir(&config.posts_output_directory)?;
    rmdir(&config.projects_output_directory)?;
    rmdir(&config.static_output_directory)?;

    let writer = Writer {
        list_template: &list_template,
        post_template: &post_template,
        portfolio_template: portfolio_template.as_ref(),
        project_template: project_template.as_ref(),
        urls: ListUrls {
            index_url: &config.index_url,
            posts_url: &config.posts_url,
        },
        projects_url: &config.projects_url,
        posts_output_directory: &config.posts_output_directory,
        projects_output_directory: &config.projects_output_directory,
        site_title: &config.title,
        home_page: &config.home_page,
        static_url: &config.static_url,
        atom_url: &config.atom_url,
        metadata: &metadata,
        normalizer: &normalizer,
        contact_email: config.contact_email.as_deref(),
    };

    let posts = loaded.as_ref().map(Vec::clone).unwrap_or_default();
    let view = ListView::from_load(loaded, &ListQuery::default());
    let lists = writer.write_lists(&view)?;

    let refs: Vec<&Post> = posts.iter().collect();
    let ordered = sort_posts(&refs, SortOrder::DateDesc, &metadata);
    for (i, post) in ordered.iter().enumerate() {
        let comments = fetcher.fetch_notes(&post.id);
        writer.write_post(&ordered, i, &comments)?;
    }

    let projects = load_projects(&config.projects_file);
    let portfolio = writer.write_portfolio(&projects)?;
    log::info!(
        "Wrote {} list pages, {} post pages, and {} portfolio pages",
        lists,
        ordered.len(),
        portfolio
    );

    // copy static directory
    match config.static_source_directory.is_dir() {
        true => copy_dir(
            &config.static_source_directory,
            &config.static_output_directory,
        )?,
        false => log::warn!(
            "No static directory at '{}'",
            config.static_source_directory.display()
        ),
    }

    // copy /posts/index.html to /index.html
    let _ = std::fs::copy(
        &config.posts_output_directory.join("index.html"),
        &config.root_output_directory.join("index.html"),
    )?;

    // create the atom feed
    write_feed(
        &FeedConfig {
            title: config.title.clone(),
            id: config.home_page.to_string(),
            author: config.author.clone(),
            home_page: &config.home_page,
            urls: ListUrls {
                index_url: &config.index_url,
                posts_url: &config.posts_url,
            },
            metadata: &metadata,
            normalizer: &normalizer,
        },
        &posts,
        File::create(config.root_output_directory.join("feed.atom"))?,
    )?;

    Ok(())
}

/// Loads the posts for every view: through the cache, or straight from the
/// API when `refresh` is set.
pub fn fetch_posts(
    config: &Config,
    fetcher: &Fetcher,
    refresh: bool,
    now_millis: i64,
) -> std::result::Result<Vec<Post>, FetchError> {
    let cache = PostCache::new(&config.cache_directory, config.cache_ttl_millis);
    match refresh {
        true => refresh_posts(Some(&cache), fetcher, config.post_limit, now_millis),
        false => load_posts(Some(&cache), fetcher, config.post_limit, now_millis),
    }
}

/// Resolves the effective metadata table for `config`.
pub fn effective_metadata(config: &Config, transport: &dyn Transport) -> Metadata {
    resolve_metadata(&config.metadata, config.metadata_source.as_ref(), transport)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relpath = match entry.path().strip_prefix(src) {
            Ok(relpath) => relpath,
            Err(_) => continue,
        };
        let target = dst.join(relpath);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        if !contents.is_empty() {
            contents.push('\n');
        }
        File::open(&template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

// Like `parse_template`, but a template the theme doesn't list, or whose
// files don't exist, is `None`.
fn parse_optional_template(template_files: &[PathBuf]) -> Result<Option<Template>> {
    if template_files.is_empty() {
        return Ok(None);
    }
    if let Some(missing) = template_files.iter().find(|path| !path.exists()) {
        log::warn!("Template file '{}' not found", missing.display());
        return Ok(None);
    }
    Ok(Some(parse_template(template_files.iter())?))
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during writing,
/// cleaning output directories, parsing template files, and other I/O.
/// Fetch failures only surface here when the HTTP client can't be created;
/// everything else degrades to an empty collection.
#[derive(Debug)]
pub enum Error {
    /// Returned when the HTTP client can't be created.
    Fetch(FetchError),

    /// Returned for errors writing pages to disk as HTML files.
    Write(WriteError),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for errors writing the feed.
    Feed(FeedError),

    /// Returned for errors walking the static directory.
    Walk(walkdir::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Fetch(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Walk(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fetch(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Feed(err) => Some(err),
            Error::Walk(err) => Some(err),
            Error::Io(err) => Some(err),
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

impl From<FetchError> for Error {
    /// Converts [`FetchError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FetchError) -> Error {
        Error::Fetch(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<FeedError> for Error {
    /// Converts [`FeedError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: FeedError) -> Error {
        Error::Feed(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: walkdir::Error) -> Error {
        Error::Walk(err)
    }
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}
