//! Loads the project configuration from `rocktobot.yaml` and the theme's
//! `theme/theme.yaml`, resolving every URL and path the build needs.

use crate::cache::DEFAULT_TTL_MILLIS;
use crate::metadata::{Metadata, Source};
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// The project file name searched for in the working directory and its
/// parents.
pub const PROJECT_FILE: &str = "rocktobot.yaml";

/// The environment variable that overrides the configured API key.
pub const API_KEY_VAR: &str = "ROCKTOBOT_API_KEY";

const DEFAULT_METADATA_FILE: &str = "data/post-metadata.json";
const DEFAULT_PROJECTS_FILE: &str = "data/projects.json";
const DEFAULT_CACHE_DIRECTORY: &str = ".rocktobot-cache";

fn default_post_limit() -> usize {
    50
}

fn default_cache_ttl_seconds() -> u64 {
    (DEFAULT_TTL_MILLIS / 1000) as u64
}

fn default_http_timeout_seconds() -> u64 {
    30
}

fn default_title() -> String {
    String::from("rocktobot")
}

#[derive(Deserialize)]
struct Project {
    blog: String,

    #[serde(default)]
    api_key: String,

    site_root: Url,

    #[serde(default = "default_title")]
    title: String,

    #[serde(default)]
    author: Option<Author>,

    #[serde(default)]
    contact_email: Option<String>,

    #[serde(default = "default_post_limit")]
    post_limit: usize,

    #[serde(default = "default_cache_ttl_seconds")]
    cache_ttl_seconds: u64,

    #[serde(default = "default_http_timeout_seconds")]
    http_timeout_seconds: u64,

    /// The host root-relative media sources resolve against. Defaults to the
    /// normalized blog identifier.
    #[serde(default)]
    platform_host: Option<String>,

    /// The host whose links stay on-page. Defaults to the host of
    /// `site_root`.
    #[serde(default)]
    site_host: Option<String>,

    #[serde(default)]
    metadata_source: Option<String>,

    #[serde(default)]
    metadata: Metadata,

    #[serde(default)]
    projects: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Theme {
    list_template: Vec<PathBuf>,
    post_template: Vec<PathBuf>,

    #[serde(default)]
    portfolio_template: Vec<PathBuf>,

    #[serde(default)]
    project_template: Vec<PathBuf>,
}

/// The site author, credited in the feed.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// Settings supplied outside the project file.
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub output_directory: PathBuf,

    /// Overrides the cache directory. Relative project defaults resolve
    /// against the project root.
    pub cache_directory: Option<PathBuf>,

    /// Overrides the configured API key (see [`API_KEY_VAR`]).
    pub api_key: Option<String>,
}

pub struct Config {
    pub title: String,
    pub author: Option<Author>,
    pub blog: String,

    /// Blank when neither the project file nor [`API_KEY_VAR`] supplies one.
    /// Only the API requests need it; see [`crate::fetch::Error::MissingApiKey`].
    pub api_key: String,
    pub post_limit: usize,
    pub contact_email: Option<String>,
    pub platform_host: String,
    pub site_host: Option<String>,
    pub http_timeout: Duration,
    pub cache_ttl_millis: i64,
    pub cache_directory: PathBuf,

    /// The bundled metadata overrides.
    pub metadata: Metadata,
    pub metadata_source: Option<Source>,
    pub projects_file: PathBuf,

    pub home_page: Url,
    pub index_url: Url,
    pub posts_url: Url,
    pub projects_url: Url,
    pub static_url: Url,
    pub atom_url: Url,

    pub list_template: Vec<PathBuf>,
    pub post_template: Vec<PathBuf>,

    /// Empty when the theme has no portfolio pages.
    pub portfolio_template: Vec<PathBuf>,
    pub project_template: Vec<PathBuf>,

    pub static_source_directory: PathBuf,
    pub root_output_directory: PathBuf,
    pub posts_output_directory: PathBuf,
    pub projects_output_directory: PathBuf,
    pub static_output_directory: PathBuf,
}

impl Config {
    /// Searches `dir` and its parents for the project file.
    pub fn from_directory(dir: &Path, options: &Options) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path, options)
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent, options),
                None => Err(Error::ProjectNotFound),
            }
        }
    }

    pub fn from_project_file(path: &Path, options: &Options) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let project_root = path
            .parent()
            .ok_or_else(|| Error::NoParent(path.to_owned()))?;
        let theme_dir = project_root.join("theme");
        let theme: Theme = serde_yaml::from_reader(open(&theme_dir.join("theme.yaml"), "theme")?)?;

        let blog = project.blog;
        let api_key = options
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(project.api_key);

        let site_root = dir_url(&project.site_root);
        let metadata_source = match project.metadata_source {
            Some(s) => source(project_root, &s)?,
            None => Source::File(project_root.join(DEFAULT_METADATA_FILE)),
        };
        let templates = |files: &[PathBuf]| -> Vec<PathBuf> {
            files.iter().map(|relpath| theme_dir.join(relpath)).collect()
        };
        let output = &options.output_directory;

        Ok(Config {
            platform_host: project
                .platform_host
                .unwrap_or_else(|| crate::fetch::normalize_blog(&blog)),
            site_host: project
                .site_host
                .or_else(|| site_root.host_str().map(str::to_owned)),
            title: project.title,
            author: project.author,
            blog,
            api_key,
            post_limit: project.post_limit,
            contact_email: project.contact_email,
            http_timeout: Duration::from_secs(project.http_timeout_seconds),
            cache_ttl_millis: (project.cache_ttl_seconds as i64).saturating_mul(1000),
            cache_directory: project_root.join(
                options
                    .cache_directory
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIRECTORY)),
            ),
            metadata: project.metadata,
            metadata_source: Some(metadata_source),
            projects_file: project_root.join(
                project
                    .projects
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PROJECTS_FILE)),
            ),
            index_url: site_root.join("posts/")?,
            posts_url: site_root.join("posts/")?,
            projects_url: site_root.join("projects/")?,
            static_url: site_root.join("static/")?,
            atom_url: site_root.join("feed.atom")?,
            home_page: site_root,
            list_template: templates(&theme.list_template),
            post_template: templates(&theme.post_template),
            portfolio_template: templates(&theme.portfolio_template),
            project_template: templates(&theme.project_template),
            static_source_directory: theme_dir.join("static"),
            root_output_directory: output.to_owned(),
            posts_output_directory: output.join("posts"),
            projects_output_directory: output.join("projects"),
            static_output_directory: output.join("static"),
        })
    }
}

/// Ensures the URL's path ends in `/` so relative joins land inside it.
fn dir_url(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn source(project_root: &Path, s: &str) -> Result<Source> {
    match s.starts_with("http://") || s.starts_with("https://") {
        true => Ok(Source::Url(Url::parse(s)?)),
        false => Ok(Source::File(project_root.join(s))),
    }
}

fn open(path: &Path, kind: &'static str) -> Result<File> {
    File::open(path).map_err(|err| Error::Open {
        kind,
        path: path.to_owned(),
        err,
    })
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no parent directory holds a project file.
    ProjectNotFound,

    /// Returned when a project or theme file can't be opened.
    Open {
        kind: &'static str,
        path: PathBuf,
        err: std::io::Error,
    },

    /// Returned when the project file path has no parent directory.
    NoParent(PathBuf),

    /// Returned when a project or theme file isn't valid.
    Yaml(serde_yaml::Error),

    /// Returned when a configured URL isn't valid.
    Url(url::ParseError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectNotFound => write!(
                f,
                "Could not find `{}` in any parent directory",
                PROJECT_FILE
            ),
            Error::Open { kind, path, err } => {
                write!(f, "Opening {} file `{}`: {}", kind, path.display(), err)
            }
            Error::NoParent(path) => write!(
                f,
                "Can't get parent directory for project file '{}'",
                path.display()
            ),
            Error::Yaml(err) => write!(f, "Loading configuration: {}", err),
            Error::Url(err) => write!(f, "Loading configuration: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { err, .. } => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Url(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts [`serde_yaml::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts [`url::ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: url::ParseError) -> Error {
        Error::Url(err)
    }
}
