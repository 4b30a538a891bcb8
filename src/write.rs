use crate::comment::Comment;
use crate::detail::PostPage;
use crate::listing::{ListQuery, ListUrls, ListView, SortOrder};
use crate::metadata::Metadata;
use crate::normalize::Normalizer;
use crate::portfolio::{Project, NO_PROJECTS};
use crate::post::Post;
use crate::tag::strip_marker;
use gtmpl::{Template, Value};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use url::Url;

/// Responsible for templating and writing the list, post, and portfolio
/// pages to disk.
pub struct Writer<'a> {
    /// The template for list pages.
    pub list_template: &'a Template,

    /// The template for post pages.
    pub post_template: &'a Template,

    /// The template for the portfolio grid. Portfolio pages are skipped when
    /// the theme doesn't provide one.
    pub portfolio_template: Option<&'a Template>,

    /// The template for project pages.
    pub project_template: Option<&'a Template>,

    /// List and post page URLs. List pages are located at
    /// `{index_url}/index.html`, `{index_url}/{sort}.html`, and
    /// `{index_url}/tag/{slug}/...`; post pages at `{posts_url}/{id}.html`.
    pub urls: ListUrls<'a>,

    /// The base URL for project pages.
    pub projects_url: &'a Url,

    /// The directory list and post pages are written to. It mirrors the
    /// layout of [`Writer::urls`].
    pub posts_output_directory: &'a Path,

    /// The directory portfolio pages are written to.
    pub projects_output_directory: &'a Path,

    /// The site title, available to every template as `site_title`.
    pub site_title: &'a str,

    /// The URL for the site's home page, available as `home_page`.
    pub home_page: &'a Url,

    /// The URL for the static assets, available as `static_url`.
    pub static_url: &'a Url,

    /// The URL for the Atom feed, available as `atom_url`.
    pub atom_url: &'a Url,

    pub metadata: &'a Metadata,
    pub normalizer: &'a Normalizer,
    pub contact_email: Option<&'a str>,
}

impl Writer<'_> {
    /// Templates a single page and writes it to `file_path`. The page value
    /// is available to templates as `item`, alongside `prev`, `next`, the
    /// site-wide URLs, and `page_title`: `heading` followed by the site title,
    /// or the site title alone.
    fn write_page(
        &self,
        template: &Template,
        heading: Option<&str>,
        item: Value,
        prev: Option<String>,
        next: Option<String>,
        file_path: &Path,
    ) -> Result<()> {
        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let option_to_value = |opt: Option<String>| match opt {
            Some(url) => Value::String(url),
            None => Value::Nil,
        };
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), item);
        m.insert("prev".to_owned(), option_to_value(prev));
        m.insert("next".to_owned(), option_to_value(next));
        m.insert(
            "site_title".to_owned(),
            Value::String(self.site_title.to_owned()),
        );
        m.insert(
            "page_title".to_owned(),
            Value::String(match heading {
                Some(heading) => format!("{} — {}", heading, self.site_title),
                None => self.site_title.to_owned(),
            }),
        );
        m.insert(
            "home_page".to_owned(),
            Value::String(self.home_page.to_string()),
        );
        m.insert(
            "static_url".to_owned(),
            Value::String(self.static_url.to_string()),
        );
        m.insert(
            "atom_url".to_owned(),
            Value::String(self.atom_url.to_string()),
        );

        log::debug!("Writing {}", file_path.display());
        template.execute(
            &mut std::fs::File::create(file_path)?,
            &gtmpl::Context::from(Value::Object(m))?,
        )?;
        Ok(())
    }

    /// Writes the list pages for `view`. A ready view gets one page per sort
    /// order for the whole collection and for every tag in its vocabulary;
    /// any other state only gets the default `index.html`, carrying its
    /// message.
    pub fn write_lists(&self, view: &ListView) -> Result<usize> {
        let state = match view {
            ListView::Ready(state) => state,
            other => {
                self.write_list(other.clone(), &ListQuery::default())?;
                return Ok(1);
            }
        };

        let mut written = 0;
        let filters = std::iter::once(None).chain(
            state
                .tags(self.metadata)
                .into_iter()
                .map(|tag| Some(strip_marker(&tag).to_owned())),
        );
        for tag in filters {
            for sort in SortOrder::ALL.iter().copied() {
                let query = ListQuery {
                    tag: tag.clone(),
                    sort,
                };
                let page = view.clone().with_tag(tag.clone()).with_sort(sort);
                self.write_list(page, &query)?;
                written += 1;
            }
        }
        Ok(written)
    }

    fn write_list(&self, view: ListView, query: &ListQuery) -> Result<()> {
        self.write_page(
            self.list_template,
            None,
            view.to_value(self.metadata, &self.urls),
            None,
            None,
            &self.posts_output_directory.join(query.page_path()),
        )
    }

    /// Writes one post page. `ordered` is the date-descending collection the
    /// post belongs to; its neighbors become the page's `prev` and `next`
    /// links.
    pub fn write_post(&self, ordered: &[&Post], index: usize, comments: &[Comment]) -> Result<()> {
        let post = ordered[index];
        let page = PostPage {
            post,
            comments,
            metadata: self.metadata,
            normalizer: self.normalizer,
            contact_email: self.contact_email,
        };
        let prev = match index {
            0 => None,
            _ => Some(self.urls.post(ordered[index - 1])),
        };
        let next = ordered.get(index + 1).map(|p| self.urls.post(p));
        self.write_page(
            self.post_template,
            Some(post.resolved_title(self.metadata).as_str()),
            page.to_value(&self.urls),
            prev,
            next,
            &self.posts_output_directory.join(format!("{}.html", post.id)),
        )
    }

    /// Writes the portfolio grid and one page per project. Returns the number
    /// of pages written; missing templates skip their pages with a warning.
    pub fn write_portfolio(&self, projects: &[Project]) -> Result<usize> {
        let mut written = 0;
        match self.portfolio_template {
            None => log::warn!("Theme has no portfolio template; skipping the portfolio grid"),
            Some(template) => {
                self.write_page(
                    template,
                    Some("Portfolio"),
                    grid_value(projects, self.projects_url),
                    None,
                    None,
                    &self.projects_output_directory.join("index.html"),
                )?;
                written += 1;
            }
        }

        match self.project_template {
            None if !projects.is_empty() => {
                log::warn!("Theme has no project template; skipping project pages")
            }
            None => {}
            Some(template) => {
                for (i, project) in projects.iter().enumerate() {
                    let prev = match i {
                        0 => None,
                        _ => Some(projects[i - 1].url(self.projects_url)),
                    };
                    let next = projects.get(i + 1).map(|p| p.url(self.projects_url));
                    self.write_page(
                        template,
                        Some(format!("{} — Portfolio", project.title).as_str()),
                        project.to_page_value(),
                        prev,
                        next,
                        &self
                            .projects_output_directory
                            .join(format!("{}.html", project.id)),
                    )?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }
}

/// The portfolio grid value: `projects` (cards) and `message`, which is
/// empty unless there are no projects.
fn grid_value(projects: &[Project], projects_url: &Url) -> Value {
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert(
        "projects".to_owned(),
        Value::Array(projects.iter().map(|p| p.to_card_value(projects_url)).collect()),
    );
    m.insert(
        "message".to_owned(),
        Value::String(match projects.is_empty() {
            true => NO_PROJECTS.to_owned(),
            false => String::new(),
        }),
    );
    Value::Object(m)
}

/// The result of a fallible page-writing operation.
type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(String),

    /// An error writing the output files.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts [`io::Error`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template error message into an [`Error`].
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}
