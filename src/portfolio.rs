//! The portfolio: a locally authored list of [`Project`]s loaded from
//! `projects.json`, rendered as a banner grid and one page per project with
//! links, an optional 3D model viewer, and a gallery whose lightbox overlays
//! are generated from [`crate::lightbox::Lightbox`] transitions.

use crate::lightbox::{Key, Lightbox};
use crate::normalize::escape;
use gtmpl_value::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use url::Url;

pub const NO_PROJECTS: &str = "No projects available yet.";

pub const PROJECT_NOT_FOUND: &str = "Project not found.";

/// The only 3D viewer type with markup.
pub const MODEL_VIEWER: &str = "model-viewer";

/// The script the `model-viewer` element needs.
pub const MODEL_VIEWER_SCRIPT: &str =
    "https://ajax.googleapis.com/ajax/libs/model-viewer/3.3.0/model-viewer.min.js";

#[derive(Deserialize)]
struct ProjectsFile {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub banner_image: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub involvement: Option<String>,

    #[serde(default)]
    pub time_frame: Option<String>,

    #[serde(default)]
    pub links: Vec<ProjectLink>,

    #[serde(default)]
    pub gallery: Vec<GalleryItem>,

    #[serde(default, rename = "has3D")]
    pub has_3d: bool,

    #[serde(default, rename = "viewer3D")]
    pub viewer_3d: Option<Viewer3d>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ProjectLink {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GalleryItem {
    pub image: String,

    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Viewer3d {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub alt: Option<String>,
}

/// Loads the project list, propagating failures.
pub fn try_load_projects(path: &Path) -> Result<Vec<Project>> {
    let file = std::fs::File::open(path).map_err(|err| Error::Open {
        path: path.display().to_string(),
        err,
    })?;
    let parsed: ProjectsFile = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(parsed.projects)
}

/// Loads the project list. Any failure is logged and yields an empty list.
pub fn load_projects(path: &Path) -> Vec<Project> {
    try_load_projects(path).unwrap_or_else(|e| {
        log::error!("Error loading projects: {}", e);
        Vec::new()
    })
}

/// Finds a project by identifier.
pub fn find_project<'a>(projects: &'a [Project], id: &str) -> Option<&'a Project> {
    projects.iter().find(|p| p.id == id)
}

/// Formats plain description text as HTML: blank lines separate paragraphs
/// and single newlines become `<br>`.
pub fn format_description(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|para| !para.is_empty())
        .map(|para| format!("<p>{}</p>", escape(para).replace('\n', "<br>")))
        .collect()
}

impl Viewer3d {
    /// The viewer markup. Unknown viewer types render nothing.
    pub fn html(&self) -> String {
        if self.kind != MODEL_VIEWER {
            return String::new();
        }
        format!(
            r#"<model-viewer src="{}" alt="{}" auto-rotate camera-controls style="width: 100%; height: 500px; background: var(--card);"></model-viewer>"#,
            escape(&self.model),
            escape(self.alt.as_deref().unwrap_or("3D Model")),
        )
    }
}

impl Project {
    /// The 3D viewer to show, if the project has one enabled.
    pub fn viewer(&self) -> Option<&Viewer3d> {
        match self.has_3d {
            true => self.viewer_3d.as_ref(),
            false => None,
        }
    }

    pub fn url(&self, projects_url: &Url) -> String {
        projects_url
            .join(&format!("{}.html", self.id))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}.html", projects_url, self.id))
    }

    /// The grid card value: `id`, `title`, `banner`, and `url`.
    pub fn to_card_value(&self, projects_url: &Url) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(self.id.clone()));
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert("banner".to_owned(), Value::String(self.banner_image.clone()));
        m.insert("url".to_owned(), Value::String(self.url(projects_url)));
        Value::Object(m)
    }

    /// The project page value. Optional sections are `Nil` (or empty arrays)
    /// when absent so templates can test them with `if`.
    pub fn to_page_value(&self) -> Value {
        let optional = |s: Option<String>| s.map(Value::String).unwrap_or(Value::Nil);
        let non_blank = |s: &Option<String>| s.as_deref().filter(|s| !s.trim().is_empty()).map(str::to_owned);

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(self.id.clone()));
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert("banner".to_owned(), Value::String(self.banner_image.clone()));
        m.insert("time_frame".to_owned(), optional(non_blank(&self.time_frame)));
        m.insert(
            "description".to_owned(),
            optional(non_blank(&self.description).map(|d| format_description(&d))),
        );
        m.insert(
            "involvement".to_owned(),
            optional(non_blank(&self.involvement).map(|d| format_description(&d))),
        );
        m.insert(
            "links".to_owned(),
            Value::Array(self.links.iter().map(ProjectLink::to_value).collect()),
        );
        m.insert(
            "gallery".to_owned(),
            Value::Array(
                self.gallery
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.to_value(i, &self.gallery))
                    .collect(),
            ),
        );
        let viewer = self.viewer().map(Viewer3d::html).filter(|html| !html.is_empty());
        m.insert(
            "needs_model_viewer".to_owned(),
            Value::Bool(viewer.is_some()),
        );
        m.insert("viewer".to_owned(), optional(viewer));
        m.insert(
            "model_viewer_script".to_owned(),
            Value::String(MODEL_VIEWER_SCRIPT.to_owned()),
        );
        Value::Object(m)
    }
}

impl ProjectLink {
    fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("label".to_owned(), Value::String(self.label.clone()));
        m.insert("url".to_owned(), Value::String(self.url.clone()));
        Value::Object(m)
    }
}

/// The anchor a thumbnail links to and its overlay is addressed by.
pub fn overlay_id(index: usize) -> String {
    format!("lightbox-{}", index)
}

/// The anchor closing an overlay returns to.
pub const GALLERY_ANCHOR: &str = "gallery";

impl GalleryItem {
    fn to_value(&self, index: usize, gallery: &[GalleryItem]) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("index".to_owned(), Value::String(index.to_string()));
        m.insert("image".to_owned(), Value::String(self.image.clone()));
        m.insert(
            "caption".to_owned(),
            self.caption
                .clone()
                .filter(|c| !c.trim().is_empty())
                .map(Value::String)
                .unwrap_or(Value::Nil),
        );
        m.insert("overlay_id".to_owned(), Value::String(overlay_id(index)));
        m.insert(
            "overlay".to_owned(),
            Value::String(
                Lightbox::open(gallery.len(), index)
                    .map(|lightbox| render_overlay(gallery, &lightbox))
                    .unwrap_or_default(),
            ),
        );
        Value::Object(m)
    }
}

/// Renders the overlay for the lightbox's current image. The buttons link to
/// the overlays the lightbox would move to, and carry the key that mirrors
/// them.
pub fn render_overlay(gallery: &[GalleryItem], lightbox: &Lightbox) -> String {
    let item = match gallery.get(lightbox.index()) {
        Some(item) => item,
        None => return String::new(),
    };
    let (previous, next) = lightbox.neighbors();
    let caption = item.caption.as_deref().unwrap_or("");
    let caption_html = match caption.trim().is_empty() {
        true => String::new(),
        false => format!(r#"<p class="lightbox-caption">{}</p>"#, escape(caption)),
    };
    format!(
        concat!(
            r#"<div class="lightbox" id="{id}" role="dialog" aria-modal="true">"#,
            r#"<div class="lightbox-content">"#,
            r##"<a class="lightbox-close" href="#{gallery}" aria-label="Close" data-key="{close_key}">&times;</a>"##,
            r##"<a class="lightbox-prev" href="#{previous}" aria-label="Previous" data-key="{previous_key}">‹</a>"##,
            r##"<a class="lightbox-next" href="#{next}" aria-label="Next" data-key="{next_key}">›</a>"##,
            r#"<div class="lightbox-image-container">"#,
            r#"<img src="{image}" alt="{alt}" class="lightbox-image" />{caption}"#,
            r#"</div>"#,
            r#"<div class="lightbox-counter">{counter}</div>"#,
            r#"</div></div>"#,
        ),
        id = overlay_id(lightbox.index()),
        gallery = GALLERY_ANCHOR,
        close_key = Key::Escape.name(),
        previous = overlay_id(previous),
        previous_key = Key::ArrowLeft.name(),
        next = overlay_id(next),
        next_key = Key::ArrowRight.name(),
        image = escape(&item.image),
        alt = escape(caption),
        caption = caption_html,
        counter = lightbox.counter(),
    )
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to load the project list.
#[derive(Debug)]
pub enum Error {
    /// Returned when the project file can't be opened.
    Open { path: String, err: std::io::Error },

    /// Returned when the project file isn't valid.
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open { path, err } => write!(f, "Opening project file '{}': {}", path, err),
            Error::Json(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { path: _, err } => Some(err),
            Error::Json(err) => Some(err),
        }
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

    const PROJECTS: &str = r#"{
        "projects": [
            {
                "id": "robot-arm",
                "title": "Robot <Arm>",
                "bannerImage": "/img/arm.jpg",
                "description": "First para.\nSame para.\n\nSecond para.",
                "timeFrame": "2023",
                "links": [{"label": "Code", "url": "https://git.example.org/arm"}],
                "gallery": [
                    {"image": "/img/1.jpg", "caption": "One"},
                    {"image": "/img/2.jpg"},
                    {"image": "/img/3.jpg", "caption": "Three"}
                ],
                "has3D": true,
                "viewer3D": {"type": "model-viewer", "model": "/models/arm.glb"}
            },
            {"id": "bare", "title": "Bare"}
        ]
    }"#;

    fn projects() -> Vec<Project> {
        serde_json::from_str::<ProjectsFile>(PROJECTS).unwrap().projects
    }

    #[test]
    fn test_parse_projects() {
        let projects = projects();
        assert_eq!(2, projects.len());
        assert_eq!("/img/arm.jpg", projects[0].banner_image);
        assert_eq!(3, projects[0].gallery.len());
        assert!(projects[0].viewer().is_some());
        assert!(projects[1].gallery.is_empty());
        assert!(projects[1].viewer().is_none());
    }

    #[test]
    fn test_load_projects_failure_is_empty() {
        assert!(load_projects(Path::new("/nonexistent/projects.json")).is_empty());
    }

    #[test]
    fn test_load_projects_from_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("projects.json");
        std::fs::write(&path, PROJECTS)?;
        assert_eq!(projects(), try_load_projects(&path)?);
        Ok(())
    }

    #[test]
    fn test_find_project() {
        let projects = projects();
        assert_eq!(Some("Bare"), find_project(&projects, "bare").map(|p| p.title.as_str()));
        assert_eq!(None, find_project(&projects, "missing"));
    }

    #[test]
    fn test_format_description() {
        assert_eq!(
            "<p>First &lt;para&gt;.<br>Same para.</p><p>Second para.</p>",
            format_description("First <para>.\nSame para.\n\n\n\nSecond para.\n")
        );
        assert_eq!("", format_description("  \n\n  "));
    }

    #[test]
    fn test_viewer_html() {
        let viewer = Viewer3d {
            kind: String::from(MODEL_VIEWER),
            model: String::from("/m.glb"),
            alt: None,
        };
        assert!(viewer.html().starts_with(r#"<model-viewer src="/m.glb" alt="3D Model""#));

        let other = Viewer3d {
            kind: String::from("sketchfab"),
            ..viewer
        };
        assert_eq!("", other.html());
    }

    #[test]
    fn test_render_overlay_wraps() {
        let projects = projects();
        let gallery = &projects[0].gallery;
        let overlay = render_overlay(gallery, &Lightbox::open(3, 2).unwrap());
        assert!(overlay.contains(r##"id="lightbox-2""##));
        assert!(overlay.contains(r##"class="lightbox-next" href="#lightbox-0""##));
        assert!(overlay.contains(r##"class="lightbox-prev" href="#lightbox-1""##));
        assert!(overlay.contains(r#"<div class="lightbox-counter">3 / 3</div>"#));
        assert!(overlay.contains(r#"<p class="lightbox-caption">Three</p>"#));

        let uncaptioned = render_overlay(gallery, &Lightbox::open(3, 1).unwrap());
        assert!(!uncaptioned.contains("lightbox-caption"));
        assert!(uncaptioned.contains(r#"alt="""#));
    }

    #[test]
    fn test_page_value() {
        let projects = projects();
        match projects[0].to_page_value() {
            Value::Object(m) => {
                assert!(matches!(m.get("needs_model_viewer"), Some(Value::Bool(true))));
                assert!(matches!(m.get("gallery"), Some(Value::Array(items)) if items.len() == 3));
                assert!(matches!(m.get("title"), Some(Value::String(s)) if s == "Robot <Arm>"));
            }
            _ => panic!("wanted an object"),
        }
        match projects[1].to_page_value() {
            Value::Object(m) => {
                assert!(matches!(m.get("description"), Some(Value::Nil)));
                assert!(matches!(m.get("viewer"), Some(Value::Nil)));
            }
            _ => panic!("wanted an object"),
        }
    }
}
