//! Turns a [`Post`] into a rendering-ready HTML fragment. [`Normalizer::render_content`]
//! assembles markup per post type and then passes it through
//! [`Normalizer::normalize_fragment`], which rewrites `<img>` and `<a>` start
//! tags:
//!
//! * image sources become absolute (`//host/x` → `https://host/x`,
//!   `/x` → `https://{platform_host}/x`, `host/x` → `https://host/x`),
//! * lazy-load attributes are dropped (a missing `src` is recovered from
//!   `data-src`/`data-lazy-src` first),
//! * images always carry the `post-image` class and non-blank alt text,
//! * links that leave the site open in a new tab with `rel="noopener noreferrer"`.
//!
//! Normalization is idempotent: running it over its own output changes
//! nothing.

use crate::post::{Post, PostKind};
use pulldown_cmark::escape::escape_html;
use regex::{Captures, Regex};
use url::Url;

/// The class every post image carries.
pub const IMAGE_CLASS: &str = "post-image";

/// The alt text for images that don't have any.
pub const DEFAULT_ALT: &str = "Post image";

const LAZY_ATTRIBUTES: &[&str] = &["loading", "data-src", "data-lazy-src"];

const SAFE_REL: &[&str] = &["noopener", "noreferrer"];

/// Rewrites post content. Holds the compiled patterns and the hosts that
/// decide how URLs are resolved.
pub struct Normalizer {
    /// The host root-relative image sources belong to, e.g.,
    /// `rocktobot.tumblr.com`.
    platform_host: String,

    /// The host of the generated site. Links to it aren't "off-page".
    site_host: Option<String>,

    tag: Regex,
    attribute: Regex,
    scheme: Regex,
}

/// A parsed attribute. `value` is `None` for bare attributes like `controls`.
#[derive(Debug)]
struct Attribute {
    name: String,
    value: Option<String>,
}

impl Normalizer {
    pub fn new(platform_host: &str, site_host: Option<&str>) -> Normalizer {
        Normalizer {
            platform_host: platform_host.to_owned(),
            site_host: site_host.map(str::to_lowercase),
            tag: Regex::new(r#"(?i)<(img|a)([\s/](?:[^>"']|"[^"]*"|'[^']*')*)?>"#)
                .expect("tag pattern is valid"),
            attribute: Regex::new(
                r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
            )
            .expect("attribute pattern is valid"),
            scheme: Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("scheme pattern is valid"),
        }
    }

    /// Renders a post's content as a normalized HTML fragment. Unknown post
    /// types render as the empty string.
    pub fn render_content(&self, post: &Post) -> String {
        self.normalize_fragment(&assemble(post))
    }

    /// Rewrites every `<img>` and `<a>` start tag in `html`. See the module
    /// documentation for the rules.
    pub fn normalize_fragment(&self, html: &str) -> String {
        self.tag
            .replace_all(html, |caps: &Captures| self.rewrite_tag(caps))
            .into_owned()
    }

    fn rewrite_tag(&self, caps: &Captures) -> String {
        let name = caps[1].to_lowercase();
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("").trim_end();
        let (rest, self_closing) = split_self_closing(rest);
        let mut attributes = self.parse_attributes(rest);

        match name.as_str() {
            "img" => self.rewrite_image(&mut attributes),
            _ => self.rewrite_link(&mut attributes),
        }

        let mut out = format!("<{}", name);
        for attribute in &attributes {
            out.push(' ');
            out.push_str(&attribute.name);
            if let Some(value) = &attribute.value {
                out.push_str("=\"");
                out.push_str(&value.replace('"', "&quot;"));
                out.push('"');
            }
        }
        // `<a>` is never void, so a stray slash is dropped
        out.push_str(match self_closing && name == "img" {
            true => " />",
            false => ">",
        });
        out
    }

    fn parse_attributes(&self, s: &str) -> Vec<Attribute> {
        self.attribute
            .captures_iter(s)
            .map(|caps| Attribute {
                name: caps[1].to_lowercase(),
                value: caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str().to_owned()),
            })
            .collect()
    }

    fn rewrite_image(&self, attributes: &mut Vec<Attribute>) {
        let has_src = get(attributes, "src").map(|v| !v.trim().is_empty()).unwrap_or(false);
        if !has_src {
            let lazy = get(attributes, "data-src")
                .or_else(|| get(attributes, "data-lazy-src"))
                .map(str::to_owned);
            if let Some(lazy) = lazy {
                set(attributes, "src", &lazy);
            }
        }
        attributes.retain(|a| !LAZY_ATTRIBUTES.contains(&a.name.as_str()));

        if let Some(src) = get(attributes, "src").map(|v| self.absolutize(v)) {
            set(attributes, "src", &src);
        }

        let class = match get(attributes, "class") {
            Some(class) if class.split_whitespace().any(|c| c == IMAGE_CLASS) => None,
            Some(class) if class.trim().is_empty() => Some(IMAGE_CLASS.to_owned()),
            Some(class) => Some(format!("{} {}", class.trim(), IMAGE_CLASS)),
            None => Some(IMAGE_CLASS.to_owned()),
        };
        if let Some(class) = class {
            set(attributes, "class", &class);
        }

        if get(attributes, "alt").map(|v| v.trim().is_empty()).unwrap_or(true) {
            set(attributes, "alt", DEFAULT_ALT);
        }
    }

    fn rewrite_link(&self, attributes: &mut Vec<Attribute>) {
        let off_page = get(attributes, "href")
            .map(|href| self.is_off_page(href))
            .unwrap_or(false);
        if !off_page {
            return;
        }

        set(attributes, "target", "_blank");
        let mut rel: Vec<String> = get(attributes, "rel")
            .map(|v| v.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        for token in SAFE_REL {
            if !rel.iter().any(|r| r.eq_ignore_ascii_case(token)) {
                rel.push((*token).to_owned());
            }
        }
        set(attributes, "rel", &rel.join(" "));
    }

    /// Resolves an image source to an absolute URL. Anything with a scheme
    /// (including `data:`) is returned unchanged.
    pub fn absolutize(&self, src: &str) -> String {
        let src = src.trim();
        if src.is_empty() || self.scheme.is_match(src) {
            src.to_owned()
        } else if src.starts_with("//") {
            format!("https:{}", src)
        } else if src.starts_with('/') {
            format!("https://{}{}", self.platform_host, src)
        } else {
            format!("https://{}", src)
        }
    }

    /// Reports whether `href` leaves the site: absolute http(s) and
    /// protocol-relative URLs on a host other than the site's own.
    pub fn is_off_page(&self, href: &str) -> bool {
        let href = href.trim();
        let absolute = if href.starts_with("//") {
            format!("https:{}", href)
        } else {
            let lower = href.to_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return false;
            }
            href.to_owned()
        };

        match (Url::parse(&absolute), &self.site_host) {
            (Ok(url), Some(site_host)) => url.host_str().map(|h| h != site_host).unwrap_or(true),
            (Ok(_), None) => true,
            (Err(_), _) => true,
        }
    }
}

/// Splits a trailing self-closing slash off a start tag's attribute text. The
/// slash only counts when it stands apart from the last attribute, since an
/// unquoted value may end in `/` (`href=https://example.org/dir/`).
fn split_self_closing(rest: &str) -> (&str, bool) {
    match rest.strip_suffix('/') {
        Some(head)
            if head.is_empty()
                || head.ends_with(|c: char| c.is_whitespace() || c == '"' || c == '\'') =>
        {
            (head, true)
        }
        _ => (rest, false),
    }
}

fn get<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_deref().unwrap_or(""))
}

/// Sets an attribute in place, or appends it if it's absent.
fn set(attributes: &mut Vec<Attribute>, name: &str, value: &str) {
    match attributes.iter_mut().find(|a| a.name == name) {
        Some(attribute) => attribute.value = Some(value.to_owned()),
        None => attributes.push(Attribute {
            name: name.to_owned(),
            value: Some(value.to_owned()),
        }),
    }
}

/// Escapes plain text for insertion into HTML text or attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // writing into a String can't fail
    let _ = escape_html(&mut out, s);
    out
}

/// Assembles the raw (unnormalized) markup for a post.
fn assemble(post: &Post) -> String {
    let mut content = String::new();
    match &post.kind {
        PostKind::Text { body } => content.push_str(body),
        PostKind::Photo { caption, photos } => {
            content.push_str(caption);
            for photo in photos {
                content.push_str(&format!(
                    r#"<img src="{}" alt="{}" class="{}" />"#,
                    escape(&photo.original_size.url),
                    DEFAULT_ALT,
                    IMAGE_CLASS,
                ));
            }
        }
        PostKind::Quote { text, source } => {
            content.push_str(&format!("<blockquote>{}</blockquote>", text));
            if let Some(source) = source.as_deref().filter(|s| !s.trim().is_empty()) {
                content.push_str(&format!(r#"<p class="quote-source">— {}</p>"#, escape(source)));
            }
        }
        PostKind::Link { url, description } => {
            let label = match post.title.as_deref() {
                Some(title) if !title.trim().is_empty() => title,
                _ => url.as_str(),
            };
            content.push_str(&format!(
                r#"<p><a href="{}" target="_blank">{}</a></p>"#,
                escape(url),
                escape(label),
            ));
            content.push_str(description);
        }
        PostKind::Video {
            caption,
            video_url,
            player,
        } => {
            match video_url.as_deref().filter(|u| !u.trim().is_empty()) {
                Some(video_url) => content.push_str(&format!(
                    r#"<video controls><source src="{}" type="video/mp4"></video>"#,
                    escape(video_url),
                )),
                None => {
                    let widest = player
                        .iter()
                        .filter_map(|p| p.embed_code().map(|code| (p.width(), code)))
                        .max_by_key(|(width, _)| *width);
                    if let Some((_, code)) = widest {
                        content.push_str(code);
                    }
                }
            }
            content.push_str(caption);
        }
        PostKind::Audio {
            caption,
            player,
            track_name,
            artist,
        } => {
            if let Some(player) = player.as_deref().filter(|p| !p.trim().is_empty()) {
                content.push_str(&format!(r#"<div class="audio-player">{}</div>"#, player));
            }
            let track = match (track_name.as_deref(), artist.as_deref()) {
                (Some(track), Some(artist)) => Some(format!("{} — {}", track, artist)),
                (Some(track), None) => Some(track.to_owned()),
                (None, Some(artist)) => Some(artist.to_owned()),
                (None, None) => None,
            };
            if let Some(track) = track {
                content.push_str(&format!(r#"<p class="audio-track">{}</p>"#, escape(&track)));
            }
            content.push_str(caption);
        }
        PostKind::Chat { body, dialogue } => {
            if dialogue.is_empty() {
                content.push_str(body);
            } else {
                content.push_str(r#"<ul class="chat">"#);
                for line in dialogue {
                    content.push_str(&format!(
                        "<li><strong>{}</strong> {}</li>",
                        escape(&line.label),
                        escape(&line.phrase),
                    ));
                }
                content.push_str("</ul>");
            }
        }
        PostKind::Other => {}
    }
    content
}
