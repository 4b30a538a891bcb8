//! The post list view: sorting, tag filtering, the tag vocabulary, and the
//! view states. [`ListView`] is the state machine (`loading -> ready | empty |
//! error`, and `ready -> ready` on sort or tag changes); [`ListState`] is the
//! view model that carries the current sort and filter explicitly.

use crate::metadata::Metadata;
use crate::post::{format_date, Post};
use crate::tag::{strip_marker, Tag};
use gtmpl_value::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Shown when the current filter matches nothing.
pub const NO_POSTS: &str = "No posts found.";

/// Shown when the posts couldn't be loaded at all.
pub const LOAD_FAILED: &str = "Unable to load posts.";

/// The available post orderings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortOrder {
    DateDesc,
    DateAsc,
    TitleAsc,
    TitleDesc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::DateDesc,
        SortOrder::DateAsc,
        SortOrder::TitleAsc,
        SortOrder::TitleDesc,
    ];

    /// The query-parameter form, e.g., `date-desc`.
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::DateDesc => "date-desc",
            SortOrder::DateAsc => "date-asc",
            SortOrder::TitleAsc => "title-asc",
            SortOrder::TitleDesc => "title-desc",
        }
    }

    /// The label shown in the sort selector.
    pub fn label(self) -> &'static str {
        match self {
            SortOrder::DateDesc => "Newest First",
            SortOrder::DateAsc => "Oldest First",
            SortOrder::TitleAsc => "Title A-Z",
            SortOrder::TitleDesc => "Title Z-A",
        }
    }

    /// Parses a `sort` parameter, falling back to the default order for
    /// unknown values.
    pub fn parse_or_default(s: &str) -> SortOrder {
        s.parse().unwrap_or_else(|e| {
            log::warn!("{}; using `{}`", e, SortOrder::default().as_str());
            SortOrder::default()
        })
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::DateDesc
    }
}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .iter()
            .copied()
            .find(|order| order.as_str() == s)
            .ok_or_else(|| UnknownSortOrder(s.to_owned()))
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq)]
pub struct UnknownSortOrder(String);

impl fmt::Display for UnknownSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown sort order `{}`", self.0)
    }
}

impl std::error::Error for UnknownSortOrder {}

/// The list page selection carried by the `tag` and `sort` query parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub sort: SortOrder,
}

impl ListQuery {
    /// Parses a query string such as `tag=ai&sort=title-asc`. A leading `?` is
    /// allowed; unknown parameters are ignored.
    pub fn parse(query: &str) -> ListQuery {
        let mut parsed = ListQuery::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "tag" if !value.is_empty() => parsed.tag = Some(value.into_owned()),
                "sort" => parsed.sort = SortOrder::parse_or_default(&value),
                _ => {}
            }
        }
        parsed
    }

    /// The generated page for this selection, relative to the posts index
    /// directory. The default sort is the `index.html` of its directory.
    pub fn page_path(&self) -> String {
        let file = match self.sort {
            SortOrder::DateDesc => String::from("index.html"),
            sort => format!("{}.html", sort),
        };
        match &self.tag {
            Some(tag) => format!("tag/{}/{}", Tag::new(tag.as_str()).slug(), file),
            None => file,
        }
    }
}

/// Sorts posts by the given order. Title orders compare resolved titles
/// case-insensitively; the sort is stable.
pub fn sort_posts<'a>(posts: &[&'a Post], sort: SortOrder, metadata: &Metadata) -> Vec<&'a Post> {
    let mut sorted = posts.to_vec();
    match sort {
        SortOrder::DateDesc => sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortOrder::DateAsc => sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortOrder::TitleAsc | SortOrder::TitleDesc => {
            let mut keyed: Vec<(String, &Post)> = sorted
                .iter()
                .map(|p| (p.resolved_title(metadata).to_lowercase(), *p))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| match sort {
                SortOrder::TitleDesc => b.cmp(a),
                _ => a.cmp(b),
            });
            sorted = keyed.into_iter().map(|(_, p)| p).collect();
        }
    }
    sorted
}

/// Keeps the posts whose resolved tags match `filter` (see [`Tag::matches`]).
pub fn filter_by_tag<'a>(posts: &[&'a Post], filter: &str, metadata: &Metadata) -> Vec<&'a Post> {
    posts
        .iter()
        .copied()
        .filter(|post| post.resolved_tags(metadata).iter().any(|t| t.matches(filter)))
        .collect()
}

/// The union of resolved tags across `posts`, lowercased and sorted.
pub fn all_tags(posts: &[Post], metadata: &Metadata) -> Vec<String> {
    posts
        .iter()
        .flat_map(|post| post.resolved_tags(metadata))
        .map(|tag| tag.name.to_lowercase())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// The list view model: the full collection plus the current selection.
#[derive(Clone, Debug)]
pub struct ListState {
    pub posts: Vec<Post>,
    pub sort: SortOrder,
    pub tag_filter: Option<String>,
}

impl ListState {
    /// The filtered, sorted posts for the current selection.
    pub fn visible<'a>(&'a self, metadata: &Metadata) -> Vec<&'a Post> {
        let all: Vec<&Post> = self.posts.iter().collect();
        let filtered = match &self.tag_filter {
            Some(filter) => filter_by_tag(&all, filter, metadata),
            None => all,
        };
        sort_posts(&filtered, self.sort, metadata)
    }

    /// The tag vocabulary of the whole collection, not just the visible
    /// posts.
    pub fn tags(&self, metadata: &Metadata) -> Vec<String> {
        all_tags(&self.posts, metadata)
    }

    pub fn query(&self) -> ListQuery {
        ListQuery {
            tag: self.tag_filter.clone(),
            sort: self.sort,
        }
    }

    fn is_active(&self, tag: &str) -> bool {
        match &self.tag_filter {
            Some(filter) => filter == tag || filter == strip_marker(tag),
            None => false,
        }
    }
}

/// The list page's states.
#[derive(Clone, Debug)]
pub enum ListView {
    Loading,
    Ready(ListState),
    Empty,
    Error(String),
}

impl ListView {
    /// Performs the `loading -> *` transition from the outcome of loading
    /// the posts.
    pub fn from_load<E: fmt::Display>(
        loaded: Result<Vec<Post>, E>,
        query: &ListQuery,
    ) -> ListView {
        match loaded {
            Err(e) => ListView::Error(e.to_string()),
            Ok(posts) if posts.is_empty() => ListView::Empty,
            Ok(posts) => ListView::Ready(ListState {
                posts,
                sort: query.sort,
                tag_filter: query.tag.clone(),
            }),
        }
    }

    /// `ready -> ready` on a sort change. Other states are unchanged.
    pub fn with_sort(self, sort: SortOrder) -> ListView {
        match self {
            ListView::Ready(state) => ListView::Ready(ListState { sort, ..state }),
            other => other,
        }
    }

    /// `ready -> ready` on tag navigation. Other states are unchanged.
    pub fn with_tag(self, tag_filter: Option<String>) -> ListView {
        match self {
            ListView::Ready(state) => ListView::Ready(ListState { tag_filter, ..state }),
            other => other,
        }
    }

    /// Converts the view into a template [`Value`] with fields `state`,
    /// `message`, `posts`, `tags`, `sort_options`, `all_url`, `all_active`,
    /// and `tag_filter`. The last three are only meaningful when ready.
    pub fn to_value(&self, metadata: &Metadata, urls: &ListUrls) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        let (state, message) = match self {
            ListView::Loading => ("loading", ""),
            ListView::Ready(_) => ("ready", ""),
            ListView::Empty => ("empty", NO_POSTS),
            ListView::Error(_) => ("error", LOAD_FAILED),
        };
        m.insert("state".to_owned(), Value::String(state.to_owned()));
        m.insert("all_url".to_owned(), Value::String(String::new()));
        m.insert("all_active".to_owned(), Value::Bool(false));
        m.insert("tag_filter".to_owned(), Value::Nil);

        let mut posts = Vec::new();
        let mut tags = Vec::new();
        let mut sort_options = Vec::new();
        let mut message = message.to_owned();
        if let ListView::Ready(state) = self {
            posts = state
                .visible(metadata)
                .into_iter()
                .map(|p| card(p, metadata, urls))
                .collect();
            if posts.is_empty() {
                message = NO_POSTS.to_owned();
            }
            tags = state
                .tags(metadata)
                .iter()
                .map(|tag| tag_filter_item(state, tag, urls))
                .collect();
            sort_options = SortOrder::ALL
                .iter()
                .map(|sort| sort_option(state, *sort, urls))
                .collect();
            m.insert(
                "all_url".to_owned(),
                Value::String(urls.page(&ListQuery { tag: None, sort: state.sort })),
            );
            m.insert("all_active".to_owned(), Value::Bool(state.tag_filter.is_none()));
            m.insert(
                "tag_filter".to_owned(),
                state.tag_filter.clone().map(Value::String).unwrap_or(Value::Nil),
            );
        }
        m.insert("message".to_owned(), Value::String(message));
        m.insert("posts".to_owned(), Value::Array(posts));
        m.insert("tags".to_owned(), Value::Array(tags));
        m.insert("sort_options".to_owned(), Value::Array(sort_options));
        Value::Object(m)
    }
}

/// Resolves list page and post page URLs.
pub struct ListUrls<'a> {
    /// The base URL of the list pages, with a trailing slash.
    pub index_url: &'a Url,

    /// The base URL of the post pages, with a trailing slash.
    pub posts_url: &'a Url,
}

impl ListUrls<'_> {
    pub fn page(&self, query: &ListQuery) -> String {
        join(self.index_url, &query.page_path())
    }

    pub fn post(&self, post: &Post) -> String {
        join(self.posts_url, &format!("{}.html", post.id))
    }
}

fn join(base: &Url, relative: &str) -> String {
    base.join(relative)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{}{}", base, relative))
}

fn card(post: &Post, metadata: &Metadata, urls: &ListUrls) -> Value {
    let tags: Vec<Value> = post
        .resolved_tags(metadata)
        .iter()
        .map(|tag| tag.to_value(urls.index_url))
        .collect();
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("id".to_owned(), Value::String(post.id.clone()));
    m.insert("title".to_owned(), Value::String(post.resolved_title(metadata)));
    m.insert("date".to_owned(), Value::String(format_date(post.timestamp)));
    m.insert("url".to_owned(), Value::String(urls.post(post)));
    m.insert("has_tags".to_owned(), Value::Bool(!tags.is_empty()));
    m.insert("tags".to_owned(), Value::Array(tags));
    Value::Object(m)
}

fn tag_filter_item(state: &ListState, tag: &str, urls: &ListUrls) -> Value {
    let query = ListQuery {
        tag: Some(strip_marker(tag).to_owned()),
        sort: state.sort,
    };
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("tag".to_owned(), Value::String(tag.to_owned()));
    m.insert("url".to_owned(), Value::String(urls.page(&query)));
    m.insert("active".to_owned(), Value::Bool(state.is_active(tag)));
    Value::Object(m)
}

fn sort_option(state: &ListState, sort: SortOrder, urls: &ListUrls) -> Value {
    let query = ListQuery {
        tag: state.tag_filter.clone(),
        sort,
    };
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("value".to_owned(), Value::String(sort.as_str().to_owned()));
    m.insert("label".to_owned(), Value::String(sort.label().to_owned()));
    m.insert("url".to_owned(), Value::String(urls.page(&query)));
    m.insert("selected".to_owned(), Value::Bool(state.sort == sort));
    Value::Object(m)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metadata::Override;
    use crate::post::PostKind;

    fn post(id: &str, timestamp: i64, title: &str, tags: &[&str]) -> Post {
        Post {
            id: id.to_owned(),
            timestamp,
            title: Some(title.to_owned()),
            tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            post_url: None,
            kind: PostKind::Text {
                body: String::from("b"),
            },
        }
    }

    fn posts() -> Vec<Post> {
        vec![
            post("a", 100, "banana", &["ai"]),
            post("b", 50, "Apple", &["life"]),
            post("c", 200, "cherry", &["AI", "art"]),
        ]
    }

    fn ids(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_sort_by_date() {
        let posts = posts();
        let refs: Vec<&Post> = posts.iter().collect();
        let metadata = Metadata::default();
        let desc = sort_posts(&refs, SortOrder::DateDesc, &metadata);
        assert_eq!(vec![200, 100, 50], desc.iter().map(|p| p.timestamp).collect::<Vec<_>>());
        let asc = sort_posts(&refs, SortOrder::DateAsc, &metadata);
        assert_eq!(vec![50, 100, 200], asc.iter().map(|p| p.timestamp).collect::<Vec<_>>());
    }

    #[test]
    fn test_sort_by_title_is_case_insensitive() {
        let posts = posts();
        let refs: Vec<&Post> = posts.iter().collect();
        let metadata = Metadata::default();
        assert_eq!(vec!["b", "a", "c"], ids(&sort_posts(&refs, SortOrder::TitleAsc, &metadata)));
        assert_eq!(vec!["c", "a", "b"], ids(&sort_posts(&refs, SortOrder::TitleDesc, &metadata)));
    }

    #[test]
    fn test_sort_by_resolved_title() {
        let posts = posts();
        let refs: Vec<&Post> = posts.iter().collect();
        let mut metadata = Metadata::default();
        metadata.insert(
            "c",
            Override {
                title: Some(String::from("aardvark")),
                tags: None,
            },
        );
        assert_eq!(vec!["c", "b", "a"], ids(&sort_posts(&refs, SortOrder::TitleAsc, &metadata)));
    }

    #[test]
    fn test_filter_by_tag_accepts_both_forms() {
        let posts = posts();
        let refs: Vec<&Post> = posts.iter().collect();
        let metadata = Metadata::default();
        assert_eq!(vec!["a", "c"], ids(&filter_by_tag(&refs, "ai", &metadata)));
        assert_eq!(vec!["a", "c"], ids(&filter_by_tag(&refs, "#AI", &metadata)));
        assert!(filter_by_tag(&refs, "nothing", &metadata).is_empty());
    }

    #[test]
    fn test_filter_uses_override_tags() {
        let posts = posts();
        let refs: Vec<&Post> = posts.iter().collect();
        let mut metadata = Metadata::default();
        metadata.insert(
            "b",
            Override {
                title: None,
                tags: Some(vec![String::from("#ai")]),
            },
        );
        assert_eq!(vec!["a", "b", "c"], ids(&filter_by_tag(&refs, "ai", &metadata)));
    }

    #[test]
    fn test_tag_vocabulary_covers_unfiltered_collection() {
        let state = ListState {
            posts: posts(),
            sort: SortOrder::DateDesc,
            tag_filter: Some(String::from("life")),
        };
        let metadata = Metadata::default();
        assert_eq!(vec!["b"], ids(&state.visible(&metadata)));
        assert_eq!(vec!["#ai", "#art", "#life"], state.tags(&metadata));
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!(Ok(SortOrder::TitleAsc), "title-asc".parse::<SortOrder>());
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::DateDesc, SortOrder::parse_or_default("sideways"));
    }

    #[test]
    fn test_list_query() {
        assert_eq!(ListQuery::default(), ListQuery::parse(""));
        let query = ListQuery::parse("?tag=Machine%20Learning&sort=title-desc&x=1");
        assert_eq!(Some(String::from("Machine Learning")), query.tag);
        assert_eq!(SortOrder::TitleDesc, query.sort);
        assert_eq!("tag/machine-learning/title-desc.html", query.page_path());
        assert_eq!("index.html", ListQuery::parse("sort=date-desc").page_path());
        assert_eq!("date-asc.html", ListQuery::parse("sort=date-asc").page_path());
        assert_eq!("tag/ai/index.html", ListQuery::parse("tag=%23ai").page_path());
    }

    #[test]
    fn test_view_transitions() {
        let query = ListQuery::default();
        assert!(matches!(
            ListView::from_load(Err::<Vec<Post>, _>("boom"), &query),
            ListView::Error(_)
        ));
        assert!(matches!(
            ListView::from_load(Ok::<_, String>(Vec::new()), &query),
            ListView::Empty
        ));

        let view = ListView::from_load(Ok::<_, String>(posts()), &query)
            .with_sort(SortOrder::TitleAsc)
            .with_tag(Some(String::from("ai")));
        match view {
            ListView::Ready(state) => {
                assert_eq!(SortOrder::TitleAsc, state.sort);
                assert_eq!(vec!["a", "c"], ids(&state.visible(&Metadata::default())));
                assert_eq!(3, state.posts.len());
            }
            other => panic!("wanted ready; found {:?}", other),
        }

        assert!(matches!(ListView::Empty.with_sort(SortOrder::DateAsc), ListView::Empty));
    }

    #[test]
    fn test_to_value_marks_empty_filter() -> Result<(), url::ParseError> {
        let index_url = Url::parse("https://example.org/posts/")?;
        let urls = ListUrls {
            index_url: &index_url,
            posts_url: &index_url,
        };
        let view = ListView::from_load(
            Ok::<_, String>(posts()),
            &ListQuery {
                tag: Some(String::from("nothing")),
                sort: SortOrder::DateDesc,
            },
        );
        match view.to_value(&Metadata::default(), &urls) {
            Value::Object(m) => {
                assert!(matches!(m.get("message"), Some(Value::String(s)) if s == NO_POSTS));
                assert!(matches!(m.get("all_active"), Some(Value::Bool(false))));
                assert!(matches!(m.get("tags"), Some(Value::Array(tags)) if tags.len() == 3));
                assert!(matches!(m.get("posts"), Some(Value::Array(posts)) if posts.is_empty()));
            }
            _ => panic!("wanted an object"),
        }
        Ok(())
    }
}
