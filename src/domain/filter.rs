//! Text filters for the post list and the comments of a post.
//!
//! A filter is a case-insensitive substring predicate. The empty string
//! matches every item, so a filter is never "absent".

use url::Url;

use super::entities::{Comment, Post};

/// Query parameter that carries the post-title filter.
pub const POST_FILTER_PARAM: &str = "filter";
/// Query parameter that carries the comment filter.
pub const COMMENT_FILTER_PARAM: &str = "commentFilter";

/// One piece of filter state. Updates are synchronous and visible on the next read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    filter: String,
}

impl FilterState {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            filter: value.into(),
        }
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.filter = value.into();
    }

    pub fn clear(&mut self) {
        self.filter.clear();
    }

    pub fn value(&self) -> &str {
        &self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }
}

/// The two independent filters a view can read: post titles and comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub posts: FilterState,
    pub comments: FilterState,
}

impl Filters {
    /// Initialise from a raw query string (`filter=..&commentFilter=..`).
    /// Missing parameters default to the empty filter; the last occurrence wins.
    pub fn from_query(query: &str) -> Self {
        let mut filters = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                POST_FILTER_PARAM => filters.posts.set(value.into_owned()),
                COMMENT_FILTER_PARAM => filters.comments.set(value.into_owned()),
                _ => {}
            }
        }
        filters
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or(""))
    }

    /// Reflect the current filters into `url`, replacing any previous values.
    /// Empty filters are omitted; unrelated parameters are preserved.
    pub fn write_to_url(&self, url: &mut Url) {
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != POST_FILTER_PARAM && key != COMMENT_FILTER_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        let mut pairs: Vec<(&str, &str)> = retained
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        if !self.posts.is_empty() {
            pairs.push((POST_FILTER_PARAM, self.posts.value()));
        }
        if !self.comments.is_empty() {
            pairs.push((COMMENT_FILTER_PARAM, self.comments.value()));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
    }
}

/// Items that can be narrowed by a text filter.
pub trait Filterable {
    /// `needle` is already lowercased and non-empty.
    fn matches_lowercase(&self, needle: &str) -> bool;
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl Filterable for Post {
    fn matches_lowercase(&self, needle: &str) -> bool {
        contains_ci(&self.title, needle)
    }
}

impl Filterable for Comment {
    fn matches_lowercase(&self, needle: &str) -> bool {
        contains_ci(&self.text, needle) || contains_ci(&self.author, needle)
    }
}

/// Lazily yield the items matching `filter`, in their original order.
pub fn filter_iter<'a, T: Filterable>(
    items: &'a [T],
    filter: &str,
) -> impl Iterator<Item = &'a T> + 'a {
    let needle = filter.to_lowercase();
    items
        .iter()
        .filter(move |item| needle.is_empty() || item.matches_lowercase(&needle))
}

/// The order-preserving subsequence of `items` matching `filter`.
pub fn apply_filter<T: Filterable + Clone>(items: &[T], filter: &str) -> Vec<T> {
    filter_iter(items, filter).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, title: &str) -> Post {
        Post {
            id: id.to_string(),
            title: title.to_string(),
            content: String::new(),
            author: "someone".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn comment(id: &str, text: &str, author: &str) -> Comment {
        Comment {
            id: id.to_string(),
            text: text.to_string(),
            author: author.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            post_id: "p".to_string(),
        }
    }

    #[test]
    fn empty_filter_returns_everything_in_order() {
        let posts = vec![post("1", "b"), post("2", "a"), post("3", "c")];
        assert_eq!(apply_filter(&posts, ""), posts);
    }

    #[test]
    fn post_filter_is_case_insensitive_on_title() {
        let posts = vec![
            post("1", "Rust Tips"),
            post("2", "Cooking"),
            post("3", "Trusty rusty"),
        ];
        let ids: Vec<_> = apply_filter(&posts, "RUST")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn post_filter_ignores_content_and_author() {
        let mut p = post("1", "Title");
        p.content = "needle".to_string();
        p.author = "needle".to_string();
        assert!(apply_filter(&[p], "needle").is_empty());
    }

    #[test]
    fn comment_filter_matches_text_or_author() {
        let comments = vec![
            comment("1", "Great read", "Ann"),
            comment("2", "meh", "Greta"),
            comment("3", "ok", "Bob"),
        ];
        let ids: Vec<_> = apply_filter(&comments, "gre")
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn non_ascii_filters_fold_case() {
        let posts = vec![post("1", "Привет мир"), post("2", "Hello")];
        let found = apply_filter(&posts, "ПРИВЕТ");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");
    }

    #[test]
    fn clear_is_idempotent() {
        let mut state = FilterState::new("abc");
        state.clear();
        state.clear();
        state.clear();
        assert_eq!(state.value(), "");
        assert!(state.is_empty());
    }

    #[test]
    fn set_is_visible_immediately() {
        let mut state = FilterState::default();
        state.set("x");
        assert_eq!(state.value(), "x");
        state.set("");
        assert!(state.is_empty());
    }

    #[test]
    fn filters_from_query_default_to_empty() {
        let filters = Filters::from_query("page=2");
        assert_eq!(filters, Filters::default());
    }

    #[test]
    fn filters_from_query_decode_both_parameters() {
        let filters = Filters::from_query("filter=rust%20tips&commentFilter=ann");
        assert_eq!(filters.posts.value(), "rust tips");
        assert_eq!(filters.comments.value(), "ann");
    }

    #[test]
    fn write_to_url_replaces_and_preserves_other_params() {
        let mut url = Url::parse("http://localhost/posts?filter=old&page=2").expect("url");
        let mut filters = Filters::default();
        filters.posts.set("new one");
        filters.write_to_url(&mut url);

        let round_trip = Filters::from_url(&url);
        assert_eq!(round_trip.posts.value(), "new one");
        assert!(round_trip.comments.is_empty());
        assert!(url.query_pairs().any(|(k, v)| k == "page" && v == "2"));
    }

    #[test]
    fn write_to_url_drops_empty_filters() {
        let mut url = Url::parse("http://localhost/posts?filter=old").expect("url");
        Filters::default().write_to_url(&mut url);
        assert_eq!(url.query(), None);
    }
}
