//! Tags and query keys.
//!
//! A `QueryKey` names one cached read. A `Tag` labels what a cached read
//! depends on; mutations invalidate tags, never keys directly.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Posts,
    Comments,
}

impl TagKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Posts => "Posts",
            TagKind::Comments => "Comments",
        }
    }
}

/// Invalidation label, optionally narrowed to one id.
///
/// A tag without an id covers every tag of its kind; a tag with an id covers
/// only the identical tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: Option<String>,
}

impl Tag {
    /// `Posts`: the whole posts collection.
    pub fn posts() -> Self {
        Self {
            kind: TagKind::Posts,
            id: None,
        }
    }

    /// `Posts:{id}`
    pub fn post(id: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Posts,
            id: Some(id.into()),
        }
    }

    /// `Comments:{post_id}`: the comments of one post.
    pub fn comments(post_id: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Comments,
            id: Some(post_id.into()),
        }
    }

    /// Whether invalidating `self` invalidates a query that provided `provided`.
    pub fn covers(&self, provided: &Tag) -> bool {
        self.kind == provided.kind && (self.id.is_none() || self.id == provided.id)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// One cacheable read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    ListPosts,
    GetPost(String),
    ListComments(String),
}

impl QueryKey {
    /// Endpoint name used in logs and metrics labels.
    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryKey::ListPosts => "listPosts",
            QueryKey::GetPost(_) => "getPost",
            QueryKey::ListComments(_) => "listComments",
        }
    }

    /// The tag this query provides regardless of its result.
    pub fn base_tag(&self) -> Tag {
        match self {
            QueryKey::ListPosts => Tag::posts(),
            QueryKey::GetPost(id) => Tag::post(id.clone()),
            QueryKey::ListComments(post_id) => Tag::comments(post_id.clone()),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::ListPosts => f.write_str("listPosts()"),
            QueryKey::GetPost(id) => write!(f, "getPost({id})"),
            QueryKey::ListComments(post_id) => write!(f, "listComments({post_id})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_display_matches_wire_names() {
        assert_eq!(Tag::posts().to_string(), "Posts");
        assert_eq!(Tag::post("42").to_string(), "Posts:42");
        assert_eq!(Tag::comments("42").to_string(), "Comments:42");
    }

    #[test]
    fn collection_tag_covers_every_id_of_its_kind() {
        assert!(Tag::posts().covers(&Tag::posts()));
        assert!(Tag::posts().covers(&Tag::post("a")));
        assert!(!Tag::posts().covers(&Tag::comments("a")));
    }

    #[test]
    fn id_tag_covers_only_itself() {
        assert!(Tag::post("a").covers(&Tag::post("a")));
        assert!(!Tag::post("a").covers(&Tag::post("b")));
        assert!(!Tag::post("a").covers(&Tag::posts()));
        assert!(!Tag::post("a").covers(&Tag::comments("a")));
    }

    #[test]
    fn query_keys_compare_by_parameter() {
        assert_eq!(QueryKey::GetPost("x".into()), QueryKey::GetPost("x".into()));
        assert_ne!(QueryKey::GetPost("x".into()), QueryKey::ListComments("x".into()));
        assert_eq!(QueryKey::ListComments("p".into()).to_string(), "listComments(p)");
    }
}
