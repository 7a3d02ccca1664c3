//! Table of contents model (`SUMMARY.json`).
//!
//! A [`Summary`] is an ordered list of [`Part`]s, each holding a tree of
//! [`Article`]s. Every node carries a dotted `level` (`"2.1.3"`) that mirrors
//! its 1-based position: part 2, its first article, that article's third
//! child.

use serde::{Deserialize, Serialize};

use crate::error::{BinderyError, Result};
use crate::types::FileRef;

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// An article as produced by a summary parser, before levels are assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    /// Path of the page this article points at, relative to the book root.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub articles: Vec<RawArticle>,
}

/// A part as produced by a summary parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub articles: Vec<RawArticle>,
}

/// Input accepted by [`Summary::create_from_parts`]: an already typed part,
/// kept as is, or a raw one that gets its level from its position.
#[derive(Debug, Clone)]
pub enum PartEntry {
    Typed(Part),
    Raw(RawPart),
}

impl From<Part> for PartEntry {
    fn from(part: Part) -> Self {
        Self::Typed(part)
    }
}

impl From<RawPart> for PartEntry {
    fn from(part: RawPart) -> Self {
        Self::Raw(part)
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// A node of the table of contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    level: String,
    title: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Article>,
}

impl Article {
    pub fn new(
        level: impl Into<String>,
        title: impl Into<String>,
        path: Option<String>,
        children: Vec<Article>,
    ) -> Self {
        Self {
            level: level.into(),
            title: title.into(),
            path,
            children,
        }
    }

    /// Build an article (and its subtree) from raw input at `index` under a
    /// parent whose level is `parent_level`.
    pub fn create(raw: RawArticle, parent_level: &str, index: usize) -> Self {
        let level = format!("{parent_level}.{}", index + 1);
        let children = raw
            .articles
            .into_iter()
            .enumerate()
            .map(|(i, child)| Article::create(child, &level, i))
            .collect();

        Self {
            level,
            title: raw.title,
            path: raw.path,
            children,
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Referenced page path, if this article points at a file.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn children(&self) -> &[Article] {
        &self.children
    }

    /// Number of segments in the level (`"1.2.3"` → 3).
    pub fn depth(&self) -> usize {
        self.level.split('.').count()
    }
}

// ---------------------------------------------------------------------------
// Part
// ---------------------------------------------------------------------------

/// A top-level group of articles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

impl Part {
    pub fn new(level: impl Into<String>, title: Option<String>, articles: Vec<Article>) -> Self {
        Self {
            level: level.into(),
            title,
            articles,
        }
    }

    /// Build a part from raw input found at `index` in the parts list.
    pub fn create(raw: RawPart, index: usize) -> Self {
        let level = (index + 1).to_string();
        let articles = raw
            .articles
            .into_iter()
            .enumerate()
            .map(|(i, article)| Article::create(article, &level, i))
            .collect();

        Self {
            level,
            title: raw.title,
            articles,
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Result of a level lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SummaryNode<'a> {
    Part(&'a Part),
    Article(&'a Article),
}

impl<'a> SummaryNode<'a> {
    pub fn level(&self) -> &'a str {
        match self {
            Self::Part(part) => part.level(),
            Self::Article(article) => article.level(),
        }
    }

    /// The article, if this node is one.
    pub fn as_article(&self) -> Option<&'a Article> {
        match self {
            Self::Article(article) => Some(article),
            Self::Part(_) => None,
        }
    }

    /// Articles directly below this node.
    pub fn children(&self) -> &'a [Article] {
        match self {
            Self::Part(part) => part.articles(),
            Self::Article(article) => article.children(),
        }
    }
}

/// The table of contents of a book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    file: FileRef,
    parts: Vec<Part>,
}

impl Summary {
    /// Create a summary from a list of parts.
    ///
    /// Typed parts are kept unchanged; raw parts are built from their
    /// 0-based position in `parts`.
    pub fn create_from_parts<I, P>(file: FileRef, parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PartEntry>,
    {
        let parts = parts
            .into_iter()
            .enumerate()
            .map(|(i, entry)| match entry.into() {
                PartEntry::Typed(part) => part,
                PartEntry::Raw(raw) => Part::create(raw, i),
            })
            .collect();

        Self { file, parts }
    }

    /// Parse the JSON form of a summary (a list of raw parts).
    pub fn from_json(file: FileRef, json: &str) -> Result<Self> {
        let raw: Vec<RawPart> = serde_json::from_str(json).map_err(|e| {
            BinderyError::parse(format!("invalid summary {}: {e}", file.path.display()))
        })?;
        Ok(Self::create_from_parts(file, raw))
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Find a part or article by its dotted level.
    ///
    /// Nodes are matched on their own `level`. The search only descends
    /// into a node whose level is a prefix of `level`, and returns `None` as
    /// soon as no child at the current depth leads there. Levels with an
    /// empty, zero, or non-numeric segment never match.
    pub fn get_by_level(&self, level: &str) -> Option<SummaryNode<'_>> {
        if level.split('.').any(|s| parse_segment(s).is_none()) {
            return None;
        }
        self.parts
            .iter()
            .find_map(|part| find_level(SummaryNode::Part(part), level))
    }

    /// First article (in document order) pointing at `path`.
    pub fn get_by_path(&self, path: &str) -> Option<&Article> {
        self.articles().into_iter().find(|a| a.path() == Some(path))
    }

    /// Every article, depth-first in document order.
    pub fn articles(&self) -> Vec<&Article> {
        let mut out = Vec::new();
        for part in &self.parts {
            flatten(part.articles(), &mut out);
        }
        out
    }
}

/// Convert a 1-based level segment to a 0-based index.
fn parse_segment(segment: &str) -> Option<usize> {
    segment.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn find_level<'a>(node: SummaryNode<'a>, level: &str) -> Option<SummaryNode<'a>> {
    let own = node.level();
    if own == level {
        return Some(node);
    }
    let below = level
        .strip_prefix(own)
        .is_some_and(|rest| rest.starts_with('.'));
    if !below {
        return None;
    }
    node.children()
        .iter()
        .find_map(|article| find_level(SummaryNode::Article(article), level))
}

fn flatten<'a>(articles: &'a [Article], out: &mut Vec<&'a Article>) {
    for article in articles {
        out.push(article);
        flatten(article.children(), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str, path: Option<&str>, articles: Vec<RawArticle>) -> RawArticle {
        RawArticle {
            title: title.into(),
            path: path.map(String::from),
            articles,
        }
    }

    fn sample() -> Summary {
        Summary::create_from_parts(
            FileRef::new("SUMMARY.json"),
            vec![
                RawPart {
                    title: None,
                    articles: vec![
                        raw("Intro", Some("README.md"), vec![]),
                        raw(
                            "Guide",
                            Some("guide/index.md"),
                            vec![
                                raw("Install", Some("guide/install.md"), vec![]),
                                raw(
                                    "Usage",
                                    Some("guide/usage.md"),
                                    vec![raw("Flags", None, vec![])],
                                ),
                            ],
                        ),
                    ],
                },
                RawPart {
                    title: Some("Reference".into()),
                    articles: vec![raw("API", Some("api.md"), vec![])],
                },
            ],
        )
    }

    #[test]
    fn raw_parts_get_positional_levels() {
        let summary = sample();
        let levels: Vec<&str> = summary.articles().iter().map(|a| a.level()).collect();
        assert_eq!(levels, vec!["1.1", "1.2", "1.2.1", "1.2.2", "1.2.2.1", "2.1"]);
        assert_eq!(summary.parts()[1].level(), "2");
        assert_eq!(summary.parts()[1].title(), Some("Reference"));
    }

    #[test]
    fn typed_parts_are_kept_as_is() {
        let typed = Part::new("7", Some("Kept".into()), vec![]);
        let summary = Summary::create_from_parts(
            FileRef::default(),
            vec![
                PartEntry::from(RawPart::default()),
                PartEntry::from(typed.clone()),
            ],
        );
        assert_eq!(summary.parts()[0].level(), "1");
        assert_eq!(summary.parts()[1], typed);
    }

    #[test]
    fn get_by_level_descends_children() {
        let summary = Summary::create_from_parts(
            FileRef::default(),
            vec![RawPart {
                title: None,
                articles: vec![raw("One", None, vec![]), raw("Two", None, vec![])],
            }],
        );

        let second = summary.get_by_level("1.2").and_then(|n| n.as_article());
        assert_eq!(second.map(Article::title), Some("Two"));
        assert!(summary.get_by_level("1.3").is_none());
        assert!(summary.get_by_level("2").is_none());
        assert!(matches!(summary.get_by_level("1"), Some(SummaryNode::Part(_))));
    }

    #[test]
    fn get_by_level_checks_every_depth() {
        let summary = sample();
        let flags = summary.get_by_level("1.2.2.1").unwrap();
        assert_eq!(flags.level(), "1.2.2.1");

        // Out of range in the middle of the path, valid tail.
        assert!(summary.get_by_level("1.5.1").is_none());
        assert!(summary.get_by_level("1.1.1").is_none());
        assert!(summary.get_by_level("0").is_none());
        assert!(summary.get_by_level("1.x").is_none());
        assert!(summary.get_by_level("").is_none());
    }

    #[test]
    fn get_by_level_matches_typed_levels() {
        let leaf = |level: &str, title: &str| Article::new(level, title, None, vec![]);
        let summary = Summary::create_from_parts(
            FileRef::default(),
            vec![Part::new(
                "1",
                None,
                vec![Article::new(
                    "1",
                    "Root",
                    Some("README.md".into()),
                    vec![leaf("1.1", "First"), leaf("1.2", "Second")],
                )],
            )],
        );

        let second = summary.get_by_level("1.2").and_then(|n| n.as_article());
        assert_eq!(second.map(Article::title), Some("Second"));
        assert!(summary.get_by_level("1.3").is_none());
        assert!(summary.get_by_level("2").is_none());
        assert!(matches!(summary.get_by_level("1"), Some(SummaryNode::Part(_))));
    }

    #[test]
    fn get_by_path_finds_first_reference() {
        let summary = sample();
        let article = summary.get_by_path("guide/usage.md").unwrap();
        assert_eq!(article.level(), "1.2.2");
        assert_eq!(article.depth(), 3);
        assert!(summary.get_by_path("missing.md").is_none());
    }

    #[test]
    fn summary_from_json() {
        let json = r#"[
            {"articles": [
                {"title": "Intro", "ref": "README.md"},
                {"title": "Chapter", "ref": "chapter.md", "articles": [
                    {"title": "Section", "ref": "chapter/section.md"}
                ]}
            ]}
        ]"#;
        let summary = Summary::from_json(FileRef::new("SUMMARY.json"), json).unwrap();
        let section = summary.get_by_level("1.2.1").and_then(|n| n.as_article()).unwrap();
        assert_eq!(section.path(), Some("chapter/section.md"));

        assert!(Summary::from_json(FileRef::default(), "{").is_err());
    }
}
