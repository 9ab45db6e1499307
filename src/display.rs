//! Column descriptors and the tiny node tree they render into.
//!
//! Renderers never draw directly. They return [`Content`], which the terminal
//! shell turns into styled spans and the export engine flattens into text.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::record::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Plain,
    Strong,
    Muted,
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Empty,
    Text(String),
    Number(f64),
    /// Rendered as nothing, kept so conditional renderers can return a flag.
    Bool(bool),
    Styled { tone: Tone, children: Vec<Content> },
    Group(Vec<Content>),
}

impl Content {
    pub fn text(s: impl Into<String>) -> Self {
        Content::Text(s.into())
    }

    pub fn styled(tone: Tone, child: Content) -> Self {
        Content::Styled {
            tone,
            children: vec![child],
        }
    }

    /// Concatenates the string and number leaves of the tree.
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut String) {
        match self {
            Content::Empty | Content::Bool(_) => {}
            Content::Text(s) => out.push_str(s),
            Content::Number(n) => out.push_str(&format_number(*n)),
            Content::Styled { children, .. } | Content::Group(children) => {
                for child in children {
                    child.flatten_into(out);
                }
            }
        }
    }

    /// Walks the tree yielding `(tone, text)` pieces, innermost tone wins.
    pub fn segments(&self) -> Vec<(Tone, String)> {
        let mut out = Vec::new();
        self.segments_into(Tone::Plain, &mut out);
        out
    }

    fn segments_into(&self, tone: Tone, out: &mut Vec<(Tone, String)>) {
        match self {
            Content::Empty | Content::Bool(_) => {}
            Content::Text(s) => out.push((tone, s.clone())),
            Content::Number(n) => out.push((tone, format_number(*n))),
            Content::Styled { tone, children } => {
                for child in children {
                    child.segments_into(*tone, out);
                }
            }
            Content::Group(children) => {
                for child in children {
                    child.segments_into(tone, out);
                }
            }
        }
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

pub type Render<T> = Arc<dyn Fn(&T) -> Content + Send + Sync>;
pub type Compare<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Title, content and tooltip renderers bound to one column.
pub struct DisplayCell<T> {
    title: Content,
    content: Render<T>,
    tooltip: Option<Render<T>>,
    compare: Option<Compare<T>>,
}

impl<T> Clone for DisplayCell<T> {
    fn clone(&self) -> Self {
        Self {
            title: self.title.clone(),
            content: Arc::clone(&self.content),
            tooltip: self.tooltip.clone(),
            compare: self.compare.clone(),
        }
    }
}

impl<T> DisplayCell<T> {
    pub fn new(
        title: impl Into<Content>,
        content: impl Fn(&T) -> Content + Send + Sync + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            content: Arc::new(content),
            tooltip: None,
            compare: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Fn(&T) -> Content + Send + Sync + 'static) -> Self {
        self.tooltip = Some(Arc::new(tooltip));
        self
    }

    /// Sort this column by an explicit comparator instead of its rendered text.
    pub fn with_compare(
        mut self,
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.compare = Some(Arc::new(compare));
        self
    }

    pub fn render_title(&self) -> &Content {
        &self.title
    }

    pub fn render_content(&self, row: &T) -> Content {
        (self.content)(row)
    }

    pub fn render_tooltip(&self, row: &T) -> Option<Content> {
        self.tooltip.as_ref().map(|t| t(row))
    }

    pub fn title_text(&self) -> String {
        self.title.flatten()
    }

    pub fn content_text(&self, row: &T) -> String {
        self.render_content(row).flatten()
    }

    pub fn comparator(&self) -> Option<&Compare<T>> {
        self.compare.as_ref()
    }
}

/// Column index to descriptor. The key is the column identity.
pub type DisplayMap<T> = BTreeMap<usize, DisplayCell<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_walks_nested_nodes() {
        let node = Content::Group(vec![
            Content::styled(Tone::Success, Content::text("Active")),
            Content::Bool(true),
            Content::text(" · "),
            Content::Number(62.0),
            Content::Empty,
        ]);
        assert_eq!(node.flatten(), "Active · 62");
    }

    #[test]
    fn segments_keep_innermost_tone() {
        let node = Content::styled(
            Tone::Muted,
            Content::Group(vec![
                Content::text("a"),
                Content::styled(Tone::Danger, Content::text("b")),
            ]),
        );
        assert_eq!(
            node.segments(),
            vec![(Tone::Muted, "a".to_string()), (Tone::Danger, "b".to_string())]
        );
    }

    #[test]
    fn cell_renders_through_closures() {
        let cell = DisplayCell::new("Speed", |n: &u32| Content::Number(*n as f64))
            .with_tooltip(|n: &u32| Content::text(format!("{n} km/h")));
        assert_eq!(cell.title_text(), "Speed");
        assert_eq!(cell.content_text(&48), "48");
        assert_eq!(cell.render_tooltip(&48).map(|c| c.flatten()).as_deref(), Some("48 km/h"));
        assert!(cell.comparator().is_none());
    }
}
