//! Canonical, format-independent document tree.
//!
//! Every serialization decodes into a [`CanonicalDocument`] and every
//! encoder starts from one. The tree keeps element names, attribute order,
//! child order and text. Text-only elements hold trimmed text. In mixed
//! content the leading text sits in `text` and the text following each child
//! sits in that child's `tail`, so prose keeps its position around inline
//! elements.

use serde::Serialize;

/// A single element of the canonical tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Node {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub children: Vec<Node>,
    /// Text that follows this element inside its parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Sets an attribute, replacing an existing one of the same name in place.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Sets the text content. Whitespace-only text clears it.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim();
        self.text = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }

    /// Appends raw character data at the current end of the element: its own
    /// text while it has no children, otherwise the tail of the last child.
    pub fn push_text(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }
        let slot = match self.children.last_mut() {
            Some(last) => &mut last.tail,
            None => &mut self.text,
        };
        slot.get_or_insert_with(String::new).push_str(segment);
    }

    /// Settles collected character data once the element is complete.
    /// Text-only elements are trimmed. An element with children keeps every
    /// segment verbatim when any of them has content and drops them all
    /// otherwise, since they are then only indentation.
    pub fn settle_text(&mut self) {
        if self.children.is_empty() {
            let text = self.text.take().unwrap_or_default();
            self.set_text(text);
            return;
        }

        let has_content = |s: &Option<String>| s.as_deref().is_some_and(|t| !t.trim().is_empty());
        if has_content(&self.text) || self.children.iter().any(|c| has_content(&c.tail)) {
            return;
        }
        self.text = None;
        for child in &mut self.children {
            child.tail = None;
        }
    }

    /// True when text segments are interleaved with child elements.
    pub fn is_mixed(&self) -> bool {
        !self.children.is_empty()
            && (self.text.is_some() || self.children.iter().any(|c| c.tail.is_some()))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Node> + use<'a, 'n> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// True when the node carries neither attributes nor children.
    pub fn is_leaf(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// Scalar value of a field: the attribute of that name, or the text of the
    /// first child of that name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.attribute(name)
            .or_else(|| self.child(name).and_then(|c| c.text.as_deref()))
    }

    /// Depth-first, pre-order walk over this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// A decoded OSCAL document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalDocument {
    pub root: Node,
}

impl CanonicalDocument {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root_name(&self) -> &str {
        &self.root.name
    }

    /// Total number of elements in the tree.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.walk(&mut |_| count += 1);
        count
    }
}

/// Checks that `name` is usable as an element or attribute name in every
/// supported serialization.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}
