//! Field selection trees.
//!
//! Dot-delimited selection paths such as `people.phones.number` are folded
//! into a tree rooted at the target message. A node without children is a
//! leaf selector: it selects the field and everything beneath it.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// One node of a selection tree.
///
/// Children are kept sorted by name so that pruning visits them, and reports
/// errors for them, in a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    name: String,
    children: BTreeMap<String, FieldSelection>,
    /// Some path ended at this node
    terminal: bool,
}

impl FieldSelection {
    /// Create a leaf selector.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
            terminal: false,
        }
    }

    /// Build a selection tree rooted at `root_name` from dotted paths.
    ///
    /// Segment names are not checked here; unknown fields surface when the
    /// tree is pruned against a descriptor. An empty path list selects the
    /// whole message.
    pub fn parse<S: AsRef<str>>(root_name: impl Into<String>, paths: &[S]) -> Result<Self> {
        let mut root = Self::new(root_name);
        for path in paths {
            root.insert_path(path.as_ref())?;
        }
        Ok(root)
    }

    /// Insert a single dotted path below this node.
    ///
    /// Inserting a path that is already present is a no-op. Empty segments
    /// are skipped, so `"a..b"` is the same as `"a.b"` and `""` adds nothing.
    pub fn insert_path(&mut self, path: &str) -> Result<()> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Ok(());
        }

        let mut current = self;
        for (depth, segment) in segments.iter().enumerate() {
            if current.terminal {
                return Err(Error::AmbiguousSelection {
                    path: segments[..depth].join("."),
                });
            }
            current = current
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| FieldSelection::new(*segment));
        }

        if !current.children.is_empty() {
            return Err(Error::AmbiguousSelection {
                path: segments.join("."),
            });
        }
        current.terminal = true;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child selectors, sorted by name.
    pub fn children(&self) -> impl Iterator<Item = &FieldSelection> {
        self.children.values()
    }

    pub fn child(&self, name: &str) -> Option<&FieldSelection> {
        self.children.get(name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// True when this node selects everything beneath it.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether two selectors pick the same sub-fields, ignoring their names.
    pub(crate) fn same_shape(&self, other: &FieldSelection) -> bool {
        self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|((a_name, a), (b_name, b))| a_name == b_name && a.same_shape(b))
    }
}
