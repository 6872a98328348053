use time::OffsetDateTime;

use super::{EntryId, TagId, Vector};

/// A tag node in the knowledge graph.
///
/// Holds its tree links as ids only; the [`Graph`](crate::Graph) arena owns
/// every node and keeps `total_entries` and `modified_at` consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    pub(crate) id: TagId,
    pub(crate) name: String,
    pub(crate) position: Vector,
    pub(crate) velocity: Vector,
    pub(crate) parent: Option<TagId>,
    pub(crate) children: Vec<TagId>,
    pub(crate) entries: Vec<EntryId>,
    pub(crate) total_entries: usize,
    pub(crate) modified_at: Option<OffsetDateTime>,
    pub(crate) selected: bool,
}

impl TagNode {
    /// Creates a detached tag with no children, entries or timestamp.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagmap::{TagId, TagNode, Vector};
    ///
    /// let tag = TagNode::new(TagId::new(1), "rust", Vector::new(10.0, 20.0));
    /// assert_eq!(tag.name(), "rust");
    /// assert_eq!(tag.total_entries(), 0);
    /// assert!(tag.parent().is_none());
    /// ```
    pub fn new(id: TagId, name: impl Into<String>, position: Vector) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            velocity: Vector::ZERO,
            parent: None,
            children: Vec::new(),
            entries: Vec::new(),
            total_entries: 0,
            modified_at: None,
            selected: false,
        }
    }

    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current world position.
    pub fn position(&self) -> Vector {
        self.position
    }

    /// Velocity accumulated during the last layout step.
    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    /// Parent tag, `None` for the root or a tag detached mid-gesture.
    pub fn parent(&self) -> Option<TagId> {
        self.parent
    }

    pub fn children(&self) -> &[TagId] {
        &self.children
    }

    /// Entries filed directly under this tag, most recently added first.
    pub fn entries(&self) -> &[EntryId] {
        &self.entries
    }

    /// Entry count of the whole subtree rooted here.
    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    /// Latest modification among this tag's entries and children.
    pub fn modified_at(&self) -> Option<OffsetDateTime> {
        self.modified_at
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Hit radius in world units; grows with the subtree's entry count.
    pub fn radius(&self) -> f64 {
        20.0 + 80.0 * self.total_entries as f64 / 500.0
    }

    /// Raises `modified_at` to `at` if it is newer. Returns whether it changed.
    pub(crate) fn touch(&mut self, at: Option<OffsetDateTime>) -> bool {
        match (self.modified_at, at) {
            (_, None) => false,
            (Some(current), Some(at)) if current >= at => false,
            (_, Some(at)) => {
                self.modified_at = Some(at);
                true
            }
        }
    }
}
