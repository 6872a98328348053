//! The tag/entry graph arena.
//!
//! Tags form a rooted tree under the tag named `main`. Every node is owned by
//! [`Graph`] and referred to by id everywhere else. Aggregate counters
//! (`total_entries`) and `modified_at` are maintained incrementally by each
//! mutation so they never need a full recomputation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::f64::consts::TAU;

use rand::Rng;
use thiserror::Error;
use time::OffsetDateTime;

use crate::models::{EntryId, EntryNode, EntryRecord, Snapshot, TagId, TagNode, TagRecord, Vector};

/// Name of the root tag.
pub const ROOT_NAME: &str = "main";

/// Name of the catch-all tag that never receives reparented tags.
pub const OTHER_NAME: &str = "other";

/// Tags are scattered within this radius of the centre on load.
pub const LOAD_JITTER_RADIUS: f64 = 2000.0;

/// New tags appear within this radius of their parent.
pub const CREATE_JITTER_RADIUS: f64 = 200.0;

/// Freshness is reported in days and saturates here.
pub const MAX_DAYS_OLD: f64 = 14.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Errors from graph lookups, snapshot loading and structural edits.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("unknown tag: {0}")]
    UnknownTag(TagId),

    #[error("unknown entry: {0}")]
    UnknownEntry(EntryId),

    #[error("duplicate tag id: {0}")]
    DuplicateTag(TagId),

    #[error("duplicate entry id: {0}")]
    DuplicateEntry(EntryId),

    #[error("snapshot has no root tag named '{ROOT_NAME}'")]
    MissingRoot,

    #[error("tag {parent} lists unknown child {child}")]
    UnknownChild { parent: TagId, child: TagId },

    #[error("tag {child} is claimed by both {first} and {second}")]
    DuplicateParent {
        child: TagId,
        first: TagId,
        second: TagId,
    },

    #[error("entry {entry} references unknown category {category}")]
    UnknownCategory { entry: EntryId, category: TagId },

    #[error("tag {0} is not reachable from the root")]
    Unreachable(TagId),

    #[error("tag {0} cannot be deleted")]
    ProtectedTag(TagId),

    #[error("the root tag cannot be moved")]
    RootImmovable,

    #[error("no tag is selected")]
    NoSelection,

    #[error("invalid tag name: {0:?}")]
    InvalidTagName(String),

    #[error("tag {tag} cannot be placed under its own descendant {parent}")]
    CyclicParent { tag: TagId, parent: TagId },

    #[error("tag {0} is not detached")]
    NotDetached(TagId),

    #[error("tag {0} is already detached")]
    AlreadyDetached(TagId),

    #[error("graph invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Tags and entries removed by a subtree deletion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovedSubtree {
    pub tags: Vec<TagId>,
    pub entries: Vec<EntryId>,
}

/// Arena of tag and entry nodes.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
/// use tagmap::{Graph, Snapshot, TagId, TagRecord, Vector};
///
/// let mut main = TagRecord::new(TagId::new(1), "main");
/// main.children = vec![TagId::new(2)];
/// let snapshot = Snapshot {
///     tags: vec![main, TagRecord::new(TagId::new(2), "rust")],
///     entries: vec![],
/// };
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let graph = Graph::load(&snapshot, Vector::new(4000.0, 4000.0), &mut rng).unwrap();
/// assert_eq!(graph.root(), TagId::new(1));
/// assert_eq!(graph.tag(TagId::new(2)).unwrap().parent(), Some(TagId::new(1)));
/// ```
#[derive(Debug, Clone)]
pub struct Graph {
    tags: HashMap<TagId, TagNode>,
    order: Vec<TagId>,
    entries: HashMap<EntryId, EntryNode>,
    root: TagId,
    other: Option<TagId>,
    selected: Option<TagId>,
}

/// A uniformly distributed point in the disc of `radius` around `center`.
pub(crate) fn jitter<R: Rng + ?Sized>(center: Vector, radius: f64, rng: &mut R) -> Vector {
    let distance = radius * rng.r#gen::<f64>().sqrt();
    let angle = rng.gen_range(0.0..TAU);
    center + Vector::new(angle.cos(), angle.sin()) * distance
}

impl Graph {
    /// Builds a graph from a fetch-all snapshot.
    ///
    /// Fails without producing a partial graph if a child id is unknown, a tag
    /// has two parents, an entry names an unknown category, the root is
    /// missing, or a tag cannot be reached from the root.
    pub fn load<R: Rng + ?Sized>(
        snapshot: &Snapshot,
        center: Vector,
        rng: &mut R,
    ) -> Result<Self> {
        let mut tags = HashMap::with_capacity(snapshot.tags.len());
        let mut order = Vec::with_capacity(snapshot.tags.len());

        for record in &snapshot.tags {
            let position = jitter(center, LOAD_JITTER_RADIUS, rng);
            let node = TagNode::new(record.id, record.name.clone(), position);
            if tags.insert(record.id, node).is_some() {
                return Err(GraphError::DuplicateTag(record.id));
            }
            order.push(record.id);
        }

        for record in &snapshot.tags {
            for &child in &record.children {
                let node = tags.get_mut(&child).ok_or(GraphError::UnknownChild {
                    parent: record.id,
                    child,
                })?;
                if let Some(first) = node.parent {
                    return Err(GraphError::DuplicateParent {
                        child,
                        first,
                        second: record.id,
                    });
                }
                node.parent = Some(record.id);
            }
            if let Some(node) = tags.get_mut(&record.id) {
                node.children = record.children.clone();
            }
        }

        let root = order
            .iter()
            .copied()
            .find(|id| tags.get(id).is_some_and(|tag| tag.name == ROOT_NAME))
            .ok_or(GraphError::MissingRoot)?;
        if let Some(parent) = tags.get(&root).and_then(|tag| tag.parent) {
            return Err(GraphError::CyclicParent { tag: root, parent });
        }
        let other = order
            .iter()
            .copied()
            .find(|id| tags.get(id).is_some_and(|tag| tag.name == OTHER_NAME));

        let reachable = reachable_from(&tags, root);
        if let Some(&lost) = order.iter().find(|id| !reachable.contains(id)) {
            return Err(GraphError::Unreachable(lost));
        }

        let mut graph = Self {
            tags,
            order,
            entries: HashMap::with_capacity(snapshot.entries.len()),
            root,
            other,
            selected: None,
        };

        for record in &snapshot.tags {
            graph.propagate_modified(record.id, record.modified_at);
        }

        for record in &snapshot.entries {
            let tag = graph
                .tags
                .get_mut(&record.category)
                .ok_or(GraphError::UnknownCategory {
                    entry: record.id,
                    category: record.category,
                })?;
            tag.entries.push(record.id);
            if graph
                .entries
                .insert(record.id, EntryNode::from(record.clone()))
                .is_some()
            {
                return Err(GraphError::DuplicateEntry(record.id));
            }
            graph.adjust_totals(record.category, 1);
            graph.propagate_modified(record.category, Some(record.modified_at));
        }

        graph.verify_invariants()?;
        log::debug!(
            "event=graph_load tags={} entries={} status=ok",
            graph.order.len(),
            graph.entries.len()
        );
        Ok(graph)
    }

    pub fn root(&self) -> TagId {
        self.root
    }

    /// The catch-all tag, if the snapshot had one.
    pub fn other(&self) -> Option<TagId> {
        self.other
    }

    pub fn tag(&self, id: TagId) -> Option<&TagNode> {
        self.tags.get(&id)
    }

    pub fn entry(&self, id: EntryId) -> Option<&EntryNode> {
        self.entries.get(&id)
    }

    /// First tag carrying `name`, in iteration order.
    pub fn tag_by_name(&self, name: &str) -> Option<&TagNode> {
        self.tags().find(|tag| tag.name == name)
    }

    /// Tags in stable iteration order: snapshot order, then creation order.
    pub fn tags(&self) -> impl Iterator<Item = &TagNode> {
        self.order.iter().filter_map(|id| self.tags.get(id))
    }

    pub fn tag_ids(&self) -> &[TagId] {
        &self.order
    }

    /// Entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryNode> {
        self.entries.values()
    }

    pub fn tag_count(&self) -> usize {
        self.order.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn selected(&self) -> Option<TagId> {
        self.selected
    }

    pub(crate) fn tag_mut(&mut self, id: TagId) -> Option<&mut TagNode> {
        self.tags.get_mut(&id)
    }

    fn require_tag(&self, id: TagId) -> Result<&TagNode> {
        self.tags.get(&id).ok_or(GraphError::UnknownTag(id))
    }

    fn require_tag_mut(&mut self, id: TagId) -> Result<&mut TagNode> {
        self.tags.get_mut(&id).ok_or(GraphError::UnknownTag(id))
    }

    fn require_entry_mut(&mut self, id: EntryId) -> Result<&mut EntryNode> {
        self.entries.get_mut(&id).ok_or(GraphError::UnknownEntry(id))
    }

    /// Selects `id`, clearing any previous selection first.
    pub fn select_tag(&mut self, id: TagId) -> Result<()> {
        self.require_tag(id)?;
        self.clear_selection();
        if let Some(tag) = self.tags.get_mut(&id) {
            tag.selected = true;
        }
        self.selected = Some(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selected.take()
            && let Some(tag) = self.tags.get_mut(&previous)
        {
            tag.selected = false;
        }
    }

    /// Whether `ancestor` lies strictly above `tag` in the tree.
    pub fn is_ancestor(&self, ancestor: TagId, tag: TagId) -> bool {
        let mut current = self.tags.get(&tag).and_then(|node| node.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.tags.get(&id).and_then(|node| node.parent);
        }
        false
    }

    /// The subtree rooted at `id`, in pre-order, starting with `id`.
    pub fn subtree(&self, id: TagId) -> Result<Vec<TagId>> {
        self.require_tag(id)?;
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(tag) = self.tags.get(&current) {
                stack.extend(tag.children.iter().rev().copied());
            }
        }
        Ok(out)
    }

    /// Every entry filed anywhere in the subtree rooted at `id`.
    pub fn subtree_entries(&self, id: TagId) -> Result<Vec<EntryId>> {
        Ok(self
            .subtree(id)?
            .into_iter()
            .filter_map(|tag| self.tags.get(&tag))
            .flat_map(|tag| tag.entries.iter().copied())
            .collect())
    }

    /// Parent to child edges, in tag iteration order.
    pub fn edges(&self) -> Vec<(TagId, TagId)> {
        self.tags()
            .flat_map(|tag| tag.children.iter().map(move |&child| (tag.id, child)))
            .collect()
    }

    /// Nearest tag to `source` that may become its new parent.
    ///
    /// Skips `source` itself, the catch-all tag, and every descendant of
    /// `source`. Ties go to the earlier tag in iteration order.
    pub fn closest_tag(&self, source: TagId) -> Result<Option<TagId>> {
        let origin = self.require_tag(source)?.position;
        let mut best: Option<(TagId, f64)> = None;
        for tag in self.tags() {
            if tag.id == source || Some(tag.id) == self.other || self.is_ancestor(source, tag.id) {
                continue;
            }
            let distance = tag.position.distance_to(origin);
            if best.is_none_or(|(_, closest)| distance < closest) {
                best = Some((tag.id, distance));
            }
        }
        Ok(best.map(|(id, _)| id))
    }

    /// Adds a server-confirmed tag under `parent`, close to the parent's position.
    pub fn insert_tag<R: Rng + ?Sized>(
        &mut self,
        record: &TagRecord,
        parent: TagId,
        rng: &mut R,
    ) -> Result<()> {
        let center = self.require_tag(parent)?.position;
        if self.tags.contains_key(&record.id) {
            return Err(GraphError::DuplicateTag(record.id));
        }
        let position = jitter(center, CREATE_JITTER_RADIUS, rng);
        let mut node = TagNode::new(record.id, record.name.clone(), position);
        node.parent = Some(parent);
        self.tags.insert(record.id, node);
        self.order.push(record.id);
        if let Some(parent) = self.tags.get_mut(&parent) {
            parent.children.push(record.id);
        }
        self.propagate_modified(record.id, record.modified_at);
        Ok(())
    }

    /// Fails if `id` is the root or the catch-all tag.
    pub fn check_removable(&self, id: TagId) -> Result<()> {
        self.require_tag(id)?;
        if id == self.root || Some(id) == self.other {
            return Err(GraphError::ProtectedTag(id));
        }
        Ok(())
    }

    /// Removes the subtree rooted at `id` together with every entry in it.
    pub fn remove_subtree(&mut self, id: TagId) -> Result<RemovedSubtree> {
        self.check_removable(id)?;
        let tags = self.subtree(id)?;
        let entries = self.subtree_entries(id)?;

        if self.tags.get(&id).is_some_and(|tag| tag.parent.is_some()) {
            self.detach_tag(id)?;
        }
        if self.selected.is_some_and(|selected| tags.contains(&selected)) {
            self.clear_selection();
        }

        let doomed: HashSet<TagId> = tags.iter().copied().collect();
        for tag in &tags {
            self.tags.remove(tag);
        }
        for entry in &entries {
            self.entries.remove(entry);
        }
        self.order.retain(|tag| !doomed.contains(tag));

        Ok(RemovedSubtree { tags, entries })
    }

    /// Files a server-confirmed entry first in its category's list.
    pub fn insert_entry(&mut self, record: EntryRecord) -> Result<()> {
        let category = record.category;
        if self.entries.contains_key(&record.id) {
            return Err(GraphError::DuplicateEntry(record.id));
        }
        let tag = self.tags.get_mut(&category).ok_or(GraphError::UnknownCategory {
            entry: record.id,
            category,
        })?;
        tag.entries.insert(0, record.id);
        let modified_at = record.modified_at;
        self.entries.insert(record.id, EntryNode::from(record));
        self.adjust_totals(category, 1);
        self.propagate_modified(category, Some(modified_at));
        Ok(())
    }

    pub fn remove_entry(&mut self, id: EntryId, now: OffsetDateTime) -> Result<EntryNode> {
        let entry = self.entries.remove(&id).ok_or(GraphError::UnknownEntry(id))?;
        if let Some(tag) = self.tags.get_mut(&entry.category) {
            tag.entries.retain(|&other| other != id);
        }
        self.adjust_totals(entry.category, -1);
        self.propagate_modified(entry.category, Some(now));
        Ok(entry)
    }

    /// Refiles an entry under `new_category`. Returns the previous category.
    pub fn move_entry(
        &mut self,
        id: EntryId,
        new_category: TagId,
        now: OffsetDateTime,
    ) -> Result<TagId> {
        self.require_tag(new_category)?;
        let entry = self.require_entry_mut(id)?;
        let old_category = entry.category;
        if old_category == new_category {
            return Ok(old_category);
        }
        entry.category = new_category;
        entry.modified_at = now;

        if let Some(tag) = self.tags.get_mut(&old_category) {
            tag.entries.retain(|&other| other != id);
        }
        self.adjust_totals(old_category, -1);
        self.propagate_modified(old_category, Some(now));

        if let Some(tag) = self.tags.get_mut(&new_category) {
            tag.entries.insert(0, id);
        }
        self.adjust_totals(new_category, 1);
        self.propagate_modified(new_category, Some(now));
        Ok(old_category)
    }

    pub fn set_entry_title(&mut self, id: EntryId, title: &str, now: OffsetDateTime) -> Result<()> {
        let entry = self.require_entry_mut(id)?;
        entry.title = title.to_string();
        entry.modified_at = now;
        let category = entry.category;
        self.propagate_modified(category, Some(now));
        Ok(())
    }

    pub fn set_entry_content(
        &mut self,
        id: EntryId,
        content: &str,
        now: OffsetDateTime,
    ) -> Result<()> {
        let entry = self.require_entry_mut(id)?;
        entry.content = content.to_string();
        entry.modified_at = now;
        let category = entry.category;
        self.propagate_modified(category, Some(now));
        Ok(())
    }

    /// Renames a tag. Returns the previous name.
    pub fn rename_tag(&mut self, id: TagId, name: &str) -> Result<String> {
        validate_tag_name(name)?;
        let tag = self.require_tag_mut(id)?;
        Ok(std::mem::replace(&mut tag.name, name.to_string()))
    }

    /// Unlinks `id` from its parent, leaving it as a floating subtree root.
    ///
    /// The subtree's entries are subtracted from every former ancestor.
    /// Returns the former parent.
    pub fn detach_tag(&mut self, id: TagId) -> Result<TagId> {
        if id == self.root {
            return Err(GraphError::RootImmovable);
        }
        let tag = self.require_tag_mut(id)?;
        let parent = tag.parent.take().ok_or(GraphError::AlreadyDetached(id))?;
        let total = tag.total_entries as isize;
        if let Some(node) = self.tags.get_mut(&parent) {
            node.children.retain(|&child| child != id);
        }
        self.adjust_totals(parent, -total);
        Ok(parent)
    }

    /// Links a floating tag under `parent`, adding its entries to the new
    /// ancestors.
    pub fn attach_tag(&mut self, id: TagId, parent: TagId) -> Result<()> {
        let tag = self.require_tag(id)?;
        if tag.parent.is_some() {
            return Err(GraphError::NotDetached(id));
        }
        if id == self.root {
            return Err(GraphError::RootImmovable);
        }
        self.require_tag(parent)?;
        if parent == id || self.is_ancestor(id, parent) {
            return Err(GraphError::CyclicParent { tag: id, parent });
        }

        let (total, modified_at) = (tag.total_entries as isize, tag.modified_at);
        if let Some(node) = self.tags.get_mut(&id) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.tags.get_mut(&parent) {
            node.children.push(id);
        }
        self.adjust_totals(parent, total);
        self.propagate_modified(parent, modified_at);
        Ok(())
    }

    /// Fails if `id` cannot be moved under `parent`.
    pub fn check_reparent(&self, id: TagId, parent: TagId) -> Result<()> {
        if id == self.root {
            return Err(GraphError::RootImmovable);
        }
        self.require_tag(id)?;
        self.require_tag(parent)?;
        if parent == id || self.is_ancestor(id, parent) {
            return Err(GraphError::CyclicParent { tag: id, parent });
        }
        Ok(())
    }

    /// Moves `id` (attached or floating) under `parent`.
    pub fn reparent_tag(&mut self, id: TagId, parent: TagId) -> Result<()> {
        self.check_reparent(id, parent)?;
        if self.tags.get(&id).is_some_and(|tag| tag.parent.is_some()) {
            self.detach_tag(id)?;
        }
        self.attach_tag(id, parent)
    }

    pub fn set_tag_position(&mut self, id: TagId, position: Vector) -> Result<()> {
        self.require_tag_mut(id)?.position = position;
        Ok(())
    }

    /// Fractional days since the tag was last modified, clipped to `[0, 14]`.
    ///
    /// A tag that was never modified counts as the oldest.
    pub fn days_old(&self, id: TagId, now: OffsetDateTime) -> Result<f64> {
        let tag = self.require_tag(id)?;
        Ok(tag.modified_at.map_or(MAX_DAYS_OLD, |at| {
            ((now - at).as_seconds_f64() / SECONDS_PER_DAY).clamp(0.0, MAX_DAYS_OLD)
        }))
    }

    /// Checks every tree, counter, timestamp and selection invariant.
    pub fn verify_invariants(&self) -> Result<()> {
        let violation = |message: String| Err(GraphError::InvariantViolation(message));

        if self.tags.len() != self.order.len() {
            return violation(format!(
                "{} tags but {} in iteration order",
                self.tags.len(),
                self.order.len()
            ));
        }
        match self.tags.get(&self.root) {
            None => return violation(format!("root {} missing", self.root)),
            Some(root) if root.parent.is_some() => {
                return violation(format!("root {} has a parent", self.root));
            }
            Some(_) => {}
        }

        let mut reachable = HashSet::new();
        for tag in self.tags().filter(|tag| tag.parent.is_none()) {
            reachable.extend(reachable_from(&self.tags, tag.id));
        }
        if let Some(lost) = self.order.iter().find(|id| !reachable.contains(id)) {
            return violation(format!("tag {lost} is part of a cycle"));
        }

        let mut selected = 0;
        for tag in self.tags() {
            if tag.selected {
                selected += 1;
                if self.selected != Some(tag.id) {
                    return violation(format!("tag {} flagged but not selected", tag.id));
                }
            }

            if let Some(parent) = tag.parent {
                let listed = self
                    .tags
                    .get(&parent)
                    .is_some_and(|node| node.children.contains(&tag.id));
                if !listed {
                    return violation(format!("tag {} missing from parent {parent}", tag.id));
                }
            }

            let mut total = tag.entries.len();
            for child in &tag.children {
                let Some(node) = self.tags.get(child) else {
                    return violation(format!("tag {} lists unknown child {child}", tag.id));
                };
                if node.parent != Some(tag.id) {
                    return violation(format!("child {child} does not point back to {}", tag.id));
                }
                if node.modified_at > tag.modified_at {
                    return violation(format!("child {child} is newer than {}", tag.id));
                }
                total += node.total_entries;
            }
            if total != tag.total_entries {
                return violation(format!(
                    "tag {} totals {} but holds {total}",
                    tag.id, tag.total_entries
                ));
            }

            for entry_id in &tag.entries {
                let Some(entry) = self.entries.get(entry_id) else {
                    return violation(format!("tag {} lists unknown entry {entry_id}", tag.id));
                };
                if entry.category != tag.id {
                    return violation(format!("entry {entry_id} filed under the wrong tag"));
                }
                if Some(entry.modified_at) > tag.modified_at {
                    return violation(format!("entry {entry_id} is newer than {}", tag.id));
                }
            }
        }
        if selected > 1 {
            return violation(format!("{selected} tags selected"));
        }

        for entry in self.entries.values() {
            let filed = self
                .tags
                .get(&entry.category)
                .is_some_and(|tag| tag.entries.contains(&entry.id));
            if !filed {
                return violation(format!("entry {} has no owning tag", entry.id));
            }
        }
        Ok(())
    }

    /// Adds `delta` to the totals of `from` and every ancestor.
    fn adjust_totals(&mut self, from: TagId, delta: isize) {
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(tag) = self.tags.get_mut(&id) else {
                break;
            };
            tag.total_entries = tag.total_entries.saturating_add_signed(delta);
            current = tag.parent;
        }
    }

    /// Raises `modified_at` along the chain from `from` to its root.
    ///
    /// Stops at the first tag that is already at least as recent; its
    /// ancestors are too.
    fn propagate_modified(&mut self, from: TagId, at: Option<OffsetDateTime>) {
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(tag) = self.tags.get_mut(&id) else {
                break;
            };
            if !tag.touch(at) {
                break;
            }
            current = tag.parent;
        }
    }
}

/// Rejects empty names and names containing whitespace.
pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(GraphError::InvalidTagName(name.to_string()));
    }
    Ok(())
}

fn reachable_from(tags: &HashMap<TagId, TagNode>, start: TagId) -> HashSet<TagId> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(tag) = tags.get(&id) {
            queue.extend(tag.children.iter().copied());
        }
    }
    seen
}
