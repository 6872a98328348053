//! Application context tying the knowledge base to layout, input and search.
//!
//! [`AppContext`] owns every stateful component; the host drives it with
//! explicit calls: [`tick`](AppContext::tick) on the layout interval,
//! [`sample_pointer`](AppContext::sample_pointer) on the drag interval,
//! [`poll`](AppContext::poll) to flush debounced edits and
//! [`frame`](AppContext::frame) to get something to draw.

use std::time::Instant;

use time::OffsetDateTime;

use crate::config::Config;
use crate::debounce::{Debouncer, EditTarget};
use crate::graph::{Graph, GraphError};
use crate::interaction::{Interaction, InteractionState, PointerEvent};
use crate::layout::LayoutEngine;
use crate::models::{EntryId, TagId, Vector};
use crate::ranker::{RankedEntry, Ranker};
use crate::service::{KnowledgeBase, Result, ServiceError};

/// A tag as the renderer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct TagView {
    pub id: TagId,
    pub name: String,
    pub screen: Vector,
    pub screen_radius: f64,
    pub total_entries: usize,
    pub days_old: f64,
    pub selected: bool,
}

/// A parent/child edge in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeView {
    pub parent: TagId,
    pub child: TagId,
    pub from: Vector,
    pub to: Vector,
}

/// Everything needed to draw one frame of the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Visible tags, in iteration order.
    pub tags: Vec<TagView>,
    /// Edges with at least one visible end.
    pub edges: Vec<EdgeView>,
    pub selected: Option<TagId>,
    /// Tag following the pointer, if any.
    pub held: Option<TagId>,
    /// Tag detached by a reparent gesture, if any.
    pub replacing: Option<TagId>,
}

pub struct AppContext {
    kb: KnowledgeBase,
    ranker: Ranker,
    layout: LayoutEngine,
    interaction: Interaction,
    debouncer: Debouncer,
    query: String,
}

impl AppContext {
    pub fn new(kb: KnowledgeBase, config: &Config) -> Self {
        let mut ranker = Ranker::new();
        ranker.create_vocab(kb.graph().entries());
        Self {
            kb,
            ranker,
            layout: LayoutEngine::new(config.layout),
            interaction: Interaction::new(config.interaction),
            debouncer: Debouncer::new(config.debounce),
            query: String::new(),
        }
    }

    pub fn kb(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn graph(&self) -> &Graph {
        self.kb.graph()
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// The query currently applied to the entry list.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// One layout step. Returns whether anything moved.
    pub fn tick(&mut self) -> bool {
        let hold = self.interaction.hold();
        self.layout.step(self.kb.graph_mut(), hold)
    }

    pub fn sample_pointer(&mut self) {
        self.interaction.sample(&mut self.kb, &mut self.layout);
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Result<()> {
        self.interaction
            .handle(event, &mut self.kb, &mut self.layout)
    }

    /// Arms `entry` for the "move to tag" gesture.
    pub fn arm_entry_move(&mut self, entry: EntryId) -> Result<()> {
        self.interaction
            .arm_entry_move(entry, &mut self.kb, &mut self.layout)
    }

    pub fn cancel_entry_move(&mut self) {
        self.interaction.cancel_entry_move();
    }

    pub fn edit_query(&mut self, text: &str, now: Instant) {
        self.debouncer.schedule(EditTarget::Query, text, now);
    }

    pub fn edit_entry_title(&mut self, id: EntryId, text: &str, now: Instant) {
        self.debouncer
            .schedule(EditTarget::EntryTitle(id), text, now);
    }

    pub fn edit_entry_content(&mut self, id: EntryId, text: &str, now: Instant) {
        self.debouncer
            .schedule(EditTarget::EntryContent(id), text, now);
    }

    pub fn edit_tag_name(&mut self, id: TagId, text: &str, now: Instant) {
        self.debouncer.schedule(EditTarget::TagName(id), text, now);
    }

    /// Applies every debounced edit due at `now`.
    ///
    /// Each edit is attempted independently; the failures are returned in
    /// the order the edits were applied.
    pub fn poll(&mut self, now: Instant) -> Vec<ServiceError> {
        let due = self.debouncer.drain_due(now);
        self.apply_edits(due)
    }

    /// Applies every pending edit, due or not.
    pub fn flush(&mut self) -> Vec<ServiceError> {
        let all = self.debouncer.drain_all();
        self.apply_edits(all)
    }

    fn apply_edits(&mut self, edits: Vec<(EditTarget, String)>) -> Vec<ServiceError> {
        let mut failures = Vec::new();
        let mut entries_changed = false;
        for (target, value) in edits {
            let result = match target {
                EditTarget::Query => {
                    if value != self.query {
                        self.query = value;
                        self.layout.reheat();
                    }
                    Ok(())
                }
                EditTarget::EntryTitle(id) => {
                    entries_changed = true;
                    self.kb.update_entry_title(id, &value)
                }
                EditTarget::EntryContent(id) => {
                    entries_changed = true;
                    self.kb.update_entry_content(id, &value)
                }
                EditTarget::TagName(id) => self.kb.rename_tag(id, &value),
            };
            if let Err(e) = result {
                failures.push(e);
            }
        }
        if entries_changed {
            self.refresh_vocab();
        }
        failures
    }

    pub fn select_tag(&mut self, id: TagId) -> Result<()> {
        self.kb.select_tag(id)
    }

    pub fn create_tag(&mut self, parent: TagId) -> Result<TagId> {
        let id = self.kb.create_tag(parent)?;
        self.layout.reheat();
        Ok(id)
    }

    /// Deletes `id` and its subtree.
    ///
    /// A reparent gesture whose tag or original parent lies in that subtree
    /// is cancelled first, so the detached tag goes down with it as it does
    /// on the server.
    pub fn delete_tag(&mut self, id: TagId) -> Result<()> {
        if let InteractionState::Replacing {
            tag,
            original_parent,
        } = self.interaction.state()
        {
            let graph = self.kb.graph();
            let doomed = |t: TagId| t == id || graph.is_ancestor(id, t);
            if doomed(tag) || doomed(original_parent) {
                self.interaction.cancel_replacing(&mut self.kb, &mut self.layout);
            }
        }
        self.kb.delete_tag(id)?;
        let graph = self.kb.graph();
        self.debouncer.retain(|target| match *target {
            EditTarget::Query => true,
            EditTarget::TagName(tag) => graph.tag(tag).is_some(),
            EditTarget::EntryTitle(entry) | EditTarget::EntryContent(entry) => {
                graph.entry(entry).is_some()
            }
        });
        self.refresh_vocab();
        self.layout.reheat();
        Ok(())
    }

    pub fn create_entry(&mut self) -> Result<EntryId> {
        let id = self.kb.create_entry()?;
        self.refresh_vocab();
        self.layout.reheat();
        Ok(id)
    }

    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.kb.delete_entry(id)?;
        self.debouncer.cancel(EditTarget::EntryTitle(id));
        self.debouncer.cancel(EditTarget::EntryContent(id));
        self.refresh_vocab();
        self.layout.reheat();
        Ok(())
    }

    pub fn reparent_tag(&mut self, id: TagId, parent: TagId) -> Result<()> {
        self.kb.reparent_tag(id, parent)?;
        self.layout.reheat();
        Ok(())
    }

    pub fn change_entry_parent(&mut self, id: EntryId, tag: TagId) -> Result<()> {
        let result = self.kb.change_entry_parent(id, tag);
        self.layout.reheat();
        result
    }

    /// Tag whose subtree the entry list shows: the selection, else the root.
    pub fn active_tag(&self) -> TagId {
        let graph = self.kb.graph();
        graph.selected().unwrap_or(graph.root())
    }

    /// Entries under the active tag ranked against the current query.
    ///
    /// With a blank query every entry is listed, most recently modified first,
    /// with a score of zero.
    pub fn ranked_entries(&self) -> Result<Vec<RankedEntry>> {
        let graph = self.kb.graph();
        let ids = graph.subtree_entries(self.active_tag())?;
        let mut entries = ids
            .iter()
            .map(|id| graph.entry(*id).ok_or(GraphError::UnknownEntry(*id)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if self.query.trim().is_empty() {
            entries.sort_by(|a, b| {
                b.modified_at()
                    .cmp(&a.modified_at())
                    .then_with(|| a.id().cmp(&b.id()))
            });
            return Ok(entries
                .into_iter()
                .map(|entry| RankedEntry {
                    id: entry.id(),
                    score: 0.0,
                })
                .collect());
        }
        Ok(self.ranker.rank_entries(&self.query, entries))
    }

    /// Snapshot of what is on screen, with freshness measured against `now`.
    pub fn frame(&self, now: OffsetDateTime) -> Frame {
        let graph = self.kb.graph();
        let viewport = self.interaction.viewport();
        let zoom = viewport.zoom();

        let tags = graph
            .tags()
            .filter(|tag| viewport.is_visible(tag.position(), tag.radius()))
            .map(|tag| TagView {
                id: tag.id(),
                name: tag.name().to_string(),
                screen: viewport.to_screen(tag.position()),
                screen_radius: tag.radius() / zoom,
                total_entries: tag.total_entries(),
                days_old: graph.days_old(tag.id(), now).unwrap_or_default(),
                selected: tag.is_selected(),
            })
            .collect();

        let edges = graph
            .edges()
            .into_iter()
            .filter_map(|(parent, child)| {
                let (a, b) = (graph.tag(parent)?, graph.tag(child)?);
                let visible = viewport.is_visible(a.position(), a.radius())
                    || viewport.is_visible(b.position(), b.radius());
                visible.then(|| EdgeView {
                    parent,
                    child,
                    from: viewport.to_screen(a.position()),
                    to: viewport.to_screen(b.position()),
                })
            })
            .collect();

        let hold = self.interaction.hold();
        let replacing = match self.interaction.state() {
            InteractionState::Replacing { tag, .. } => Some(tag),
            _ => None,
        };

        Frame {
            tags,
            edges,
            selected: graph.selected(),
            held: hold.held,
            replacing,
        }
    }

    fn refresh_vocab(&mut self) {
        self.ranker.create_vocab(self.kb.graph().entries());
    }
}
