//! Pointer-driven interaction with the tag map.
//!
//! [`Interaction`] turns raw pointer events into selections, viewport moves,
//! tag drags, reparent gestures and entry moves. Every `(state, event)` pair
//! has a defined outcome; nothing panics on an unexpected event.
//!
//! Reparenting is a two-step gesture: a double click on a tag detaches it
//! from its parent ([`InteractionState::Replacing`]), and releasing the
//! pointer either commits it under the nearest eligible tag or puts it back
//! where it came from.
mod viewport;

use std::time::{Duration, Instant};

use crate::graph::{Graph, GraphError};
use crate::layout::{Hold, LayoutEngine};
use crate::models::{EntryId, TagId, Vector};
use crate::service::{KnowledgeBase, ServiceError};

pub use viewport::{CANVAS_SIZE, Viewport, ZoomConfig};

/// Gesture tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionConfig {
    /// A released tag reattaches to the nearest tag within this world distance.
    pub reattach_radius: f64,
    /// Two presses on the same tag within this window detach it.
    pub double_click: Duration,
    pub zoom: ZoomConfig,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            reattach_radius: 300.0,
            double_click: Duration::from_millis(300),
            zoom: ZoomConfig::default(),
        }
    }
}

/// Where the gesture currently stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionState {
    Idle,
    /// Panning; `last` is the pointer position already applied to the origin.
    DraggingViewport { last: Vector },
    DraggingTag { tag: TagId },
    /// `tag` is detached and follows the pointer until released.
    Replacing { tag: TagId, original_parent: TagId },
    /// The next press on a tag refiles `entry` there.
    MovingEntry { entry: EntryId },
}

/// Raw input, in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { screen: Vector, at: Instant },
    Move { screen: Vector },
    Up,
    Wheel { delta_y: f64 },
}

/// The interaction state machine with its viewport.
#[derive(Debug)]
pub struct Interaction {
    state: InteractionState,
    viewport: Viewport,
    config: InteractionConfig,
    pointer: Vector,
    last_press: Option<(TagId, Instant)>,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new(InteractionConfig::default())
    }
}

impl Interaction {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            viewport: Viewport::new(config.zoom),
            config,
            pointer: Vector::ZERO,
            last_press: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    /// Latest pointer position, in screen coordinates.
    pub fn pointer(&self) -> Vector {
        self.pointer
    }

    /// What the layout engine must leave alone this tick.
    pub fn hold(&self) -> Hold {
        match self.state {
            InteractionState::DraggingTag { tag } => Hold {
                detached: None,
                held: Some(tag),
            },
            InteractionState::Replacing { tag, .. } => Hold {
                detached: Some(tag),
                held: Some(tag),
            },
            _ => Hold::default(),
        }
    }

    /// First tag, in iteration order, whose circle contains `screen`.
    pub fn hit_test(&self, graph: &Graph, screen: Vector) -> Option<TagId> {
        graph
            .tags()
            .find(|tag| {
                let center = self.viewport.to_screen(tag.position());
                center.distance_to(screen) < tag.radius() / self.viewport.zoom()
            })
            .map(|tag| tag.id())
    }

    /// Applies one pointer event.
    ///
    /// The state is always updated. An error means a store call made on the
    /// way failed; the graph has already been brought back to a consistent
    /// state when that happens.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        kb: &mut KnowledgeBase,
        layout: &mut LayoutEngine,
    ) -> Result<(), ServiceError> {
        match event {
            PointerEvent::Down { screen, at } => {
                // a release was lost; settle it before the new press
                let released = match self.state {
                    InteractionState::Replacing { .. } => self.release(kb, layout),
                    _ => Ok(()),
                };
                let pressed = self.press(screen, at, kb, layout);
                released.and(pressed)
            }
            PointerEvent::Move { screen } => {
                self.pointer = screen;
                Ok(())
            }
            PointerEvent::Up => self.release(kb, layout),
            PointerEvent::Wheel { delta_y } => {
                self.viewport.wheel(delta_y);
                Ok(())
            }
        }
    }

    /// Applies pointer motion accumulated since the last sample.
    ///
    /// Called on a fixed interval by the host loop while a drag is active.
    pub fn sample(&mut self, kb: &mut KnowledgeBase, layout: &mut LayoutEngine) {
        match self.state {
            InteractionState::DraggingViewport { last } => {
                self.viewport.pan(self.pointer - last);
                self.state = InteractionState::DraggingViewport { last: self.pointer };
            }
            InteractionState::DraggingTag { tag } | InteractionState::Replacing { tag, .. } => {
                let world = self.viewport.to_world(self.pointer);
                if kb.graph_mut().set_tag_position(tag, world).is_ok() {
                    layout.reheat();
                }
            }
            InteractionState::Idle | InteractionState::MovingEntry { .. } => {}
        }
    }

    /// Arms `entry` so the next press on a tag refiles it there.
    pub fn arm_entry_move(
        &mut self,
        entry: EntryId,
        kb: &mut KnowledgeBase,
        layout: &mut LayoutEngine,
    ) -> Result<(), ServiceError> {
        kb.graph()
            .entry(entry)
            .ok_or(GraphError::UnknownEntry(entry))?;
        let released = match self.state {
            InteractionState::Replacing { .. } => self.release(kb, layout),
            _ => Ok(()),
        };
        self.state = InteractionState::MovingEntry { entry };
        released
    }

    pub fn cancel_entry_move(&mut self) {
        if let InteractionState::MovingEntry { .. } = self.state {
            self.state = InteractionState::Idle;
        }
    }

    /// Puts a detached tag back under its original parent without touching
    /// the store, ending the gesture.
    ///
    /// Returns the tag that was detached, if any.
    pub fn cancel_replacing(
        &mut self,
        kb: &mut KnowledgeBase,
        layout: &mut LayoutEngine,
    ) -> Option<TagId> {
        let InteractionState::Replacing {
            tag,
            original_parent,
        } = self.state
        else {
            return None;
        };
        self.state = InteractionState::Idle;
        revert(kb, tag, original_parent);
        layout.reheat();
        Some(tag)
    }

    fn press(
        &mut self,
        screen: Vector,
        at: Instant,
        kb: &mut KnowledgeBase,
        layout: &mut LayoutEngine,
    ) -> Result<(), ServiceError> {
        self.pointer = screen;
        let hit = self.hit_test(kb.graph(), screen);

        if let InteractionState::MovingEntry { entry } = self.state {
            self.state = InteractionState::Idle;
            if let Some(tag) = hit {
                self.last_press = None;
                let moved = kb.change_entry_parent(entry, tag);
                layout.reheat();
                return moved;
            }
        }

        let Some(tag) = hit else {
            self.last_press = None;
            self.state = InteractionState::DraggingViewport { last: screen };
            return Ok(());
        };

        kb.select_tag(tag)?;
        let double = self.last_press.is_some_and(|(previous, pressed_at)| {
            previous == tag && at.saturating_duration_since(pressed_at) <= self.config.double_click
        });

        if double && tag != kb.graph().root() {
            let original_parent = kb.graph_mut().detach_tag(tag)?;
            log::debug!(
                "event=tag_detach id={} parent={} status=ok",
                tag,
                original_parent
            );
            self.state = InteractionState::Replacing {
                tag,
                original_parent,
            };
            self.last_press = None;
            layout.reheat();
        } else {
            self.state = InteractionState::DraggingTag { tag };
            self.last_press = Some((tag, at));
        }
        Ok(())
    }

    fn release(
        &mut self,
        kb: &mut KnowledgeBase,
        layout: &mut LayoutEngine,
    ) -> Result<(), ServiceError> {
        let state = std::mem::replace(&mut self.state, InteractionState::Idle);
        match state {
            InteractionState::Replacing {
                tag,
                original_parent,
            } => {
                let result = self.settle(tag, original_parent, kb);
                layout.reheat();
                result
            }
            // an armed entry move survives a stray release
            InteractionState::MovingEntry { .. } => {
                self.state = state;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Commits a detached tag under the nearest eligible tag, or reverts it.
    fn settle(
        &self,
        tag: TagId,
        original_parent: TagId,
        kb: &mut KnowledgeBase,
    ) -> Result<(), ServiceError> {
        let graph = kb.graph();
        let Some(node) = graph.tag(tag) else {
            return Ok(());
        };
        if node.parent().is_some() {
            return Ok(());
        }

        let position = node.position();
        let target = graph.closest_tag(tag)?.filter(|candidate| {
            graph
                .tag(*candidate)
                .is_some_and(|c| c.position().distance_to(position) <= self.config.reattach_radius)
        });

        match target {
            Some(parent) => kb.reparent_tag(tag, parent).inspect_err(|_| {
                revert(kb, tag, original_parent);
            }),
            None => {
                revert(kb, tag, original_parent);
                Ok(())
            }
        }
    }
}

/// Puts a detached tag back under its original parent. The store never saw
/// the detach, so no call is made.
fn revert(kb: &mut KnowledgeBase, tag: TagId, original_parent: TagId) {
    if let Err(e) = kb.graph_mut().attach_tag(tag, original_parent) {
        log::error!(
            "event=tag_revert id={} parent={} status=error error={}",
            tag,
            original_parent,
            e
        );
        return;
    }
    log::debug!(
        "event=tag_revert id={} parent={} status=ok",
        tag,
        original_parent
    );
}
