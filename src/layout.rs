//! Force-directed layout of the tag tree.
//!
//! Every pair of tags repels, every parent/child edge attracts, and the
//! resulting velocity is scaled by a temperature that cools by a fixed step
//! each tick. Perturbations reheat the simulation; once the temperature
//! reaches zero nothing moves until the next reheat.

use std::collections::HashMap;

use crate::graph::Graph;
use crate::models::{TagId, Vector};

/// Side length of the square world, in world units.
pub const WORLD_SIZE: f64 = 8000.0;

/// Tunables for the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub repulsion: f64,
    pub attraction: f64,
    /// Keeps the repulsion finite for coincident tags.
    pub softening: f64,
    pub initial_temperature: f64,
    pub reheat_temperature: f64,
    pub cooling_step: f64,
    /// Where the root is pinned.
    pub center: Vector,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            repulsion: 1000.0,
            attraction: 0.0001,
            softening: 0.00001,
            initial_temperature: 1000.0,
            reheat_temperature: 500.0,
            cooling_step: 0.01,
            center: Vector::new(WORLD_SIZE / 2.0, WORLD_SIZE / 2.0),
        }
    }
}

/// Tags the pointer currently owns during a step.
///
/// The detached tag neither feels nor exerts forces; the held tag keeps the
/// position drag sampling gave it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hold {
    pub detached: Option<TagId>,
    pub held: Option<TagId>,
}

#[derive(Debug, Default)]
struct Scratch {
    ids: Vec<TagId>,
    positions: Vec<Vector>,
    forces: Vec<Vector>,
    index: HashMap<TagId, usize>,
}

/// Stateful simulator; one [`step`](LayoutEngine::step) per tick.
#[derive(Debug)]
pub struct LayoutEngine {
    config: LayoutConfig,
    temperature: f64,
    scratch: Scratch,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    /// Creates an engine at its initial temperature.
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            temperature: config.initial_temperature,
            config,
            scratch: Scratch::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn is_settled(&self) -> bool {
        self.temperature <= 0.0
    }

    /// Back to the initial temperature, as after a fresh load.
    pub fn restart(&mut self) {
        self.temperature = self.config.initial_temperature;
    }

    /// Resets the temperature after a perturbation.
    pub fn reheat(&mut self) {
        self.temperature = self.config.reheat_temperature;
        log::trace!("event=layout_reheat temperature={}", self.temperature);
    }

    /// Advances the simulation by exactly one tick.
    ///
    /// Returns whether any tag position changed.
    pub fn step(&mut self, graph: &mut Graph, hold: Hold) -> bool {
        if self.temperature <= 0.0 {
            return false;
        }

        let scratch = &mut self.scratch;
        scratch.ids.clear();
        scratch.ids.extend_from_slice(graph.tag_ids());
        scratch.positions.clear();
        scratch.index.clear();
        for (i, id) in scratch.ids.iter().enumerate() {
            let position = graph.tag(*id).map_or(Vector::ZERO, |tag| tag.position());
            scratch.positions.push(position);
            scratch.index.insert(*id, i);
        }
        scratch.forces.clear();
        scratch.forces.resize(scratch.ids.len(), Vector::ZERO);

        let skip = hold
            .detached
            .and_then(|id| scratch.index.get(&id).copied());

        accumulate_repulsion(
            &scratch.positions,
            skip,
            self.config.repulsion,
            self.config.softening,
            &mut scratch.forces,
        );

        for (parent, child) in graph.edges() {
            let (Some(&a), Some(&b)) = (scratch.index.get(&parent), scratch.index.get(&child))
            else {
                continue;
            };
            if Some(a) == skip || Some(b) == skip {
                continue;
            }
            let (pa, pb) = (scratch.positions[a], scratch.positions[b]);
            scratch.forces[a] += attraction_between(pa, pb, self.config.attraction);
            scratch.forces[b] += attraction_between(pb, pa, self.config.attraction);
        }

        let root = graph.root();
        let mut moved = false;
        for (i, id) in scratch.ids.iter().enumerate() {
            let velocity = scratch.forces[i];
            let Some(tag) = graph.tag_mut(*id) else {
                continue;
            };
            tag.velocity = velocity;
            let next = if *id == root {
                self.config.center
            } else if Some(*id) == hold.held {
                continue;
            } else {
                tag.position + velocity * self.temperature
            };
            if next != tag.position {
                tag.position = next;
                moved = true;
            }
        }

        self.temperature = (self.temperature - self.config.cooling_step).max(0.0);
        moved
    }
}

/// Adds to `forces[i]` the push away from every other tag.
fn accumulate_repulsion(
    positions: &[Vector],
    skip: Option<usize>,
    strength: f64,
    softening: f64,
    forces: &mut [Vector],
) {
    for (i, &a) in positions.iter().enumerate() {
        if Some(i) == skip {
            continue;
        }
        for (j, &b) in positions.iter().enumerate() {
            if i == j || Some(j) == skip {
                continue;
            }
            forces[i] += repulsion_between(a, b, strength, softening);
        }
    }
}

/// Force on `a` away from `b`, falling off with the squared distance.
fn repulsion_between(a: Vector, b: Vector, strength: f64, softening: f64) -> Vector {
    let delta = a - b;
    let distance_sq = delta.x * delta.x + delta.y * delta.y;
    delta.normalize() * (strength / (distance_sq + softening))
}

/// Force on `a` towards `b`, growing linearly with distance.
fn attraction_between(a: Vector, b: Vector, strength: f64) -> Vector {
    (b - a).normalize() * (strength * a.distance_to(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snapshot, TagRecord};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn graph() -> Graph {
        let mut main = TagRecord::new(TagId::new(1), "main");
        main.children = vec![TagId::new(2), TagId::new(3)];
        let snapshot = Snapshot {
            tags: vec![
                main,
                TagRecord::new(TagId::new(2), "a"),
                TagRecord::new(TagId::new(3), "b"),
            ],
            entries: vec![],
        };
        Graph::load(
            &snapshot,
            LayoutConfig::default().center,
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap()
    }

    fn position(graph: &Graph, id: i64) -> Vector {
        graph.tag(TagId::new(id)).unwrap().position()
    }

    #[test]
    fn repulsion_points_away_and_decays() {
        let near = repulsion_between(Vector::new(1.0, 0.0), Vector::ZERO, 1000.0, 0.00001);
        let far = repulsion_between(Vector::new(10.0, 0.0), Vector::ZERO, 1000.0, 0.00001);

        assert!(near.x > 0.0);
        assert_eq!(near.y, 0.0);
        assert!(far.x < near.x);
        assert!((far.x - 10.0).abs() < 1e-6);
    }

    #[test]
    fn coincident_tags_do_not_produce_nan() {
        let force = repulsion_between(Vector::ZERO, Vector::ZERO, 1000.0, 0.00001);
        assert_eq!(force, Vector::ZERO);
    }

    #[test]
    fn attraction_is_linear_in_distance() {
        let pull = attraction_between(Vector::ZERO, Vector::new(200.0, 0.0), 0.0001);
        assert!((pull.x - 0.02).abs() < 1e-12);
    }

    #[test]
    fn step_pins_root_to_center_and_cools() {
        let mut graph = graph();
        let mut engine = LayoutEngine::default();

        let moved = engine.step(&mut graph, Hold::default());

        assert!(moved);
        assert_eq!(position(&graph, 1), engine.config().center);
        assert!((engine.temperature() - 999.99).abs() < 1e-9);
    }

    #[test]
    fn held_tag_stays_put() {
        let mut graph = graph();
        let mut engine = LayoutEngine::default();
        let held_before = position(&graph, 2);
        let free_before = position(&graph, 3);

        engine.step(
            &mut graph,
            Hold {
                detached: None,
                held: Some(TagId::new(2)),
            },
        );

        assert_eq!(position(&graph, 2), held_before);
        assert_ne!(position(&graph, 3), free_before);
    }

    #[test]
    fn detached_tag_feels_no_force() {
        let mut graph = graph();
        graph.detach_tag(TagId::new(2)).unwrap();
        let mut engine = LayoutEngine::default();
        let before = position(&graph, 2);

        engine.step(
            &mut graph,
            Hold {
                detached: Some(TagId::new(2)),
                held: None,
            },
        );

        assert_eq!(position(&graph, 2), before);
        assert_eq!(graph.tag(TagId::new(2)).unwrap().velocity(), Vector::ZERO);
    }

    #[test]
    fn cold_engine_is_a_no_op() {
        let mut graph = graph();
        let mut engine = LayoutEngine::new(LayoutConfig {
            initial_temperature: 0.0,
            ..LayoutConfig::default()
        });
        let before: Vec<Vector> = graph.tags().map(|tag| tag.position()).collect();

        assert!(!engine.step(&mut graph, Hold::default()));

        let after: Vec<Vector> = graph.tags().map(|tag| tag.position()).collect();
        assert_eq!(before, after);
        assert!(engine.is_settled());
    }

    #[test]
    fn reheat_resets_to_reheat_temperature() {
        let mut engine = LayoutEngine::default();
        engine.reheat();
        assert_eq!(engine.temperature(), 500.0);

        engine.restart();
        assert_eq!(engine.temperature(), 1000.0);
    }
}
