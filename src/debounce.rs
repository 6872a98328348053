//! Pending edits waiting out their debounce delay.
//!
//! The host loop calls [`Debouncer::schedule`] on every keystroke and
//! [`Debouncer::drain_due`] on every poll. Each target holds at most one
//! pending value; a newer edit replaces the older one and restarts its delay.

use std::time::{Duration, Instant};

use crate::models::{EntryId, TagId};

/// Something a text field edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditTarget {
    Query,
    EntryTitle(EntryId),
    EntryContent(EntryId),
    TagName(TagId),
}

/// Delay before each kind of edit is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    pub query: Duration,
    pub entry: Duration,
    pub rename: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            query: Duration::from_millis(300),
            entry: Duration::from_millis(300),
            rename: Duration::from_millis(500),
        }
    }
}

impl DebounceConfig {
    pub fn delay(&self, target: EditTarget) -> Duration {
        match target {
            EditTarget::Query => self.query,
            EditTarget::EntryTitle(_) | EditTarget::EntryContent(_) => self.entry,
            EditTarget::TagName(_) => self.rename,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Pending {
    target: EditTarget,
    value: String,
    due: Instant,
}

/// At most one pending value per [`EditTarget`].
#[derive(Debug, Default)]
pub struct Debouncer {
    config: DebounceConfig,
    pending: Vec<Pending>,
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Schedules `value` for `target`, replacing anything already pending there.
    pub fn schedule(&mut self, target: EditTarget, value: impl Into<String>, now: Instant) {
        let due = now + self.config.delay(target);
        let value = value.into();
        match self.pending.iter_mut().find(|p| p.target == target) {
            Some(pending) => {
                pending.value = value;
                pending.due = due;
            }
            None => self.pending.push(Pending { target, value, due }),
        }
    }

    /// The value waiting for `target`, if any.
    pub fn pending(&self, target: EditTarget) -> Option<&str> {
        self.pending
            .iter()
            .find(|p| p.target == target)
            .map(|p| p.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Earliest deadline among pending edits.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Drops the pending edit for `target`.
    pub fn cancel(&mut self, target: EditTarget) -> Option<String> {
        let index = self.pending.iter().position(|p| p.target == target)?;
        Some(self.pending.remove(index).value)
    }

    /// Keeps only the edits whose target satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&EditTarget) -> bool) {
        self.pending.retain(|p| keep(&p.target));
    }

    /// Removes and returns every edit due at `now`, earliest deadline first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<(EditTarget, String)> {
        let (mut due, waiting): (Vec<Pending>, Vec<Pending>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;
        due.sort_by_key(|p| p.due);
        due.into_iter().map(|p| (p.target, p.value)).collect()
    }

    /// Removes and returns every pending edit regardless of deadline.
    pub fn drain_all(&mut self) -> Vec<(EditTarget, String)> {
        let mut all: Vec<Pending> = self.pending.drain(..).collect();
        all.sort_by_key(|p| p.due);
        all.into_iter().map(|p| (p.target, p.value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn nothing_is_due_before_the_delay() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        debouncer.schedule(EditTarget::Query, "ru", t0);

        assert!(debouncer.drain_due(t0 + ms(299)).is_empty());
        assert_eq!(
            debouncer.drain_due(t0 + ms(300)),
            vec![(EditTarget::Query, "ru".to_string())]
        );
        assert!(debouncer.is_empty());
    }

    #[test]
    fn newer_edit_replaces_and_restarts() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();

        debouncer.schedule(EditTarget::Query, "r", t0);
        debouncer.schedule(EditTarget::Query, "rust", t0 + ms(200));

        assert_eq!(debouncer.len(), 1);
        assert!(debouncer.drain_due(t0 + ms(300)).is_empty());
        assert_eq!(
            debouncer.drain_due(t0 + ms(500)),
            vec![(EditTarget::Query, "rust".to_string())]
        );
    }

    #[test]
    fn targets_are_independent() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();
        let entry = EntryId::new(1);

        debouncer.schedule(EditTarget::EntryTitle(entry), "title", t0);
        debouncer.schedule(EditTarget::EntryContent(entry), "body", t0 + ms(10));
        debouncer.schedule(EditTarget::TagName(TagId::new(2)), "renamed", t0);

        assert_eq!(debouncer.pending(EditTarget::EntryTitle(entry)), Some("title"));
        let due = debouncer.drain_due(t0 + ms(310));
        assert_eq!(
            due,
            vec![
                (EditTarget::EntryTitle(entry), "title".to_string()),
                (EditTarget::EntryContent(entry), "body".to_string()),
            ]
        );
        assert_eq!(debouncer.next_deadline(), Some(t0 + ms(500)));
    }

    #[test]
    fn cancel_and_retain_drop_edits() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::default();
        debouncer.schedule(EditTarget::TagName(TagId::new(1)), "a", t0);
        debouncer.schedule(EditTarget::TagName(TagId::new(2)), "b", t0);
        debouncer.schedule(EditTarget::Query, "q", t0);

        assert_eq!(debouncer.cancel(EditTarget::Query), Some("q".to_string()));
        assert_eq!(debouncer.cancel(EditTarget::Query), None);

        debouncer.retain(|target| *target != EditTarget::TagName(TagId::new(1)));

        assert_eq!(
            debouncer.drain_all(),
            vec![(EditTarget::TagName(TagId::new(2)), "b".to_string())]
        );
    }
}
