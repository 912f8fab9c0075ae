//! Subscription filters.

use std::collections::BTreeSet;

use allways_types::{ControlBoxId, EventKind, SemaphoreKind, StatusEvent};

/// Selects which events a subscriber receives.
///
/// Every criterion left as `None` matches everything. The semaphore-kind
/// criterion only restricts events that concern a semaphore; emergency
/// log events always pass it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    kinds: Option<BTreeSet<EventKind>>,
    semaphore_kind: Option<SemaphoreKind>,
    control_box: Option<ControlBoxId>,
}

impl EventFilter {
    /// Filter that matches every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter that matches only the given event kinds.
    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Restrict to events concerning one semaphore kind.
    #[must_use]
    pub const fn with_semaphore_kind(mut self, kind: SemaphoreKind) -> Self {
        self.semaphore_kind = Some(kind);
        self
    }

    /// Restrict to events concerning one control box.
    #[must_use]
    pub const fn with_control_box(mut self, control_box: ControlBoxId) -> Self {
        self.control_box = Some(control_box);
        self
    }

    /// Whether `event` passes every criterion.
    pub fn matches(&self, event: &StatusEvent) -> bool {
        let kind_ok = self
            .kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()));
        let semaphore_ok = match (self.semaphore_kind, event.semaphore_kind()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        };
        let control_box_ok = self
            .control_box
            .is_none_or(|wanted| wanted == event.control_box_id());
        kind_ok && semaphore_ok && control_box_ok
    }
}
