//! Receiver-side status cache.
//!
//! Observers keep the last status they saw for each semaphore and apply a
//! status event only when it differs, so a duplicate delivery never shows
//! up as a second transition. A resync replaces the whole cache from a
//! registry snapshot.

use std::collections::HashMap;

use allways_types::{LightStatus, RegistrySnapshot, SemaphoreId, StatusEvent};

/// Last known status per semaphore.
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    statuses: HashMap<SemaphoreId, LightStatus>,
}

impl StatusCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from a registry snapshot.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let mut cache = Self::new();
        cache.reset(snapshot);
        cache
    }

    /// Replace every cached status with the snapshot's.
    pub fn reset(&mut self, snapshot: &RegistrySnapshot) {
        self.statuses.clear();
        for view in &snapshot.control_boxes {
            for s in &view.traffic {
                self.statuses.insert(s.id, s.status);
            }
            for s in &view.pedestrian {
                self.statuses.insert(s.id, s.status);
            }
        }
    }

    /// Apply an event. Returns `true` if it is a visible change.
    ///
    /// Log events are always visible; status events only when the status
    /// differs from the cached one.
    pub fn apply(&mut self, event: &StatusEvent) -> bool {
        match event {
            StatusEvent::SemaphoreStatusChanged {
                semaphore_id,
                new_status,
                ..
            } => self.statuses.insert(*semaphore_id, *new_status) != Some(*new_status),
            StatusEvent::EmergencyVehicleLogged { .. }
            | StatusEvent::PedestrianRequestLogged { .. } => true,
        }
    }

    /// Cached status of a semaphore.
    pub fn get(&self, id: SemaphoreId) -> Option<LightStatus> {
        self.statuses.get(&id).copied()
    }

    /// Number of semaphores tracked.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use allways_types::{ControlBoxId, SemaphoreKind, StatusOrigin};
    use chrono::Utc;

    use super::*;

    fn changed(id: SemaphoreId, status: LightStatus) -> StatusEvent {
        StatusEvent::SemaphoreStatusChanged {
            semaphore_id: id,
            semaphore_kind: SemaphoreKind::Traffic,
            control_box_id: ControlBoxId::new(),
            new_status: status,
            previous_status: LightStatus::Red,
            origin: StatusOrigin::SelfReport,
            at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_status_is_a_no_op() {
        let mut cache = StatusCache::new();
        let id = SemaphoreId::new();
        assert!(cache.apply(&changed(id, LightStatus::Green)));
        assert!(!cache.apply(&changed(id, LightStatus::Green)));
        assert_eq!(cache.get(id), Some(LightStatus::Green));
        assert!(cache.apply(&changed(id, LightStatus::Yellow)));
    }

    #[test]
    fn reset_replaces_cached_state() {
        let mut cache = StatusCache::new();
        let stale = SemaphoreId::new();
        cache.apply(&changed(stale, LightStatus::Red));
        cache.reset(&RegistrySnapshot {
            control_boxes: Vec::new(),
            taken_at: Utc::now(),
        });
        assert!(cache.is_empty());
    }
}
