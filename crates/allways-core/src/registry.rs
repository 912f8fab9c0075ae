//! Device registry.
//!
//! Owns control boxes, the semaphores attached to them and the pedestrian
//! registrants, all held by the persistence collaborator. Registry edits
//! never touch a semaphore's status: the only status write path is
//! [`Registry::set_status`], shared by device self-reports and emergency
//! preemption.
//!
//! # Status writes
//!
//! Each `(kind, id)` pair has its own async mutex. Inside it the current
//! status is read, the store is written, and the value the store returns is
//! published before the lock is released. Per-semaphore publish order
//! therefore equals commit order.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use allways_db::Store;
use allways_events::StatusChannel;
use allways_types::{
    CivilId, ControlBox, ControlBoxDraft, ControlBoxId, ControlBoxView, IdentifierField,
    LightStatus, Pedestrian, PedestrianSemaphore, PedestrianSemaphoreDraft, RegistrySnapshot,
    Semaphore, SemaphoreId, SemaphoreKind, StatusChange, StatusEvent, StatusOrigin,
    TrafficSemaphore, TrafficSemaphoreDraft,
};
use chrono::Utc;
use tracing::{debug, info};

use crate::error::CoreError;

/// Highest GPIO channel number on the field controllers.
pub const GPIO_MAX: i32 = 40;

type LockKey = (SemaphoreKind, SemaphoreId);

/// A semaphore record submitted for upsert, of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemaphoreDraft {
    /// Traffic semaphore record.
    Traffic(TrafficSemaphoreDraft),
    /// Pedestrian semaphore record.
    Pedestrian(PedestrianSemaphoreDraft),
}

/// The device registry.
pub struct Registry {
    store: Arc<dyn Store>,
    channel: StatusChannel,
    locks: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl Registry {
    /// Create a registry over a store, publishing on `channel`.
    pub fn new(store: Arc<dyn Store>, channel: StatusChannel) -> Self {
        Self {
            store,
            channel,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The persistence collaborator.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// The status channel this registry publishes on.
    pub const fn channel(&self) -> &StatusChannel {
        &self.channel
    }

    // =========================================================================
    // Control boxes
    // =========================================================================

    /// All control boxes, ordered by name.
    pub async fn list_control_boxes(&self) -> Result<Vec<ControlBox>, CoreError> {
        Ok(self.store.list_control_boxes().await?)
    }

    /// Look up a control box.
    pub async fn get_control_box(&self, id: ControlBoxId) -> Result<ControlBox, CoreError> {
        self.store
            .get_control_box(id)
            .await?
            .ok_or_else(|| CoreError::not_found("control box", id))
    }

    /// Register or edit a control box.
    pub async fn upsert_control_box(&self, draft: ControlBoxDraft) -> Result<ControlBox, CoreError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("control box name must not be empty"));
        }
        let record = ControlBox {
            id: draft.id.unwrap_or_default(),
            name: name.to_owned(),
            location: draft.location.trim().to_owned(),
            tmc_id: draft.tmc_id,
            network_username: draft.network_username.trim().to_owned(),
            network_secret: draft.network_secret.filter(|s| !s.is_empty()),
        };
        let stored = self.store.upsert_control_box(record).await?;
        info!(control_box_id = %stored.id, name = %stored.name, "Control box saved");
        Ok(stored)
    }

    /// Delete a control box. Rejected while any semaphore references it.
    pub async fn delete_control_box(&self, id: ControlBoxId) -> Result<(), CoreError> {
        let view = self.list_semaphores_of(id).await?;
        if !view.traffic.is_empty() || !view.pedestrian.is_empty() {
            return Err(CoreError::validation(format!(
                "control box {id} still owns {} semaphore(s)",
                view.traffic.len().saturating_add(view.pedestrian.len())
            )));
        }
        if self.store.delete_control_box(id).await? {
            info!(control_box_id = %id, "Control box deleted");
            Ok(())
        } else {
            Err(CoreError::not_found("control box", id))
        }
    }

    /// A control box with every semaphore attached to it.
    pub async fn list_semaphores_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<ControlBoxView, CoreError> {
        let control_box = self.get_control_box(control_box_id).await?;
        let traffic = self.store.list_traffic_of(control_box_id).await?;
        let pedestrian = self.store.list_pedestrian_of(control_box_id).await?;
        Ok(ControlBoxView {
            control_box,
            traffic,
            pedestrian,
        })
    }

    // =========================================================================
    // Semaphores
    // =========================================================================

    /// Register or edit a semaphore of either kind.
    pub async fn upsert_semaphore(&self, draft: SemaphoreDraft) -> Result<Semaphore, CoreError> {
        match draft {
            SemaphoreDraft::Traffic(d) => self.upsert_traffic(d).await.map(Semaphore::Traffic),
            SemaphoreDraft::Pedestrian(d) => self
                .upsert_pedestrian_semaphore(d)
                .await
                .map(Semaphore::Pedestrian),
        }
    }

    /// Register or edit a traffic semaphore, replacing its destination set.
    ///
    /// A new semaphore starts `UNKNOWN`; an existing one keeps its status.
    pub async fn upsert_traffic(
        &self,
        draft: TrafficSemaphoreDraft,
    ) -> Result<TrafficSemaphore, CoreError> {
        let name = validate_name(&draft.name)?;
        validate_gpio(&[
            ("gpio_red", draft.gpio_red),
            ("gpio_yellow", draft.gpio_yellow),
            ("gpio_green", draft.gpio_green),
        ])?;
        self.require_control_box(draft.control_box_id).await?;

        let destinations: BTreeSet<i32> = draft.destinations.into_iter().collect();
        let record = TrafficSemaphore {
            id: draft.id.unwrap_or_default(),
            control_box_id: draft.control_box_id,
            name,
            location: draft.location,
            gpio_red: draft.gpio_red,
            gpio_yellow: draft.gpio_yellow,
            gpio_green: draft.gpio_green,
            status: LightStatus::Unknown,
            destinations,
        };
        let stored = self.store.upsert_traffic(record).await?;
        info!(
            semaphore_id = %stored.id,
            kind = "traffic",
            destinations = ?stored.destinations,
            "Semaphore saved"
        );
        Ok(stored)
    }

    /// Register or edit a pedestrian semaphore.
    ///
    /// Without a button, `gpio_button` and `button_threshold` are stored as
    /// null whatever was supplied.
    pub async fn upsert_pedestrian_semaphore(
        &self,
        draft: PedestrianSemaphoreDraft,
    ) -> Result<PedestrianSemaphore, CoreError> {
        let name = validate_name(&draft.name)?;
        let (gpio_button, button_threshold) = if draft.has_button {
            match (draft.gpio_button, draft.button_threshold) {
                (Some(gpio), Some(threshold)) => (Some(gpio), Some(threshold)),
                _ => {
                    return Err(CoreError::validation(
                        "gpio_button and button_threshold are required when has_button is set",
                    ));
                }
            }
        } else {
            (None, None)
        };

        let mut channels = vec![("gpio_red", draft.gpio_red), ("gpio_green", draft.gpio_green)];
        if let Some(gpio) = gpio_button {
            channels.push(("gpio_button", gpio));
        }
        validate_gpio(&channels)?;
        self.require_control_box(draft.control_box_id).await?;

        let record = PedestrianSemaphore {
            id: draft.id.unwrap_or_default(),
            control_box_id: draft.control_box_id,
            name,
            location: draft.location,
            gpio_red: draft.gpio_red,
            gpio_green: draft.gpio_green,
            status: LightStatus::Unknown,
            has_card_reader: draft.has_card_reader,
            has_buzzer: draft.has_buzzer,
            has_button: draft.has_button,
            gpio_button,
            button_threshold,
        };
        let stored = self.store.upsert_pedestrian_semaphore(record).await?;
        info!(semaphore_id = %stored.id, kind = "pedestrian", "Semaphore saved");
        Ok(stored)
    }

    /// Look up a semaphore.
    pub async fn get_semaphore(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
    ) -> Result<Semaphore, CoreError> {
        let found = match kind {
            SemaphoreKind::Traffic => self.store.get_traffic(id).await?.map(Semaphore::Traffic),
            SemaphoreKind::Pedestrian => self
                .store
                .get_pedestrian_semaphore(id)
                .await?
                .map(Semaphore::Pedestrian),
        };
        found.ok_or_else(|| CoreError::not_found(semaphore_entity(kind), id))
    }

    /// Resolve semaphores by `id` (UUID string) or `location` (integer).
    ///
    /// A location can match several semaphores; an id matches at most one.
    /// An empty result is not an error here.
    pub async fn find_semaphores(
        &self,
        kind: SemaphoreKind,
        field: IdentifierField,
        value: &serde_json::Value,
    ) -> Result<Vec<Semaphore>, CoreError> {
        match field {
            IdentifierField::Id => {
                let id = value
                    .as_str()
                    .and_then(|s| s.trim().parse::<SemaphoreId>().ok())
                    .ok_or_else(|| {
                        CoreError::validation(format!("identifier {value} is not a semaphore id"))
                    })?;
                match self.get_semaphore(kind, id).await {
                    Ok(found) => Ok(vec![found]),
                    Err(CoreError::NotFound { .. }) => Ok(Vec::new()),
                    Err(other) => Err(other),
                }
            }
            IdentifierField::Location => {
                let location = location_value(value).ok_or_else(|| {
                    CoreError::validation(format!("identifier {value} is not a location"))
                })?;
                let found = match kind {
                    SemaphoreKind::Traffic => self
                        .store
                        .traffic_at_location(location)
                        .await?
                        .into_iter()
                        .map(Semaphore::Traffic)
                        .collect(),
                    SemaphoreKind::Pedestrian => self
                        .store
                        .pedestrian_at_location(location)
                        .await?
                        .into_iter()
                        .map(Semaphore::Pedestrian)
                        .collect(),
                };
                Ok(found)
            }
        }
    }

    /// Delete a semaphore; a traffic semaphore's destinations go with it.
    pub async fn delete_semaphore(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
    ) -> Result<(), CoreError> {
        {
            let lock = self.semaphore_lock(kind, id);
            let _held = lock.lock().await;
            if !self.store.delete_semaphore(kind, id).await? {
                return Err(CoreError::not_found(semaphore_entity(kind), id));
            }
        }
        self.prune_lock(kind, id);
        info!(semaphore_id = %id, kind = kind.as_str(), "Semaphore deleted");
        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Write a semaphore's status and publish the committed value.
    ///
    /// Writing the status a semaphore already has is a no-op: nothing is
    /// stored and nothing is published.
    pub async fn set_status(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
        status: LightStatus,
        origin: StatusOrigin,
    ) -> Result<StatusChange, CoreError> {
        if status == LightStatus::Unknown {
            return Err(CoreError::validation("UNKNOWN cannot be written as a status"));
        }

        let lock = self.semaphore_lock(kind, id);
        let _held = lock.lock().await;

        let current = self.get_semaphore(kind, id).await?;
        let previous = current.status();
        let control_box_id = current.control_box_id();
        if previous == status {
            debug!(semaphore_id = %id, kind = kind.as_str(), status = %status, "Status unchanged");
            return Ok(StatusChange {
                semaphore_id: id,
                kind,
                control_box_id,
                previous,
                current: previous,
            });
        }

        let committed = self
            .store
            .set_status(kind, id, status)
            .await?
            .ok_or_else(|| CoreError::not_found(semaphore_entity(kind), id))?;

        let change = StatusChange {
            semaphore_id: id,
            kind,
            control_box_id,
            previous,
            current: committed,
        };
        if change.changed() {
            self.channel.publish(StatusEvent::SemaphoreStatusChanged {
                semaphore_id: id,
                semaphore_kind: kind,
                control_box_id,
                new_status: committed,
                previous_status: previous,
                origin,
                at: Utc::now(),
            });
            info!(
                semaphore_id = %id,
                kind = kind.as_str(),
                status = %committed,
                previous = %previous,
                origin = ?origin,
                "Status changed"
            );
        }
        Ok(change)
    }

    // =========================================================================
    // Pedestrians
    // =========================================================================

    /// Register or edit a pedestrian. The civil id is the key and never
    /// changes; a blank tag is stored as none.
    pub async fn upsert_pedestrian(&self, record: Pedestrian) -> Result<Pedestrian, CoreError> {
        if record.disability < 0 {
            return Err(CoreError::validation("disability must not be negative"));
        }
        let record = Pedestrian {
            name: record
                .name
                .map(|n| n.trim().to_owned())
                .filter(|n| !n.is_empty()),
            physical_tag_id: record
                .physical_tag_id
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty()),
            ..record
        };
        if let Some(tag) = record.physical_tag_id.as_deref() {
            if let Some(holder) = self.store.find_pedestrian_by_tag(tag).await? {
                if holder.cc_id != record.cc_id {
                    return Err(CoreError::validation(format!(
                        "physical tag {tag} is already assigned"
                    )));
                }
            }
        }
        let stored = self.store.upsert_pedestrian(record).await?;
        info!(cc_id = %stored.cc_id, "Pedestrian saved");
        Ok(stored)
    }

    /// Look up a pedestrian by civil id.
    pub async fn get_pedestrian(&self, cc_id: &CivilId) -> Result<Pedestrian, CoreError> {
        self.store
            .get_pedestrian(cc_id)
            .await?
            .ok_or_else(|| CoreError::not_found("pedestrian", cc_id))
    }

    /// Look up a pedestrian by physical tag.
    pub async fn find_pedestrian_by_tag(&self, tag: &str) -> Result<Option<Pedestrian>, CoreError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_pedestrian_by_tag(tag).await?)
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    /// Full read of current registry state, for subscriber resync.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, CoreError> {
        let taken_at = Utc::now();
        let boxes = self.store.list_control_boxes().await?;
        let mut control_boxes = Vec::with_capacity(boxes.len());
        for control_box in boxes {
            let traffic = self.store.list_traffic_of(control_box.id).await?;
            let pedestrian = self.store.list_pedestrian_of(control_box.id).await?;
            control_boxes.push(ControlBoxView {
                control_box,
                traffic,
                pedestrian,
            });
        }
        Ok(RegistrySnapshot {
            control_boxes,
            taken_at,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn require_control_box(&self, id: ControlBoxId) -> Result<(), CoreError> {
        if self.store.get_control_box(id).await?.is_some() {
            Ok(())
        } else {
            Err(CoreError::validation(format!(
                "control box {id} does not exist"
            )))
        }
    }

    fn semaphore_lock(&self, kind: SemaphoreKind, id: SemaphoreId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry((kind, id)).or_default())
    }

    /// Drop the mutex for `(kind, id)` unless a writer still holds or awaits
    /// it. A semaphore re-registered under the same id must keep sharing it.
    fn prune_lock(&self, kind: SemaphoreKind, id: SemaphoreId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&(kind, id))
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&(kind, id));
        }
    }
}

const fn semaphore_entity(kind: SemaphoreKind) -> &'static str {
    match kind {
        SemaphoreKind::Traffic => "traffic semaphore",
        SemaphoreKind::Pedestrian => "pedestrian semaphore",
    }
}

fn validate_name(raw: &str) -> Result<String, CoreError> {
    let name = raw.trim();
    if name.is_empty() {
        Err(CoreError::validation("semaphore name must not be empty"))
    } else {
        Ok(name.to_owned())
    }
}

/// Every channel in `0..=GPIO_MAX`, and no two channels equal.
fn validate_gpio(channels: &[(&str, i32)]) -> Result<(), CoreError> {
    for (label, gpio) in channels {
        if !(0..=GPIO_MAX).contains(gpio) {
            return Err(CoreError::validation(format!(
                "{label} {gpio} is outside 0..={GPIO_MAX}"
            )));
        }
    }
    let mut seen = BTreeSet::new();
    for (label, gpio) in channels {
        if !seen.insert(*gpio) {
            return Err(CoreError::validation(format!(
                "{label} {gpio} is already used by another channel"
            )));
        }
    }
    Ok(())
}

fn location_value(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
