//! In-memory [`Store`] used for local runs and tests.
//!
//! All tables live behind one [`RwLock`], so every method is trivially
//! atomic. The store can be switched offline to exercise the core's
//! unavailable-store path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use allways_types::{
    CivilId, ControlBox, ControlBoxId, EmergencyVehicleRequest, LightStatus, Pedestrian,
    PedestrianCrossingRequest, PedestrianSemaphore, SemaphoreId, SemaphoreKind, TrafficSemaphore,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::Store;

#[derive(Default)]
struct Tables {
    control_boxes: BTreeMap<ControlBoxId, ControlBox>,
    traffic: BTreeMap<SemaphoreId, TrafficSemaphore>,
    pedestrian_semaphores: BTreeMap<SemaphoreId, PedestrianSemaphore>,
    pedestrians: BTreeMap<CivilId, Pedestrian>,
    emergency: Vec<EmergencyVehicleRequest>,
    crossings: Vec<PedestrianCrossingRequest>,
}

impl Tables {
    fn owns_semaphores(&self, control_box_id: ControlBoxId) -> bool {
        self.traffic
            .values()
            .any(|s| s.control_box_id == control_box_id)
            || self
                .pedestrian_semaphores
                .values()
                .any(|s| s.control_box_id == control_box_id)
    }

    fn require_control_box(&self, control_box_id: ControlBoxId) -> Result<(), DbError> {
        if self.control_boxes.contains_key(&control_box_id) {
            Ok(())
        } else {
            Err(DbError::Conflict(format!(
                "control box {control_box_id} does not exist"
            )))
        }
    }
}

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DbError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DbError::Unavailable(String::from("memory store is offline")))
        } else {
            Ok(())
        }
    }
}

fn by_location_then_id<T>(items: &mut [T], key: impl Fn(&T) -> (i32, SemaphoreId)) {
    items.sort_by_key(key);
}

fn limit_to_usize(limit: u32) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_control_boxes(&self) -> Result<Vec<ControlBox>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut boxes: Vec<ControlBox> = tables.control_boxes.values().cloned().collect();
        boxes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(boxes)
    }

    async fn get_control_box(&self, id: ControlBoxId) -> Result<Option<ControlBox>, DbError> {
        self.check_online()?;
        Ok(self.tables.read().await.control_boxes.get(&id).cloned())
    }

    async fn upsert_control_box(&self, mut record: ControlBox) -> Result<ControlBox, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if record.network_secret.is_none() {
            record.network_secret = tables
                .control_boxes
                .get(&record.id)
                .and_then(|existing| existing.network_secret.clone());
        }
        tables.control_boxes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_control_box(&self, id: ControlBoxId) -> Result<bool, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        if tables.owns_semaphores(id) {
            return Err(DbError::Conflict(format!(
                "control box {id} still owns semaphores"
            )));
        }
        Ok(tables.control_boxes.remove(&id).is_some())
    }

    async fn list_traffic_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<Vec<TrafficSemaphore>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut found: Vec<TrafficSemaphore> = tables
            .traffic
            .values()
            .filter(|s| s.control_box_id == control_box_id)
            .cloned()
            .collect();
        by_location_then_id(&mut found, |s| (s.location, s.id));
        Ok(found)
    }

    async fn list_pedestrian_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<Vec<PedestrianSemaphore>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut found: Vec<PedestrianSemaphore> = tables
            .pedestrian_semaphores
            .values()
            .filter(|s| s.control_box_id == control_box_id)
            .cloned()
            .collect();
        by_location_then_id(&mut found, |s| (s.location, s.id));
        Ok(found)
    }

    async fn get_traffic(&self, id: SemaphoreId) -> Result<Option<TrafficSemaphore>, DbError> {
        self.check_online()?;
        Ok(self.tables.read().await.traffic.get(&id).cloned())
    }

    async fn get_pedestrian_semaphore(
        &self,
        id: SemaphoreId,
    ) -> Result<Option<PedestrianSemaphore>, DbError> {
        self.check_online()?;
        Ok(self.tables.read().await.pedestrian_semaphores.get(&id).cloned())
    }

    async fn traffic_at_location(&self, location: i32) -> Result<Vec<TrafficSemaphore>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .traffic
            .values()
            .filter(|s| s.location == location)
            .cloned()
            .collect())
    }

    async fn pedestrian_at_location(
        &self,
        location: i32,
    ) -> Result<Vec<PedestrianSemaphore>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .pedestrian_semaphores
            .values()
            .filter(|s| s.location == location)
            .cloned()
            .collect())
    }

    async fn upsert_traffic(
        &self,
        mut record: TrafficSemaphore,
    ) -> Result<TrafficSemaphore, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.require_control_box(record.control_box_id)?;
        if let Some(existing) = tables.traffic.get(&record.id) {
            record.status = existing.status;
        }
        tables.traffic.insert(record.id, record.clone());
        Ok(record)
    }

    async fn upsert_pedestrian_semaphore(
        &self,
        mut record: PedestrianSemaphore,
    ) -> Result<PedestrianSemaphore, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.require_control_box(record.control_box_id)?;
        if let Some(existing) = tables.pedestrian_semaphores.get(&record.id) {
            record.status = existing.status;
        }
        tables.pedestrian_semaphores.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_semaphore(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
    ) -> Result<bool, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        // Destinations live inside the traffic record, so they go with it.
        let removed = match kind {
            SemaphoreKind::Traffic => tables.traffic.remove(&id).is_some(),
            SemaphoreKind::Pedestrian => tables.pedestrian_semaphores.remove(&id).is_some(),
        };
        Ok(removed)
    }

    async fn traffic_serving(&self, destination: i32) -> Result<Vec<TrafficSemaphore>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut found: Vec<TrafficSemaphore> = tables
            .traffic
            .values()
            .filter(|s| s.destinations.contains(&destination))
            .cloned()
            .collect();
        by_location_then_id(&mut found, |s| (s.location, s.id));
        Ok(found)
    }

    async fn set_status(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
        status: LightStatus,
    ) -> Result<Option<LightStatus>, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        let slot = match kind {
            SemaphoreKind::Traffic => tables.traffic.get_mut(&id).map(|s| &mut s.status),
            SemaphoreKind::Pedestrian => tables
                .pedestrian_semaphores
                .get_mut(&id)
                .map(|s| &mut s.status),
        };
        Ok(slot.map(|current| {
            *current = status;
            *current
        }))
    }

    async fn upsert_pedestrian(&self, record: Pedestrian) -> Result<Pedestrian, DbError> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        tables.pedestrians.insert(record.cc_id.clone(), record.clone());
        Ok(record)
    }

    async fn get_pedestrian(&self, cc_id: &CivilId) -> Result<Option<Pedestrian>, DbError> {
        self.check_online()?;
        Ok(self.tables.read().await.pedestrians.get(cc_id).cloned())
    }

    async fn find_pedestrian_by_tag(&self, tag: &str) -> Result<Option<Pedestrian>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .pedestrians
            .values()
            .find(|p| p.physical_tag_id.as_deref() == Some(tag))
            .cloned())
    }

    async fn append_emergency(
        &self,
        record: EmergencyVehicleRequest,
    ) -> Result<EmergencyVehicleRequest, DbError> {
        self.check_online()?;
        self.tables.write().await.emergency.push(record.clone());
        Ok(record)
    }

    async fn recent_emergency(&self, limit: u32) -> Result<Vec<EmergencyVehicleRequest>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut rows = tables.emergency.clone();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows.truncate(limit_to_usize(limit));
        Ok(rows)
    }

    async fn append_crossing(
        &self,
        record: PedestrianCrossingRequest,
    ) -> Result<PedestrianCrossingRequest, DbError> {
        self.check_online()?;
        self.tables.write().await.crossings.push(record.clone());
        Ok(record)
    }

    async fn recent_crossings(
        &self,
        limit: u32,
    ) -> Result<Vec<PedestrianCrossingRequest>, DbError> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut rows = tables.crossings.clone();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows.truncate(limit_to_usize(limit));
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::collections::BTreeSet;

    use allways_types::TmcId;
    use chrono::{Duration, Utc};

    use super::*;

    fn control_box() -> ControlBox {
        ControlBox {
            id: ControlBoxId::new(),
            name: String::from("CB-1"),
            location: String::from("Av. da Liberdade"),
            tmc_id: TmcId::new(),
            network_username: String::from("cb1"),
            network_secret: Some(String::from("s3cret")),
        }
    }

    fn traffic(control_box_id: ControlBoxId, destinations: &[i32]) -> TrafficSemaphore {
        TrafficSemaphore {
            id: SemaphoreId::new(),
            control_box_id,
            name: String::from("TS1"),
            location: 1,
            gpio_red: 2,
            gpio_yellow: 3,
            gpio_green: 4,
            status: LightStatus::Unknown,
            destinations: destinations.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_stored_status_and_replaces_destinations() {
        let store = MemoryStore::new();
        let cb_id = store.upsert_control_box(control_box()).await.unwrap().id;

        let mut sem = traffic(cb_id, &[1, 2]);
        store.upsert_traffic(sem.clone()).await.unwrap();
        store
            .set_status(SemaphoreKind::Traffic, sem.id, LightStatus::Green)
            .await
            .unwrap();

        sem.destinations = [3].into_iter().collect();
        sem.status = LightStatus::Unknown;
        let stored = store.upsert_traffic(sem).await.unwrap();
        assert_eq!(stored.status, LightStatus::Green);
        assert_eq!(stored.destinations.into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn semaphore_needs_existing_control_box() {
        let store = MemoryStore::new();
        let result = store.upsert_traffic(traffic(ControlBoxId::new(), &[])).await;
        assert!(matches!(result, Err(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn control_box_delete_blocked_by_semaphores() {
        let store = MemoryStore::new();
        let cb = control_box();
        let cb_id = cb.id;
        store.upsert_control_box(cb).await.unwrap();
        let sem = traffic(cb_id, &[7]);
        let sem_id = sem.id;
        store.upsert_traffic(sem).await.unwrap();

        assert!(matches!(
            store.delete_control_box(cb_id).await,
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            store.delete_semaphore(SemaphoreKind::Traffic, sem_id).await,
            Ok(true)
        ));
        assert!(store.traffic_serving(7).await.is_ok_and(|v| v.is_empty()));
        assert!(matches!(store.delete_control_box(cb_id).await, Ok(true)));
    }

    #[tokio::test]
    async fn secret_survives_upsert_without_secret() {
        let store = MemoryStore::new();
        let mut cb = control_box();
        store.upsert_control_box(cb.clone()).await.unwrap();
        cb.network_secret = None;
        cb.name = String::from("CB-renamed");
        let stored = store.upsert_control_box(cb).await.unwrap();
        assert_eq!(stored.network_secret.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn recent_logs_are_newest_first_and_limited() {
        let store = MemoryStore::new();
        let sem = SemaphoreId::new();
        let now = Utc::now();
        for minutes in [5, 1, 3] {
            store
                .append_crossing(PedestrianCrossingRequest {
                    id: allways_types::CrossingRequestId::new(),
                    semaphore_id: sem,
                    pedestrian_id: None,
                    timestamp: now - Duration::minutes(minutes),
                })
                .await
                .unwrap();
        }
        let rows = store.recent_crossings(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.first().map(|r| r.timestamp), Some(now - Duration::minutes(1)));
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.list_control_boxes().await,
            Err(DbError::Unavailable(_))
        ));
        store.set_offline(false);
        assert!(store.list_control_boxes().await.is_ok());
    }
}
