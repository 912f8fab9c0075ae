//! The persistence collaborator interface.
//!
//! The core reaches storage only through [`Store`]. Every method is a single
//! atomic step from the caller's point of view: a row insert, update or
//! delete, or the destination-set replace that rides along with a traffic
//! semaphore upsert.

use allways_types::{
    CivilId, ControlBox, ControlBoxId, EmergencyVehicleRequest, LightStatus, Pedestrian,
    PedestrianCrossingRequest, PedestrianSemaphore, SemaphoreId, SemaphoreKind, TrafficSemaphore,
};
use async_trait::async_trait;

use crate::error::DbError;

/// Storage operations the core depends on.
///
/// Implementations must uphold three rules the registry relies on:
///
/// - Upserting an existing semaphore never changes its stored status. A
///   new row takes the status carried by the record.
/// - Upserting a traffic semaphore replaces its destination set wholesale.
/// - Deleting a control box that still owns semaphores fails with
///   [`DbError::Conflict`]; deleting a semaphore removes its destinations.
#[async_trait]
pub trait Store: Send + Sync {
    // -- control boxes --------------------------------------------------

    /// All control boxes, ordered by name.
    async fn list_control_boxes(&self) -> Result<Vec<ControlBox>, DbError>;

    /// Look up a control box by id.
    async fn get_control_box(&self, id: ControlBoxId) -> Result<Option<ControlBox>, DbError>;

    /// Insert or update a control box. A `None` secret keeps the stored one.
    async fn upsert_control_box(&self, record: ControlBox) -> Result<ControlBox, DbError>;

    /// Delete a control box. Returns `false` if it did not exist.
    async fn delete_control_box(&self, id: ControlBoxId) -> Result<bool, DbError>;

    // -- semaphores -----------------------------------------------------

    /// Traffic semaphores of a control box, ordered by `(location, id)`.
    async fn list_traffic_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<Vec<TrafficSemaphore>, DbError>;

    /// Pedestrian semaphores of a control box, ordered by `(location, id)`.
    async fn list_pedestrian_of(
        &self,
        control_box_id: ControlBoxId,
    ) -> Result<Vec<PedestrianSemaphore>, DbError>;

    /// Look up a traffic semaphore by id.
    async fn get_traffic(&self, id: SemaphoreId) -> Result<Option<TrafficSemaphore>, DbError>;

    /// Look up a pedestrian semaphore by id.
    async fn get_pedestrian_semaphore(
        &self,
        id: SemaphoreId,
    ) -> Result<Option<PedestrianSemaphore>, DbError>;

    /// Traffic semaphores at an intersection location, ordered by id.
    async fn traffic_at_location(&self, location: i32) -> Result<Vec<TrafficSemaphore>, DbError>;

    /// Pedestrian semaphores at an intersection location, ordered by id.
    async fn pedestrian_at_location(
        &self,
        location: i32,
    ) -> Result<Vec<PedestrianSemaphore>, DbError>;

    /// Insert or update a traffic semaphore and replace its destinations.
    ///
    /// Returns the stored record, including its stored status.
    async fn upsert_traffic(&self, record: TrafficSemaphore) -> Result<TrafficSemaphore, DbError>;

    /// Insert or update a pedestrian semaphore.
    ///
    /// Returns the stored record, including its stored status.
    async fn upsert_pedestrian_semaphore(
        &self,
        record: PedestrianSemaphore,
    ) -> Result<PedestrianSemaphore, DbError>;

    /// Delete a semaphore of the given kind. Returns `false` if it did not
    /// exist.
    async fn delete_semaphore(&self, kind: SemaphoreKind, id: SemaphoreId)
    -> Result<bool, DbError>;

    /// Traffic semaphores whose destination set contains `destination`,
    /// ordered by `(location, id)`.
    async fn traffic_serving(&self, destination: i32) -> Result<Vec<TrafficSemaphore>, DbError>;

    /// Write a semaphore's status and return the committed value, or `None`
    /// if the semaphore does not exist.
    async fn set_status(
        &self,
        kind: SemaphoreKind,
        id: SemaphoreId,
        status: LightStatus,
    ) -> Result<Option<LightStatus>, DbError>;

    // -- pedestrians ----------------------------------------------------

    /// Insert or update a registrant keyed by civil id.
    async fn upsert_pedestrian(&self, record: Pedestrian) -> Result<Pedestrian, DbError>;

    /// Look up a registrant by civil id.
    async fn get_pedestrian(&self, cc_id: &CivilId) -> Result<Option<Pedestrian>, DbError>;

    /// Look up a registrant by physical tag id.
    async fn find_pedestrian_by_tag(&self, tag: &str) -> Result<Option<Pedestrian>, DbError>;

    // -- append-only logs -----------------------------------------------

    /// Append an emergency-vehicle request.
    async fn append_emergency(
        &self,
        record: EmergencyVehicleRequest,
    ) -> Result<EmergencyVehicleRequest, DbError>;

    /// Most recent emergency-vehicle requests, newest first.
    async fn recent_emergency(&self, limit: u32) -> Result<Vec<EmergencyVehicleRequest>, DbError>;

    /// Append a pedestrian-crossing request.
    async fn append_crossing(
        &self,
        record: PedestrianCrossingRequest,
    ) -> Result<PedestrianCrossingRequest, DbError>;

    /// Most recent pedestrian-crossing requests, newest first.
    async fn recent_crossings(
        &self,
        limit: u32,
    ) -> Result<Vec<PedestrianCrossingRequest>, DbError>;
}
