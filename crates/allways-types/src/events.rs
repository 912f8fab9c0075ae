//! Events carried on the status channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EventKind, LightStatus, SemaphoreKind, StatusOrigin};
use crate::ids::{ControlBoxId, SemaphoreId};
use crate::structs::{EmergencyVehicleRequest, PedestrianCrossingRequest};

/// A change notification published on the status channel.
///
/// The channel is a notification side-channel: observers that miss events
/// re-read the registry instead of replaying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A semaphore's committed light changed.
    SemaphoreStatusChanged {
        /// Semaphore whose light changed.
        semaphore_id: SemaphoreId,
        /// Kind of that semaphore.
        semaphore_kind: SemaphoreKind,
        /// Owning control box.
        control_box_id: ControlBoxId,
        /// Committed light.
        new_status: LightStatus,
        /// Light before the write.
        previous_status: LightStatus,
        /// Which write path produced the change.
        origin: StatusOrigin,
        /// Publish time.
        at: DateTime<Utc>,
    },
    /// An emergency-vehicle request was appended to the log.
    EmergencyVehicleLogged {
        /// The logged row.
        record: EmergencyVehicleRequest,
        /// Publish time.
        at: DateTime<Utc>,
    },
    /// A pedestrian-crossing request was appended to the log.
    PedestrianRequestLogged {
        /// The logged row.
        record: PedestrianCrossingRequest,
        /// Control box owning the semaphore the request was made at.
        control_box_id: ControlBoxId,
        /// Publish time.
        at: DateTime<Utc>,
    },
}

impl StatusEvent {
    /// Filtering kind of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::SemaphoreStatusChanged { .. } => EventKind::SemaphoreStatus,
            Self::EmergencyVehicleLogged { .. } => EventKind::EmergencyVehicle,
            Self::PedestrianRequestLogged { .. } => EventKind::PedestrianRequest,
        }
    }

    /// Control box the event concerns.
    pub const fn control_box_id(&self) -> ControlBoxId {
        match self {
            Self::SemaphoreStatusChanged { control_box_id, .. }
            | Self::PedestrianRequestLogged { control_box_id, .. } => *control_box_id,
            Self::EmergencyVehicleLogged { record, .. } => record.control_box_id,
        }
    }

    /// Semaphore kind for status events; `None` for log events.
    pub const fn semaphore_kind(&self) -> Option<SemaphoreKind> {
        match self {
            Self::SemaphoreStatusChanged { semaphore_kind, .. } => Some(*semaphore_kind),
            Self::EmergencyVehicleLogged { .. } => None,
            // Crossing requests are only made at pedestrian semaphores.
            Self::PedestrianRequestLogged { .. } => Some(SemaphoreKind::Pedestrian),
        }
    }

    /// Publish time.
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::SemaphoreStatusChanged { at, .. }
            | Self::EmergencyVehicleLogged { at, .. }
            | Self::PedestrianRequestLogged { at, .. } => *at,
        }
    }
}
