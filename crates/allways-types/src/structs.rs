//! Registry entities and append-only log rows.
//!
//! Ownership forms a tree: a [`ControlBox`] owns its
//! [`TrafficSemaphore`]s and [`PedestrianSemaphore`]s, and a traffic
//! semaphore owns its destination set. Draft types carry what a caller
//! may submit for an upsert; the registry turns them into stored records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{LightStatus, PriorityLevel, SemaphoreKind};
use crate::ids::{
    CivilId, ControlBoxId, CrossingRequestId, EmergencyRequestId, SemaphoreId, TmcId,
};

// ---------------------------------------------------------------------------
// Control box
// ---------------------------------------------------------------------------

/// A physical field cabinet housing a traffic controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ControlBox {
    /// Registry identifier.
    pub id: ControlBoxId,
    /// Display name, also used by field controllers to look up their id.
    pub name: String,
    /// Free-text location (street, junction).
    pub location: String,
    /// Owning traffic-management-center account.
    pub tmc_id: TmcId,
    /// Network username the cabinet authenticates with.
    pub network_username: String,
    /// Network secret. Never serialized back out.
    #[serde(default, skip_serializing)]
    #[ts(skip)]
    pub network_secret: Option<String>,
}

/// Caller-supplied control box record for an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ControlBoxDraft {
    /// Existing id to update; `None` registers a new control box.
    #[serde(default)]
    pub id: Option<ControlBoxId>,
    /// Display name.
    pub name: String,
    /// Free-text location.
    #[serde(default)]
    pub location: String,
    /// Owning TMC account.
    pub tmc_id: TmcId,
    /// Network username.
    #[serde(default)]
    pub network_username: String,
    /// Network secret; `None` on update keeps the stored secret.
    #[serde(default)]
    pub network_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// Traffic semaphore
// ---------------------------------------------------------------------------

/// A vehicle traffic light with red/yellow/green outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TrafficSemaphore {
    /// Registry identifier.
    pub id: SemaphoreId,
    /// Owning control box.
    pub control_box_id: ControlBoxId,
    /// Display name (e.g. `TS1`).
    pub name: String,
    /// Integer position on the intersection ring.
    pub location: i32,
    /// GPIO channel driving the red lamp.
    pub gpio_red: i32,
    /// GPIO channel driving the yellow lamp.
    pub gpio_yellow: i32,
    /// GPIO channel driving the green lamp.
    pub gpio_green: i32,
    /// Current light, as last committed.
    pub status: LightStatus,
    /// Destination numbers this semaphore serves.
    pub destinations: BTreeSet<i32>,
}

/// Caller-supplied traffic semaphore record for an upsert.
///
/// Carries no status: status is never edited through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TrafficSemaphoreDraft {
    /// Existing id to update; `None` registers a new semaphore.
    #[serde(default)]
    pub id: Option<SemaphoreId>,
    /// Owning control box (must exist).
    pub control_box_id: ControlBoxId,
    /// Display name.
    pub name: String,
    /// Integer position on the intersection ring.
    pub location: i32,
    /// Red GPIO channel.
    pub gpio_red: i32,
    /// Yellow GPIO channel.
    pub gpio_yellow: i32,
    /// Green GPIO channel.
    pub gpio_green: i32,
    /// Destination numbers; duplicates collapse.
    #[serde(default)]
    pub destinations: Vec<i32>,
}

// ---------------------------------------------------------------------------
// Pedestrian semaphore
// ---------------------------------------------------------------------------

/// A pedestrian crossing light, optionally with card reader, buzzer and
/// push-button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PedestrianSemaphore {
    /// Registry identifier.
    pub id: SemaphoreId,
    /// Owning control box.
    pub control_box_id: ControlBoxId,
    /// Display name (e.g. `PS2`).
    pub name: String,
    /// Integer position on the intersection ring.
    pub location: i32,
    /// GPIO channel driving the red lamp.
    pub gpio_red: i32,
    /// GPIO channel driving the green lamp.
    pub gpio_green: i32,
    /// Current light, as last committed.
    pub status: LightStatus,
    /// An RFID card reader is fitted.
    pub has_card_reader: bool,
    /// An audible buzzer is fitted.
    pub has_buzzer: bool,
    /// A push-button is fitted.
    pub has_button: bool,
    /// Button GPIO channel; present iff `has_button`.
    pub gpio_button: Option<i32>,
    /// Button press threshold; present iff `has_button`.
    pub button_threshold: Option<i32>,
}

/// Caller-supplied pedestrian semaphore record for an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PedestrianSemaphoreDraft {
    /// Existing id to update; `None` registers a new semaphore.
    #[serde(default)]
    pub id: Option<SemaphoreId>,
    /// Owning control box (must exist).
    pub control_box_id: ControlBoxId,
    /// Display name.
    pub name: String,
    /// Integer position on the intersection ring.
    pub location: i32,
    /// Red GPIO channel.
    pub gpio_red: i32,
    /// Green GPIO channel.
    pub gpio_green: i32,
    /// Card reader fitted.
    #[serde(default)]
    pub has_card_reader: bool,
    /// Buzzer fitted.
    #[serde(default)]
    pub has_buzzer: bool,
    /// Push-button fitted.
    #[serde(default)]
    pub has_button: bool,
    /// Button GPIO channel; ignored unless `has_button`.
    #[serde(default)]
    pub gpio_button: Option<i32>,
    /// Button threshold; ignored unless `has_button`.
    #[serde(default)]
    pub button_threshold: Option<i32>,
}

// ---------------------------------------------------------------------------
// Semaphore of either kind
// ---------------------------------------------------------------------------

/// A stored semaphore of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Semaphore {
    /// A traffic semaphore.
    Traffic(TrafficSemaphore),
    /// A pedestrian semaphore.
    Pedestrian(PedestrianSemaphore),
}

impl Semaphore {
    /// The semaphore's id.
    pub const fn id(&self) -> SemaphoreId {
        match self {
            Self::Traffic(s) => s.id,
            Self::Pedestrian(s) => s.id,
        }
    }

    /// The semaphore's kind.
    pub const fn kind(&self) -> SemaphoreKind {
        match self {
            Self::Traffic(_) => SemaphoreKind::Traffic,
            Self::Pedestrian(_) => SemaphoreKind::Pedestrian,
        }
    }

    /// The semaphore's committed status.
    pub const fn status(&self) -> LightStatus {
        match self {
            Self::Traffic(s) => s.status,
            Self::Pedestrian(s) => s.status,
        }
    }

    /// The owning control box.
    pub const fn control_box_id(&self) -> ControlBoxId {
        match self {
            Self::Traffic(s) => s.control_box_id,
            Self::Pedestrian(s) => s.control_box_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Pedestrian registrant
// ---------------------------------------------------------------------------

/// A registered pedestrian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct Pedestrian {
    /// Civil identity number; immutable once created.
    pub cc_id: CivilId,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Physical tag (RFID card) id used for card-reader matching.
    #[serde(default)]
    pub physical_tag_id: Option<String>,
    /// Disability level (0 = none); extends crossing time at the field.
    #[serde(default)]
    pub disability: i32,
}

// ---------------------------------------------------------------------------
// Append-only logs
// ---------------------------------------------------------------------------

/// Logged emergency-vehicle request. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct EmergencyVehicleRequest {
    /// Log row id.
    pub id: EmergencyRequestId,
    /// Requesting TMC account.
    pub tmc_id: TmcId,
    /// Control box the vehicle was at when the request was made.
    pub control_box_id: ControlBoxId,
    /// Vehicle license plate.
    pub license_plate: String,
    /// Location the vehicle is coming from.
    pub origin: i32,
    /// Destination number the vehicle is heading to.
    pub destination: i32,
    /// Urgency tier.
    #[ts(type = "number")]
    pub priority_level: PriorityLevel,
    /// When the request was made.
    pub timestamp: DateTime<Utc>,
}

/// Logged pedestrian-crossing request. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct PedestrianCrossingRequest {
    /// Log row id.
    pub id: CrossingRequestId,
    /// Pedestrian semaphore the request was made at.
    pub semaphore_id: SemaphoreId,
    /// Registered pedestrian, `None` for anonymous presses.
    pub pedestrian_id: Option<CivilId>,
    /// When the request was made.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// A control box together with every semaphore it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct ControlBoxView {
    /// The control box.
    pub control_box: ControlBox,
    /// Its traffic semaphores, ordered by location.
    pub traffic: Vec<TrafficSemaphore>,
    /// Its pedestrian semaphores, ordered by location.
    pub pedestrian: Vec<PedestrianSemaphore>,
}

/// Full read of current registry state, used to resynchronize observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    /// Every control box with its semaphores.
    pub control_boxes: Vec<ControlBoxView>,
    /// When the read was taken.
    pub taken_at: DateTime<Utc>,
}
