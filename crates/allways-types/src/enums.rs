//! Enumeration types shared across the AllWays workspace.
//!
//! Status codes reach the system in two shapes: numeric codes from field
//! controllers (`0`/`1`/`2`) and names from dashboards (`"RED"`, ...).
//! Both are normalized here into [`LightStatus`]; anything else is rejected
//! by returning `None` so callers can raise a validation error.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Light status
// ---------------------------------------------------------------------------

/// Current light of a semaphore.
///
/// `Unknown` is the initial state of every newly registered semaphore and
/// of any semaphore whose controller has not reported yet. It can never be
/// set through a status command.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LightStatus {
    /// Stop.
    Red,
    /// Go.
    Green,
    /// Prepare to stop.
    Yellow,
    /// No report received yet.
    #[default]
    Unknown,
}

impl LightStatus {
    /// Map a field-controller numeric code to a status.
    ///
    /// `0` is RED, `1` is GREEN, `2` is YELLOW. Every other code is invalid.
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Red),
            1 => Some(Self::Green),
            2 => Some(Self::Yellow),
            _ => None,
        }
    }

    /// Numeric code of a reportable status, `None` for `Unknown`.
    pub const fn code(self) -> Option<i64> {
        match self {
            Self::Red => Some(0),
            Self::Green => Some(1),
            Self::Yellow => Some(2),
            Self::Unknown => None,
        }
    }

    /// Parse a reportable status name, case-insensitively.
    ///
    /// `"UNKNOWN"` is deliberately not accepted: it is a storage state, not
    /// something a device may report.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "RED" => Some(Self::Red),
            "GREEN" => Some(Self::Green),
            "YELLOW" => Some(Self::Yellow),
            _ => None,
        }
    }

    /// Normalize a wire value (number or string) into a reportable status.
    ///
    /// Numeric strings such as `"1"` are accepted as codes, mirroring the
    /// loosely typed payloads older controllers send.
    pub fn from_wire(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().and_then(Self::from_code),
            serde_json::Value::String(s) => Self::from_name(s).or_else(|| {
                s.trim().parse::<i64>().ok().and_then(Self::from_code)
            }),
            _ => None,
        }
    }

    /// Storage representation (`"RED"`, `"GREEN"`, `"YELLOW"`, `"UNKNOWN"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Yellow => "YELLOW",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse the storage representation, including `"UNKNOWN"`.
    ///
    /// A `NULL` or unrecognized stored value reads back as `Unknown`.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("UNKNOWN") | None => Self::Unknown,
            Some(other) => Self::from_name(other).unwrap_or(Self::Unknown),
        }
    }
}

impl core::fmt::Display for LightStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Semaphore kind
// ---------------------------------------------------------------------------

/// Which kind of semaphore an id or command refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SemaphoreKind {
    /// Vehicle traffic light (red/yellow/green).
    Traffic,
    /// Pedestrian crossing light (red/green).
    Pedestrian,
}

impl SemaphoreKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Traffic => "traffic",
            Self::Pedestrian => "pedestrian",
        }
    }

    /// Parse a kind from its wire name or from the legacy table names
    /// (`t_semaphore`, `p_semaphore`) field controllers still send.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "traffic" | "t_semaphore" | "tsem" => Some(Self::Traffic),
            "pedestrian" | "p_semaphore" | "psem" => Some(Self::Pedestrian),
            _ => None,
        }
    }
}

impl core::fmt::Display for SemaphoreKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Priority level
// ---------------------------------------------------------------------------

/// Urgency tier of an emergency-vehicle request.
///
/// Lower numeric code means higher urgency. Only codes `1..=3` are known;
/// anything else is a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PriorityLevel {
    /// Code 1: life-threatening response.
    Critical,
    /// Code 2: urgent response.
    Urgent,
    /// Code 3: standard priority response.
    Standard,
}

impl PriorityLevel {
    /// Map a numeric urgency code to a tier.
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Critical),
            2 => Some(Self::Urgent),
            3 => Some(Self::Standard),
            _ => None,
        }
    }

    /// Numeric urgency code of the tier.
    pub const fn code(self) -> i16 {
        match self {
            Self::Critical => 1,
            Self::Urgent => 2,
            Self::Standard => 3,
        }
    }
}

impl TryFrom<i64> for PriorityLevel {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown priority level {code}"))
    }
}

impl From<PriorityLevel> for i64 {
    fn from(level: PriorityLevel) -> Self {
        Self::from(level.code())
    }
}

// ---------------------------------------------------------------------------
// Event metadata
// ---------------------------------------------------------------------------

/// Which write path produced a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum StatusOrigin {
    /// The field controller reported its own light.
    SelfReport,
    /// The emergency routing engine forced the light.
    EmergencyPreemption,
}

/// Kind of event carried on the status channel, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A semaphore's light changed.
    SemaphoreStatus,
    /// An emergency-vehicle request was logged.
    EmergencyVehicle,
    /// A pedestrian-crossing request was logged.
    PedestrianRequest,
}

impl EventKind {
    /// Wire name of the kind, also used as a transport subject segment.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SemaphoreStatus => "semaphore_status",
            Self::EmergencyVehicle => "emergency_vehicle",
            Self::PedestrianRequest => "pedestrian_request",
        }
    }

    /// Parse a kind from its wire name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "semaphore_status" | "status" => Some(Self::SemaphoreStatus),
            "emergency_vehicle" | "emergency" => Some(Self::EmergencyVehicle),
            "pedestrian_request" | "crossing" => Some(Self::PedestrianRequest),
            _ => None,
        }
    }
}

/// Field a status command uses to locate its semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum IdentifierField {
    /// The semaphore's UUID.
    Id,
    /// The semaphore's integer location on its intersection.
    Location,
}

impl IdentifierField {
    /// Parse an identifier field name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "id" => Some(Self::Id),
            "location" => Some(Self::Location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_codes_map_to_lights() {
        assert_eq!(LightStatus::from_code(0), Some(LightStatus::Red));
        assert_eq!(LightStatus::from_code(1), Some(LightStatus::Green));
        assert_eq!(LightStatus::from_code(2), Some(LightStatus::Yellow));
        assert_eq!(LightStatus::from_code(5), None);
        assert_eq!(LightStatus::from_code(-1), None);
    }

    #[test]
    fn wire_values_normalize() {
        assert_eq!(LightStatus::from_wire(&json!(1)), Some(LightStatus::Green));
        assert_eq!(LightStatus::from_wire(&json!("yellow")), Some(LightStatus::Yellow));
        assert_eq!(LightStatus::from_wire(&json!("0")), Some(LightStatus::Red));
        assert_eq!(LightStatus::from_wire(&json!("UNKNOWN")), None);
        assert_eq!(LightStatus::from_wire(&json!(1.5)), None);
        assert_eq!(LightStatus::from_wire(&json!(null)), None);
    }

    #[test]
    fn stored_status_defaults_to_unknown() {
        assert_eq!(LightStatus::from_stored(None), LightStatus::Unknown);
        assert_eq!(LightStatus::from_stored(Some("GREEN")), LightStatus::Green);
        assert_eq!(LightStatus::from_stored(Some("garbage")), LightStatus::Unknown);
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&LightStatus::Green).ok();
        assert_eq!(json.as_deref(), Some("\"GREEN\""));
    }

    #[test]
    fn priority_accepts_only_known_tiers() {
        assert_eq!(PriorityLevel::from_code(1), Some(PriorityLevel::Critical));
        assert_eq!(PriorityLevel::from_code(3), Some(PriorityLevel::Standard));
        assert_eq!(PriorityLevel::from_code(0), None);
        assert_eq!(PriorityLevel::from_code(4), None);
        let parsed: Result<PriorityLevel, _> = serde_json::from_str("7");
        assert!(parsed.is_err());
        let parsed: Result<PriorityLevel, _> = serde_json::from_str("2");
        assert_eq!(parsed.ok(), Some(PriorityLevel::Urgent));
    }

    #[test]
    fn kind_accepts_legacy_table_names() {
        assert_eq!(SemaphoreKind::parse("t_semaphore"), Some(SemaphoreKind::Traffic));
        assert_eq!(SemaphoreKind::parse("Pedestrian"), Some(SemaphoreKind::Pedestrian));
        assert_eq!(SemaphoreKind::parse("controlbox"), None);
    }
}
