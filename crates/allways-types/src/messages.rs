//! Inbound message shapes and operation results.
//!
//! Submissions are deliberately loose: every field a field device or
//! dashboard may omit is optional here, and the core turns a missing field
//! into a validation error instead of a deserialization failure. Field
//! names accept both the camelCase wire form and the legacy column names
//! older controllers still send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{LightStatus, SemaphoreKind};
use crate::ids::{ControlBoxId, SemaphoreId, TmcId};
use crate::structs::{EmergencyVehicleRequest, PedestrianCrossingRequest};

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// Emergency-vehicle dispatch as received from a TMC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct EmergencySubmission {
    /// Requesting TMC account.
    #[serde(default, alias = "tmcid")]
    pub tmc_id: Option<TmcId>,
    /// Control box the vehicle is at.
    #[serde(default, alias = "controlbox_id")]
    pub control_box_id: Option<ControlBoxId>,
    /// Vehicle license plate.
    #[serde(default, alias = "licenseplate")]
    pub license_plate: Option<String>,
    /// Location the vehicle is coming from.
    #[serde(default)]
    pub origin: Option<i32>,
    /// Destination number the vehicle is heading to.
    #[serde(default)]
    pub destination: Option<i32>,
    /// Raw urgency code; only `1..=3` are accepted.
    #[serde(default, alias = "priority_level")]
    pub priority_level: Option<i64>,
    /// Request time; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_identifier_field() -> String {
    String::from("id")
}

/// Status self-report from a field controller.
///
/// Kind, identifier field and status are kept raw so the core can reject
/// unknown values with a precise message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateCommand {
    /// `"traffic"` or `"pedestrian"` (legacy table names accepted).
    #[serde(alias = "table")]
    pub entity_kind: String,
    /// `"id"` or `"location"`.
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,
    /// UUID string for `id`, integer for `location`.
    pub identifier_value: serde_json::Value,
    /// Column being written. Older controllers send it; only `"status"`
    /// is writable.
    #[serde(default)]
    pub update_field: Option<String>,
    /// Numeric code `0`/`1`/`2` or a status name.
    #[serde(alias = "updateValue")]
    pub new_status: serde_json::Value,
}

/// Pedestrian button press at a pedestrian semaphore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct CrossingSubmission {
    /// Pedestrian semaphore the button belongs to.
    #[serde(alias = "psem_id")]
    pub semaphore_id: SemaphoreId,
    /// Civil id of the pedestrian, if known. Blank means anonymous.
    #[serde(default, alias = "pedestrianCC_id")]
    pub pedestrian_id: Option<String>,
    /// Press time; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Card-reader read at a pedestrian semaphore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct TagCrossingSubmission {
    /// Pedestrian semaphore the reader belongs to.
    #[serde(alias = "psem_id")]
    pub semaphore_id: SemaphoreId,
    /// Physical tag id read from the card.
    #[serde(alias = "physicaltag_id")]
    pub physical_tag: String,
    /// Read time; defaults to receipt time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Committed effect of one status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// Semaphore written.
    pub semaphore_id: SemaphoreId,
    /// Its kind.
    pub kind: SemaphoreKind,
    /// Owning control box.
    pub control_box_id: ControlBoxId,
    /// Status before the write.
    pub previous: LightStatus,
    /// Status as committed by the store.
    pub current: LightStatus,
}

impl StatusChange {
    /// Whether the write produced a visible transition.
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// What routing did to one candidate semaphore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SemaphoreOutcome {
    /// The light was switched.
    Changed {
        /// Light before preemption.
        previous: LightStatus,
    },
    /// The light already had the desired status.
    Unchanged,
    /// The write failed; other candidates are unaffected.
    Failed {
        /// Failure description.
        error: String,
    },
}

/// Routing outcome for a single candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct SemaphoreRouting {
    /// Candidate semaphore.
    pub semaphore_id: SemaphoreId,
    /// What happened to it.
    pub outcome: SemaphoreOutcome,
}

/// Result of handling an emergency-vehicle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct RoutingResult {
    /// The logged request.
    pub request: EmergencyVehicleRequest,
    /// Candidates now in priority state, in routing order.
    pub affected: Vec<SemaphoreId>,
    /// Per-candidate outcomes, in routing order.
    pub outcomes: Vec<SemaphoreRouting>,
}

impl RoutingResult {
    /// Whether at least one candidate failed.
    pub fn is_partial(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.outcome, SemaphoreOutcome::Failed { .. }))
    }

    /// Ids of the candidates whose write failed.
    pub fn failed(&self) -> Vec<SemaphoreId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, SemaphoreOutcome::Failed { .. }))
            .map(|o| o.semaphore_id)
            .collect()
    }
}

/// Result of handling a pedestrian-crossing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "camelCase")]
pub struct CrossingResult {
    /// The logged request.
    pub request: PedestrianCrossingRequest,
    /// Whether the request was attributed to a registered pedestrian.
    /// On the card-reader path this is the validity flag returned to the
    /// field device.
    pub attributed: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::enums::PriorityLevel;
    use crate::ids::EmergencyRequestId;

    #[test]
    fn emergency_submission_accepts_legacy_names() {
        let tmc = TmcId::new();
        let cb = ControlBoxId::new();
        let raw = format!(
            r#"{{"tmcid":"{tmc}","controlbox_id":"{cb}","licenseplate":"AA-00-BB","origin":2,"destination":7,"priority_level":1}}"#
        );
        let parsed: EmergencySubmission = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.tmc_id, Some(tmc));
        assert_eq!(parsed.control_box_id, Some(cb));
        assert_eq!(parsed.license_plate.as_deref(), Some("AA-00-BB"));
        assert_eq!(parsed.priority_level, Some(1));
        assert!(parsed.timestamp.is_none());
    }

    #[test]
    fn status_command_defaults_identifier_field() {
        let raw = r#"{"entityKind":"traffic","identifierValue":3,"newStatus":1}"#;
        let parsed: StatusUpdateCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.identifier_field, "id");
        assert_eq!(parsed.update_field, None);
    }

    #[test]
    fn status_command_reads_legacy_update_field() {
        let raw = r#"{"table":"t_semaphore","identifierField":"location","identifierValue":3,"updateField":"status","updateValue":2}"#;
        let parsed: StatusUpdateCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.update_field.as_deref(), Some("status"));
        assert_eq!(parsed.new_status, serde_json::json!(2));
    }

    #[test]
    fn routing_result_reports_failures() {
        let ok = SemaphoreId::new();
        let broken = SemaphoreId::new();
        let result = RoutingResult {
            request: EmergencyVehicleRequest {
                id: EmergencyRequestId::new(),
                tmc_id: TmcId::new(),
                control_box_id: ControlBoxId::new(),
                license_plate: String::from("AA-00-BB"),
                origin: 1,
                destination: 7,
                priority_level: PriorityLevel::Critical,
                timestamp: Utc::now(),
            },
            affected: vec![ok],
            outcomes: vec![
                SemaphoreRouting {
                    semaphore_id: ok,
                    outcome: SemaphoreOutcome::Changed {
                        previous: LightStatus::Red,
                    },
                },
                SemaphoreRouting {
                    semaphore_id: broken,
                    outcome: SemaphoreOutcome::Failed {
                        error: String::from("store unavailable"),
                    },
                },
            ],
        };
        assert!(result.is_partial());
        assert_eq!(result.failed(), vec![broken]);
    }
}
