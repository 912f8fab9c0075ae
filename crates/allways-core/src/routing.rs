//! Emergency-vehicle routing.
//!
//! A dispatch is validated, every traffic semaphore serving its destination
//! is forced GREEN through the registry's status write path, and the request
//! is appended to the emergency log. Semaphores are switched independently:
//! one failure is recorded in the result and does not stop the others.
//! Nothing reverts a preempted semaphore; it stays GREEN until the next
//! self-report.

use std::sync::Arc;

use allways_types::{
    EmergencyRequestId, EmergencySubmission, EmergencyVehicleRequest, LightStatus, PriorityLevel,
    RoutingResult, SemaphoreKind, SemaphoreOutcome, SemaphoreRouting, StatusEvent, StatusOrigin,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::destinations::DestinationGraph;
use crate::error::CoreError;
use crate::registry::Registry;

/// Handles emergency-vehicle dispatches.
#[derive(Clone)]
pub struct EmergencyRouter {
    registry: Arc<Registry>,
    graph: DestinationGraph,
}

impl EmergencyRouter {
    /// Create a router over the registry and destination graph.
    pub const fn new(registry: Arc<Registry>, graph: DestinationGraph) -> Self {
        Self { registry, graph }
    }

    /// Route an emergency vehicle and log the request.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] when a field is missing or the priority
    ///   code is outside `1..=3`
    /// - [`CoreError::NotFound`] when the control box does not exist
    /// - [`CoreError::PersistenceUnavailable`] when the candidates cannot be
    ///   resolved or the log append fails
    pub async fn handle_emergency_request(
        &self,
        submission: EmergencySubmission,
    ) -> Result<RoutingResult, CoreError> {
        let request = validate(submission)?;
        let _ = self.registry.get_control_box(request.control_box_id).await?;

        let candidates = self.graph.semaphores_serving(request.destination).await?;
        info!(
            license_plate = %request.license_plate,
            destination = request.destination,
            priority = request.priority_level.code(),
            candidates = candidates.len(),
            "Routing emergency vehicle"
        );

        let mut affected = Vec::with_capacity(candidates.len());
        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let outcome = match self
                .registry
                .set_status(
                    SemaphoreKind::Traffic,
                    candidate.id,
                    LightStatus::Green,
                    StatusOrigin::EmergencyPreemption,
                )
                .await
            {
                Ok(change) if change.changed() => {
                    affected.push(candidate.id);
                    SemaphoreOutcome::Changed {
                        previous: change.previous,
                    }
                }
                Ok(_) => {
                    warn!(
                        semaphore_id = %candidate.id,
                        destination = request.destination,
                        "Semaphore already in priority state"
                    );
                    affected.push(candidate.id);
                    SemaphoreOutcome::Unchanged
                }
                Err(e) => {
                    warn!(
                        semaphore_id = %candidate.id,
                        error = %e,
                        "Preemption failed"
                    );
                    SemaphoreOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(SemaphoreRouting {
                semaphore_id: candidate.id,
                outcome,
            });
        }

        let request = self.registry.store().append_emergency(request).await?;
        self.registry
            .channel()
            .publish(StatusEvent::EmergencyVehicleLogged {
                record: request.clone(),
                at: Utc::now(),
            });

        let result = RoutingResult {
            request,
            affected,
            outcomes,
        };
        if result.is_partial() {
            warn!(
                request_id = %result.request.id,
                failed = result.failed().len(),
                "Emergency routing partially applied"
            );
        }
        Ok(result)
    }

    /// Most recent emergency requests, newest first.
    pub async fn recent_emergency_requests(
        &self,
        limit: u32,
    ) -> Result<Vec<EmergencyVehicleRequest>, CoreError> {
        Ok(self.registry.store().recent_emergency(limit).await?)
    }
}

fn validate(submission: EmergencySubmission) -> Result<EmergencyVehicleRequest, CoreError> {
    let license_plate = submission
        .license_plate
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| missing("licensePlate"))?;
    let tmc_id = submission.tmc_id.ok_or_else(|| missing("tmcId"))?;
    let control_box_id = submission
        .control_box_id
        .ok_or_else(|| missing("controlBoxId"))?;
    let origin = submission.origin.ok_or_else(|| missing("origin"))?;
    let destination = submission.destination.ok_or_else(|| missing("destination"))?;
    let code = submission
        .priority_level
        .ok_or_else(|| missing("priorityLevel"))?;
    let priority_level = PriorityLevel::from_code(code).ok_or_else(|| {
        CoreError::validation(format!("priority level {code} is not an urgency tier (1..=3)"))
    })?;

    Ok(EmergencyVehicleRequest {
        id: EmergencyRequestId::new(),
        tmc_id,
        control_box_id,
        license_plate,
        origin,
        destination,
        priority_level,
        timestamp: submission.timestamp.unwrap_or_else(Utc::now),
    })
}

fn missing(field: &str) -> CoreError {
    CoreError::validation(format!("{field} is required"))
}
