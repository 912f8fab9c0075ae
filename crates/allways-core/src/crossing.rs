//! Pedestrian crossing requests.
//!
//! A button press or card-reader read at a pedestrian semaphore is logged
//! and announced on the status channel. The semaphore's light is left to
//! the field controller.

use std::sync::Arc;

use allways_types::{
    CivilId, ControlBoxId, CrossingRequestId, CrossingResult, CrossingSubmission,
    PedestrianCrossingRequest, SemaphoreId, SemaphoreKind, StatusEvent, TagCrossingSubmission,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::registry::Registry;

/// Handles pedestrian crossing requests.
#[derive(Clone)]
pub struct CrossingHandler {
    registry: Arc<Registry>,
}

impl CrossingHandler {
    /// Create a handler over the registry.
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Log a button press. An identity that is blank or not registered is
    /// recorded as anonymous.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] when the pedestrian semaphore does not exist;
    /// [`CoreError::PersistenceUnavailable`] when the log append fails.
    pub async fn handle_crossing_request(
        &self,
        submission: CrossingSubmission,
    ) -> Result<CrossingResult, CoreError> {
        let control_box_id = self.semaphore_owner(submission.semaphore_id).await?;

        let pedestrian_id = match submission.pedestrian_id.as_deref().and_then(CivilId::parse) {
            Some(cc_id) => {
                let registered = self.registry.store().get_pedestrian(&cc_id).await?;
                if registered.is_none() {
                    debug!(cc_id = %cc_id, "Unregistered pedestrian, logging anonymously");
                }
                registered.map(|p| p.cc_id)
            }
            None => None,
        };

        self.record(
            submission.semaphore_id,
            control_box_id,
            pedestrian_id,
            submission.timestamp,
        )
        .await
    }

    /// Log a card-reader read. `attributed` in the result tells the reader
    /// whether the tag belongs to a registered pedestrian.
    ///
    /// # Errors
    ///
    /// Same as [`handle_crossing_request`](Self::handle_crossing_request).
    pub async fn handle_tag_crossing(
        &self,
        submission: TagCrossingSubmission,
    ) -> Result<CrossingResult, CoreError> {
        let control_box_id = self.semaphore_owner(submission.semaphore_id).await?;
        let holder = self
            .registry
            .find_pedestrian_by_tag(&submission.physical_tag)
            .await?;
        if holder.is_none() {
            debug!(
                semaphore_id = %submission.semaphore_id,
                "Unrecognized tag, logging anonymously"
            );
        }

        self.record(
            submission.semaphore_id,
            control_box_id,
            holder.map(|p| p.cc_id),
            submission.timestamp,
        )
        .await
    }

    /// Most recent crossing requests, newest first.
    pub async fn recent_crossing_requests(
        &self,
        limit: u32,
    ) -> Result<Vec<PedestrianCrossingRequest>, CoreError> {
        Ok(self.registry.store().recent_crossings(limit).await?)
    }

    async fn semaphore_owner(&self, semaphore_id: SemaphoreId) -> Result<ControlBoxId, CoreError> {
        self.registry
            .get_semaphore(SemaphoreKind::Pedestrian, semaphore_id)
            .await
            .map(|s| s.control_box_id())
    }

    async fn record(
        &self,
        semaphore_id: SemaphoreId,
        control_box_id: ControlBoxId,
        pedestrian_id: Option<CivilId>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<CrossingResult, CoreError> {
        let attributed = pedestrian_id.is_some();
        let request = self
            .registry
            .store()
            .append_crossing(PedestrianCrossingRequest {
                id: CrossingRequestId::new(),
                semaphore_id,
                pedestrian_id,
                timestamp: timestamp.unwrap_or_else(Utc::now),
            })
            .await?;

        self.registry
            .channel()
            .publish(StatusEvent::PedestrianRequestLogged {
                record: request.clone(),
                control_box_id,
                at: Utc::now(),
            });
        info!(semaphore_id = %semaphore_id, attributed, "Crossing request logged");

        Ok(CrossingResult {
            request,
            attributed,
        })
    }
}
