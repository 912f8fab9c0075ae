//! The assembled core.
//!
//! [`AllwaysCore`] wires the registry, destination graph, router, crossing
//! handler and status reporter over one store and one status channel. It is
//! the handle the HTTP surface and the NATS bridge share.

use std::sync::Arc;

use allways_db::Store;
use allways_events::{EventFilter, StatusChannel, Subscription};
use allways_types::{
    CrossingResult, CrossingSubmission, EmergencySubmission, EmergencyVehicleRequest,
    PedestrianCrossingRequest, RoutingResult, StatusChange, StatusUpdateCommand,
    TagCrossingSubmission, TrafficSemaphore,
};

use crate::crossing::CrossingHandler;
use crate::destinations::DestinationGraph;
use crate::error::CoreError;
use crate::registry::Registry;
use crate::routing::EmergencyRouter;
use crate::status::StatusReporter;

/// Default row count for recent-log reads.
pub const DEFAULT_RECENT_LOG_LIMIT: u32 = 50;

/// Upper bound on a single recent-log read.
pub const MAX_RECENT_LOG_LIMIT: u32 = 1000;

/// Shared handle to every core operation.
#[derive(Clone)]
pub struct AllwaysCore {
    registry: Arc<Registry>,
    graph: DestinationGraph,
    router: EmergencyRouter,
    crossings: CrossingHandler,
    reporter: StatusReporter,
    recent_log_limit: u32,
}

impl AllwaysCore {
    /// Assemble the core over a store and a status channel.
    pub fn new(store: Arc<dyn Store>, channel: StatusChannel) -> Self {
        let graph = DestinationGraph::new(Arc::clone(&store));
        let registry = Arc::new(Registry::new(store, channel));
        Self {
            router: EmergencyRouter::new(Arc::clone(&registry), graph.clone()),
            crossings: CrossingHandler::new(Arc::clone(&registry)),
            reporter: StatusReporter::new(Arc::clone(&registry)),
            graph,
            registry,
            recent_log_limit: DEFAULT_RECENT_LOG_LIMIT,
        }
    }

    /// Set the row count used when a recent-log read gives no limit.
    #[must_use]
    pub fn with_recent_log_limit(mut self, limit: u32) -> Self {
        self.recent_log_limit = limit.clamp(1, MAX_RECENT_LOG_LIMIT);
        self
    }

    /// The device registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The status channel.
    pub fn channel(&self) -> &StatusChannel {
        self.registry.channel()
    }

    /// Subscribe to status events.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.registry.channel().subscribe(filter)
    }

    /// Route an emergency vehicle.
    pub async fn handle_emergency_request(
        &self,
        submission: EmergencySubmission,
    ) -> Result<RoutingResult, CoreError> {
        self.router.handle_emergency_request(submission).await
    }

    /// Log a pedestrian button press.
    pub async fn handle_crossing_request(
        &self,
        submission: CrossingSubmission,
    ) -> Result<CrossingResult, CoreError> {
        self.crossings.handle_crossing_request(submission).await
    }

    /// Log a pedestrian card-reader read.
    pub async fn handle_tag_crossing(
        &self,
        submission: TagCrossingSubmission,
    ) -> Result<CrossingResult, CoreError> {
        self.crossings.handle_tag_crossing(submission).await
    }

    /// Apply a controller self-report.
    pub async fn report_status(
        &self,
        command: StatusUpdateCommand,
    ) -> Result<Vec<StatusChange>, CoreError> {
        self.reporter.report_status(command).await
    }

    /// Traffic semaphores serving a destination.
    pub async fn semaphores_serving(
        &self,
        destination: i32,
    ) -> Result<Vec<TrafficSemaphore>, CoreError> {
        self.graph.semaphores_serving(destination).await
    }

    /// Most recent emergency requests, newest first.
    pub async fn recent_emergency_requests(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<EmergencyVehicleRequest>, CoreError> {
        self.router
            .recent_emergency_requests(self.resolve_limit(limit))
            .await
    }

    /// Most recent crossing requests, newest first.
    pub async fn recent_crossing_requests(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<PedestrianCrossingRequest>, CoreError> {
        self.crossings
            .recent_crossing_requests(self.resolve_limit(limit))
            .await
    }

    fn resolve_limit(&self, limit: Option<u32>) -> u32 {
        limit.map_or(self.recent_log_limit, |l| l.clamp(1, MAX_RECENT_LOG_LIMIT))
    }
}
