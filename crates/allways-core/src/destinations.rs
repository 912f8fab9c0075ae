//! Destination graph: which traffic semaphores serve a destination.

use std::sync::Arc;

use allways_db::Store;
use allways_types::TrafficSemaphore;

use crate::error::CoreError;

/// Read view over the destination sets stored with each traffic semaphore.
///
/// Every call goes to the store, so a lookup always reflects the most
/// recent committed upsert.
#[derive(Clone)]
pub struct DestinationGraph {
    store: Arc<dyn Store>,
}

impl DestinationGraph {
    /// Create a graph over `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Traffic semaphores whose destination set contains `destination`,
    /// ordered by `(location, id)`.
    pub async fn semaphores_serving(
        &self,
        destination: i32,
    ) -> Result<Vec<TrafficSemaphore>, CoreError> {
        let mut serving = self.store.traffic_serving(destination).await?;
        serving.sort_by_key(|s| (s.location, s.id));
        Ok(serving)
    }
}
