//! Device registry, emergency routing and pedestrian crossing handling for
//! AllWays.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `allways-config.yaml`.
//! - [`registry`] -- Control boxes, semaphores, pedestrians, and the single
//!   status write path.
//! - [`destinations`] -- Destination-number to traffic-semaphore lookups.
//! - [`routing`] -- Emergency-vehicle preemption and the emergency log.
//! - [`crossing`] -- Pedestrian button and card-reader requests.
//! - [`status`] -- Field controller status self-reports.
//! - [`service`] -- [`AllwaysCore`], the assembled handle.
//!
//! Every status transition goes through
//! [`Registry::set_status`](registry::Registry::set_status), which publishes
//! the committed value on the status channel.

pub mod config;
pub mod crossing;
pub mod destinations;
pub mod error;
pub mod registry;
pub mod routing;
pub mod service;
pub mod status;

pub use config::{AllwaysConfig, ConfigError, StorageBackend};
pub use error::CoreError;
pub use registry::{Registry, SemaphoreDraft};
pub use service::AllwaysCore;
