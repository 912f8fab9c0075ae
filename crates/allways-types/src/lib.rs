//! Shared type definitions for the AllWays traffic coordination core.
//!
//! This crate is the single source of truth for the types used across the
//! AllWays workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the monitoring dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity and log identifiers
//! - [`enums`] -- Light status, semaphore kind, priority tiers, event kinds
//! - [`structs`] -- Registry entities, log rows and read models
//! - [`messages`] -- Inbound submissions and operation results
//! - [`events`] -- Events carried on the status channel

pub mod enums;
pub mod events;
pub mod ids;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventKind, IdentifierField, LightStatus, PriorityLevel, SemaphoreKind, StatusOrigin};
pub use events::StatusEvent;
pub use ids::{CivilId, ControlBoxId, CrossingRequestId, EmergencyRequestId, SemaphoreId, TmcId};
pub use messages::{
    CrossingResult, CrossingSubmission, EmergencySubmission, RoutingResult, SemaphoreOutcome,
    SemaphoreRouting, StatusChange, StatusUpdateCommand, TagCrossingSubmission,
};
pub use structs::{
    ControlBox, ControlBoxDraft, ControlBoxView, EmergencyVehicleRequest, Pedestrian,
    PedestrianCrossingRequest, PedestrianSemaphore, PedestrianSemaphoreDraft, RegistrySnapshot,
    Semaphore, TrafficSemaphore, TrafficSemaphoreDraft,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::ControlBoxId::export_all();
        let _ = crate::ids::SemaphoreId::export_all();
        let _ = crate::ids::TmcId::export_all();
        let _ = crate::ids::EmergencyRequestId::export_all();
        let _ = crate::ids::CrossingRequestId::export_all();
        let _ = crate::ids::CivilId::export_all();

        // Enums
        let _ = crate::enums::LightStatus::export_all();
        let _ = crate::enums::SemaphoreKind::export_all();
        let _ = crate::enums::StatusOrigin::export_all();
        let _ = crate::enums::EventKind::export_all();
        let _ = crate::enums::IdentifierField::export_all();

        // Structs
        let _ = crate::structs::ControlBox::export_all();
        let _ = crate::structs::ControlBoxDraft::export_all();
        let _ = crate::structs::TrafficSemaphore::export_all();
        let _ = crate::structs::TrafficSemaphoreDraft::export_all();
        let _ = crate::structs::PedestrianSemaphore::export_all();
        let _ = crate::structs::PedestrianSemaphoreDraft::export_all();
        let _ = crate::structs::Semaphore::export_all();
        let _ = crate::structs::Pedestrian::export_all();
        let _ = crate::structs::EmergencyVehicleRequest::export_all();
        let _ = crate::structs::PedestrianCrossingRequest::export_all();
        let _ = crate::structs::ControlBoxView::export_all();
        let _ = crate::structs::RegistrySnapshot::export_all();

        // Messages and events
        let _ = crate::messages::EmergencySubmission::export_all();
        let _ = crate::messages::StatusUpdateCommand::export_all();
        let _ = crate::messages::CrossingSubmission::export_all();
        let _ = crate::messages::TagCrossingSubmission::export_all();
        let _ = crate::messages::StatusChange::export_all();
        let _ = crate::messages::SemaphoreOutcome::export_all();
        let _ = crate::messages::SemaphoreRouting::export_all();
        let _ = crate::messages::RoutingResult::export_all();
        let _ = crate::messages::CrossingResult::export_all();
        let _ = crate::events::StatusEvent::export_all();
    }
}
