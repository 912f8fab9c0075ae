//! Status self-reports from field controllers.

use std::sync::Arc;

use allways_types::{
    IdentifierField, LightStatus, SemaphoreKind, StatusChange, StatusOrigin, StatusUpdateCommand,
};
use tracing::warn;

use crate::error::CoreError;
use crate::registry::Registry;

/// A status update command with every field resolved to its typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCommand {
    /// Semaphore kind addressed.
    pub kind: SemaphoreKind,
    /// How the semaphore is identified.
    pub field: IdentifierField,
    /// Raw identifier, interpreted according to `field`.
    pub value: serde_json::Value,
    /// Status to apply.
    pub status: LightStatus,
}

/// Resolve the raw command fields. Unknown kinds and identifier fields are
/// rejected, as are status codes outside 0/1/2 and any update field other
/// than `status`.
pub fn normalize(command: StatusUpdateCommand) -> Result<NormalizedCommand, CoreError> {
    let kind = SemaphoreKind::parse(&command.entity_kind).ok_or_else(|| {
        CoreError::validation(format!("unknown entity kind {:?}", command.entity_kind))
    })?;
    let field = IdentifierField::parse(&command.identifier_field).ok_or_else(|| {
        CoreError::validation(format!(
            "unknown identifier field {:?}",
            command.identifier_field
        ))
    })?;
    if let Some(update_field) = command
        .update_field
        .as_deref()
        .filter(|field| field.trim() != "status")
    {
        return Err(CoreError::validation(format!(
            "update field {update_field:?} is not writable"
        )));
    }
    let status = LightStatus::from_wire(&command.new_status).ok_or_else(|| {
        CoreError::validation(format!("unknown status {}", command.new_status))
    })?;
    Ok(NormalizedCommand {
        kind,
        field,
        value: command.identifier_value,
        status,
    })
}

/// Applies controller self-reports through the registry.
#[derive(Clone)]
pub struct StatusReporter {
    registry: Arc<Registry>,
}

impl StatusReporter {
    /// Create a reporter over the registry.
    pub const fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Apply a self-report to every semaphore the identifier resolves to.
    ///
    /// A location can address several semaphores; each gets its own status
    /// write and the changes are returned in resolution order.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] for an unknown kind, field or status code,
    /// raised before anything is written; [`CoreError::NotFound`] when the
    /// identifier matches nothing.
    pub async fn report_status(
        &self,
        command: StatusUpdateCommand,
    ) -> Result<Vec<StatusChange>, CoreError> {
        let command = normalize(command)?;
        let targets = self
            .registry
            .find_semaphores(command.kind, command.field, &command.value)
            .await?;
        if targets.is_empty() {
            return Err(CoreError::not_found(
                match command.kind {
                    SemaphoreKind::Traffic => "traffic semaphore",
                    SemaphoreKind::Pedestrian => "pedestrian semaphore",
                },
                &command.value,
            ));
        }

        let mut changes = Vec::with_capacity(targets.len());
        for target in targets {
            match self
                .registry
                .set_status(command.kind, target.id(), command.status, StatusOrigin::SelfReport)
                .await
            {
                Ok(change) => changes.push(change),
                Err(CoreError::NotFound { .. }) => {
                    warn!(semaphore_id = %target.id(), "Semaphore removed during self-report");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(changes)
    }
}
