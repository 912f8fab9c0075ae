//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every registry entity and log row has a strongly-typed ID so a control
//! box id can never be passed where a semaphore id is expected. IDs
//! generated application-side use UUID v7 (time-ordered).
//!
//! The pedestrian registrant is the exception: it is keyed by its civil
//! identity number ([`CivilId`]), which is assigned outside the system.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a control box (field cabinet).
    ControlBoxId
}

define_id! {
    /// Unique identifier for a semaphore of either kind.
    ///
    /// Traffic and pedestrian semaphores share one id space; the
    /// [`SemaphoreKind`](crate::SemaphoreKind) travels alongside the id
    /// wherever the kind matters.
    SemaphoreId
}

define_id! {
    /// Unique identifier for a traffic-management-center account.
    TmcId
}

define_id! {
    /// Unique identifier for an emergency-vehicle log row.
    EmergencyRequestId
}

define_id! {
    /// Unique identifier for a pedestrian-crossing log row.
    CrossingRequestId
}

/// Civil identity number of a registered pedestrian.
///
/// Immutable once the registrant is created. Compared byte-for-byte after
/// surrounding whitespace is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(transparent)]
pub struct CivilId(String);

impl CivilId {
    /// Build a civil id, trimming surrounding whitespace.
    ///
    /// Returns `None` for an empty (or all-whitespace) value.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// Borrow the civil id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CivilId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let control_box = ControlBoxId::new();
        let semaphore = SemaphoreId::new();
        assert_ne!(control_box.into_inner(), Uuid::nil());
        assert_ne!(semaphore.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_parses_from_uuid_string() {
        let id = SemaphoreId::new();
        let parsed: Result<SemaphoreId, _> = id.to_string().parse();
        assert_eq!(parsed.ok(), Some(id));
        assert!("not-a-uuid".parse::<SemaphoreId>().is_err());
    }

    #[test]
    fn civil_id_rejects_blank() {
        assert!(CivilId::parse("   ").is_none());
        assert_eq!(
            CivilId::parse(" 12345678 ").map(|c| c.as_str().to_owned()),
            Some(String::from("12345678"))
        );
    }

    #[test]
    fn civil_id_serializes_as_plain_string() {
        let id = CivilId::parse("99887766");
        let json = id.as_ref().and_then(|c| serde_json::to_string(c).ok());
        assert_eq!(json.as_deref(), Some("\"99887766\""));
    }
}
