//! Terminal equipment domain events consumed by the indexer.
//!
//! The events are written by the equipment service; the indexer only decodes the subset
//! it needs. Payloads are camelCase JSON keyed by the stored type name:
//!
//! | Stored type | Payload |
//! |---|---|
//! | `terminal_equipment_placed_in_node_container` | `{nodeContainerId, equipment: {id, specificationId, name?}}` |
//! | `terminal_equipment_naming_info_changed` | `{terminalEquipmentId, namingInfo: {name?, description?}}` |
//! | `terminal_equipment_specification_added` | `{specification: {id, name}}` |
//! | `terminal_equipment_specification_changed` | `{terminalEquipmentId, newSpecificationId}` |
//! | `terminal_equipment_removed` | `{terminalEquipmentId}` |
//!
//! Unknown payload fields are ignored.

use equipment_search_core::event::{Event, EventError, SerializedEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every stored type name the equipment projection subscribes to.
pub const SUBSCRIBED_EVENT_TYPES: &[&str] = &[
    EventKind::Placed.type_name(),
    EventKind::NamingInfoChanged.type_name(),
    EventKind::SpecificationAdded.type_name(),
    EventKind::SpecificationChanged.type_name(),
    EventKind::Removed.type_name(),
];

/// The equipment part of a placement event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalEquipment {
    /// Equipment id
    pub id: Uuid,
    /// Specification the equipment was created from
    pub specification_id: Uuid,
    /// Display name, if any
    #[serde(default)]
    pub name: Option<String>,
}

/// A terminal equipment was placed in a node container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentPlaced {
    /// Container the equipment was placed in (not indexed)
    pub node_container_id: Uuid,
    /// The placed equipment
    pub equipment: TerminalEquipment,
}

/// Naming information of a terminal equipment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingInfo {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text description (not indexed)
    #[serde(default)]
    pub description: Option<String>,
}

/// The naming information of a terminal equipment changed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingInfoChanged {
    /// Equipment id
    pub terminal_equipment_id: Uuid,
    /// New naming information
    pub naming_info: NamingInfo,
}

/// A terminal equipment specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    /// Specification id
    pub id: Uuid,
    /// Specification name, matched against the allow-list
    pub name: String,
}

/// A terminal equipment specification was added to the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificationAdded {
    /// The new specification
    pub specification: Specification,
}

/// A terminal equipment was moved to another specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificationChanged {
    /// Equipment id
    pub terminal_equipment_id: Uuid,
    /// Specification the equipment now uses
    pub new_specification_id: Uuid,
}

/// A terminal equipment was removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRemoved {
    /// Equipment id
    pub terminal_equipment_id: Uuid,
}

/// Kind of an [`EquipmentEvent`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`EquipmentPlaced`]
    Placed,
    /// [`NamingInfoChanged`]
    NamingInfoChanged,
    /// [`SpecificationAdded`]
    SpecificationAdded,
    /// [`SpecificationChanged`]
    SpecificationChanged,
    /// [`EquipmentRemoved`]
    Removed,
}

impl EventKind {
    /// The stored type name of this kind.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Placed => "terminal_equipment_placed_in_node_container",
            Self::NamingInfoChanged => "terminal_equipment_naming_info_changed",
            Self::SpecificationAdded => "terminal_equipment_specification_added",
            Self::SpecificationChanged => "terminal_equipment_specification_changed",
            Self::Removed => "terminal_equipment_removed",
        }
    }

    /// Look up the kind for a stored type name.
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        [
            Self::Placed,
            Self::NamingInfoChanged,
            Self::SpecificationAdded,
            Self::SpecificationChanged,
            Self::Removed,
        ]
        .into_iter()
        .find(|kind| kind.type_name() == type_name)
    }
}

/// Every terminal equipment event the indexer handles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EquipmentEvent {
    /// Equipment placed
    Placed(EquipmentPlaced),
    /// Naming info changed
    NamingInfoChanged(NamingInfoChanged),
    /// Specification added
    SpecificationAdded(SpecificationAdded),
    /// Specification of an equipment changed
    SpecificationChanged(SpecificationChanged),
    /// Equipment removed
    Removed(EquipmentRemoved),
}

impl EquipmentEvent {
    /// An equipment placed in a fresh node container.
    #[must_use]
    pub fn placed(id: Uuid, name: Option<&str>, specification_id: Uuid) -> Self {
        Self::Placed(EquipmentPlaced {
            node_container_id: Uuid::new_v4(),
            equipment: TerminalEquipment {
                id,
                specification_id,
                name: name.map(str::to_string),
            },
        })
    }

    /// A rename (description left empty).
    #[must_use]
    pub fn renamed(id: Uuid, name: Option<&str>) -> Self {
        Self::NamingInfoChanged(NamingInfoChanged {
            terminal_equipment_id: id,
            naming_info: NamingInfo {
                name: name.map(str::to_string),
                description: None,
            },
        })
    }

    /// A specification added to the catalog.
    #[must_use]
    pub fn specification_added(id: Uuid, name: impl Into<String>) -> Self {
        Self::SpecificationAdded(SpecificationAdded {
            specification: Specification {
                id,
                name: name.into(),
            },
        })
    }

    /// An equipment moved to `new_specification_id`.
    #[must_use]
    pub const fn specification_changed(id: Uuid, new_specification_id: Uuid) -> Self {
        Self::SpecificationChanged(SpecificationChanged {
            terminal_equipment_id: id,
            new_specification_id,
        })
    }

    /// An equipment removed.
    #[must_use]
    pub const fn removed(id: Uuid) -> Self {
        Self::Removed(EquipmentRemoved {
            terminal_equipment_id: id,
        })
    }

    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Placed(_) => EventKind::Placed,
            Self::NamingInfoChanged(_) => EventKind::NamingInfoChanged,
            Self::SpecificationAdded(_) => EventKind::SpecificationAdded,
            Self::SpecificationChanged(_) => EventKind::SpecificationChanged,
            Self::Removed(_) => EventKind::Removed,
        }
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>, EventError> {
    serde_json::to_vec(payload).map_err(|e| EventError::SerializationError(e.to_string()))
}

impl Event for EquipmentEvent {
    fn event_type(&self) -> &'static str {
        self.kind().type_name()
    }

    fn to_bytes(&self) -> Result<Vec<u8>, EventError> {
        match self {
            Self::Placed(payload) => encode(payload),
            Self::NamingInfoChanged(payload) => encode(payload),
            Self::SpecificationAdded(payload) => encode(payload),
            Self::SpecificationChanged(payload) => encode(payload),
            Self::Removed(payload) => encode(payload),
        }
    }

    fn from_serialized(event: &SerializedEvent) -> Result<Self, EventError> {
        let kind = EventKind::from_type_name(&event.event_type)
            .ok_or_else(|| EventError::UnknownEventType(event.event_type.clone()))?;
        Ok(match kind {
            EventKind::Placed => Self::Placed(event.decode()?),
            EventKind::NamingInfoChanged => Self::NamingInfoChanged(event.decode()?),
            EventKind::SpecificationAdded => Self::SpecificationAdded(event.decode()?),
            EventKind::SpecificationChanged => Self::SpecificationChanged(event.decode()?),
            EventKind::Removed => Self::Removed(event.decode()?),
        })
    }
}
