use serde::{Deserialize, Serialize};

use crate::packets::FieldMap;

/// Commands for the gripper attached to the wrist.
///
/// Grip positions are taught on the pendant and referred to by label.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum GripperCommand {
    Activate,
    Set { label: String },
    Get,
}

impl GripperCommand {
    pub fn set(label: impl Into<String>) -> Self {
        GripperCommand::Set { label: label.into() }
    }

    pub fn to_field_map(&self) -> FieldMap {
        match self {
            GripperCommand::Activate => FieldMap::new().with("action", "activate"),
            GripperCommand::Set { label } => {
                FieldMap::new().with("action", "set").with("label", label.as_str())
            }
            GripperCommand::Get => FieldMap::new().with("action", "get"),
        }
    }
}
