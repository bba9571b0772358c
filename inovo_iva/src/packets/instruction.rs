use serde::{Deserialize, Serialize};

use super::FieldMap;
use crate::codec::ResponseKind;
use crate::commands::{GripperCommand, IoCommand, RobotCommand};
use crate::CommandError;

/// What a `get` instruction reads back from the controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CurrentKind {
    Transform,
    JointCoord,
}

impl CurrentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurrentKind::Transform => "transform",
            CurrentKind::JointCoord => "joint_coord",
        }
    }
}

/// Top-level envelope sent to the IVA runtime, one per line.
///
/// The `type` field always comes first, followed by the envelope's own fields
/// and then the fields of the wrapped descriptor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Run a command now. With `enter_context` the controller keeps it
    /// active until the matching [`Instruction::Pop`].
    Execute { command: RobotCommand, enter_context: bool },
    /// Buffer a command on the controller without running it.
    Enqueue(RobotCommand),
    /// Run everything buffered so far as a single block.
    Dequeue { enter_context: bool },
    Pop,
    Io(IoCommand),
    Gripper(GripperCommand),
    GetCurrent(CurrentKind),
    GetData { key: String },
    Custom(FieldMap),
}

impl Instruction {
    pub fn op_code(&self) -> &'static str {
        match self {
            Instruction::Execute { .. } => "execute",
            Instruction::Enqueue(_) => "enqueue",
            Instruction::Dequeue { .. } => "dequeue",
            Instruction::Pop => "pop",
            Instruction::Io(_) => "io",
            Instruction::Gripper(_) => "gripper",
            Instruction::GetCurrent(_) | Instruction::GetData { .. } => "get",
            Instruction::Custom(_) => "custom",
        }
    }

    /// Whether an `OK` for this instruction opens a context on the
    /// controller.
    pub fn enters_context(&self) -> bool {
        matches!(
            self,
            Instruction::Execute { enter_context: true, .. }
                | Instruction::Dequeue { enter_context: true }
        )
    }

    /// Checks the wrapped descriptor the way its constructor would.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Instruction::Execute { command, .. } | Instruction::Enqueue(command) => {
                command.validate()
            }
            Instruction::Io(command) => command.validate(),
            _ => Ok(()),
        }
    }

    pub fn expected_response(&self) -> ResponseKind {
        match self {
            Instruction::Io(IoCommand::Get { .. }) => ResponseKind::Digital,
            Instruction::Gripper(GripperCommand::Get) => ResponseKind::Gripper,
            Instruction::GetCurrent(CurrentKind::Transform) => ResponseKind::Transform,
            Instruction::GetCurrent(CurrentKind::JointCoord) => ResponseKind::JointCoord,
            Instruction::GetData { .. } | Instruction::Custom(_) => ResponseKind::Data,
            _ => ResponseKind::Ack,
        }
    }

    pub fn to_field_map(&self) -> FieldMap {
        let mut map = FieldMap::new().with("type", self.op_code());
        match self {
            Instruction::Execute { command, enter_context } => {
                map.insert("enter_context", *enter_context);
                map.extend(command.to_field_map());
            }
            Instruction::Enqueue(command) => map.extend(command.to_field_map()),
            Instruction::Dequeue { enter_context } => {
                map.insert("enter_context", *enter_context);
            }
            Instruction::Pop => {}
            Instruction::Io(io) => map.extend(io.to_field_map()),
            Instruction::Gripper(gripper) => map.extend(gripper.to_field_map()),
            Instruction::GetCurrent(kind) => {
                map.insert("target", kind.as_str());
            }
            Instruction::GetData { key } => {
                map.insert("target", "data");
                map.insert("key", key.as_str());
            }
            // Caller fields are merged last and may override `type`.
            Instruction::Custom(fields) => map.extend(fields.clone()),
        }
        map
    }
}

impl From<IoCommand> for Instruction {
    fn from(value: IoCommand) -> Self {
        Instruction::Io(value)
    }
}

impl From<GripperCommand> for Instruction {
    fn from(value: GripperCommand) -> Self {
        Instruction::Gripper(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{IntoRobotCommand, IoTarget};
    use crate::geometry::Transform;

    #[test]
    fn execute_puts_envelope_fields_first() {
        let cmd = Transform::from_z(10.0).as_linear().unwrap();
        let map = Instruction::Execute { command: cmd, enter_context: true }.to_field_map();
        let keys: Vec<_> = map.keys().collect();

        assert_eq!(&keys[..4], &["type", "enter_context", "action", "mode"]);
        assert_eq!(map.get_f64("enter_context"), Some(1.0));
    }

    #[test]
    fn only_scoped_execute_and_dequeue_enter_context() {
        let cmd = RobotCommand::synchronize();
        let scoped = |enter_context| Instruction::Execute {
            command: cmd.clone(),
            enter_context,
        };
        assert!(scoped(true).enters_context());
        assert!(!scoped(false).enters_context());
        assert!(!Instruction::Enqueue(cmd).enters_context());
        assert!(Instruction::Dequeue { enter_context: true }.enters_context());
        assert!(!Instruction::Pop.enters_context());
    }

    #[test]
    fn get_variants_share_op_code() {
        let data = Instruction::GetData { key: "part_count".into() }.to_field_map();
        assert_eq!(data.get_str("type"), Some("get"));
        assert_eq!(data.get_str("target"), Some("data"));
        assert_eq!(data.get_str("key"), Some("part_count"));

        let joints = Instruction::GetCurrent(CurrentKind::JointCoord);
        assert_eq!(joints.expected_response(), ResponseKind::JointCoord);
    }

    #[test]
    fn io_get_expects_digital_reply() {
        let io = IoCommand::get(IoTarget::Wrist, 0).unwrap();
        assert_eq!(Instruction::from(io).expected_response(), ResponseKind::Digital);
        let set = IoCommand::set(IoTarget::Wrist, 0, false).unwrap();
        assert_eq!(Instruction::from(set).expected_response(), ResponseKind::Ack);
    }
}
