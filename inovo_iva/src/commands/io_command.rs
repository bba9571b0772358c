use serde::{Deserialize, Serialize};

use crate::packets::FieldMap;
use crate::CommandError;

/// Digital IO banks reachable through the IVA runtime.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IoTarget {
    /// Beckhoff EtherCAT terminal in the control box, ports 0..=7.
    Beckhoff,
    /// Wrist connector, ports 0..=1.
    Wrist,
}

impl IoTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            IoTarget::Beckhoff => "beckhoff",
            IoTarget::Wrist => "wrist",
        }
    }

    pub fn max_port(&self) -> u8 {
        match self {
            IoTarget::Beckhoff => 7,
            IoTarget::Wrist => 1,
        }
    }

    fn check_port(&self, port: u8) -> Result<(), CommandError> {
        if port > self.max_port() {
            return Err(CommandError::ParameterOutOfRange {
                field: "port",
                value: port as f64,
                min: 0.0,
                max: self.max_port() as f64,
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCommand {
    Get { target: IoTarget, port: u8 },
    Set { target: IoTarget, port: u8, state: bool },
}

impl IoCommand {
    pub fn get(target: IoTarget, port: u8) -> Result<Self, CommandError> {
        target.check_port(port)?;
        Ok(IoCommand::Get { target, port })
    }

    pub fn set(target: IoTarget, port: u8, state: bool) -> Result<Self, CommandError> {
        target.check_port(port)?;
        Ok(IoCommand::Set { target, port, state })
    }

    /// Port check for commands built from the variants directly.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            IoCommand::Get { target, port } | IoCommand::Set { target, port, .. } => {
                target.check_port(*port)
            }
        }
    }

    pub fn target(&self) -> IoTarget {
        match self {
            IoCommand::Get { target, .. } | IoCommand::Set { target, .. } => *target,
        }
    }

    pub fn to_field_map(&self) -> FieldMap {
        match self {
            IoCommand::Get { target, port } => FieldMap::new()
                .with("action", "get")
                .with("target", target.as_str())
                .with("port", *port),
            IoCommand::Set { target, port, state } => FieldMap::new()
                .with("action", "set")
                .with("target", target.as_str())
                .with("port", *port)
                .with("state", *state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range_depends_on_bank() {
        assert!(IoCommand::get(IoTarget::Beckhoff, 7).is_ok());
        assert!(IoCommand::set(IoTarget::Wrist, 1, true).is_ok());
        assert!(matches!(
            IoCommand::set(IoTarget::Wrist, 2, true),
            Err(CommandError::ParameterOutOfRange { field: "port", .. })
        ));
        assert!(IoCommand::get(IoTarget::Beckhoff, 8).is_err());
    }

    #[test]
    fn set_encodes_state_as_number() {
        let map = IoCommand::set(IoTarget::Beckhoff, 3, true).unwrap().to_field_map();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["action", "target", "port", "state"]);
        assert_eq!(map.get_f64("state"), Some(1.0));
        assert_eq!(map.get_str("target"), Some("beckhoff"));
    }
}
