use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{JointCoord, Transform};
use crate::packets::FieldMap;
use crate::CommandError;

/// Interpolation of a motion and whether its target is relative to the
/// current position.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MotionMode {
    Linear,
    LinearRelative,
    Joint,
    JointRelative,
}

impl MotionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionMode::Linear => "linear",
            MotionMode::LinearRelative => "linear_relative",
            MotionMode::Joint => "joint",
            MotionMode::JointRelative => "joint_relative",
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self, MotionMode::LinearRelative | MotionMode::JointRelative)
    }
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MotionMode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(MotionMode::Linear),
            "linear_relative" => Ok(MotionMode::LinearRelative),
            "joint" => Ok(MotionMode::Joint),
            "joint_relative" => Ok(MotionMode::JointRelative),
            other => Err(CommandError::InvalidTarget(format!("unknown motion mode `{}`", other))),
        }
    }
}

/// What a motion moves to: a Cartesian pose or a joint configuration, never
/// both.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum MotionTarget {
    Transform(Transform),
    JointCoord(JointCoord),
}

impl MotionTarget {
    pub fn to_field_map(&self) -> FieldMap {
        match self {
            MotionTarget::Transform(t) => FieldMap::new()
                .with("target", "transform")
                .with("x", t.x())
                .with("y", t.y())
                .with("z", t.z())
                .with("rx", t.rx())
                .with("ry", t.ry())
                .with("rz", t.rz()),
            MotionTarget::JointCoord(j) => {
                let mut map = FieldMap::new().with("target", "joint_coord");
                for (i, joint) in j.as_array().iter().enumerate() {
                    map.insert(format!("j{}", i + 1), *joint);
                }
                map
            }
        }
    }

    /// Reads a target back from its wire fields. The `target` field picks
    /// the variant; missing components are 0.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, CommandError> {
        match fields.get_str("target") {
            Some("transform") => {
                let c = |key: &str| fields.get_f64(key).unwrap_or(0.0);
                Ok(MotionTarget::Transform(Transform::new(
                    [c("x"), c("y"), c("z")],
                    [c("rx"), c("ry"), c("rz")],
                )))
            }
            Some("joint_coord") => Ok(MotionTarget::JointCoord(JointCoord::from_fields(fields))),
            Some(other) => Err(CommandError::InvalidTarget(format!(
                "expected `transform` or `joint_coord`, got `{}`",
                other
            ))),
            None => Err(CommandError::InvalidTarget("missing `target` field".to_string())),
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            MotionTarget::Transform(t) => t.is_finite(),
            MotionTarget::JointCoord(j) => j.is_finite(),
        }
    }
}

impl From<Transform> for MotionTarget {
    fn from(value: Transform) -> Self {
        MotionTarget::Transform(value)
    }
}

impl From<JointCoord> for MotionTarget {
    fn from(value: JointCoord) -> Self {
        MotionTarget::JointCoord(value)
    }
}

/// Optional motion parameters, in user units.
///
/// | field               | unit | range      | wire unit |
/// |---------------------|------|------------|-----------|
/// | `speed`             | %    | 1..=100    | fraction  |
/// | `accel`             | %    | 1..=100    | fraction  |
/// | `blend_linear`      | mm   | 1..=1000   | m         |
/// | `blend_angular`     | deg  | 1..=360    | rad       |
/// | `tcp_speed_linear`  | mm/s | 1..=999    | m/s       |
/// | `tcp_speed_angular` | deg/s| 1..=360    | rad/s     |
///
/// Unset fields are left out of the instruction and keep their current
/// value on the controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionParameters {
    pub speed: Option<f64>,
    pub accel: Option<f64>,
    pub blend_linear: Option<f64>,
    pub blend_angular: Option<f64>,
    pub tcp_speed_linear: Option<f64>,
    pub tcp_speed_angular: Option<f64>,
}

struct Bound {
    field: &'static str,
    min: f64,
    max: f64,
    to_wire: fn(f64) -> f64,
}

const BOUNDS: [Bound; 6] = [
    Bound { field: "speed", min: 1.0, max: 100.0, to_wire: percent },
    Bound { field: "accel", min: 1.0, max: 100.0, to_wire: percent },
    Bound { field: "blend_linear", min: 1.0, max: 1000.0, to_wire: millimetres },
    Bound { field: "blend_angular", min: 1.0, max: 360.0, to_wire: f64::to_radians },
    Bound { field: "tcp_speed_linear", min: 1.0, max: 999.0, to_wire: millimetres },
    Bound { field: "tcp_speed_angular", min: 1.0, max: 360.0, to_wire: f64::to_radians },
];

fn percent(v: f64) -> f64 {
    v / 100.0
}

fn millimetres(v: f64) -> f64 {
    v / 1000.0
}

impl MotionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speed(mut self, percent: f64) -> Self {
        self.speed = Some(percent);
        self
    }
    pub fn accel(mut self, percent: f64) -> Self {
        self.accel = Some(percent);
        self
    }
    pub fn blend_linear(mut self, mm: f64) -> Self {
        self.blend_linear = Some(mm);
        self
    }
    pub fn blend_angular(mut self, deg: f64) -> Self {
        self.blend_angular = Some(deg);
        self
    }
    pub fn tcp_speed_linear(mut self, mm_per_s: f64) -> Self {
        self.tcp_speed_linear = Some(mm_per_s);
        self
    }
    pub fn tcp_speed_angular(mut self, deg_per_s: f64) -> Self {
        self.tcp_speed_angular = Some(deg_per_s);
        self
    }

    fn values(&self) -> [Option<f64>; 6] {
        [
            self.speed,
            self.accel,
            self.blend_linear,
            self.blend_angular,
            self.tcp_speed_linear,
            self.tcp_speed_angular,
        ]
    }

    /// Checks every present field against its range. NaN is out of range.
    pub fn validate(&self) -> Result<(), CommandError> {
        for (bound, value) in BOUNDS.iter().zip(self.values()) {
            if let Some(value) = value {
                if !(bound.min..=bound.max).contains(&value) {
                    return Err(CommandError::ParameterOutOfRange {
                        field: bound.field,
                        value,
                        min: bound.min,
                        max: bound.max,
                    });
                }
            }
        }
        Ok(())
    }

    fn to_field_map(&self) -> FieldMap {
        BOUNDS
            .iter()
            .zip(self.values())
            .filter_map(|(bound, value)| value.map(|v| (bound.field, (bound.to_wire)(v))))
            .collect()
    }
}

/// An instruction the controller can execute or enqueue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RobotCommand {
    Motion { mode: MotionMode, target: MotionTarget },
    SetParameter(MotionParameters),
    Sleep { seconds: f64 },
    /// Breaks blending between the surrounding motions.
    Synchronize,
}

impl RobotCommand {
    pub fn motion(mode: MotionMode, target: impl Into<MotionTarget>) -> Result<Self, CommandError> {
        let command = RobotCommand::Motion { mode, target: target.into() };
        command.validate()?;
        Ok(command)
    }

    pub fn set_parameter(parameters: MotionParameters) -> Result<Self, CommandError> {
        let command = RobotCommand::SetParameter(parameters);
        command.validate()?;
        Ok(command)
    }

    pub fn sleep(seconds: f64) -> Result<Self, CommandError> {
        let command = RobotCommand::Sleep { seconds };
        command.validate()?;
        Ok(command)
    }

    /// Re-runs the constructor checks. Variants can be built (or
    /// deserialized) directly, so the session checks again before sending.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            RobotCommand::Motion { target, .. } if !target.is_finite() => Err(
                CommandError::InvalidTarget(format!("non-finite component in {:?}", target)),
            ),
            RobotCommand::SetParameter(parameters) => parameters.validate(),
            RobotCommand::Sleep { seconds } if !(seconds.is_finite() && *seconds >= 0.0) => {
                Err(CommandError::ParameterOutOfRange {
                    field: "second",
                    value: *seconds,
                    min: 0.0,
                    max: f64::MAX,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn synchronize() -> Self {
        RobotCommand::Synchronize
    }

    pub fn action(&self) -> &'static str {
        match self {
            RobotCommand::Motion { .. } => "motion",
            RobotCommand::SetParameter(_) => "set_parameter",
            RobotCommand::Sleep { .. } => "sleep",
            RobotCommand::Synchronize => "synchronize",
        }
    }

    pub fn to_field_map(&self) -> FieldMap {
        let mut map = FieldMap::new().with("action", self.action());
        match self {
            RobotCommand::Motion { mode, target } => {
                map.insert("mode", mode.as_str());
                map.extend(target.to_field_map());
            }
            RobotCommand::SetParameter(parameters) => map.extend(parameters.to_field_map()),
            RobotCommand::Sleep { seconds } => {
                map.insert("second", *seconds);
            }
            RobotCommand::Synchronize => {}
        }
        map
    }
}

/// Anything that can be the target of a motion.
pub trait IntoRobotCommand {
    fn motion_target(&self) -> MotionTarget;

    fn as_motion(&self, mode: MotionMode) -> Result<RobotCommand, CommandError> {
        RobotCommand::motion(mode, self.motion_target())
    }

    fn as_linear(&self) -> Result<RobotCommand, CommandError> {
        self.as_motion(MotionMode::Linear)
    }

    fn as_linear_relative(&self) -> Result<RobotCommand, CommandError> {
        self.as_motion(MotionMode::LinearRelative)
    }

    fn as_joint(&self) -> Result<RobotCommand, CommandError> {
        self.as_motion(MotionMode::Joint)
    }

    fn as_joint_relative(&self) -> Result<RobotCommand, CommandError> {
        self.as_motion(MotionMode::JointRelative)
    }
}

impl IntoRobotCommand for Transform {
    fn motion_target(&self) -> MotionTarget {
        MotionTarget::Transform(*self)
    }
}

impl IntoRobotCommand for JointCoord {
    fn motion_target(&self) -> MotionTarget {
        MotionTarget::JointCoord(*self)
    }
}
