use std::ops::{Add, Neg};

use serde::{Deserialize, Serialize};

use crate::packets::FieldMap;
use crate::{CommandError, ProtocolError};

pub const JOINT_COUNT: usize = 6;

/// Six joint angles in degrees, indexed 1..=6.
///
/// Like [`Transform`](super::Transform) this is a value type: every update
/// returns a new coordinate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct JointCoord {
    joints_deg: [f64; JOINT_COUNT],
}

impl JointCoord {
    pub fn new(j1: f64, j2: f64, j3: f64, j4: f64, j5: f64, j6: f64) -> Self {
        Self {
            joints_deg: [j1, j2, j3, j4, j5, j6],
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(joints_deg: [f64; JOINT_COUNT]) -> Self {
        Self { joints_deg }
    }

    /// Builds a coordinate from exactly six values, in order.
    pub fn from_sequence(values: &[f64]) -> Result<Self, CommandError> {
        let joints_deg: [f64; JOINT_COUNT] = values
            .try_into()
            .map_err(|_| CommandError::InvalidJointCount(values.len()))?;
        Ok(Self { joints_deg })
    }

    pub fn to_sequence(&self) -> Vec<f64> {
        self.joints_deg.to_vec()
    }

    pub fn as_array(&self) -> [f64; JOINT_COUNT] {
        self.joints_deg
    }

    /// Angle of joint `n` (1-based).
    pub fn joint(&self, n: usize) -> Option<f64> {
        n.checked_sub(1).and_then(|i| self.joints_deg.get(i)).copied()
    }

    /// Returns a coordinate with joint `n` (1-based) rotated by `delta_deg`.
    pub fn with_joint(&self, n: usize, delta_deg: f64) -> Result<Self, CommandError> {
        if !(1..=JOINT_COUNT).contains(&n) {
            return Err(CommandError::InvalidJointIndex(n));
        }
        Ok(self.offset(n - 1, delta_deg))
    }

    pub fn with_joint_1(&self, delta_deg: f64) -> Self {
        self.offset(0, delta_deg)
    }
    pub fn with_joint_2(&self, delta_deg: f64) -> Self {
        self.offset(1, delta_deg)
    }
    pub fn with_joint_3(&self, delta_deg: f64) -> Self {
        self.offset(2, delta_deg)
    }
    pub fn with_joint_4(&self, delta_deg: f64) -> Self {
        self.offset(3, delta_deg)
    }
    pub fn with_joint_5(&self, delta_deg: f64) -> Self {
        self.offset(4, delta_deg)
    }
    pub fn with_joint_6(&self, delta_deg: f64) -> Self {
        self.offset(5, delta_deg)
    }

    fn offset(&self, idx: usize, delta_deg: f64) -> Self {
        let mut joints_deg = self.joints_deg;
        joints_deg[idx] += delta_deg;
        Self { joints_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.joints_deg.iter().all(|j| j.is_finite())
    }

    /// Reads `j1`..`j6` from a field map; missing joints are 0.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let mut joints_deg = [0.0; JOINT_COUNT];
        for (i, joint) in joints_deg.iter_mut().enumerate() {
            *joint = fields.get_f64(&format!("j{}", i + 1)).unwrap_or(0.0);
        }
        Self { joints_deg }
    }

    /// Parses the controller's joint reply, e.g.
    /// `{joints : [-1.54, -0.08, -0.11, -2.99, 1.76, 3.39, ], tcp : {...}, tcpid : tool_plate, }`.
    ///
    /// Joints are reported in radians.
    pub fn from_robot(response: &str) -> Result<Self, ProtocolError> {
        let malformed =
            || ProtocolError::MalformedResponse(format!("no joint list in `{}`", response));

        let start = response.find('[').ok_or_else(malformed)?;
        let end = response[start..].find(']').ok_or_else(malformed)? + start;

        let values = response[start + 1..end]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<f64>().map(f64::to_degrees).map_err(|_| {
                    ProtocolError::MalformedResponse(format!("bad joint value `{}`", s))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() < JOINT_COUNT {
            return Err(ProtocolError::MalformedResponse(format!(
                "expected {} joints in `{}`",
                JOINT_COUNT, response
            )));
        }

        let mut joints_deg = [0.0; JOINT_COUNT];
        joints_deg.copy_from_slice(&values[..JOINT_COUNT]);
        Ok(Self { joints_deg })
    }
}

impl Add for JointCoord {
    type Output = JointCoord;

    fn add(self, rhs: JointCoord) -> JointCoord {
        let mut joints_deg = self.joints_deg;
        for (joint, delta) in joints_deg.iter_mut().zip(rhs.joints_deg) {
            *joint += delta;
        }
        JointCoord { joints_deg }
    }
}

impl Neg for JointCoord {
    type Output = JointCoord;

    fn neg(self) -> JointCoord {
        JointCoord {
            joints_deg: self.joints_deg.map(|j| -j),
        }
    }
}
