//! Interface to the controller's service bridge.
//!
//! The arm exposes power, safety and runtime control as ROS services behind
//! a rosbridge websocket. This crate does not speak that protocol itself;
//! it consumes it through [`ControllerBridge`], which an application
//! implements on top of whatever client it uses.

use std::future::Future;

use int_enum::IntEnum;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::IvaError;

pub const TYPE_TRIGGER: &str = "std_srvs/Trigger";
pub const TYPE_RUN_SEQUENCE: &str = "commander_msgs/RunSequence";
pub const TYPE_GET_VAR: &str = "commander_msgs/get_var";
pub const TYPE_SET_VAR: &str = "commander_msgs/set_var";

/// One-shot services offered by the controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Service {
    PowerOn,
    PowerOff,
    RobotEnable,
    RobotDisable,
    EstopReset,
    SafeStopReset,
    /// Starts the runtime, from the start block or from the named procedure.
    RuntimeStart { procedure: Option<String> },
    RuntimeStop,
    RuntimePause,
    RuntimeStep,
    RuntimeDebug,
    RuntimeContinue,
    RuntimeGetVar { name: String },
    RuntimeSetVar { name: String, value: String },
}

impl Service {
    pub fn path(&self) -> &'static str {
        match self {
            Service::PowerOn => "/psu/enable",
            Service::PowerOff => "/psu/disable",
            Service::RobotEnable => "/robot/enable",
            Service::RobotDisable => "/robot/disable",
            Service::EstopReset => "/psu/estop/reset",
            Service::SafeStopReset => "/psu/safe_stop/reset",
            Service::RuntimeStart { .. } => "/sequence/start",
            Service::RuntimeStop => "/sequence/stop",
            Service::RuntimePause => "/sequence/pause",
            Service::RuntimeStep => "/sequence/step",
            Service::RuntimeDebug => "/sequence/debug",
            Service::RuntimeContinue => "/sequence/continue",
            Service::RuntimeGetVar { .. } => "/sequence/get_var",
            Service::RuntimeSetVar { .. } => "/sequence/set_var",
        }
    }

    pub fn service_type(&self) -> &'static str {
        match self {
            Service::RuntimeStart { .. } => TYPE_RUN_SEQUENCE,
            Service::RuntimeGetVar { .. } => TYPE_GET_VAR,
            Service::RuntimeSetVar { .. } => TYPE_SET_VAR,
            _ => TYPE_TRIGGER,
        }
    }

    /// Request arguments as the service expects them.
    pub fn args(&self) -> Value {
        match self {
            Service::RuntimeStart { procedure: Some(name) } => json!({ "procedure_name": name }),
            Service::RuntimeGetVar { name } => json!({ "name": name }),
            Service::RuntimeSetVar { name, value } => json!({ "name": name, "value": value }),
            _ => json!({}),
        }
    }

    /// A rosbridge `call_service` message for this service.
    pub fn to_rosbridge_request(&self, id: &str) -> Value {
        json!({
            "op": "call_service",
            "id": id,
            "service": self.path(),
            "type": self.service_type(),
            "args": self.args(),
        })
    }
}

/// Result of a service call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ServiceResponse {
    pub success: bool,
    /// Usually an error description when `success` is false.
    pub message: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl ServiceResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            value: None,
        }
    }

    /// Parses the `values` object of a rosbridge `service_response`.
    pub fn from_message(message: &Value) -> Result<Self, IvaError> {
        serde_json::from_value(message.clone())
            .map_err(|e| IvaError::Bridge(format!("bad service response: {}", e)))
    }

    /// Turns an unsuccessful response into an error naming the service.
    pub fn into_result(self, service: &Service) -> Result<Self, IvaError> {
        if self.success {
            Ok(self)
        } else {
            Err(IvaError::Bridge(format!("{} failed: {}", service.path(), self.message)))
        }
    }
}

#[repr(u8)]
#[derive(Debug, Serialize, Deserialize, IntEnum, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle = 0,
    Running = 1,
    Paused = 2,
    PausedOnError = 3,
}

impl Default for RuntimeState {
    fn default() -> Self {
        RuntimeState::Idle
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RuntimeVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: String,
    pub value: String,
}

/// Drive-level state of one joint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct JointDriveState {
    pub age: i64,
    pub current: f64,
    pub drive_temp: f64,
    pub ff_torque: f64,
    pub joint_temp: f64,
    pub motor_temp: f64,
    pub output_gain: f64,
    pub position: f64,
    pub state: i64,
    pub status: i64,
    pub target_position: f64,
    pub torque: f64,
    pub velocity: f64,
}

/// Latest controller state as mirrored by the bridge.
///
/// The bridge refreshes this from its subscriptions on its own schedule;
/// fields are independent and carry no ordering guarantee between them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Telemetry {
    pub tcp_speed_linear: f64,
    pub tcp_speed_angular: f64,
    pub tcp_pose_vec: [f64; 3],
    /// `(x, y, z, w)`.
    pub tcp_pose_quat: [f64; 4],
    pub joint_position: Vec<f64>,
    pub joint_velocity: Vec<f64>,
    pub joint_effort: Vec<f64>,
    pub voltage: f64,
    pub current: f64,
    pub power_status: String,
    pub driver_state: String,
    pub drives_powered: bool,
    pub estop_active: bool,
    pub estop_circuit_complete: bool,
    pub safe_stop_active: bool,
    pub safe_stop_circuit_complete: bool,
    pub active_blocks: Vec<String>,
    pub current_block_progress: f64,
    pub runtime_state: RuntimeState,
    pub variables: Vec<RuntimeVariable>,
    pub arm_enabled: bool,
    pub arm_state: i64,
    pub joint_states: Vec<JointDriveState>,
}

/// Service bridge to the controller.
///
/// Only [`call`](ControllerBridge::call) and
/// [`telemetry`](ControllerBridge::telemetry) are required; each named
/// service is a thin wrapper over `call`.
pub trait ControllerBridge: Send + Sync {
    fn telemetry(&self) -> Telemetry;

    fn call(
        &self,
        service: Service,
    ) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send;

    fn power_on(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::PowerOn)
    }
    fn power_off(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::PowerOff)
    }
    fn robot_enable(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RobotEnable)
    }
    fn robot_disable(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RobotDisable)
    }
    fn estop_reset(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::EstopReset)
    }
    fn safe_stop_reset(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::SafeStopReset)
    }
    fn runtime_start(
        &self,
        procedure: Option<&str>,
    ) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeStart {
            procedure: procedure.map(str::to_string),
        })
    }
    fn runtime_stop(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeStop)
    }
    fn runtime_pause(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimePause)
    }
    fn runtime_step(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeStep)
    }
    fn runtime_debug(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeDebug)
    }
    fn runtime_continue(&self) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeContinue)
    }
    fn runtime_get_var(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeGetVar { name: name.to_string() })
    }
    fn runtime_set_var(
        &self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        self.call(Service::RuntimeSetVar {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}
