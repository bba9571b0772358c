// Library exports for the IVA runtime simulator

mod bridge;
pub use bridge::SimBridge;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use inovo_iva::codec;
use inovo_iva::commands::{MotionMode, MotionTarget};
use inovo_iva::geometry::{JointCoord, Transform};
use inovo_iva::packets::FieldMap;
use inovo_iva::socket::Stream;
use inovo_iva::{IvaError, TransportError};

/// State of the simulated arm and its IVA runtime.
///
/// There is no kinematics: the pose and the joints are tracked
/// independently and only change when a motion targets them.
#[derive(Clone, Debug)]
pub struct SimState {
    pub pose: Transform,
    pub joints: JointCoord,
    /// Contexts opened by scoped execute/dequeue and not yet popped.
    pub depth: usize,
    pub queue: Vec<FieldMap>,
    pub parameters: FieldMap,
    pub beckhoff: [bool; 8],
    pub wrist: [bool; 2],
    pub gripper_active: bool,
    /// Opening as a fraction, the way the runtime reports it.
    pub gripper_fraction: f64,
    pub gripper_labels: HashMap<String, f64>,
    pub data: HashMap<String, String>,
    /// Every instruction received, in order.
    pub received: Vec<FieldMap>,
    pub slept_seconds: f64,
}

impl Default for SimState {
    fn default() -> Self {
        let gripper_labels = [("open".to_string(), 1.0), ("close".to_string(), 0.0)]
            .into_iter()
            .collect();
        Self {
            pose: Transform::new([400.0, 0.0, 300.0], [180.0, 0.0, 0.0]),
            joints: JointCoord::new(0.0, 45.0, -90.0, 0.0, 45.0, 0.0),
            depth: 0,
            queue: Vec::new(),
            parameters: FieldMap::new(),
            beckhoff: [false; 8],
            wrist: [false; 2],
            gripper_active: false,
            gripper_fraction: 1.0,
            gripper_labels,
            data: HashMap::new(),
            received: Vec::new(),
            slept_seconds: 0.0,
        }
    }
}

impl SimState {
    /// Applies one robot command (`action` plus its fields).
    fn run_command(&mut self, fields: &FieldMap) -> Result<(), String> {
        match fields.get_str("action") {
            Some("motion") => {
                let mode = fields
                    .get_str("mode")
                    .ok_or("missing motion mode")
                    .and_then(|m| MotionMode::from_str(m).map_err(|_| "unknown motion mode"))?;
                let target = MotionTarget::from_fields(fields).map_err(|e| e.to_string())?;
                self.apply_motion(mode, target);
                Ok(())
            }
            Some("set_parameter") => {
                let envelope = ["type", "enter_context", "action"];
                for (key, value) in fields.iter().filter(|(k, _)| !envelope.contains(k)) {
                    self.parameters.insert(key, value.clone());
                }
                Ok(())
            }
            Some("sleep") => {
                self.slept_seconds += fields.get_f64("second").unwrap_or(0.0);
                Ok(())
            }
            Some("synchronize") => Ok(()),
            Some(other) => Err(format!("unknown action {}", other)),
            None => Err("missing action".to_string()),
        }
    }

    fn apply_motion(&mut self, mode: MotionMode, target: MotionTarget) {
        match (target, mode.is_relative()) {
            (MotionTarget::Transform(t), false) => self.pose = t,
            (MotionTarget::Transform(t), true) => self.pose = self.pose.then(&t),
            (MotionTarget::JointCoord(j), false) => self.joints = j,
            (MotionTarget::JointCoord(j), true) => self.joints = self.joints + j,
        }
    }

    fn io(&mut self, fields: &FieldMap) -> String {
        let port = fields.get_f64("port").unwrap_or(-1.0);
        let bank: &mut [bool] = match fields.get_str("target") {
            Some("beckhoff") => &mut self.beckhoff,
            Some("wrist") => &mut self.wrist,
            _ => return "Error: unknown io target".to_string(),
        };
        if port < 0.0 || port as usize >= bank.len() {
            return format!("Error: invalid port {}", port);
        }
        let slot = &mut bank[port as usize];
        match fields.get_str("action") {
            Some("get") => (if *slot { "True" } else { "False" }).to_string(),
            Some("set") => {
                *slot = fields.get_f64("state").unwrap_or(0.0) != 0.0;
                codec::ACK.to_string()
            }
            _ => "Error: unknown io action".to_string(),
        }
    }

    fn gripper(&mut self, fields: &FieldMap) -> String {
        match fields.get_str("action") {
            Some("activate") => {
                self.gripper_active = true;
                codec::ACK.to_string()
            }
            _ if !self.gripper_active => "Error: gripper not activated".to_string(),
            Some("get") => format!("{}", self.gripper_fraction),
            Some("set") => {
                let label = fields.get_str("label").unwrap_or_default();
                match self.gripper_labels.get(label) {
                    Some(fraction) => {
                        self.gripper_fraction = *fraction;
                        codec::ACK.to_string()
                    }
                    None => format!("Error: unknown gripper label {}", label),
                }
            }
            _ => "Error: unknown gripper action".to_string(),
        }
    }

    fn get(&self, fields: &FieldMap) -> String {
        match fields.get_str("target") {
            Some("transform") => pose_reply(&self.pose),
            Some("joint_coord") => {
                let joints: String = self
                    .joints
                    .as_array()
                    .iter()
                    .map(|j| format!("{:.6}, ", j.to_radians()))
                    .collect();
                let tcp = pose_reply(&self.pose);
                format!("{{joints : [{}], tcp : {}, tcpid : tool_plate, }}", joints, tcp)
            }
            Some("data") => {
                let key = fields.get_str("key").unwrap_or_default();
                self.data
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| format!("Error: no data for key {}", key))
            }
            _ => "Error: unknown get target".to_string(),
        }
    }

    /// Produces the reply line (without terminator) for one instruction.
    pub fn handle(&mut self, request: &FieldMap) -> String {
        self.received.push(request.clone());
        let ok = || codec::ACK.to_string();
        let enter_context = request.get_f64("enter_context").unwrap_or(0.0) != 0.0;

        match request.get_str("type") {
            Some("execute") => match self.run_command(request) {
                Ok(()) => {
                    if enter_context {
                        self.depth += 1;
                    }
                    ok()
                }
                Err(e) => format!("Error: {}", e),
            },
            Some("enqueue") => {
                self.queue.push(request.clone());
                ok()
            }
            Some("dequeue") => {
                for command in std::mem::take(&mut self.queue) {
                    if let Err(e) = self.run_command(&command) {
                        return format!("Error: {}", e);
                    }
                }
                if enter_context {
                    self.depth += 1;
                }
                ok()
            }
            Some("pop") => {
                if self.depth == 0 {
                    return "Error: context stack is empty".to_string();
                }
                self.depth -= 1;
                ok()
            }
            Some("io") => self.io(request),
            Some("gripper") => self.gripper(request),
            Some("get") => self.get(request),
            Some("custom") => ok(),
            Some(other) => format!("Error: unknown type {}", other),
            None => "Error: missing type".to_string(),
        }
    }
}

fn pose_reply(pose: &Transform) -> String {
    format!(
        "{{x : {:.6}, y : {:.6}, z : {:.6}, rx : {:.6}, ry : {:.6}, rz : {:.6}, }}",
        pose.x() / 1000.0,
        pose.y() / 1000.0,
        pose.z() / 1000.0,
        pose.rx().to_radians(),
        pose.ry().to_radians(),
        pose.rz().to_radians(),
    )
}

/// Simulated IVA runtime. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SimState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> Arc<Mutex<SimState>> {
        Arc::clone(&self.state)
    }

    /// Answers instructions until the peer hangs up.
    pub async fn serve<S>(&self, mut stream: Stream<S>) -> Result<(), IvaError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let line = match stream.read().await {
                Ok(line) => line,
                Err(TransportError::EndOfCommunication) => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            let reply = match codec::decode(&line) {
                Ok(request) => self.state.lock().await.handle(&request),
                Err(e) => {
                    tracing::warn!("sim: undecodable request `{}`: {}", line, e);
                    format!("Error: {}", e)
                }
            };
            tracing::debug!("sim: {} -> {}", line, reply);
            stream.write(&reply).await?;
        }
    }

    /// Connects to the control process the way the runtime procedure does,
    /// retrying while nothing is listening yet, then serves the session.
    pub async fn connect_and_serve(
        &self,
        addr: &str,
        attempts: u32,
        retry_delay: Duration,
    ) -> Result<(), IvaError> {
        let mut attempt = 0;
        let stream = loop {
            attempt += 1;
            match Stream::connect(addr).await {
                Ok(stream) => break stream,
                Err(e) if attempt < attempts => {
                    tracing::warn!("sim: connect attempt {} to {} failed: {}", attempt, addr, e);
                    sleep(retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        tracing::info!("sim: connected to {}", addr);
        self.serve(stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(fields: &[(&str, &str)]) -> FieldMap {
        fields.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn pop_on_empty_stack_is_rejected() {
        let mut state = SimState::default();
        let reply = state.handle(&request(&[("type", "pop")]));
        assert!(reply.starts_with("Error"));
    }

    #[test]
    fn dequeue_runs_queue_in_order() {
        let mut state = SimState::default();
        let first = FieldMap::new()
            .with("type", "enqueue")
            .with("action", "motion")
            .with("mode", "linear")
            .with("target", "transform")
            .with("x", 10.0);
        let second = FieldMap::new()
            .with("type", "enqueue")
            .with("action", "motion")
            .with("mode", "linear_relative")
            .with("target", "transform")
            .with("x", 5.0);

        assert_eq!(state.handle(&first), "OK");
        assert_eq!(state.handle(&second), "OK");
        assert_eq!(state.pose, SimState::default().pose);

        let dequeue = FieldMap::new().with("type", "dequeue").with("enter_context", 1);
        assert_eq!(state.handle(&dequeue), "OK");
        assert_eq!(state.depth, 1);
        assert!((state.pose.x() - 15.0).abs() < 1e-9);
        assert!(state.queue.is_empty());
    }

    #[test]
    fn gripper_requires_activation() {
        let mut state = SimState::default();
        let get = request(&[("type", "gripper"), ("action", "get")]);
        assert!(state.handle(&get).starts_with("Error"));
        state.handle(&request(&[("type", "gripper"), ("action", "activate")]));
        assert_eq!(state.handle(&get), "1");
    }
}
