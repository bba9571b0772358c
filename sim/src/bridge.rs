use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio::time::Duration;

use inovo_iva::bridge::{ControllerBridge, RuntimeState, Service, ServiceResponse, Telemetry};
use inovo_iva::IvaError;

use crate::SimController;

/// Stand-in for the controller's service bridge.
///
/// Starting the runtime spawns the [`SimController`] and points it at
/// `listener_addr`, which is what the real runtime procedure does on the
/// arm. Other services only update the telemetry snapshot.
pub struct SimBridge {
    controller: SimController,
    listener_addr: String,
    telemetry: Mutex<Telemetry>,
    variables: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Service>>,
    runtime: Mutex<Option<JoinHandle<Result<(), IvaError>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimBridge {
    pub fn new(controller: SimController, listener_addr: impl Into<String>) -> Self {
        Self {
            controller,
            listener_addr: listener_addr.into(),
            telemetry: Mutex::new(Telemetry::default()),
            variables: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            runtime: Mutex::new(None),
        }
    }

    /// Services called so far, in order.
    pub fn calls(&self) -> Vec<Service> {
        lock(&self.calls).clone()
    }

    /// Takes the handle of the spawned runtime, if one was started.
    pub fn take_runtime(&self) -> Option<JoinHandle<Result<(), IvaError>>> {
        lock(&self.runtime).take()
    }

    fn handle(&self, service: &Service) -> ServiceResponse {
        let mut telemetry = lock(&self.telemetry);
        match service {
            Service::PowerOn => {
                telemetry.power_status = "on".to_string();
                telemetry.drives_powered = true;
            }
            Service::PowerOff => {
                telemetry.power_status = "off".to_string();
                telemetry.drives_powered = false;
                telemetry.arm_enabled = false;
            }
            Service::RobotEnable => {
                if !telemetry.drives_powered {
                    return ServiceResponse::failed("drives are not powered");
                }
                telemetry.arm_enabled = true;
            }
            Service::RobotDisable => telemetry.arm_enabled = false,
            Service::EstopReset => telemetry.estop_active = false,
            Service::SafeStopReset => telemetry.safe_stop_active = false,
            Service::RuntimeStart { procedure } => {
                if telemetry.runtime_state == RuntimeState::Running {
                    return ServiceResponse::failed("runtime already running");
                }
                telemetry.runtime_state = RuntimeState::Running;
                telemetry.active_blocks = procedure.iter().cloned().collect();

                let controller = self.controller.clone();
                let addr = self.listener_addr.clone();
                let handle = tokio::spawn(async move {
                    controller.connect_and_serve(&addr, 50, Duration::from_millis(20)).await
                });
                if let Some(previous) = lock(&self.runtime).replace(handle) {
                    previous.abort();
                }
            }
            Service::RuntimeStop => {
                telemetry.runtime_state = RuntimeState::Idle;
                telemetry.active_blocks.clear();
                if let Some(handle) = lock(&self.runtime).take() {
                    handle.abort();
                }
            }
            Service::RuntimePause => telemetry.runtime_state = RuntimeState::Paused,
            Service::RuntimeContinue => telemetry.runtime_state = RuntimeState::Running,
            Service::RuntimeStep | Service::RuntimeDebug => {}
            Service::RuntimeGetVar { name } => {
                return match lock(&self.variables).get(name) {
                    Some(value) => ServiceResponse {
                        success: true,
                        message: String::new(),
                        value: Some(value.clone()),
                    },
                    None => ServiceResponse::failed(format!("no variable named {}", name)),
                };
            }
            Service::RuntimeSetVar { name, value } => {
                lock(&self.variables).insert(name.clone(), value.clone());
            }
        }
        ServiceResponse::ok()
    }
}

impl ControllerBridge for SimBridge {
    fn telemetry(&self) -> Telemetry {
        lock(&self.telemetry).clone()
    }

    fn call(
        &self,
        service: Service,
    ) -> impl Future<Output = Result<ServiceResponse, IvaError>> + Send {
        async move {
            tracing::info!("sim bridge: {}", service.path());
            lock(&self.calls).push(service.clone());
            Ok(self.handle(&service))
        }
    }
}
