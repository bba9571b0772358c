use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use inovo_iva::bridge::ControllerBridge;
use inovo_iva::commands::{IntoRobotCommand, MotionParameters};
use inovo_iva::drivers::{InovoRobot, IvaConfig};
use inovo_iva::geometry::{JointCoord, Transform};
use inovo_iva::socket::Listener;
use inovo_iva::IvaError;
use sim::{SimBridge, SimController};

/// Walks a simulated arm through the IVA session: bootstrap, parameters,
/// motions, a scoped sequence, IO and the gripper.
#[derive(Parser, Debug)]
#[command(name = "example", version, about)]
struct Args {
    /// JSON file with an `IvaConfig`; defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the listener port (0 picks a free one).
    #[arg(long)]
    port: Option<u16>,

    /// Side of the square traced inside the scoped context, in mm.
    #[arg(long, default_value_t = 50.0)]
    square: f64,
}

fn load_config(args: &Args) -> Result<IvaConfig, IvaError> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| IvaError::Config(format!("{}: {}", path.display(), e)))?;
            IvaConfig::from_json(&json)?
        }
        None => IvaConfig::new("127.0.0.1", 0),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), IvaError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let listener = Listener::bind(&config).await?;
    let local = listener
        .local_addr()
        .map_err(|e| IvaError::Config(format!("listener has no local address: {}", e)))?;
    let bridge = SimBridge::new(SimController::new(), format!("127.0.0.1:{}", local.port()));

    bridge.power_on().await?.into_result(&inovo_iva::bridge::Service::PowerOn)?;
    bridge.robot_enable().await?.into_result(&inovo_iva::bridge::Service::RobotEnable)?;

    let mut robot =
        InovoRobot::bootstrap_with_listener(&bridge, listener, &config.procedure).await?;
    tracing::info!("runtime state: {:?}", bridge.telemetry().runtime_state);

    robot
        .set_param(MotionParameters::new().speed(50.0).accel(30.0).blend_linear(5.0))
        .await?;

    let start = robot.get_current_transform().await?;
    tracing::info!("start pose: {:?}", start);

    let above = start.then_z(100.0);
    robot.linear(&above).await?;

    // Trace a square while the tool is tilted, then come back level.
    let side = args.square;
    let square = [
        Transform::from_x(side),
        Transform::from_y(side),
        Transform::from_x(-side),
        Transform::from_y(-side),
    ]
    .iter()
    .map(|step| step.as_linear_relative())
    .collect::<Result<Vec<_>, _>>()?;

    let tilt = above.then_relative_rx(10.0).as_linear()?;
    let corners = robot
        .context(tilt, |robot| {
            Box::pin(async move {
                robot.sequence(square, false).await?;
                robot.synchronize().await?;
                Ok(robot.get_current_transform().await?)
            })
        })
        .await?;
    tracing::info!("pose after square: {:?} (context depth {})", corners, robot.depth());

    robot.gripper_activate().await?;
    robot.gripper_set("close").await?;
    tracing::info!("gripper at {:.0}%", robot.gripper_get().await?);

    robot.set_io_beckhoff(2, true).await?;
    tracing::info!("beckhoff 2 = {}", robot.get_io_beckhoff(2).await?);

    let joints = robot.get_current_joint().await?;
    tracing::info!("joints: {:?}", joints.to_sequence());
    robot.joint_relative(&JointCoord::zero().with_joint_6(15.0)).await?;
    robot.sleep(0.5).await?;

    bridge.runtime_stop().await?;
    Ok(())
}
