/// Session tests against the simulated IVA runtime over an in-memory pipe.
use inovo_iva::commands::{MotionMode, MotionParameters, RobotCommand};
use inovo_iva::drivers::{InovoRobot, StackState};
use inovo_iva::geometry::{JointCoord, Transform};
use inovo_iva::packets::FieldMap;
use inovo_iva::socket::Stream;
use inovo_iva::{IvaError, SessionError};
use sim::SimController;
use tokio::io::DuplexStream;

fn connect() -> (InovoRobot<DuplexStream>, SimController) {
    let (client, server) = tokio::io::duplex(8192);
    let sim = SimController::new();
    let served = sim.clone();
    tokio::spawn(async move { served.serve(Stream::new(server)).await });
    (InovoRobot::new(Stream::new(client)), sim)
}

fn offset() -> RobotCommand {
    RobotCommand::motion(MotionMode::LinearRelative, Transform::from_z(20.0)).unwrap()
}

#[tokio::test]
async fn nested_contexts_unwind_to_idle() {
    let (mut robot, sim) = connect();

    robot.execute(offset(), true).await.unwrap();
    robot
        .execute(RobotCommand::set_parameter(MotionParameters::new().speed(20.0)).unwrap(), true)
        .await
        .unwrap();
    assert_eq!(robot.stack_state(), StackState::Depth(2));
    assert_eq!(sim.state().lock().await.depth, 2);

    robot.pop().await.unwrap();
    assert_eq!(robot.stack_state(), StackState::Depth(1));
    robot.pop().await.unwrap();

    assert_eq!(robot.stack_state(), StackState::Idle);
    assert_eq!(sim.state().lock().await.depth, 0);
}

#[tokio::test]
async fn pop_without_context_never_reaches_the_wire() {
    let (mut robot, sim) = connect();

    let err = robot.pop().await.unwrap_err();
    assert!(matches!(err, IvaError::Session(SessionError::EmptyContextStack)));

    // The session is still usable and the controller saw nothing before this.
    robot.synchronize().await.unwrap();
    let received = sim.state().lock().await.received.clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].get_str("type"), Some("execute"));
}

#[tokio::test]
async fn unscoped_execute_leaves_stack_alone() {
    let (mut robot, _sim) = connect();

    robot.linear(&Transform::from_vec(300.0, 0.0, 200.0)).await.unwrap();
    robot.sleep(0.25).await.unwrap();

    assert!(robot.stack_state() == StackState::Idle);
    assert_eq!(robot.depth(), 0);
}

#[tokio::test]
async fn context_pops_after_body() {
    let (mut robot, sim) = connect();

    let pose = robot
        .context(offset(), |robot| {
            Box::pin(async move {
                assert_eq!(robot.depth(), 1);
                robot.get_current_transform().await
            })
        })
        .await
        .unwrap();

    assert!((pose.z() - 320.0).abs() < 1e-3);
    assert_eq!(robot.depth(), 0);

    let state = sim.state();
    let state = state.lock().await;
    assert_eq!(state.depth, 0);
    assert_eq!(state.received.last().and_then(|m| m.get_str("type")), Some("pop"));
}

#[tokio::test]
async fn context_pops_when_body_fails() {
    let (mut robot, sim) = connect();

    let err = robot
        .context(offset(), |robot| Box::pin(async move { robot.get_data("missing").await }))
        .await
        .unwrap_err();

    assert!(err.rejection().is_some_and(|text| text.contains("missing")));
    assert_eq!(robot.depth(), 0);
    assert_eq!(sim.state().lock().await.depth, 0);
}

#[tokio::test]
async fn context_sequence_opens_a_single_context() {
    let (mut robot, sim) = connect();

    let square = [
        Transform::from_x(10.0),
        Transform::from_y(10.0),
        Transform::from_x(-10.0),
        Transform::from_y(-10.0),
    ]
    .iter()
    .map(|step| RobotCommand::motion(MotionMode::LinearRelative, *step).unwrap())
    .collect::<Vec<_>>();

    robot
        .context_sequence(square, |robot| {
            Box::pin(async move {
                assert_eq!(robot.depth(), 1);
                robot.synchronize().await
            })
        })
        .await
        .unwrap();

    let state = sim.state();
    let state = state.lock().await;
    assert_eq!(state.depth, 0);
    assert!(state.queue.is_empty());
    let enqueued = state
        .received
        .iter()
        .filter(|m| m.get_str("type") == Some("enqueue"))
        .count();
    assert_eq!(enqueued, 4);
    assert!((state.pose.x() - 400.0).abs() < 1e-9);
}

#[tokio::test]
async fn rejected_instruction_keeps_session_open() {
    let (mut robot, _sim) = connect();

    let err = robot.gripper_get().await.unwrap_err();
    assert!(matches!(err, IvaError::Session(SessionError::ControllerRejected(_))));

    robot.gripper_activate().await.unwrap();
    robot.gripper_set("close").await.unwrap();
    assert_eq!(robot.gripper_get().await.unwrap(), 0.0);
    robot.gripper_set("open").await.unwrap();
    assert_eq!(robot.gripper_get().await.unwrap(), 100.0);
}

#[tokio::test]
async fn io_and_state_queries() {
    let (mut robot, sim) = connect();
    sim.state().lock().await.data.insert("tool:mass".into(), "1.2".into());

    assert!(!robot.get_io_beckhoff(3).await.unwrap());
    robot.set_io_beckhoff(3, true).await.unwrap();
    assert!(robot.get_io_beckhoff(3).await.unwrap());
    robot.set_io_wrist(1, true).await.unwrap();
    assert!(robot.get_io_wrist(1).await.unwrap());
    assert!(robot.set_io_wrist(2, true).await.is_err());

    let joints = robot.get_current_joint().await.unwrap();
    assert!((joints.joint(3).unwrap() + 90.0).abs() < 1e-3);

    robot.joint_relative(&JointCoord::zero().with_joint_1(15.0)).await.unwrap();
    let joints = robot.get_current_joint().await.unwrap();
    assert!((joints.joint(1).unwrap() - 15.0).abs() < 1e-3);

    assert_eq!(robot.get_data("tool:mass").await.unwrap(), "1.2");

    let reply = robot.custom(FieldMap::new().with("mode", "noop")).await.unwrap();
    assert!(reply.is_ok());
}
