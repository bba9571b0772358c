use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use super::{ContextStack, IvaConfig, StackState};
use crate::bridge::{ControllerBridge, Service};
use crate::codec::{self, Response};
use crate::commands::{
    GripperCommand, IntoRobotCommand, IoCommand, IoTarget, MotionParameters, RobotCommand,
};
use crate::geometry::{JointCoord, Transform};
use crate::logger::{Logger, TracingLogger};
use crate::packets::{CurrentKind, FieldMap, Instruction};
use crate::socket::{Listener, Stream};
use crate::{IvaError, SessionError};

/// Future returned by the body of a scoped context.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IvaError>> + Send + 'a>>;

/// A session with the IVA runtime running on the arm.
///
/// Every call is one request and one reply; the `&mut self` receivers make
/// pipelining impossible, which the controller's context stack relies on.
///
/// ```rust,ignore
/// let config = IvaConfig::default();
/// let mut robot = InovoRobot::bootstrap(&bridge, &config).await?;
///
/// robot.set_param(MotionParameters::new().speed(50.0)).await?;
/// robot.linear(&Transform::from_z(100.0)).await?;
///
/// // Blend through a sequence while a tool offset is active.
/// robot
///     .context(tool_offset, |robot| Box::pin(async move {
///         robot.sequence(path, false).await
///     }))
///     .await?;
/// ```
pub struct InovoRobot<S = TcpStream> {
    stream: Stream<S>,
    contexts: ContextStack,
    logger: Arc<dyn Logger>,
}

impl InovoRobot<TcpStream> {
    /// Listens on `config`, asks the bridge to start the IVA procedure and
    /// waits for the runtime to connect back.
    pub async fn bootstrap<B: ControllerBridge>(
        bridge: &B,
        config: &IvaConfig,
    ) -> Result<Self, IvaError> {
        config.validate()?;
        let listener = Listener::bind(config).await?;
        Self::bootstrap_with_listener(bridge, listener, &config.procedure).await
    }

    /// [`bootstrap`](Self::bootstrap) with a listener the caller already
    /// bound, e.g. to learn an ephemeral port first.
    pub async fn bootstrap_with_listener<B: ControllerBridge>(
        bridge: &B,
        listener: Listener,
        procedure: &str,
    ) -> Result<Self, IvaError> {
        let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new("robot"));
        Self::bootstrap_with_logger(bridge, listener, procedure, logger).await
    }

    /// Like [`bootstrap_with_listener`](Self::bootstrap_with_listener); the
    /// session and the listener both report to `logger`.
    pub async fn bootstrap_with_logger<B: ControllerBridge>(
        bridge: &B,
        listener: Listener,
        procedure: &str,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, IvaError> {
        let service = Service::RuntimeStart {
            procedure: Some(procedure.to_string()),
        };
        bridge.call(service.clone()).await?.into_result(&service)?;
        logger.info(&format!(
            "runtime procedure `{}` started, waiting for connection",
            procedure
        ));

        let stream = listener.with_logger(logger.clone()).accept().await;
        Ok(Self::new(stream).with_logger(logger))
    }
}

impl<S> InovoRobot<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: Stream<S>) -> Self {
        Self {
            stream,
            contexts: ContextStack::new(),
            logger: Arc::new(TracingLogger::new("robot")),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn depth(&self) -> usize {
        self.contexts.depth()
    }

    pub fn stack_state(&self) -> StackState {
        self.contexts.state()
    }

    pub fn stream(&self) -> &Stream<S> {
        &self.stream
    }

    pub fn into_stream(self) -> Stream<S> {
        self.stream
    }

    /// Sends one instruction and decodes the reply it expects. Invalid
    /// descriptors fail here, before anything is written.
    pub async fn request(&mut self, instruction: &Instruction) -> Result<Response, IvaError> {
        instruction.validate()?;
        let line = codec::encode(&instruction.to_field_map())?;
        self.stream.write(&line).await?;
        let reply = self.stream.read().await?;
        Ok(codec::decode_response(&reply, instruction.expected_response())?)
    }

    async fn request_ok(&mut self, instruction: &Instruction) -> Result<(), IvaError> {
        match self.request(instruction).await? {
            Response::Ok => Ok(()),
            other => Err(self.rejected(instruction, other)),
        }
    }

    fn rejected(&self, instruction: &Instruction, response: Response) -> IvaError {
        let text = match response {
            Response::Rejected(text) => text,
            other => format!("unexpected reply {:?}", other),
        };
        self.logger
            .error(&format!("`{}` rejected by controller: {}", instruction.op_code(), text));
        SessionError::ControllerRejected(text).into()
    }

    /// Runs `command`. With `enter_context` the controller keeps it active
    /// until [`pop`](Self::pop); the local stack grows only once the
    /// controller has acknowledged.
    pub async fn execute(
        &mut self,
        command: RobotCommand,
        enter_context: bool,
    ) -> Result<(), IvaError> {
        let instruction = Instruction::Execute { command, enter_context };
        self.request_ok(&instruction).await?;
        if instruction.enters_context() {
            self.contexts.push();
        }
        Ok(())
    }

    pub async fn enqueue(&mut self, command: RobotCommand) -> Result<(), IvaError> {
        self.request_ok(&Instruction::Enqueue(command)).await
    }

    pub async fn dequeue(&mut self, enter_context: bool) -> Result<(), IvaError> {
        self.request_ok(&Instruction::Dequeue { enter_context }).await?;
        if enter_context {
            self.contexts.push();
        }
        Ok(())
    }

    /// Enqueues every command and runs them as one block. Opens at most one
    /// context.
    pub async fn sequence<I>(&mut self, commands: I, enter_context: bool) -> Result<(), IvaError>
    where
        I: IntoIterator<Item = RobotCommand>,
    {
        for command in commands {
            self.enqueue(command).await?;
        }
        self.dequeue(enter_context).await
    }

    /// Closes the innermost context. Fails without touching the wire when
    /// none is open.
    pub async fn pop(&mut self) -> Result<(), IvaError> {
        self.contexts.ensure_open()?;
        let line = codec::encode(&Instruction::Pop.to_field_map())?;
        self.stream.write(&line).await?;
        self.contexts.pop()?;

        let reply = self.stream.read().await?;
        match codec::decode_response(&reply, Instruction::Pop.expected_response())? {
            Response::Ok => Ok(()),
            other => Err(self.rejected(&Instruction::Pop, other)),
        }
    }

    /// Executes `command` in a new context, runs `body`, then pops.
    ///
    /// The pop happens whether `body` succeeds or fails. If both fail, the
    /// body's error is returned and the pop error is logged. A panic inside
    /// `body` unwinds past the pop.
    pub async fn context<T, F>(&mut self, command: RobotCommand, body: F) -> Result<T, IvaError>
    where
        F: for<'a> FnOnce(&'a mut Self) -> SessionFuture<'a, T>,
    {
        self.execute(command, true).await?;
        self.scoped(body).await
    }

    /// Like [`context`](Self::context), opened by a dequeued sequence.
    pub async fn context_sequence<I, T, F>(&mut self, commands: I, body: F) -> Result<T, IvaError>
    where
        I: IntoIterator<Item = RobotCommand>,
        F: for<'a> FnOnce(&'a mut Self) -> SessionFuture<'a, T>,
    {
        self.sequence(commands, true).await?;
        self.scoped(body).await
    }

    async fn scoped<T, F>(&mut self, body: F) -> Result<T, IvaError>
    where
        F: for<'a> FnOnce(&'a mut Self) -> SessionFuture<'a, T>,
    {
        let result = body(self).await;
        let popped = self.pop().await;
        match (result, popped) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(pop_err)) => {
                self.logger
                    .error(&format!("pop after failed context also failed: {}", pop_err));
                Err(e)
            }
        }
    }

    pub async fn sleep(&mut self, seconds: f64) -> Result<(), IvaError> {
        self.execute(RobotCommand::sleep(seconds)?, false).await
    }

    pub async fn set_param(&mut self, parameters: MotionParameters) -> Result<(), IvaError> {
        self.execute(RobotCommand::set_parameter(parameters)?, false).await
    }

    pub async fn synchronize(&mut self) -> Result<(), IvaError> {
        self.execute(RobotCommand::synchronize(), false).await
    }

    pub async fn linear<T: IntoRobotCommand>(&mut self, target: &T) -> Result<(), IvaError> {
        self.execute(target.as_linear()?, false).await
    }

    pub async fn linear_relative<T>(&mut self, target: &T) -> Result<(), IvaError>
    where
        T: IntoRobotCommand,
    {
        self.execute(target.as_linear_relative()?, false).await
    }

    pub async fn joint<T: IntoRobotCommand>(&mut self, target: &T) -> Result<(), IvaError> {
        self.execute(target.as_joint()?, false).await
    }

    pub async fn joint_relative<T>(&mut self, target: &T) -> Result<(), IvaError>
    where
        T: IntoRobotCommand,
    {
        self.execute(target.as_joint_relative()?, false).await
    }

    pub async fn io(&mut self, command: IoCommand) -> Result<Response, IvaError> {
        self.request(&Instruction::Io(command)).await
    }

    async fn get_io(&mut self, target: IoTarget, port: u8) -> Result<bool, IvaError> {
        let instruction = Instruction::Io(IoCommand::get(target, port)?);
        match self.request(&instruction).await? {
            Response::Digital(state) => Ok(state),
            other => Err(self.rejected(&instruction, other)),
        }
    }

    async fn set_io(&mut self, target: IoTarget, port: u8, state: bool) -> Result<(), IvaError> {
        self.request_ok(&Instruction::Io(IoCommand::set(target, port, state)?)).await
    }

    pub async fn get_io_beckhoff(&mut self, port: u8) -> Result<bool, IvaError> {
        self.get_io(IoTarget::Beckhoff, port).await
    }

    pub async fn get_io_wrist(&mut self, port: u8) -> Result<bool, IvaError> {
        self.get_io(IoTarget::Wrist, port).await
    }

    pub async fn set_io_beckhoff(&mut self, port: u8, state: bool) -> Result<(), IvaError> {
        self.set_io(IoTarget::Beckhoff, port, state).await
    }

    pub async fn set_io_wrist(&mut self, port: u8, state: bool) -> Result<(), IvaError> {
        self.set_io(IoTarget::Wrist, port, state).await
    }

    pub async fn gripper_activate(&mut self) -> Result<(), IvaError> {
        self.request_ok(&Instruction::Gripper(GripperCommand::Activate)).await
    }

    /// Current gripper opening in percent.
    pub async fn gripper_get(&mut self) -> Result<f64, IvaError> {
        let instruction = Instruction::Gripper(GripperCommand::Get);
        match self.request(&instruction).await? {
            Response::Gripper(percent) => Ok(percent),
            other => Err(self.rejected(&instruction, other)),
        }
    }

    pub async fn gripper_set(&mut self, label: &str) -> Result<(), IvaError> {
        self.request_ok(&Instruction::Gripper(GripperCommand::set(label))).await
    }

    pub async fn get_current_transform(&mut self) -> Result<Transform, IvaError> {
        let instruction = Instruction::GetCurrent(CurrentKind::Transform);
        match self.request(&instruction).await? {
            Response::Transform(pose) => Ok(pose),
            other => Err(self.rejected(&instruction, other)),
        }
    }

    pub async fn get_current_joint(&mut self) -> Result<JointCoord, IvaError> {
        let instruction = Instruction::GetCurrent(CurrentKind::JointCoord);
        match self.request(&instruction).await? {
            Response::JointCoord(joints) => Ok(joints),
            other => Err(self.rejected(&instruction, other)),
        }
    }

    /// Reads a runtime value by key. An unknown key is a rejection.
    pub async fn get_data(&mut self, key: &str) -> Result<String, IvaError> {
        let instruction = Instruction::GetData { key: key.to_string() };
        match self.request(&instruction).await? {
            Response::Data(value) => Ok(value),
            other => Err(self.rejected(&instruction, other)),
        }
    }

    /// Sends an arbitrary `custom` instruction and returns the raw reply.
    pub async fn custom(&mut self, fields: FieldMap) -> Result<Response, IvaError> {
        self.request(&Instruction::Custom(fields)).await
    }
}
