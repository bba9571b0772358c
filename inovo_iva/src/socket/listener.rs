use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

use super::Stream;
use crate::drivers::IvaConfig;
use crate::logger::{Logger, TracingLogger};
use crate::TransportError;

/// Called with the running failure count and the error before each retry.
pub type RetryHook = Box<dyn FnMut(u64, &io::Error) + Send>;

/// Runs `attempt` until it succeeds, sleeping `delay` between failures.
///
/// There is no failure path: errors are reported to `on_retry` and retried
/// forever.
pub async fn accept_with_retry<T, F, Fut, H>(mut attempt: F, mut on_retry: H, delay: Duration) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
    H: FnMut(u64, &io::Error),
{
    let mut failures: u64 = 0;
    loop {
        match attempt().await {
            Ok(value) => return value,
            Err(e) => {
                failures += 1;
                on_retry(failures, &e);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Server side of the IVA connection.
pub struct Listener {
    inner: TcpListener,
    retry_delay: Duration,
    on_retry: Option<RetryHook>,
    logger: Arc<dyn Logger>,
}

impl Listener {
    pub async fn bind(config: &IvaConfig) -> Result<Self, TransportError> {
        let addr = config.bind_address();
        let inner = TcpListener::bind(&addr)
            .await
            .map_err(|source| TransportError::Bind { addr: addr.clone(), source })?;

        let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new("listener"));
        logger.info(&format!("listening on {}", addr));

        Ok(Self {
            inner,
            retry_delay: config.accept_retry_delay(),
            on_retry: None,
            logger,
        })
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn set_retry_hook(&mut self, hook: impl FnMut(u64, &io::Error) + Send + 'static) {
        self.on_retry = Some(Box::new(hook));
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Waits for the next connection. Accept errors are logged, passed to
    /// the retry hook and retried; this only returns with a live stream.
    pub async fn accept(&mut self) -> Stream<TcpStream> {
        let inner = &self.inner;
        let hook = &mut self.on_retry;
        let logger = self.logger.as_ref();

        let (tcp, peer) = accept_with_retry(
            move || inner.accept(),
            |attempt, err| report_retry(logger, hook, attempt, err),
            self.retry_delay,
        )
        .await;

        self.logger.info(&format!("accepted connection from {}", peer));
        Stream::from_tcp(tcp).with_logger(self.logger.clone())
    }
}

fn report_retry(logger: &dyn Logger, hook: &mut Option<RetryHook>, attempt: u64, err: &io::Error) {
    logger.warning(&format!("accept failed (attempt {}): {}", attempt, err));
    if let Some(hook) = hook.as_mut() {
        hook(attempt, err);
    }
}
