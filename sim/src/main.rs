use std::collections::HashMap;
use std::error::Error;

use clap::Parser;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use sim::{SimController, SimState};

/// Simulated IVA runtime: connects to a control process and answers its
/// instructions like the procedure running on the arm would.
#[derive(Parser, Debug)]
#[command(name = "sim", version, about)]
struct Args {
    /// Address of the control process listener.
    #[arg(long, default_value = "127.0.0.1:50003")]
    addr: String,

    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 50)]
    attempts: u32,

    /// Delay between connection attempts, in milliseconds.
    #[arg(long, default_value_t = 200)]
    retry_ms: u64,

    /// Runtime data served to `get_data`, as `key=value`.
    #[arg(long = "data", value_parser = parse_key_value)]
    data: Vec<(String, String)>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{}`", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let data: HashMap<String, String> = args.data.into_iter().collect();
    let sim = SimController::with_state(SimState {
        data,
        ..SimState::default()
    });

    sim.connect_and_serve(&args.addr, args.attempts, Duration::from_millis(args.retry_ms))
        .await?;

    let state = sim.state();
    let state = state.lock().await;
    tracing::info!(
        "session closed after {} instructions, {} context(s) left open",
        state.received.len(),
        state.depth
    );
    Ok(())
}
