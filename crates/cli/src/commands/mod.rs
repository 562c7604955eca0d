pub mod cleanup;
pub mod list;
pub mod refresh;
pub mod serve;
pub mod shutdown;
pub mod start;
pub mod status;
pub mod stop;
pub mod validate;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

use launchdeck_common::{DEFAULT_HOST, DEFAULT_SERVER_PORT, env};

pub async fn run_cli_async<F, Fut>(f: F) -> i32
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    match f().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

/// Control-server address flags shared by every command that talks to it.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(
        long = "host",
        value_name = "HOST",
        help = "Control server host. Defaults to LAUNCHDECK_HOST or 127.0.0.1"
    )]
    pub host: Option<String>,
    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        help = "Control server port. Defaults to LAUNCHDECK_PORT or 4500"
    )]
    pub port: Option<u16>,
}

impl ServerArgs {
    /// Resolve flags against environment variables and built-in defaults.
    pub fn resolve(&self) -> (String, u16) {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| env::var_or("LAUNCHDECK_HOST", DEFAULT_HOST));
        let port = self
            .port
            .unwrap_or_else(|| env::var_u16_or("LAUNCHDECK_PORT", DEFAULT_SERVER_PORT));
        (host, port)
    }
}

pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    spinner
}

pub fn format_elapsed_ms(start: Instant) -> String {
    let elapsed = start.elapsed();
    if elapsed.as_secs() == 0 {
        return format!("{}ms", elapsed.as_millis());
    }
    let seconds = elapsed.as_secs();
    let remaining_ms = elapsed.subsec_millis();
    format!("{seconds}s {remaining_ms}ms")
}
