use clap::Args;
use std::time::Instant;

use crate::client;
use crate::commands::{ServerArgs, format_elapsed_ms, run_cli_async, spinner};

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    #[arg(value_name = "APP_ID", help = "Id of the app to start")]
    pub app_id: String,
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: StartArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: StartArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();
    let start_time = Instant::now();

    let progress = spinner(&format!("🚀 Starting {}...", args.app_id));
    let result = client::start_app(&host, port, &args.app_id).await;
    progress.finish_and_clear();

    let outcome = result?;
    if outcome.terminal {
        println!(
            "✅ {} launched in a terminal window ({})",
            outcome.name,
            format_elapsed_ms(start_time)
        );
        return Ok(());
    }

    match outcome.port {
        Some(app_port) => println!(
            "✅ {} running at http://localhost:{app_port} ({})",
            outcome.name,
            format_elapsed_ms(start_time)
        ),
        None => println!(
            "✅ {} running ({})",
            outcome.name,
            format_elapsed_ms(start_time)
        ),
    }
    if let Some(pid) = outcome.pid {
        println!("   pid {pid}");
    }
    Ok(())
}
