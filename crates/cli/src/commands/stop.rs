use clap::Args;
use std::time::Instant;

use crate::client;
use crate::commands::{ServerArgs, format_elapsed_ms, run_cli_async, spinner};

#[derive(Args, Debug, Clone)]
pub struct StopArgs {
    #[arg(value_name = "APP_ID", help = "Id of the app to stop")]
    pub app_id: String,
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: StopArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: StopArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();
    let start_time = Instant::now();

    let progress = spinner(&format!("🛑 Stopping {}...", args.app_id));
    let result = client::stop_app(&host, port, &args.app_id).await;
    progress.finish_and_clear();

    result?;
    println!(
        "✅ {} stopped ({})",
        args.app_id,
        format_elapsed_ms(start_time)
    );
    Ok(())
}
