use clap::Args;

use crate::client;
use crate::commands::{ServerArgs, run_cli_async, spinner};

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: CleanupArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: CleanupArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();

    let progress = spinner("🧹 Sweeping dev port ranges...");
    let result = client::cleanup_ports(&host, port).await;
    progress.finish_and_clear();

    let response = result?;
    if response.freed.is_empty() {
        println!("✅ No stale listeners found.");
    } else {
        let ports: Vec<String> = response.freed.iter().map(u16::to_string).collect();
        println!(
            "✅ Freed {} port(s): {}",
            response.freed.len(),
            ports.join(", ")
        );
    }
    Ok(())
}
