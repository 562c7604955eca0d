use clap::Args;

use crate::client;
use crate::commands::{ServerArgs, run_cli_async, spinner};

#[derive(Args, Debug, Clone)]
pub struct ShutdownArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: ShutdownArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: ShutdownArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();

    let progress = spinner("⏹  Stopping control server and all apps...");
    let result = client::stop_server(&host, port).await;
    progress.finish_and_clear();

    result?;
    println!("✅ Control server shutting down.");
    Ok(())
}
