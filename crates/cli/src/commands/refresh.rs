use clap::Args;

use crate::client;
use crate::commands::{ServerArgs, run_cli_async};

#[derive(Args, Debug, Clone)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: RefreshArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: RefreshArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();
    let response = client::refresh_config(&host, port).await?;
    println!("✅ Catalog reloaded: {} app(s).", response.apps);
    Ok(())
}
