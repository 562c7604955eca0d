use clap::Args;

use crate::client;
use crate::commands::{ServerArgs, run_cli_async};

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(
        value_name = "APP_ID",
        help = "Id of the app to inspect. Omit for a server summary"
    )]
    pub app_id: Option<String>,
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: StatusArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: StatusArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();

    let Some(app_id) = args.app_id else {
        let health = client::health(&host, port).await?;
        println!(
            "✅ Control server {} at http://{host}:{port} (v{})",
            health.status, health.version
        );
        println!("   {} apps configured, {} running", health.apps, health.running);
        return Ok(());
    };

    let status = client::app_status(&host, port, &app_id).await?;
    println!("{} ({})", status.name, status.id);
    println!("  kind:  {}", status.kind);
    println!("  path:  {}", status.path);
    if !status.description.is_empty() {
        println!("  about: {}", status.description);
    }
    if status.is_running {
        match status.port {
            Some(app_port) => println!("  state: 🟢 running at http://localhost:{app_port}"),
            None => println!("  state: 🟢 running"),
        }
        if let Some(pid) = status.pid {
            println!("  pid:   {pid}");
        }
    } else {
        println!("  state: ⚪ stopped");
        if let Some(preferred) = status.preferred_port {
            println!("  port:  {preferred} (preferred)");
        }
    }
    Ok(())
}
