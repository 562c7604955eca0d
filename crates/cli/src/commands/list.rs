use clap::Args;

use crate::client;
use crate::commands::{ServerArgs, run_cli_async};

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub server: ServerArgs,
    #[arg(long = "json", help = "Print the raw JSON response")]
    pub json: bool,
}

pub async fn run(args: ListArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: ListArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();
    let apps = client::list_apps(&host, port).await?;

    if args.json {
        let raw = serde_json::to_string_pretty(
            &apps
                .iter()
                .map(|app| {
                    serde_json::json!({
                        "id": app.id,
                        "name": app.name,
                        "kind": app.kind,
                        "is_running": app.is_running,
                        "port": app.port,
                        "pid": app.pid,
                    })
                })
                .collect::<Vec<_>>(),
        )
        .map_err(|err| format!("Failed to render JSON: {err}"))?;
        println!("{raw}");
        return Ok(());
    }

    if apps.is_empty() {
        println!("No apps configured. Add entries to ~/.launchdeck/apps.toml.");
        return Ok(());
    }

    for app in apps {
        let state = if app.is_running {
            match app.port {
                Some(port) => format!("🟢 running at http://localhost:{port}"),
                None => "🟢 running".to_string(),
            }
        } else {
            "⚪ stopped".to_string()
        };
        println!("{:<16} {:<24} [{}] {}", app.id, app.name, app.kind, state);
        if !app.description.is_empty() {
            println!("{:<16} {}", "", app.description);
        }
    }
    Ok(())
}
