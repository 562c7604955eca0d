use clap::Args;

use crate::client;
use crate::commands::{ServerArgs, run_cli_async};

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

pub async fn run(args: ValidateArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: ValidateArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();
    let reports = client::validate_config(&host, port).await?;

    if reports.is_empty() {
        println!("No apps configured. Nothing to validate.");
        return Ok(());
    }

    let mut failed = 0;
    for report in &reports {
        if report.valid && report.warnings.is_empty() {
            println!("✅ {} ({})", report.name, report.id);
            continue;
        }
        if report.valid {
            println!("⚠️  {} ({})", report.name, report.id);
        } else {
            failed += 1;
            println!("❌ {} ({})", report.name, report.id);
        }
        for error in &report.errors {
            println!("   error: {error}");
        }
        for warning in &report.warnings {
            println!("   warning: {warning}");
        }
    }

    if failed > 0 {
        Err(format!("{failed} app configuration(s) failed validation"))
    } else {
        Ok(())
    }
}
