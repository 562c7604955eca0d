use clap::{Parser, Subcommand};

mod client;
mod commands;

#[derive(Parser)]
#[command(
    name = "launchdeck",
    version,
    about = "\x1b[33mlaunchdeck\x1b[0m launches and supervises your local dev apps 🚀"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🛰️ Run the control server in the foreground
    Serve(commands::serve::ServeArgs),
    /// 📋 List configured apps and their run state
    List(commands::list::ListArgs),
    /// 🚀 Start an app
    Start(commands::start::StartArgs),
    /// 🛑 Stop a running app
    Stop(commands::stop::StopArgs),
    /// 🔎 Show the status of one app
    Status(commands::status::StatusArgs),
    /// 🧹 Kill stale listeners on the well-known dev port ranges
    Cleanup(commands::cleanup::CleanupArgs),
    /// 🔄 Reload the app catalog from disk
    Refresh(commands::refresh::RefreshArgs),
    /// ✅ Validate the app catalog
    Validate(commands::validate::ValidateArgs),
    /// ⏹ Ask the control server to shut down
    Shutdown(commands::shutdown::ShutdownArgs),
}

#[tokio::main]
async fn main() {
    launchdeck_core::init_tracing();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::List(args) => commands::list::run(args).await,
        Commands::Start(args) => commands::start::run(args).await,
        Commands::Stop(args) => commands::stop::run(args).await,
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Cleanup(args) => commands::cleanup::run(args).await,
        Commands::Refresh(args) => commands::refresh::run(args).await,
        Commands::Validate(args) => commands::validate::run(args).await,
        Commands::Shutdown(args) => commands::shutdown::run(args).await,
    };
    std::process::exit(code);
}
