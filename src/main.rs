mod config;
mod docker;
mod judge;
mod logging;
mod server;
mod testcases;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cjudge")]
#[command(about = "Sandboxed code judging service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server (default command)
    Serve {
        /// Host to bind
        #[arg(short = 'H', long, default_value = "0.0.0.0", env = "CJUDGE_HOST")]
        host: String,

        /// Port to bind
        #[arg(short, long, default_value = "9000", env = "CJUDGE_PORT")]
        port: u16,
    },

    /// Force-remove all sandbox pool containers and exit
    Teardown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = logging::init_logging("./logs", "cjudge");

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve {
        host: "0.0.0.0".to_string(),
        port: 9000,
    });

    match command {
        Commands::Serve { host, port } => {
            server::server::run_rest_server(&host, port).await?;
        }
        Commands::Teardown => {
            let config = config::JudgeConfig::from_env();
            let client = Arc::new(docker::DockerClient::new(None).await?);
            let pool = docker::ContainerPool::new(client, config);
            pool.teardown().await;
        }
    }

    Ok(())
}
