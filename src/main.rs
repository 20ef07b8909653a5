use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use log::{error, info};

use merlion::{initialize_logger, App, Cli, CredentialStore, Result, UserConfig};

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => UserConfig::default_path()?,
    };
    let config = UserConfig::load_from(&config_path)?;
    let credentials = Arc::new(CredentialStore::new()?);

    let mut app = App::new(config, config_path, credentials, cli.base_url, cli.verbose);
    app.run(cli.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    initialize_logger();
    let cli = Cli::parse();

    info!("Application starting up");
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", console::style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
