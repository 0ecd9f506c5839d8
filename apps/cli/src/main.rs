use anyhow::Context;
use clap::Parser;
use filekit::logger::Logger;
use filekit_cli::{Cli, Settings, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings =
        Settings::load(cli.config.as_deref()).context("Critical: Configuration is malformed")?;

    let _log = Logger::from_settings(env!("CARGO_PKG_NAME"), &settings.log)?;

    let failed = run(cli.command, settings, &mut std::io::stdout().lock()).await?;
    if failed > 0 {
        anyhow::bail!("{failed} item(s) failed");
    }
    Ok(())
}
