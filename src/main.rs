use std::{io, path::PathBuf, process};

use clap::Parser;
use eyre::WrapErr as _;
use localcert::{provision, Config, ProvisionOptions, StdinPrompt};

/// Provision or renew the TLS certificate of your localcert domain.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Renew the certificate even if it is valid for more than 30 days.
    #[arg(long = "forceRenew")]
    force_renew: bool,

    /// Directory holding the account, certificate and key files [default: $HOME/.localcert].
    #[arg(long, env = "LOCALCERT_DIR")]
    config_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir()?,
    };
    log::info!("Using config directory {}", config_dir.display());

    let mut config = Config::load(&config_dir)
        .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
    let mut client = config.client()?;
    let mut prompt = StdinPrompt::new();

    let options = ProvisionOptions {
        force_renew: cli.force_renew,
    };

    let res = provision(
        &mut config,
        &mut client,
        &mut prompt,
        &mut io::stdout(),
        options,
    )
    .await;

    if let Err(err) = res {
        log::debug!("{:?}", err.report());
        eprintln!("{err}");
        process::exit(1);
    }

    Ok(())
}
