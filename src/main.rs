use clap::Parser;
use scenefade::event::Registration;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

/// scenefade — Stream Deck plugin that fades an overlay across OBS scene switches
#[derive(Parser)]
#[command(name = "scenefade", version, about)]
struct Cli {
    /// Host websocket port.
    #[arg(long)]
    port: u16,

    /// Plugin instance id assigned by the host.
    #[arg(long = "pluginUUID")]
    plugin_uuid: String,

    /// Event name to register with.
    #[arg(long = "registerEvent")]
    register_event: String,

    /// Host and device information (JSON).
    #[arg(long)]
    info: Option<String>,

    /// Path to the config file (TOML). Missing file means defaults.
    #[arg(short, long, default_value = "scenefade.toml")]
    config: PathBuf,

    /// Enable JSON log output.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(scenefade::host::normalize_args(std::env::args()));

    // Stream Deck discards stdout; logs go to stderr.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scenefade=info"));

    if cli.json {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    info!("scenefade v{}", env!("CARGO_PKG_VERSION"));
    if let Some(info) = &cli.info {
        debug!("host info: {info}");
    }

    let config = scenefade::config::load_or_default(&cli.config)?;
    info!("OBS endpoint: {}", config.obs.url());

    let registration = Registration {
        event: cli.register_event,
        uuid: cli.plugin_uuid,
    };
    scenefade::plugin::run(config, cli.port, registration).await?;

    Ok(())
}
