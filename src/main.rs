use std::fs::File;
use std::sync::Arc;

use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use twepic::client::{HttpClient, TimelineClient};
use twepic::core::config::{CliOverrides, load_config, resolve};

#[derive(Parser)]
#[command(name = "twepic", about = "Live timeline client for the terminal")]
struct Args {
    /// Log verbosity for twepic.log
    #[arg(long, default_value_t = LevelFilter::Debug)]
    log_level: LevelFilter,

    /// REST API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Streaming API base URL
    #[arg(long)]
    stream_url: Option<String>,

    /// Frames per second of the UI loop
    #[arg(long)]
    fps: Option<u32>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to twepic.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("twepic.log") {
        let _ = WriteLogger::init(args.log_level, log_config, log_file);
    }

    let file_config = load_config().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {e}");
        Default::default()
    });
    let config = resolve(
        &file_config,
        &CliOverrides {
            api_url: args.api_url,
            stream_url: args.stream_url,
            fps: args.fps,
        },
    );
    log::info!("Twepic starting up against {}", config.api_url);

    let client = Arc::new(HttpClient::new(
        config.api_url.clone(),
        config.stream_url.clone(),
        config.token.clone(),
    ));
    let viewer = match client.current_user().await {
        Ok(viewer) => viewer,
        Err(e) => {
            log::error!("Sign-in failed: {e}");
            eprintln!("twepic: sign-in failed: {e}");
            return Err(std::io::Error::other(e.to_string()));
        }
    };

    twepic::tui::run(config, client, viewer)
}
