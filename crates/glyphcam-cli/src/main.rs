mod config;
mod stream;
mod watch;

use clap::{Parser, Subcommand};
use config::Config;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or unparsable. Dropped frames and read
/// retries are logged at warn and must reach stderr.
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "glyphcam", about = "Face-masked true-color glyph camera for the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the glyph frame stream on stdout
    Stream {
        /// Camera index (/dev/videoN)
        #[arg(default_value_t = 0)]
        camera: u32,
    },
    /// Run the stream and display it in this terminal
    Watch {
        /// Camera index (/dev/videoN)
        #[arg(default_value_t = 0)]
        camera: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the frame stream; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command {
        Commands::Stream { camera } => {
            tokio::task::spawn_blocking(move || stream::run(camera, &config))
                .await
                .map_err(anyhow::Error::from)
                .and_then(|r| r)
        }
        Commands::Watch { camera } => watch::run(camera, config.close_delay_secs).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(Some("  ")).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_log_filter_honours_directives() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(
            log_filter(Some("glyphcam_core=trace")).max_level_hint(),
            Some(LevelFilter::TRACE)
        );
    }
}
