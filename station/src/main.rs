//! Dark Station Chronicles console.
//!
//! Plays one session over stdin/stdout with whatever narrative providers the
//! environment configures:
//!
//! ```bash
//! cargo run -p station -- --save-dir ./saves --backend llama
//! ```

mod backends;
mod console;

use station_core::{EngineConfig, GameEngine, World};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct Args {
    world: Option<PathBuf>,
    save_dir: Option<PathBuf>,
    backend: Option<String>,
    help: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays a clean protocol stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1));
    if args.help {
        print_help();
        return Ok(());
    }

    let mut config = EngineConfig::from_env()?;
    if let Some(dir) = args.save_dir {
        config = config.with_save_dir(dir);
    }
    if let Some(backend) = args.backend {
        config = config.with_default_backend(backend);
    }

    let world = match &args.world {
        Some(path) => World::from_json(&tokio::fs::read(path).await?)?,
        None => World::dark_station(),
    };
    info!(rooms = world.len(), start = %world.start_room(), "World loaded");

    let registry = backends::registry_from_env().await;
    let narrator = Arc::new(config.narrator(registry));
    let engine = GameEngine::with_file_storage(Arc::new(world), narrator, config);

    let result = console::run_console(&engine).await;
    engine.shutdown().await;
    Ok(result?)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Args {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--world" => parsed.world = args.next().map(PathBuf::from),
            "--save-dir" => parsed.save_dir = args.next().map(PathBuf::from),
            "--backend" => parsed.backend = args.next(),
            _ => {}
        }
    }
    parsed
}

fn print_help() {
    println!("Dark Station Chronicles - an AI-narrated text adventure");
    println!();
    println!("USAGE:");
    println!("  station [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --world <PATH>      Load the station map from a JSON file");
    println!("  --save-dir <DIR>    Directory for save files (default: saves, or STATION_SAVE_DIR)");
    println!("  --backend <ID>      Starting narrator (default: claude, or DEFAULT_AI_BACKEND)");
    println!();
    println!("PROVIDERS (configured from the environment or .env):");
    println!("  claude       ANTHROPIC_API_KEY   [ANTHROPIC_MODEL]");
    println!("  openai       OPENAI_API_KEY      [OPENAI_MODEL]");
    println!("  openrouter   OPENROUTER_API_KEY  [OPENROUTER_MODEL]");
    println!("  gemini       GEMINI_API_KEY      [GEMINI_MODEL]");
    println!("  llama        LLAMA_SERVER_URL");
    println!();
    println!("TUNING:");
    println!("  STATION_AI_TIMEOUT_SECS, STATION_DEMOTION_THRESHOLD, STATION_HISTORY_WINDOW,");
    println!("  STATION_MAX_STORED_TURNS (0 or unset keeps the full history)");
    println!("  RUST_LOG controls log verbosity (logs are written to stderr)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--save-dir", "/tmp/saves", "--backend", "llama", "--verbose"]);
        assert_eq!(parsed.save_dir, Some(PathBuf::from("/tmp/saves")));
        assert_eq!(parsed.backend.as_deref(), Some("llama"));
        assert!(!parsed.help);
        assert!(parsed.world.is_none());
    }

    #[test]
    fn test_help_flag() {
        assert!(args(&["-h"]).help);
        assert!(args(&["--help"]).help);
    }

    #[test]
    fn test_missing_value_is_ignored() {
        assert_eq!(args(&["--backend"]).backend, None);
    }
}
