//! Surface Probe - check selector tables against captured page markup
//!
//! Loads a page fixture, resolves the platform, locates the surfaces, mounts
//! the overlay and optionally injects memory blocks, then prints a JSON report.
//!
//! # Usage
//!
//! ```bash
//! surface-probe fixtures/claude.json
//! surface-probe fixtures/gemini.json --blocks blocks.json --inject
//! ```

use memory_injector::{
    editor, locator, platform, Config, EditorKind, Engine, EngineStatus, HostDocument,
    MemoryDocument, Platform, StaticMemoryService, Surfaces,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct ProbeArgs {
    page: Option<PathBuf>,
    config_path: Option<PathBuf>,
    blocks_path: Option<PathBuf>,
    inject: bool,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    address: String,
    platform: Option<Platform>,
    surfaces: Option<Surfaces>,
    editor_kind: Option<EditorKind>,
    status: EngineStatus,
    editor_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inject_error: Option<String>,
}

fn parse_args() -> ProbeArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut probe = ProbeArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("Surface Probe v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    probe.config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--blocks" | "-b" => {
                i += 1;
                if i < args.len() {
                    probe.blocks_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--inject" => {
                probe.inject = true;
            }
            arg if !arg.starts_with('-') && probe.page.is_none() => {
                probe.page = Some(PathBuf::from(arg));
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    probe
}

fn print_help() {
    println!(
        r#"Surface Probe - check selector tables against captured page markup

USAGE:
    surface-probe <PAGE.json> [OPTIONS]

OPTIONS:
    -h, --help              Show this help message
    -v, --version           Show version
    -c, --config <PATH>     Path to configuration file
    -b, --blocks <PATH>     JSON array of memory blocks
    --inject                Inject the blocks into the located editor

EXAMPLES:
    surface-probe fixtures/claude.json
    surface-probe fixtures/gemini.json --blocks blocks.json --inject
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let config = match &args.config_path {
        Some(path) => Config::load_from_path(path.clone()),
        None => Config::load(),
    };

    // Logs go to stderr so stdout stays valid JSON
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.general.effective_log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(page) = args.page else {
        eprintln!("Missing page fixture. Use --help for usage information.");
        std::process::exit(1);
    };

    let doc = MemoryDocument::load_fixture(&page)?;
    info!("Loaded {:?} ({})", page, doc.address());

    let (capture_tx, _capture_rx) = mpsc::channel(1);
    let mut engine = Engine::new(doc, config, capture_tx);
    let now = Instant::now();
    engine.start(now);

    let mut inject_error = None;
    if args.inject {
        match &args.blocks_path {
            Some(path) => {
                let service = StaticMemoryService::from_json_file(path)?;
                if let Err(e) = engine.inject_all(&service, now).await {
                    inject_error = Some(e.to_string());
                }
            }
            None => warn!("--inject given without --blocks, skipping injection"),
        }
    }

    let doc = engine.document();
    let address = doc.address();
    let detected = platform::resolve(&address);
    let handle = detected.and_then(|p| editor::resolve(doc, p));

    let report = ProbeReport {
        surfaces: detected.map(|p| locator::locate_all(doc, p)),
        editor_kind: handle.map(|h| h.kind),
        editor_text: handle.map(|h| editor::read(doc, &h)),
        status: engine.status(),
        platform: detected,
        address,
        inject_error,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
