//! Text Graph Server
//!
//! Serves one graph over stdin/stdout: each request line gets exactly two
//! reply lines. Logs go to stderr.

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use std::io::{self, BufWriter};
use textgraph::core::Config;
use textgraph::protocol::{GraphServer, ServeMode};
use textgraph::storage::GraphSource;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let matches = Command::new("textgraph-server")
        .version(textgraph::VERSION)
        .about("Line-oriented server for the text graph protocol.")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Graph file or http(s) URL to serve (URLs are read only)"),
        )
        .arg(
            Arg::new("repl")
                .long("repl")
                .action(ArgAction::SetTrue)
                .help("Run in REPL mode, don't exit on malformed requests"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .get_matches();

    // Load configuration
    let mut config = if let Some(config_path) = matches.get_one::<String>("config") {
        Config::from_file(config_path)?
    } else {
        Config::load()?
    };
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    config.validate()?;

    // Initialize logging
    textgraph::init(&config.logging);

    let file = matches.get_one::<String>("file");
    let mut server = match file {
        Some(location) => GraphServer::open(GraphSource::parse(location), &config.storage)
            .with_context(|| format!("Cannot serve {}", location))?,
        None => GraphServer::new(),
    };

    let mode = if matches.get_flag("repl") {
        ServeMode::Repl
    } else {
        ServeMode::Strict
    };
    info!("Starting textgraph-server v{} ({:?} mode)", textgraph::VERSION, mode);

    let stdin = io::stdin();
    let stdout = io::stdout();
    server.serve(stdin.lock(), BufWriter::new(stdout.lock()), mode)?;

    if config.protocol.persist_on_exit && file.is_some() && server.is_dirty() {
        if server.is_read_only() {
            warn!("Not saving: graph is read only");
        } else {
            server.save()?;
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}
