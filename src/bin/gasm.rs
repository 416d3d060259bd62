//! Translate text graph assembly files into standard textual assembly.
//!
//! `gasm FILE...` writes `FILE.asm` beside each input.

use anyhow::Context;
use clap::{Arg, Command};
use textgraph::core::config::load_config_or_default;
use textgraph::storage::{GraphSource, LocalGraph};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gasm")
        .version(textgraph::VERSION)
        .about("Translate a text graph asm file to a standard textual asm file.")
        .arg(
            Arg::new("files")
                .value_name("GASM-FILE")
                .num_args(1..)
                .required(true)
                .help("Graph files to translate"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .get_matches();

    let config = load_config_or_default(matches.get_one::<String>("config").map(String::as_str));
    textgraph::init(&config.logging);

    for file in matches.get_many::<String>("files").into_iter().flatten() {
        let source = GraphSource::parse(file);
        let path = source
            .asm_path()
            .with_context(|| format!("{} has no local path", file))?;
        let graph = LocalGraph::open(source, &config.storage)
            .with_context(|| format!("Cannot load {}", file))?;
        let asm = graph
            .to_asm()
            .with_context(|| format!("Cannot translate {}", file))?;
        std::fs::write(&path, asm).with_context(|| format!("Cannot write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    Ok(())
}
