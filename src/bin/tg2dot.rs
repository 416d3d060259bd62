//! Translate text graph files into `.dot` files for graphviz.
//!
//! `tg2dot FILE...` writes `FILE.dot` beside each input. With `--show` the
//! description is piped to the configured renderer instead.

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use textgraph::core::config::load_config_or_default;
use textgraph::graph::{export_dot, render, NodeStyles};
use textgraph::storage::{GraphSource, LocalGraph};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("tg2dot")
        .version(textgraph::VERSION)
        .about("Translate a text graph file to a dot file.")
        .arg(
            Arg::new("files")
                .value_name("TG-FILE")
                .num_args(1..)
                .required(true)
                .help("Graph files to translate"),
        )
        .arg(
            Arg::new("show")
                .long("show")
                .action(ArgAction::SetTrue)
                .help("Render each graph on screen instead of writing .dot files"),
        )
        .arg(
            Arg::new("center")
                .long("center")
                .value_name("ID")
                .value_parser(clap::value_parser!(u64))
                .help("Only describe the neighborhood of this node"),
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

    let center = matches
        .get_one::<u64>("center")
        .map(|&id| (id, config.export.neighborhood_levels));

    for file in matches.get_many::<String>("files").into_iter().flatten() {
        let graph = LocalGraph::open(GraphSource::parse(file), &config.storage)
            .with_context(|| format!("Cannot load {}", file))?;

        if matches.get_flag("show") {
            let description = export_dot(&graph, center, &NodeStyles::new())?;
            render(&description, &config.export)
                .with_context(|| format!("Cannot render {}", file))?;
        } else if center.is_some() {
            let path = GraphSource::parse(file)
                .dot_path()
                .with_context(|| format!("{} is read only.", file))?;
            let description = export_dot(&graph, center, &NodeStyles::new())?;
            std::fs::write(&path, description)
                .with_context(|| format!("Cannot write {}", path.display()))?;
        } else {
            graph.save_dot().with_context(|| format!("Cannot translate {}", file))?;
        }
    }

    Ok(())
}
