use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tagmap::graph::{GraphError, OTHER_NAME};
use tagmap::logging::{default_log_level, init_logging};
use tagmap::utils::{get_snapshot_path, read_snapshot, write_snapshot};
use tagmap::{
    AppContext, Config, Graph, HttpStoreBuilder, InMemoryStore, KnowledgeBase, ServiceError, Store,
    TagId,
};

/// tagmap - browse a tag-organized knowledge base from the terminal
#[derive(Parser)]
#[command(name = "tagmap")]
#[command(about = "Browse, search and lay out a tag-organized knowledge base")]
#[command(version)]
struct Cli {
    /// Read tags and entries from a snapshot file instead of the server
    #[arg(long, global = true, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Log level or filter spec (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Print the tag hierarchy with entry totals
    Tree,
    /// Rank entries against a query
    Search(SearchCommand),
    /// Run the force-directed layout and print tag positions as JSON
    Layout(LayoutCommand),
    /// Download the server snapshot to a file
    Fetch(FetchCommand),
}

#[derive(Parser)]
struct SearchCommand {
    /// Words to look for; three characters or more match by prefix
    #[arg(value_name = "QUERY")]
    query: String,

    /// Only search under the tag with this name
    #[arg(short, long, value_name = "NAME")]
    tag: Option<String>,

    /// Maximum number of results
    #[arg(short, long, value_name = "N", default_value_t = 10)]
    limit: usize,
}

#[derive(Parser)]
struct LayoutCommand {
    /// Number of ticks to run; defaults to running until the layout settles
    #[arg(long, value_name = "N")]
    ticks: Option<usize>,

    /// Seed for initial placement
    #[arg(long, value_name = "S")]
    seed: Option<u64>,
}

#[derive(Parser)]
struct FetchCommand {
    /// Destination file; defaults to the platform data directory
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(e) = init_logging(&level) {
        eprintln!("Warning: logging disabled: {e}");
    }

    let result = match &cli.command {
        Commands::Tree => handle_tree(cli.snapshot.as_deref()),
        Commands::Search(cmd) => handle_search(cmd, cli.snapshot.as_deref()),
        Commands::Layout(cmd) => handle_layout(cmd, cli.snapshot.as_deref()),
        Commands::Fetch(cmd) => handle_fetch(cmd),
    };

    if let Err(e) = result {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad input: an empty query, an unknown tag name or a
/// snapshot that does not describe a valid tree. Everything else, including
/// transport and I/O failures, is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    let graph_error = error.chain().any(|cause| {
        cause.downcast_ref::<GraphError>().is_some()
            || matches!(
                cause.downcast_ref::<ServiceError>(),
                Some(ServiceError::Graph(_))
            )
    });
    let message = error.to_string();
    graph_error || message.contains("cannot be empty") || message.contains("No tag named")
}

/// Opens the snapshot file if one was given, otherwise the server.
fn open_store(snapshot: Option<&Path>) -> Result<Box<dyn Store>> {
    match snapshot {
        Some(path) => Ok(Box::new(InMemoryStore::from_snapshot(read_snapshot(path)?))),
        None => Ok(Box::new(
            HttpStoreBuilder::new()
                .build()
                .context("Failed to create store client")?,
        )),
    }
}

fn load(snapshot: Option<&Path>, config: &Config, seed: Option<u64>) -> Result<KnowledgeBase> {
    let store = open_store(snapshot)?;
    let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    KnowledgeBase::load_with_rng(store, config.layout.center, rng)
        .context("Failed to load knowledge base")
}

fn handle_tree(snapshot: Option<&Path>) -> Result<()> {
    let kb = load(snapshot, &Config::from_env(), None)?;
    print!("{}", render_tree(kb.graph()));
    Ok(())
}

/// Renders the hierarchy depth-first, two spaces per level, with the
/// catch-all tag listed last among its siblings.
fn render_tree(graph: &Graph) -> String {
    fn walk(graph: &Graph, id: TagId, depth: usize, out: &mut String) {
        let Some(tag) = graph.tag(id) else {
            return;
        };
        out.push_str(&format!(
            "{}{} ({})\n",
            "  ".repeat(depth),
            tag.name(),
            tag.total_entries()
        ));
        let mut children = tag.children().to_vec();
        children.sort_by_key(|child| graph.tag(*child).is_some_and(|c| c.name() == OTHER_NAME));
        for child in children {
            walk(graph, child, depth + 1, out);
        }
    }

    let mut out = String::new();
    walk(graph, graph.root(), 0, &mut out);
    out
}

fn handle_search(cmd: &SearchCommand, snapshot: Option<&Path>) -> Result<()> {
    let config = Config::from_env();
    let kb = load(snapshot, &config, None)?;
    for line in execute_search(kb, &config, &cmd.query, cmd.tag.as_deref(), cmd.limit)? {
        println!("{line}");
    }
    Ok(())
}

/// Executes the search command logic against a loaded knowledge base.
///
/// Separated from `handle_search` so it can be tested with an in-memory store.
fn execute_search(
    kb: KnowledgeBase,
    config: &Config,
    query: &str,
    tag: Option<&str>,
    limit: usize,
) -> Result<Vec<String>> {
    if query.trim().is_empty() {
        anyhow::bail!("Search query cannot be empty");
    }

    let mut app = AppContext::new(kb, config);
    if let Some(name) = tag {
        let id = app
            .graph()
            .tag_by_name(name)
            .map(|tag| tag.id())
            .ok_or_else(|| anyhow::anyhow!("No tag named '{name}'"))?;
        app.select_tag(id)?;
    }
    app.edit_query(query, Instant::now());
    app.flush();

    let graph = app.graph();
    let lines = app
        .ranked_entries()?
        .into_iter()
        .take(limit)
        .filter_map(|ranked| {
            let entry = graph.entry(ranked.id)?;
            let tag = graph.tag(entry.category())?;
            Some(format!(
                "{:.3}  {}  [{}] (id: {})",
                ranked.score,
                entry.title(),
                tag.name(),
                entry.id()
            ))
        })
        .collect();
    Ok(lines)
}

#[derive(Debug, Serialize)]
struct TagPosition {
    id: TagId,
    name: String,
    x: f64,
    y: f64,
}

fn handle_layout(cmd: &LayoutCommand, snapshot: Option<&Path>) -> Result<()> {
    let config = Config::from_env();
    let kb = load(snapshot, &config, cmd.seed)?;
    let positions = execute_layout(kb, &config, cmd.ticks);
    println!(
        "{}",
        serde_json::to_string_pretty(&positions).context("Failed to serialize positions")?
    );
    Ok(())
}

/// Runs the simulation for `ticks` steps, or until it settles.
fn execute_layout(kb: KnowledgeBase, config: &Config, ticks: Option<usize>) -> Vec<TagPosition> {
    let mut app = AppContext::new(kb, config);
    let mut steps = 0;
    while !app.layout().is_settled() && ticks.is_none_or(|limit| steps < limit) {
        app.tick();
        steps += 1;
    }
    log::info!("event=layout_run ticks={} status=ok", steps);
    app.graph()
        .tags()
        .map(|tag| TagPosition {
            id: tag.id(),
            name: tag.name().to_string(),
            x: tag.position().x,
            y: tag.position().y,
        })
        .collect()
}

fn handle_fetch(cmd: &FetchCommand) -> Result<()> {
    let path = match &cmd.output {
        Some(path) => path.clone(),
        None => get_snapshot_path()?,
    };
    let store = HttpStoreBuilder::new()
        .build()
        .context("Failed to create store client")?;
    let snapshot = store.fetch_all().context("Failed to fetch snapshot")?;
    write_snapshot(&path, &snapshot)?;
    println!(
        "Snapshot saved to {} ({} tags, {} entries)",
        path.display(),
        snapshot.tags.len(),
        snapshot.entries.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tagmap::{EntryId, EntryRecord, Snapshot, TagRecord, Vector};
    use time::macros::datetime;

    fn snapshot() -> Snapshot {
        let mut main = TagRecord::new(TagId::new(1), "main");
        main.children = vec![TagId::new(3), TagId::new(2)];
        let at = datetime!(2020-01-01 00:00:00 UTC);
        Snapshot {
            tags: vec![
                main,
                TagRecord::new(TagId::new(2), "rust"),
                TagRecord::new(TagId::new(3), "other"),
            ],
            entries: vec![
                EntryRecord {
                    id: EntryId::new(10),
                    title: "Tokio runtime".to_string(),
                    content: String::new(),
                    created_at: at,
                    modified_at: at,
                    category: TagId::new(2),
                },
                EntryRecord {
                    id: EntryId::new(11),
                    title: "Token buckets".to_string(),
                    content: String::new(),
                    created_at: at,
                    modified_at: at,
                    category: TagId::new(3),
                },
            ],
        }
    }

    fn kb() -> KnowledgeBase {
        KnowledgeBase::load_with_rng(
            Box::new(InMemoryStore::from_snapshot(snapshot())),
            Vector::new(4000.0, 4000.0),
            StdRng::seed_from_u64(1),
        )
        .expect("failed to load knowledge base")
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["tagmap", "tree", "--snapshot", "kb.json"])
            .expect("failed to parse");
        assert_eq!(cli.snapshot, Some(PathBuf::from("kb.json")));
        assert!(matches!(cli.command, Commands::Tree));
    }

    #[test]
    fn search_defaults_limit() {
        let cli = Cli::try_parse_from(["tagmap", "search", "tok"]).expect("failed to parse");
        let Commands::Search(cmd) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(cmd.limit, 10);
        assert_eq!(cmd.tag, None);
    }

    #[test]
    fn tree_lists_other_last() {
        let tree = render_tree(kb().graph());

        assert_eq!(tree, "main (2)\n  rust (1)\n  other (1)\n");
    }

    #[test]
    fn search_ranks_across_the_whole_tree() {
        let lines = execute_search(kb(), &Config::default(), "tok", None, 10)
            .expect("search should succeed");

        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn search_narrows_to_tag() {
        let lines = execute_search(kb(), &Config::default(), "tok", Some("rust"), 10)
            .expect("search should succeed");

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Tokio runtime"));
        assert!(lines[0].contains("[rust]"));
    }

    #[test]
    fn search_errors_are_user_errors() {
        let empty = execute_search(kb(), &Config::default(), "  ", None, 10).unwrap_err();
        assert!(is_user_error(&empty));

        let unknown = execute_search(kb(), &Config::default(), "tok", Some("nope"), 10).unwrap_err();
        assert!(is_user_error(&unknown));
    }

    #[test]
    fn store_failures_are_internal_errors() {
        let store = InMemoryStore::from_snapshot(snapshot());
        store.set_failing(true);

        let error = KnowledgeBase::load(Box::new(store), Vector::ZERO)
            .context("Failed to load knowledge base")
            .unwrap_err();

        assert!(!is_user_error(&error));
    }

    #[test]
    fn layout_respects_tick_limit() {
        let positions = execute_layout(kb(), &Config::default(), Some(5));

        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].x, 4000.0);
        assert_eq!(positions[0].y, 4000.0);
    }
}
