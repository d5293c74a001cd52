//! Binary entry point for the nestree command-line front end.
#![forbid(unsafe_code)]

use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use nestree::{NestedSet, NodeId, NodeRow, Placement, SqliteStore, VerifyReport};
use nu_ansi_term::{Color, Style};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(
    name = "nestree",
    version,
    about = "Maintain nested-set trees stored in a SQLite table",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(long, global = true, env = "NESTREE_DB", help = "Path to the SQLite database")]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "NESTREE_CONFIG",
        help = "Path to the CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Disable forests: the table holds a single tree"
    )]
    single_tree: bool,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the node table and its indexes
    Init,
    /// Create a new root
    Root,
    /// Create a node relative to an existing one
    Insert {
        #[arg(value_enum)]
        placement: PlacementArg,
        target: i64,
    },
    /// Move a node and its subtree relative to another node
    Move {
        node: i64,
        #[arg(value_enum)]
        placement: PlacementArg,
        target: i64,
    },
    /// Detach a node and its subtree into a tree of their own
    MakeRoot { node: i64 },
    /// Delete a node, promoting its children unless --with-descendants is set
    Delete {
        node: i64,
        #[arg(long, help = "Remove the whole subtree")]
        with_descendants: bool,
    },
    /// Print trees, or the tree containing one node
    Show {
        #[arg(long, help = "Only show the tree containing this node")]
        node: Option<i64>,
    },
    /// Check every nesting invariant
    Verify,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlacementArg {
    PrependTo,
    AppendTo,
    InsertBefore,
    InsertAfter,
}

impl From<PlacementArg> for Placement {
    fn from(value: PlacementArg) -> Self {
        match value {
            PlacementArg::PrependTo => Placement::PrependTo,
            PlacementArg::AppendTo => Placement::AppendTo,
            PlacementArg::InsertBefore => Placement::InsertBefore,
            PlacementArg::InsertAfter => Placement::InsertAfter,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct Removed {
    removed: usize,
}

#[derive(Serialize)]
struct Initialized {
    database: PathBuf,
    table: String,
    forests: bool,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nestree=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    let db_path = cli
        .db
        .clone()
        .or_else(|| config.database.clone())
        .ok_or("no database path; pass --db or set `database` in the config file")?;
    let schema = config.schema(cli.single_tree);
    let store = SqliteStore::open(&db_path, schema.clone())?;
    let mut tree = NestedSet::new(store);

    match cli.command {
        Command::Init => {
            info!(path = %db_path.display(), table = %schema.table, "cli.init");
            let report = Initialized {
                database: db_path.clone(),
                table: schema.table.clone(),
                forests: schema.forests(),
            };
            emit(cli.format, &report, || {
                println!("Initialized table {} in {}", report.table, db_path.display());
            })?;
        }
        Command::Root => {
            let node = tree.make_root()?;
            info!(node = node.id.0, "cli.root");
            emit(cli.format, &node, || print_node(&node))?;
        }
        Command::Insert { placement, target } => {
            let target = NodeId(target);
            let node = match Placement::from(placement) {
                Placement::PrependTo => tree.prepend_to(target)?,
                Placement::AppendTo => tree.append_to(target)?,
                Placement::InsertBefore => tree.insert_before(target)?,
                Placement::InsertAfter => tree.insert_after(target)?,
            };
            info!(node = node.id.0, target = target.0, "cli.insert");
            emit(cli.format, &node, || print_node(&node))?;
        }
        Command::Move {
            node,
            placement,
            target,
        } => {
            let node = tree.move_node(NodeId(node), placement.into(), NodeId(target))?;
            info!(node = node.id.0, target, "cli.move");
            emit(cli.format, &node, || print_node(&node))?;
        }
        Command::MakeRoot { node } => {
            let node = tree.move_to_root(NodeId(node))?;
            info!(node = node.id.0, "cli.make_root");
            emit(cli.format, &node, || print_node(&node))?;
        }
        Command::Delete {
            node,
            with_descendants,
        } => {
            let removed = if with_descendants {
                tree.delete_with_descendants(NodeId(node))?
            } else {
                tree.delete(NodeId(node))?
            };
            info!(node, removed, with_descendants, "cli.delete");
            let report = Removed { removed };
            emit(cli.format, &report, || println!("Removed {removed} node(s)"))?;
        }
        Command::Show { node } => {
            let rows = match node {
                Some(id) => {
                    let node = tree.node(NodeId(id))?;
                    tree.find(&nestree::query::whole_tree(&node))?
                }
                None => {
                    let mut rows = Vec::new();
                    for root in tree.roots()? {
                        rows.push(root);
                        rows.extend(tree.descendants(root.id, None)?);
                    }
                    rows
                }
            };
            emit(cli.format, &rows, || print_rows(&rows))?;
        }
        Command::Verify => {
            let report = tree.verify()?;
            emit(cli.format, &report, || print_verify_text(&report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn paint() -> bool {
    std::io::stdout().is_terminal()
}

fn styled(style: Style, text: String) -> String {
    if paint() {
        style.paint(text).to_string()
    } else {
        text
    }
}

fn print_node(node: &NodeRow) {
    let tree = node
        .tree
        .map(|tree| format!(" tree={tree}"))
        .unwrap_or_default();
    println!(
        "{} left={} right={} depth={}{tree}",
        styled(Color::Cyan.bold(), format!("node {}", node.id)),
        node.left,
        node.right,
        node.depth
    );
}

fn print_rows(rows: &[NodeRow]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }
    for row in rows {
        let indent = "  ".repeat(usize::try_from(row.depth).unwrap_or(0));
        let label = if row.is_root() {
            styled(Color::Green.bold(), row.id.to_string())
        } else if row.is_leaf() {
            styled(Style::new(), row.id.to_string())
        } else {
            styled(Color::Cyan.normal(), row.id.to_string())
        };
        println!(
            "{indent}{label} {}",
            styled(Style::new().dimmed(), format!("[{}, {}]", row.left, row.right))
        );
    }
}

fn print_verify_text(report: &VerifyReport) {
    println!(
        "Verify: trees={} nodes={}",
        report.counts.trees, report.counts.nodes
    );
    if report.success {
        println!("{}", styled(Color::Green.bold(), "ok".to_string()));
        return;
    }
    println!(
        "{}",
        styled(
            Color::Red.bold(),
            format!("{} finding(s)", report.findings.len())
        )
    );
    for finding in &report.findings {
        let tree = finding
            .tree
            .map(|tree| format!("tree {tree}: "))
            .unwrap_or_default();
        let node = finding
            .node
            .map(|node| format!("node {node}: "))
            .unwrap_or_default();
        println!("  - {tree}{node}{}", finding.message);
    }
}
