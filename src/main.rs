//! knowtree CLI: LLM-generated mind maps grounded in Wikipedia.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use knowtree::config::KnowtreeConfig;
use knowtree::error::{KnowtreeError, KnowtreeResult};
use knowtree::extract::extract;
use knowtree::graph::Graph;
use knowtree::knowledge::WikipediaClient;
use knowtree::llm::OpenAiClient;
use knowtree::message::{JsonSink, MessageSink, StdoutSink};
use knowtree::paths::KnowtreePaths;
use knowtree::render::html::export_html;
use knowtree::render::{LayoutConfig, Rendered, VisualGraph, outline_lines};
use knowtree::session::{Session, SessionOptions};

#[derive(Parser)]
#[command(name = "knowtree", version, about = "Mind maps generated by a language model, grounded in Wikipedia")]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/knowtree/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a mind map for a topic.
    Generate {
        /// The topic, e.g. "Sistema Solar".
        topic: String,

        /// Also write a vis-network HTML page (default path under the cache dir).
        #[arg(long, value_name = "PATH", num_args = 0..=1)]
        html: Option<Option<PathBuf>>,

        /// Stream progress as JSON lines; the last line is the history entry.
        #[arg(long)]
        json: bool,
    },

    /// Run the extractor over a saved model response.
    Extract {
        /// File holding the raw completion text.
        #[arg(long)]
        file: PathBuf,

        /// Print the parsed graph as JSON instead of an outline.
        #[arg(long)]
        json: bool,
    },

    /// Turn graph JSON (or a saved model response) into an HTML page.
    Render {
        #[arg(long)]
        file: PathBuf,

        /// Output HTML file.
        #[arg(long)]
        html: PathBuf,

        /// Page title (defaults to the input file name).
        #[arg(long)]
        title: Option<String>,
    },

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Launch the interactive terminal UI.
    Tui,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Tui));

    match run(cli) {
        Ok(()) => Ok(()),
        // Already printed by the session sink, raw model output included.
        Err(e) if e.is_reported() => std::process::exit(1),
        Err(e) => Err(e.into()),
    }
}

fn run(cli: Cli) -> KnowtreeResult<()> {
    let paths = KnowtreePaths::resolve()?;
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());

    match cli.command {
        Commands::Generate { topic, html, json } => {
            let config = KnowtreeConfig::load_or_default(&config_path)?;
            let sink: Arc<dyn MessageSink> = if json {
                Arc::new(JsonSink)
            } else {
                Arc::new(StdoutSink)
            };
            let client = OpenAiClient::new(config.llm.clone());
            if !client.has_credential() {
                tracing::warn!(
                    env = %config.llm.api_key_env,
                    "no API key configured; completion calls will fail"
                );
            }
            let mut session = Session::new(
                client,
                WikipediaClient::new(config.knowledge.clone()),
                sink,
                SessionOptions::from(&config),
            );
            let entry = session.submit(&topic)?;

            if json {
                let out = serde_json::to_string(entry.as_ref())?;
                println!("{out}");
            } else {
                print_outline(&entry.response);
            }

            if let Some(target) = html {
                let Rendered::Canvas(visual) = session.render(&config.render) else {
                    println!("The map is empty; no page written.");
                    return Ok(());
                };
                let path = match target {
                    Some(p) => p,
                    None => {
                        paths.ensure_exports_dir()?;
                        paths.export_file(&entry.query)
                    }
                };
                let written = export_html(&visual, &entry.query, &path)?;
                eprintln!("Wrote {}", written.display());
            }
        }

        Commands::Extract { file, json } => {
            let raw = read_file(&file)?;
            let extraction = extract(&raw)?;
            for issue in extraction.graph.issues() {
                eprintln!("[issue] {issue}");
            }
            if json {
                let out = serde_json::to_string_pretty(&extraction.graph)?;
                println!("{out}");
            } else {
                println!(
                    "{} nodes, {} edges (bytes {}..{})",
                    extraction.graph.nodes.len(),
                    extraction.graph.edges.len(),
                    extraction.span.start,
                    extraction.span.end,
                );
                print_outline(&extraction.graph);
            }
        }

        Commands::Render { file, html, title } => {
            let config = KnowtreeConfig::load_or_default(&config_path)?;
            let raw = read_file(&file)?;
            let graph = extract(&raw)?.graph;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "mind map".to_string())
            });
            let visual = VisualGraph::from_graph(&graph, &config.render);
            let written = export_html(&visual, &title, &html)?;
            println!(
                "Wrote {} ({} nodes, {} edges)",
                written.display(),
                visual.nodes.len(),
                visual.edges.len()
            );
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = KnowtreeConfig::load_or_default(&config_path)?;
                println!("# {}", config_path.display());
                print!("{}", config.redacted().to_toml(&config_path)?);
            }
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    println!(
                        "{} already exists (use --force to overwrite).",
                        config_path.display()
                    );
                } else {
                    KnowtreeConfig::default().save(&config_path)?;
                    println!("Wrote default configuration to {}", config_path.display());
                }
            }
        },

        Commands::Tui => {
            let config = KnowtreeConfig::load_or_default(&config_path)?;
            let layout: LayoutConfig = config.render.clone();
            knowtree::tui::launch(
                OpenAiClient::new(config.llm.clone()),
                WikipediaClient::new(config.knowledge.clone()),
                SessionOptions::from(&config),
                layout,
                paths,
            )?;
        }
    }

    Ok(())
}

/// Logs go to stderr. The TUI owns the terminal, so it only logs when
/// `RUST_LOG` asks for it.
fn init_tracing(interactive: bool) {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if interactive => return,
        Err(_) => tracing_subscriber::EnvFilter::new("info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_file(path: &Path) -> KnowtreeResult<String> {
    std::fs::read_to_string(path).map_err(|source| KnowtreeError::Input {
        path: path.display().to_string(),
        source,
    })
}

fn print_outline(graph: &Graph) {
    for line in outline_lines(graph) {
        println!("{line}");
    }
}
