use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use trellis_config::{Config, LiveConfig};
use trellis_graph::{
  Action, ApiNodeList, ApiWorkflowNode, NodeId, SavePlan, VisualizerState, WorkflowGraph,
  compute_positions, reduce,
};
use trellis_live::{ChannelNotifier, LiveEvent, LiveUpdates, WsTransport};

/// Trellis - workflow graph layout, validation and live job status
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the config file (default: ~/.trellis/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print node boxes and link paths for a workflow
  Layout {
    /// Workflow nodes as returned by the API (`-` for stdin)
    nodes_file: PathBuf,
  },

  /// Report nodes unreachable from the start node and convergence nodes
  Validate {
    /// Workflow nodes as returned by the API (`-` for stdin)
    nodes_file: PathBuf,
  },

  /// Apply editor actions to a workflow and print the requests needed to save it
  Plan {
    /// Workflow nodes as returned by the API (`-` for stdin)
    nodes_file: PathBuf,

    /// JSON array of editor actions (`-` for stdin)
    actions_file: PathBuf,
  },

  /// Follow live job status for a workflow until interrupted
  Watch {
    /// Workflow nodes as returned by the API (`-` for stdin)
    nodes_file: PathBuf,

    /// Websocket endpoint (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Raw Cookie header carrying the session and csrftoken
    #[arg(long)]
    cookie: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let config_path = match cli.config {
    Some(path) => path,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".trellis")
      .join("config.json"),
  };
  let mut config = Config::load_or_default(&config_path)
    .with_context(|| format!("failed to load config: {}", config_path.display()))?;
  debug!(path = %config_path.display(), "config loaded");

  match cli.command {
    Some(Commands::Layout { nodes_file }) => layout(&nodes_file, &config)?,
    Some(Commands::Validate { nodes_file }) => validate(&nodes_file)?,
    Some(Commands::Plan {
      nodes_file,
      actions_file,
    }) => plan(&nodes_file, &actions_file)?,
    Some(Commands::Watch {
      nodes_file,
      url,
      cookie,
    }) => {
      if let Some(url) = url {
        config.live.url = url;
      }
      if cookie.is_some() {
        config.live.cookie = cookie;
      }
      watch(nodes_file, config.live)?;
    }
    None => {
      println!("trellis - use --help to see available commands");
    }
  }

  Ok(())
}

fn layout(nodes_file: &Path, config: &Config) -> Result<()> {
  let graph = load_graph(nodes_file)?;
  let layout = compute_positions(&graph, &config.layout);

  eprintln!(
    "Laid out {} nodes and {} links",
    layout.nodes.len(),
    layout.links.len()
  );
  println!("{}", serde_json::to_string_pretty(&layout)?);

  Ok(())
}

fn validate(nodes_file: &Path) -> Result<()> {
  let graph = load_graph(nodes_file)?;
  let topology = graph.topology();

  let describe = |ids: Vec<NodeId>| -> Vec<serde_json::Value> {
    ids
      .into_iter()
      .filter_map(|id| graph.get_node(id))
      .map(|node| json!({ "id": node.id, "server_id": node.server_id(), "name": node.name() }))
      .collect()
  };
  let unreachable = topology.unreachable(NodeId::START);
  let unreachable_count = unreachable.len();
  let (_, cyclic) = topology.topological_order();

  let report = json!({
    "nodes": graph.nodes.len() - 1,
    "links": graph.links.len(),
    "unreachable": describe(unreachable),
    "convergence": describe(topology.convergence_nodes()),
    "cyclic": describe(cyclic),
  });
  println!("{}", serde_json::to_string_pretty(&report)?);

  if unreachable_count > 0 {
    bail!("{} node(s) unreachable from the start node", unreachable_count);
  }
  Ok(())
}

fn plan(nodes_file: &Path, actions_file: &Path) -> Result<()> {
  if is_stdin(nodes_file) && is_stdin(actions_file) {
    bail!("only one of the nodes and actions files can be read from stdin");
  }
  let nodes = read_nodes(nodes_file)?;
  let content = read_input(actions_file, "actions")?;
  let actions: Vec<Action> = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse actions: {}", actions_file.display()))?;

  let loaded = reduce(VisualizerState::new(), Action::Load { nodes });
  if let Some(error) = &loaded.content_error {
    bail!("failed to load workflow nodes: {}", error);
  }
  let action_count = actions.len();
  let state = actions.into_iter().fold(loaded, reduce);

  let plan = SavePlan::from_state(&state).context("failed to build save plan")?;
  eprintln!(
    "Applied {} actions; {} node, {} approval, {} disassociate, {} associate requests",
    action_count,
    plan.node_requests.len(),
    plan.approval_requests.len(),
    plan.disassociate.len(),
    plan.associate.len()
  );
  println!("{}", serde_json::to_string_pretty(&plan)?);

  Ok(())
}

fn watch(nodes_file: PathBuf, config: LiveConfig) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { watch_async(nodes_file, config).await })
}

async fn watch_async(nodes_file: PathBuf, config: LiveConfig) -> Result<()> {
  let graph = load_graph(&nodes_file)?;
  eprintln!("Watching {} nodes via {}", graph.nodes.len() - 1, config.url);

  let (events_tx, mut events) = mpsc::unbounded_channel();
  let live = LiveUpdates::new(Arc::new(WsTransport::from_config(&config)), &config, graph.nodes)
    .with_notifier(Arc::new(ChannelNotifier::new(events_tx)));
  let nodes = live.subscribe();

  let cancel = CancellationToken::new();
  let interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      eprintln!("Interrupted, closing connection");
      interrupt.cancel();
    }
  });

  let runner = tokio::spawn(live.run(cancel));

  // The channel closes once the runner drops its notifier.
  while let Some(event) = events.recv().await {
    match event {
      LiveEvent::NodesUpdated { node_ids } => {
        let nodes = nodes.borrow();
        for node in node_ids.iter().filter_map(|id| nodes.get(id)) {
          let job = node.job.as_ref();
          let line = json!({
            "node_id": node.id,
            "server_id": node.server_id(),
            "name": node.name(),
            "job_id": job.map(|j| j.id),
            "status": job.and_then(|j| j.status.as_deref()),
            "finished": job.and_then(|j| j.finished.as_deref()),
          });
          println!("{}", line);
        }
      }
      LiveEvent::StateChanged { state } => eprintln!("Connection {}", state),
      LiveEvent::LimitReached => eprintln!("Event limit reached, some updates may be missing"),
      LiveEvent::Reconnecting { attempt, delay_ms } => {
        eprintln!("Reconnecting in {}ms (attempt {})", delay_ms, attempt)
      }
      LiveEvent::GaveUp { attempts } => {
        eprintln!("Giving up after {} reconnect attempts", attempts)
      }
    }
  }

  runner
    .await
    .context("live updates task failed")?
    .context("live updates stopped")?;

  Ok(())
}

fn load_graph(nodes_file: &Path) -> Result<WorkflowGraph> {
  let nodes = read_nodes(nodes_file)?;
  WorkflowGraph::from_api(&nodes)
    .with_context(|| format!("invalid workflow nodes: {}", nodes_file.display()))
}

/// Read API node records. Both a bare array and a paged
/// `{ "results": [...] }` body are accepted.
fn read_nodes(path: &Path) -> Result<Vec<ApiWorkflowNode>> {
  let content = read_input(path, "nodes")?;
  let list: ApiNodeList = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse nodes: {}", path.display()))?;
  Ok(list.into_nodes())
}

fn is_stdin(path: &Path) -> bool {
  path == Path::new("-")
}

/// Read a file, or stdin when the path is `-`.
fn read_input(path: &Path, what: &str) -> Result<String> {
  if is_stdin(path) {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .with_context(|| format!("failed to read {} from stdin", what))?;
    return Ok(input);
  }
  std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {} file: {}", what, path.display()))
}
