// KaliDocker - Main Entry Point
//
// Two front-ends over the same toolbox:
// - `api`: HTTP API for the browser UI
// - `mcp`: MCP server on stdio for AI assistants
//
// plus `scan` and `tools` for one-off use from a shell.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kalidocker::api::{self, AppState};
use kalidocker::config::Config;
use kalidocker::mcp::{self, McpServer};
use kalidocker::runtime::{ContainerRuntime, DockerCli};
use kalidocker::tools::{ToolInvocation, ToolKind};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// KaliDocker: security tool orchestration over HTTP and MCP
#[derive(Parser, Debug)]
#[command(name = "kalidocker")]
#[command(author = "KaliDocker Contributors")]
#[command(version)]
#[command(about = "Run Kali security tools inside a container over HTTP or MCP", long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "KALIDOCKER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Api {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Serve MCP over stdin/stdout
    Mcp,
    /// Run one tool against a target and print the result as JSON
    Scan {
        /// Tool binary name (nmap, nuclei, ffuf, arjun, httpx, nikto, dirb)
        tool: String,

        /// Target host, URL or comma-separated URL list
        target: String,

        /// Extra tool options, split on whitespace
        #[arg(long, allow_hyphen_values = true)]
        options: Option<String>,
    },
    /// List the supported tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config, args.verbose)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    match args.command {
        Commands::Api { host, port } => {
            run_api(config, host, port, shutdown).await?;
        }
        Commands::Mcp => {
            run_mcp(config, shutdown).await?;
        }
        Commands::Scan {
            tool,
            target,
            options,
        } => {
            return run_scan(config, &tool, target, options, shutdown).await;
        }
        Commands::Tools => {
            list_tools(&config);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Install the tracing subscriber
///
/// Logs always go to stderr: in `mcp` mode stdout belongs to the protocol.
fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested");
    shutdown.cancel();
}

async fn run_api(
    config: Config,
    host: Option<String>,
    port: Option<u16>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| config.api.host.clone()),
        port.unwrap_or(config.api.port)
    );

    // A missing daemon degrades the API rather than stopping it
    let runtime: Option<Arc<dyn ContainerRuntime>> = match DockerCli::connect().await {
        Ok(docker) => Some(Arc::new(docker)),
        Err(e) => {
            warn!("Docker not available, running degraded: {}", e);
            None
        }
    };

    let state = Arc::new(AppState {
        runtime,
        toolbox: Arc::new(config.toolbox(shutdown.clone())),
        expected_services: config.api.expected_services.clone(),
    });

    info!("KaliDocker API v{} starting", env!("CARGO_PKG_VERSION"));
    api::serve(&addr, state, async move { shutdown.cancelled().await }).await
}

async fn run_mcp(config: Config, shutdown: CancellationToken) -> Result<()> {
    let server = McpServer::new(Arc::new(config.toolbox(shutdown.clone())));
    info!(exec_target = ?config.execution_target(), "MCP server ready on stdio");

    mcp::serve_stdio(server, shutdown.clone()).await?;

    if shutdown.is_cancelled() {
        // Every reply is flushed; the blocked stdin read would hold up runtime shutdown
        info!("MCP server stopped");
        std::process::exit(0);
    }
    Ok(())
}

async fn run_scan(
    config: Config,
    tool: &str,
    target: String,
    options: Option<String>,
    shutdown: CancellationToken,
) -> Result<ExitCode> {
    let kind: ToolKind = tool.parse()?;
    let toolbox = config.toolbox(shutdown);

    let result = toolbox
        .run(ToolInvocation::from_target(kind, target, options))
        .await;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to encode result")?
    );

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list_tools(config: &Config) {
    for kind in ToolKind::ALL {
        println!(
            "{:<8} {:<22} {:>4}s  {}",
            kind.binary(),
            kind.mcp_name().unwrap_or("-"),
            config.timeouts.secs(kind),
            kind.description()
        );
    }
}
