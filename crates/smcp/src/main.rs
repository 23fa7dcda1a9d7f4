use anyhow::{Context, Result};
use clap::Parser;
use smcp::config::{Cli, Transport};
use smcp::mcp::{McpServer, StdioTransport};
use smcp::runtime::PluginHost;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so it can supply MCP_* fallbacks
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    // Held until exit so buffered file logs are flushed
    let _log_guard = smcp::logging::init(&cli.log_options())?;

    let host = Arc::new(PluginHost::new(cli.host_config()));
    let report = host.reload().await.with_context(|| {
        format!(
            "plugin discovery failed for {}",
            cli.plugins_dir.display()
        )
    })?;
    info!(
        plugins = report.plugins,
        tools = report.tools,
        plugins_dir = %cli.plugins_dir.display(),
        "Plugins loaded"
    );

    spawn_reload_on_hangup(Arc::clone(&host));
    let server = Arc::new(McpServer::new(host));

    match cli.transport {
        Transport::Stdio => {
            tokio::select! {
                result = StdioTransport::new(server).run() => result?,
                _ = shutdown_signal() => info!("Shutting down"),
            }
        }
        Transport::Sse => serve_sse(&cli, server).await?,
    }
    Ok(())
}

#[cfg(feature = "sse")]
async fn serve_sse(cli: &Cli, server: Arc<McpServer>) -> Result<()> {
    use smcp::mcp::{SseConfig, SseTransport};

    if cli.allow_external {
        warn!("--allow-external set, listening on all interfaces without authentication");
    }
    let bind = cli.bind_address()?;
    SseTransport::new(server, SseConfig::new(bind))
        .run(async {
            shutdown_signal().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(not(feature = "sse"))]
async fn serve_sse(_cli: &Cli, _server: Arc<McpServer>) -> Result<()> {
    anyhow::bail!("this build has no SSE support; use --transport stdio")
}

/// Re-run discovery on SIGHUP. A failed pass keeps the current tools.
#[cfg(unix)]
fn spawn_reload_on_hangup(host: Arc<PluginHost>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGHUP, reload disabled");
                return;
            }
        };
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, reloading plugins");
            match host.reload().await {
                Ok(report) => info!(plugins = report.plugins, tools = report.tools, "Reload complete"),
                Err(e) => error!(error = %e, "Reload failed, keeping previous tools"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_host: Arc<PluginHost>) {}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
