use anyhow::Context;
use liftlog_core::{Pipeline, PipelineConfig};
use liftlog_mcp::{LiftlogMcpHandler, LoadExportParams};
use metrics_exporter_prometheus::PrometheusBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log filter from `LIFTLOG_LOG_LEVEL`, falling back to `RUST_LOG`, default `info`.
    let log_env = std::env::var("LIFTLOG_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    // Append per-target overrides to keep rmcp internals quiet by default
    let combined_filter = format!("{},rmcp=warn,serve_inner=warn", log_env);
    let env_filter = tracing_subscriber::EnvFilter::try_new(combined_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn,serve_inner=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("liftlog_mcp: log filter: {}", log_env);

    let config = PipelineConfig::from_env().context("invalid LIFTLOG_* configuration")?;
    let preload = config.export_path.clone();
    let pipeline = Pipeline::from_config(config).context("failed to load exercise mapping")?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;
    let handler = LiftlogMcpHandler::new(pipeline).with_metrics(metrics);

    tracing::info!(
        "liftlog_mcp: registered {} tools and {} prompts",
        handler.tool_count(),
        handler.prompt_count()
    );

    if let Some(path) = preload {
        // a bad preload path is reported, the server still starts
        match handler.load(LoadExportParams::default()).await {
            Ok(loaded) => tracing::info!(
                path = %path.display(),
                rows = loaded.summary.rows_read,
                valid = loaded.summary.valid_records,
                "liftlog_mcp: preloaded export"
            ),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "liftlog_mcp: preload failed")
            }
        }
    }

    tracing::info!("liftlog_mcp: starting stdio MCP server...");

    use rmcp::serve_server;
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let server = serve_server(handler, transport).await?;

    tracing::info!("liftlog_mcp: service initialized as server");

    server.waiting().await?;

    Ok(())
}
