use inkflow_core::Result;
use inkflow_runner::{
    config::RunnerConfig, error::RunnerError, executors::TemplateExecutor, pipeline::Pipeline,
};
use inkflow_workflow::{
    ChannelProgress, ExecutionEngine, GraphStore, NodeExecutor, NodeRegistry, ProgressEvent,
    register_content_types,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), RunnerError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RunnerConfig::load().map_err(|e| RunnerError::Config {
        details: e.to_string(),
    })?;
    tracing::info!(topic = %config.topic, platform = ?config.platform, "loaded configuration");

    let executor = Arc::new(TemplateExecutor::new());
    let mut registry = NodeRegistry::new();
    register_content_types(&mut registry, |_| {
        Arc::clone(&executor) as Arc<dyn NodeExecutor>
    })
    .map_err(|e| RunnerError::Registry {
        details: e.to_string(),
    })?;
    let registry = Arc::new(registry);

    let mut store = GraphStore::new(Arc::clone(&registry));
    let mut graph_events = store.subscribe();
    let pipeline = Pipeline::build(&mut store, &config)?;
    while let Ok(event) = graph_events.try_recv() {
        tracing::debug!(?event, "graph changed");
    }

    let (progress, mut events) = ChannelProgress::new();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ProgressEvent::NodeStarted { node_id } => {
                    tracing::info!(%node_id, "node started");
                }
                ProgressEvent::NodeCompleted { node_id, outputs } => {
                    tracing::info!(%node_id, ports = outputs.len(), "node completed");
                }
                ProgressEvent::NodeFailed { node_id, error } => {
                    tracing::warn!(%node_id, %error, "node failed");
                }
                ProgressEvent::NodeSkipped { node_id } => {
                    tracing::info!(%node_id, "node skipped");
                }
            }
        }
    });

    let engine = ExecutionEngine::new(registry);
    let run = engine.run(&store.snapshot(), &progress).await;
    drop(progress);
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "progress reporter stopped early");
    }

    let cached = store.record_outputs(&run);
    tracing::debug!(cached, "cached node outputs");

    for post in executor.published().await {
        tracing::info!(platform = ?post.platform, "published:\n{}", post.text);
    }
    if let Some(preview) = store
        .graph()
        .node(pipeline.preview)
        .and_then(|node| node.last_outputs.as_ref())
        .and_then(|outputs| outputs.get("preview"))
    {
        tracing::info!(%preview, "latest preview");
    }

    let summary = serde_json::to_string_pretty(&run.summary()).map_err(|e| RunnerError::Output {
        details: e.to_string(),
    })?;
    println!("{summary}");
    Ok(())
}
