use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use prism_config::AppContext;
use prism_core::project::Project;
use prism_http::EventRouterConfig;

/// `prism serve`: run the Event Router (webhook listener, file watcher,
/// worker pool) until the process receives a shutdown signal.
pub async fn execute(
    project_root: &Path,
    host: Option<String>,
    port: Option<u16>,
    specs_dir: Option<std::path::PathBuf>,
) -> Result<()> {
    let ctx = Arc::new(AppContext::open(project_root).context("failed to open project")?);

    let project_id = Project::open(project_root).map(|p| p.manifest.name).unwrap_or_else(|_| {
        project_root.file_name().and_then(|n| n.to_str()).unwrap_or("prism").to_string()
    });

    let mut config = EventRouterConfig::new(project_id, project_root);
    if let Some(host) = host {
        config.http.host = host;
    }
    if let Some(port) = port {
        config.http.port = port;
    }
    if let Some(specs_dir) = specs_dir {
        config.specs_dir = specs_dir;
    }

    prism_http::serve(ctx, config).await
}
