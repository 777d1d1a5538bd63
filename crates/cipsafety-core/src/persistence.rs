//! Connection table persistence using JSON file storage

use crate::connection::SafetyConnection;
use crate::error::AnalyzerError;
use std::path::Path;
use tokio::fs;

/// Load connections from a JSON file
pub async fn load_connections(path: &Path) -> Vec<SafetyConnection> {
    match fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<Vec<SafetyConnection>>(&contents) {
            Ok(connections) => {
                tracing::info!("Loaded {} connections from {:?}", connections.len(), path);
                connections
            }
            Err(e) => {
                tracing::warn!("Failed to parse connections file {:?}: {}", path, e);
                Vec::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No connections file found at {:?}, starting fresh", path);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Failed to read connections file {:?}: {}", path, e);
            Vec::new()
        }
    }
}

/// Save connections to a JSON file atomically
#[allow(clippy::missing_errors_doc)]
pub async fn save_connections(
    path: &Path,
    connections: &[SafetyConnection],
) -> Result<(), AnalyzerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(connections)?;

    // Write to temp file, then rename
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json).await?;
    fs::rename(&tmp_path, path).await?;

    tracing::debug!("Saved {} connections to {:?}", connections.len(), path);
    Ok(())
}
