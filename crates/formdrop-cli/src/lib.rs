//! Helpers shared by the formdrop command-line tools.

use anyhow::Context;
use formdrop_core::{FileInfo, UploadedFile};
use formdrop_engine::Engine;
use serde::Serialize;
use std::path::Path;

/// Outcome of uploading one local file.
#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<UploadedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.file.is_some()
    }
}

/// Stream a local file through the engine, as if it were posted in field `field_name`.
pub async fn upload_path(
    engine: &Engine,
    path: &Path,
    field_name: &str,
) -> anyhow::Result<UploadedFile> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut info = FileInfo::new(field_name);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        info = info.with_original_name(name);
    }

    let uploaded = engine
        .handle_reader(info, file)
        .await
        .with_context(|| format!("failed to upload {}", path.display()))?;
    Ok(uploaded)
}

pub async fn upload_outcome(engine: &Engine, path: &Path, field_name: &str) -> UploadOutcome {
    match upload_path(engine, path, field_name).await {
        Ok(file) => UploadOutcome {
            path: path.display().to_string(),
            file: Some(file),
            error: None,
        },
        Err(e) => UploadOutcome {
            path: path.display().to_string(),
            file: None,
            error: Some(format!("{:#}", e)),
        },
    }
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Human-readable byte size.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Render outcomes as a fixed-width table.
pub fn render_table(outcomes: &[UploadOutcome]) -> String {
    let mut out = format!(
        "{:<32} {:<40} {:<24} {:>10}\n",
        "FILE", "KEY", "CONTENT TYPE", "SIZE"
    );
    for outcome in outcomes {
        let path = truncate_string(&outcome.path, 32);
        match (&outcome.file, &outcome.error) {
            (Some(file), _) => out.push_str(&format!(
                "{:<32} {:<40} {:<24} {:>10}\n",
                path,
                truncate_string(&file.key, 40),
                truncate_string(&file.content_type, 24),
                format_size(file.size)
            )),
            (None, error) => out.push_str(&format!(
                "{:<32} FAILED: {}\n",
                path,
                error.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    out
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
