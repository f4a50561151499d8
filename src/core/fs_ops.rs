// src/core/fs_ops.rs
//! File system operations used by the cache and the site generator

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct FsOps;

impl FsOps {
    /// Ensure directory exists
    pub async fn ensure_dir_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create directory: {}", path.display()))?;
            info!("Created directory: {}", path.display());
        }
        Ok(())
    }

    /// Write file, creating parent directories as needed
    pub async fn write_file_safe(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        debug!("Written file: {}", path.display());
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the target.
    /// Readers see either the old or the new content, never a torn file.
    pub async fn write_atomic(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            Self::ensure_dir_exists(parent).await?;
        }

        let tmp_path = Self::temp_sibling(path);
        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;

        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| {
                format!(
                    "Failed to move {} into place at {}",
                    tmp_path.display(),
                    path.display()
                )
            });
        }

        debug!("Atomically written file: {}", path.display());
        Ok(())
    }

    fn temp_sibling(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }

    /// Lowercase, dash-separated, ASCII-alphanumeric file name stem
    pub fn slugify(name: &str) -> String {
        name.trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'ä' => 'a',
                'ö' => 'o',
                'ü' => 'u',
                'ß' => 's',
                c if c.is_ascii_alphanumeric() => c,
                _ => '-',
            })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}
