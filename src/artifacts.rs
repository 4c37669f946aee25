// src/artifacts.rs
use log::{debug, info, warn};
use std::path::{Component, Path, PathBuf};

use crate::errors::{AnimationError, Result};
use crate::models::LocatedArtifact;

/// Extensions accepted as rendered video, compared case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm"];

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
}

/// Searches `candidates` in order and returns the first video found.
///
/// Within one directory the lexicographically first file name wins, so repeated runs over the
/// same tree pick the same file. Missing directories are created before listing.
pub async fn locate(candidates: &[PathBuf], public_root: &Path) -> Result<LocatedArtifact> {
    for dir in candidates {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Could not create candidate directory {}: {}", dir.display(), e);
            continue;
        }
        match first_video_in(dir).await {
            Ok(Some(path)) => {
                let public_url = public_url(&path, public_root)?;
                info!("Video file found at: {}", path.display());
                info!("Video URL: {}", public_url);
                return Ok(LocatedArtifact {
                    absolute_path: path,
                    public_url,
                });
            }
            Ok(None) => debug!("No videos found in {}", dir.display()),
            Err(e) => warn!("Could not list {}: {}", dir.display(), e),
        }
    }
    Err(AnimationError::ArtifactNotFound {
        searched: candidates.to_vec(),
    })
}

async fn first_video_in(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut videos = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_video_file(&path) {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos.into_iter().next())
}

/// Root-relative URL of `path` under `public_root`, always with `/` separators.
pub fn public_url(path: &Path, public_root: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(public_root)
        .map_err(|_| AnimationError::OutsidePublicRoot {
            path: path.to_path_buf(),
        })?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(format!("/{}", segments.join("/")))
}
