// src/workspace.rs
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::{Isolation, WorkspaceSettings};
use crate::errors::Result;
use crate::models::SynthesizedProgram;

pub const SCRIPT_FILE_NAME: &str = "generate_animation.py";

const SCRATCH_DIR: &str = "temp";
const PUBLIC_DIR: &str = "public";
const ARTIFACT_DIR: &str = "animations";

/// Scratch and artifact directories for one request.
///
/// ```text
/// <root>/temp[/<id>]/generate_animation.py
/// <root>/public/animations[/<id>]/videos/{720p30,1080p60}/*.mp4
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    scratch_dir: PathBuf,
    public_root: PathBuf,
    artifact_dir: PathBuf,
    /// Set in per-request mode, where sibling runs share these parents.
    retention: Option<Retention>,
}

#[derive(Debug, Clone)]
struct Retention {
    request_id: String,
    keep_runs: usize,
    max_age: Option<Duration>,
}

impl Workspace {
    pub fn for_request(settings: &WorkspaceSettings, request_id: &str) -> Self {
        let root = absolute(&settings.root);
        let public_root = root.join(PUBLIC_DIR);
        let (scratch_dir, artifact_dir, retention) = match settings.isolation {
            Isolation::PerRequest => (
                root.join(SCRATCH_DIR).join(request_id),
                public_root.join(ARTIFACT_DIR).join(request_id),
                Some(Retention {
                    request_id: request_id.to_string(),
                    keep_runs: settings.keep_runs,
                    max_age: settings.max_age(),
                }),
            ),
            Isolation::Shared => (root.join(SCRATCH_DIR), public_root.join(ARTIFACT_DIR), None),
        };
        Self {
            root,
            scratch_dir,
            public_root,
            artifact_dir,
            retention,
        }
    }

    /// Directory served under `/animations`, independent of isolation mode.
    pub fn served_dir(settings: &WorkspaceSettings) -> PathBuf {
        absolute(&settings.root).join(PUBLIC_DIR).join(ARTIFACT_DIR)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn script_path(&self) -> PathBuf {
        self.scratch_dir.join(SCRIPT_FILE_NAME)
    }

    /// Where the renderer may leave its output, highest priority first.
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        let videos = self.artifact_dir.join("videos");
        vec![videos.join("720p30"), videos.join("1080p60"), self.artifact_dir.clone()]
    }

    /// Removes both directories and recreates them empty. In per-request mode, earlier runs
    /// beyond the retention limits are pruned first.
    ///
    /// Removal is best-effort; only a failure to recreate is returned.
    pub async fn reset(&self) -> Result<()> {
        if let Some(retention) = &self.retention {
            self.prune(retention).await;
        }
        if let Err(e) = self.clear().await {
            warn!("Clean up error (non-fatal): {}", e);
        }
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        tokio::fs::create_dir_all(&self.artifact_dir).await?;
        debug!(
            "Workspace ready: scratch={} artifacts={}",
            self.scratch_dir.display(),
            self.artifact_dir.display()
        );
        Ok(())
    }

    /// Removes both directories, reporting the first failure after trying both.
    pub async fn clear(&self) -> io::Result<()> {
        let scratch = remove_dir_if_present(&self.scratch_dir).await;
        let artifacts = remove_dir_if_present(&self.artifact_dir).await;
        scratch.and(artifacts)
    }

    /// Applies the retention limits to sibling run directories.
    ///
    /// Artifacts are pruned by count and age; stale scratch directories only by age.
    async fn prune(&self, retention: &Retention) {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut runs = sibling_runs(self.artifact_dir.parent(), &retention.request_id).await;
        runs.sort_by(|a, b| b.1.cmp(&a.1));
        for (index, (path, modified)) in runs.iter().enumerate() {
            let over_count = retention.keep_runs > 0 && index >= retention.keep_runs;
            if over_count || is_expired(now, *modified, retention.max_age) {
                removed += remove_run(path).await;
            }
        }

        let scratch = sibling_runs(self.scratch_dir.parent(), &retention.request_id).await;
        for (path, modified) in scratch {
            if is_expired(now, modified, retention.max_age) {
                removed += remove_run(&path).await;
            }
        }

        if removed > 0 {
            info!("Pruned {} earlier run directories", removed);
        }
    }

    /// Removes the scratch directory when dropped, including when the run is cancelled.
    pub fn scratch_guard(&self) -> ScratchGuard {
        ScratchGuard {
            path: self.scratch_dir.clone(),
        }
    }

    /// Writes the program to the scratch script file and returns its path.
    pub async fn write_program(&self, program: &SynthesizedProgram) -> Result<PathBuf> {
        let path = self.script_path();
        tokio::fs::write(&path, &program.source_text).await?;
        Ok(path)
    }
}

/// Synchronously removes a scratch directory on drop. Missing directories are fine.
#[must_use = "the scratch directory is removed when the guard is dropped"]
pub struct ScratchGuard {
    path: PathBuf,
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                warn!("Could not remove scratch directory {}: {}", self.path.display(), e);
            }
            _ => debug!("Discarded scratch directory {}", self.path.display()),
        }
    }
}

/// Directories next to the current run, with their modification times.
async fn sibling_runs(parent: Option<&Path>, current: &str) -> Vec<(PathBuf, SystemTime)> {
    let mut runs = Vec::new();
    let Some(parent) = parent else {
        return runs;
    };
    let mut entries = match tokio::fs::read_dir(parent).await {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not list {}: {}", parent.display(), e);
            }
            return runs;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name() == current {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if metadata.is_dir() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            runs.push((entry.path(), modified));
        }
    }
    runs
}

fn is_expired(now: SystemTime, modified: SystemTime, max_age: Option<Duration>) -> bool {
    match (max_age, now.duration_since(modified)) {
        (Some(max_age), Ok(age)) => age > max_age,
        _ => false,
    }
}

async fn remove_run(path: &Path) -> usize {
    match remove_dir_if_present(path).await {
        Ok(()) => 1,
        Err(e) => {
            warn!("Could not prune {}: {}", path.display(), e);
            0
        }
    }
}

async fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(root: &Path, isolation: Isolation) -> WorkspaceSettings {
        WorkspaceSettings {
            root: root.to_path_buf(),
            isolation,
            ..WorkspaceSettings::default()
        }
    }

    #[test]
    fn test_shared_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::for_request(&settings(dir.path(), Isolation::Shared), "abc");

        assert_eq!(ws.scratch_dir(), dir.path().join("temp"));
        assert_eq!(ws.artifact_dir(), dir.path().join("public/animations"));
        assert_eq!(ws.script_path(), dir.path().join("temp/generate_animation.py"));
        assert_eq!(
            ws.candidate_dirs(),
            vec![
                dir.path().join("public/animations/videos/720p30"),
                dir.path().join("public/animations/videos/1080p60"),
                dir.path().join("public/animations"),
            ]
        );
    }

    #[test]
    fn test_per_request_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::for_request(&settings(dir.path(), Isolation::PerRequest), "abc");

        assert_eq!(ws.scratch_dir(), dir.path().join("temp/abc"));
        assert_eq!(ws.artifact_dir(), dir.path().join("public/animations/abc"));
        assert_eq!(ws.public_root(), dir.path().join("public"));
    }

    #[tokio::test]
    async fn test_reset_twice_leaves_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::for_request(&settings(dir.path(), Isolation::Shared), "abc");

        std::fs::create_dir_all(ws.artifact_dir().join("videos/720p30")).unwrap();
        std::fs::write(ws.artifact_dir().join("videos/720p30/Old.mp4"), b"stale").unwrap();
        std::fs::create_dir_all(ws.scratch_dir()).unwrap();
        std::fs::write(ws.script_path(), "old script").unwrap();

        ws.reset().await.unwrap();
        ws.reset().await.unwrap();

        for d in [ws.scratch_dir(), ws.artifact_dir()] {
            assert!(d.is_dir());
            assert_eq!(std::fs::read_dir(d).unwrap().count(), 0);
        }
    }

    #[tokio::test]
    async fn test_write_program_and_scratch_guard() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::for_request(&settings(dir.path(), Isolation::PerRequest), "req1");
        ws.reset().await.unwrap();

        let scratch = ws.scratch_guard();
        let program = SynthesizedProgram {
            source_text: "print('hi')\n".to_string(),
            entry_point: "Scene".to_string(),
        };
        let path = ws.write_program(&program).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "print('hi')\n");

        drop(scratch);
        assert!(!ws.scratch_dir().exists());
        assert!(ws.artifact_dir().is_dir());
        // already gone is fine
        drop(ws.scratch_guard());
    }

    #[tokio::test]
    async fn test_reset_prunes_runs_beyond_keep_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path(), Isolation::PerRequest);
        settings.keep_runs = 2;

        for id in ["run1", "run2", "run3", "run4"] {
            let ws = Workspace::for_request(&settings, id);
            ws.reset().await.unwrap();
            std::fs::write(ws.artifact_dir().join("Scene.mp4"), b"video").unwrap();
            // distinct modification times
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let ws = Workspace::for_request(&settings, "run5");
        ws.reset().await.unwrap();

        let mut kept: Vec<String> = std::fs::read_dir(dir.path().join("public/animations"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        kept.sort();
        assert_eq!(kept, ["run3", "run4", "run5"]);
    }

    #[tokio::test]
    async fn test_reset_prunes_expired_runs_and_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path(), Isolation::PerRequest);
        settings.keep_runs = 0;
        settings.max_age_secs = 1;

        let abandoned = Workspace::for_request(&settings, "old");
        abandoned.reset().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let ws = Workspace::for_request(&settings, "new");
        ws.reset().await.unwrap();

        assert!(!abandoned.artifact_dir().exists());
        assert!(!abandoned.scratch_dir().exists());
        assert!(ws.artifact_dir().is_dir());
        assert!(ws.scratch_dir().is_dir());
    }
}
