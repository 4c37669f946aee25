// src/pipeline.rs
use log::{error, info, warn};
use std::time::Instant;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::artifacts;
use crate::config::{AppConfig, Isolation, WorkspaceSettings};
use crate::errors::{AnimationError, ErrorKind, Result};
use crate::models::{GenerationFailure, GenerationRequest, GenerationResult};
use crate::probe::MediaProber;
use crate::providers::LlmProvider;
use crate::render::RenderExecutor;
use crate::synthesizer::Synthesizer;
use crate::workspace::Workspace;

/// Prompt in, rendered video out: reset → synthesize → write → render → locate → probe.
pub struct Pipeline<P> {
    synthesizer: Synthesizer<P>,
    executor: RenderExecutor,
    prober: MediaProber,
    workspace: WorkspaceSettings,
    /// Held for a whole run when requests share one workspace.
    shared_run: Mutex<()>,
}

impl<P: LlmProvider> Pipeline<P> {
    pub fn new(provider: P, model: impl Into<String>, config: &AppConfig) -> Self {
        let settings = &config.settings;
        Self {
            synthesizer: Synthesizer::new(provider, model, &settings.synthesis),
            executor: RenderExecutor::new(&settings.render),
            prober: MediaProber::new(&settings.probe),
            workspace: settings.workspace.clone(),
            shared_run: Mutex::new(()),
        }
    }

    /// Runs the pipeline and maps any error to its caller-facing failure.
    pub async fn respond(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, GenerationFailure> {
        self.run(request).await.map_err(|e| {
            let failure = GenerationFailure::from(&e);
            match failure.error_kind {
                ErrorKind::Validation => warn!("Rejected request: {}", e),
                _ => error!("❌ Animation pipeline failed: {}", e),
            }
            failure
        })
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let prompt = request.prompt().ok_or(AnimationError::EmptyPrompt)?;

        let request_id = Uuid::new_v4().simple().to_string();
        let run_start = Instant::now();
        info!("🎬 [{}] Processing prompt: {}", request_id, prompt);

        let _shared = match self.workspace.isolation {
            Isolation::Shared => Some(self.shared_run.lock().await),
            Isolation::PerRequest => None,
        };

        let workspace = Workspace::for_request(&self.workspace, &request_id);
        workspace.reset().await?;
        let scratch = workspace.scratch_guard();

        let program = self
            .synthesizer
            .synthesize(prompt, workspace.artifact_dir())
            .await?;
        info!("[{}] Synthesized scene '{}'", request_id, program.entry_point);

        let script_path = workspace.write_program(&program).await?;

        info!("[{}] Starting render...", request_id);
        let rendered = self
            .executor
            .execute(&script_path, workspace.root())
            .await
            .and_then(|outcome| outcome.into_result());
        drop(scratch);
        rendered?;

        let artifact =
            artifacts::locate(&workspace.candidate_dirs(), workspace.public_root()).await?;

        let duration = self
            .prober
            .probe_duration(&artifact.absolute_path)
            .await
            .unwrap_or_else(|e| {
                warn!("[{}] Error getting video duration: {}", request_id, e);
                0.0
            });

        info!(
            "✅ [{}] Animation ready at {} ({:.1}s) in {}ms",
            request_id,
            artifact.public_url,
            duration,
            run_start.elapsed().as_millis()
        );

        Ok(GenerationResult::new(artifact.public_url, duration))
    }
}
