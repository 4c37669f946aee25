// src/config.rs
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AnimationError, Result};

/// Configuration for an OpenAI-compatible chat completions API (DeepSeek by default).
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    pub api_base: String,
    pub api_key: String,
}

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_base: String,
    pub api_key: String,
}

/// Configuration for the Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub api_base: String,
}

/// How request workspaces are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Every request gets its own scratch and artifact subdirectory.
    #[default]
    PerRequest,
    /// All requests share `temp/` and `public/animations/`; runs are serialized.
    Shared,
}

impl std::str::FromStr for Isolation {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "per_request" => Ok(Isolation::PerRequest),
            "shared" => Ok(Isolation::Shared),
            other => Err(AnimationError::Config(format!(
                "Unknown isolation mode '{}', expected 'per_request' or 'shared'",
                other
            ))),
        }
    }
}

/// An external program plus any leading arguments, e.g. `conda run -n manim python`.
/// Never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AnimationError::Config("Empty command".to_string()))?;
        Ok(CommandSpec {
            program,
            args: parts.collect(),
        })
    }

    /// Builds a process command with the leading arguments already applied.
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl TryFrom<String> for CommandSpec {
    type Error = AnimationError;

    fn try_from(value: String) -> Result<Self> {
        CommandSpec::parse(&value)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Directory holding `temp/` and `public/`.
    pub root: PathBuf,
    pub isolation: Isolation,
    /// Per-request mode: earlier runs kept alongside the current one. `0` keeps all.
    /// Must exceed the number of concurrent requests.
    pub keep_runs: usize,
    /// Per-request mode: earlier runs older than this are pruned. `0` disables the check.
    pub max_age_secs: u64,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            isolation: Isolation::default(),
            keep_runs: 32,
            max_age_secs: 24 * 60 * 60,
        }
    }
}

impl WorkspaceSettings {
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_secs > 0).then(|| Duration::from_secs(self.max_age_secs))
    }

    /// Rejects a root that is not valid UTF-8 once made absolute; generated programs embed it.
    pub fn validate(&self) -> Result<()> {
        let resolved = if self.root.is_absolute() {
            self.root.clone()
        } else {
            std::env::current_dir()?.join(&self.root)
        };
        if resolved.to_str().is_none() {
            return Err(AnimationError::Config(format!(
                "Workspace root '{}' is not valid UTF-8",
                resolved.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub python: CommandSpec,
    pub timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            python: CommandSpec {
                program: "python3".to_string(),
                args: Vec::new(),
            },
            timeout_secs: 20,
        }
    }
}

impl RenderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub ffprobe: CommandSpec,
    pub timeout_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ffprobe: CommandSpec {
                program: "ffprobe".to_string(),
                args: Vec::new(),
            },
            timeout_secs: 10,
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 20,
        }
    }
}

impl SynthesisSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Non-secret settings, optionally loaded from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub workspace: WorkspaceSettings,
    pub render: RenderSettings,
    pub probe: ProbeSettings,
    pub synthesis: SynthesisSettings,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// High-level application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openai: Option<OpenAIConfig>,
    pub anthropic: Option<AnthropicConfig>,
    pub ollama: Option<OllamaConfig>,
    /// Model in `provider:model_name` form, e.g. `openai:deepseek-chat`.
    pub model: String,
    pub settings: Settings,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match lookup("ANIMATOR_CONFIG") {
            Some(path) => Settings::load(Path::new(&path))?,
            None => Settings::default(),
        };
        apply_overrides(&mut settings, &lookup)?;
        settings.workspace.validate()?;

        let openai = lookup("OPENAI_API_KEY").map(|api_key| OpenAIConfig {
            api_base: lookup("OPENAI_API_BASE")
                .unwrap_or_else(|| "https://api.deepseek.com/v1".to_string()),
            api_key,
        });

        let anthropic = lookup("ANTHROPIC_API_KEY").map(|api_key| AnthropicConfig {
            api_base: lookup("ANTHROPIC_API_BASE")
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            api_key,
        });

        let ollama = lookup("OLLAMA_API_BASE").map(|api_base| OllamaConfig { api_base });

        if openai.is_none() && anthropic.is_none() && ollama.is_none() {
            return Err(AnimationError::Config(
                "No LLM providers configured. \
                 Please set OPENAI_API_KEY, ANTHROPIC_API_KEY or OLLAMA_API_BASE."
                    .to_string(),
            ));
        }

        let model = lookup("ANIMATOR_MODEL").unwrap_or_else(|| "openai:deepseek-chat".to_string());

        Ok(AppConfig {
            openai,
            anthropic,
            ollama,
            model,
            settings,
        })
    }
}

fn apply_overrides<F>(settings: &mut Settings, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("ANIMATOR_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = lookup("ANIMATOR_PORT") {
        settings.server.port = parse_number("ANIMATOR_PORT", &port)?;
    }
    if let Some(root) = lookup("ANIMATOR_WORKSPACE") {
        settings.workspace.root = PathBuf::from(root);
    }
    if let Some(isolation) = lookup("ANIMATOR_ISOLATION") {
        settings.workspace.isolation = isolation.parse()?;
    }
    if let Some(keep) = lookup("ANIMATOR_KEEP_RUNS") {
        settings.workspace.keep_runs = parse_number("ANIMATOR_KEEP_RUNS", &keep)?;
    }
    if let Some(python) = lookup("ANIMATOR_PYTHON") {
        settings.render.python = CommandSpec::parse(&python)?;
    }
    if let Some(ffprobe) = lookup("ANIMATOR_FFPROBE") {
        settings.probe.ffprobe = CommandSpec::parse(&ffprobe)?;
    }
    if let Some(secs) = lookup("RENDER_TIMEOUT_SECS") {
        settings.render.timeout_secs = parse_number("RENDER_TIMEOUT_SECS", &secs)?;
    }
    if let Some(secs) = lookup("SYNTHESIS_TIMEOUT_SECS") {
        settings.synthesis.timeout_secs = parse_number("SYNTHESIS_TIMEOUT_SECS", &secs)?;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AnimationError::Config(format!("{} must be a number, got '{}'", key, raw)))
}
