// src/synthesizer.rs
use log::{debug, error, info};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::SynthesisSettings;
use crate::errors::{AnimationError, Result};
use crate::models::SynthesizedProgram;
use crate::providers::{ChatMessage, CompletionRequest, LlmProvider};

/// Class instantiated when the generated code names no scene of its own.
pub const FALLBACK_ENTRY_POINT: &str = "Scene";

pub const PIXEL_WIDTH: u32 = 1280;
pub const PIXEL_HEIGHT: u32 = 720;
pub const FRAME_RATE: u32 = 30;
pub const BACKGROUND_COLOR: &str = "#000000";

const SIMPLE_EXAMPLE: &str = r#"class SimpleAnimation(Scene):
    def construct(self):
        # Create basic shapes
        circle = Circle(color=YELLOW)
        square = Square(color=BLUE)

        # Add title
        title = Text("Basic Shapes", color=WHITE).to_edge(UP)

        # Simple animation sequence
        self.play(Write(title))
        self.play(Create(circle))
        self.play(Transform(circle, square))
        self.wait()"#;

const GRAPH_EXAMPLE: &str = r#"class GraphAnimation(Scene):
    def construct(self):
        # Create axes
        axes = Axes(
            x_range=[-3, 3],
            y_range=[-2, 2],
            axis_config={"color": BLUE}
        )

        # Create function
        graph = axes.plot(lambda x: x**2/2, color=YELLOW)

        # Add labels
        title = Text("Quadratic Function", color=WHITE).to_edge(UP)

        # Animate
        self.play(Create(axes))
        self.play(Write(title))
        self.play(Create(graph))
        self.wait()"#;

static PYTHON_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:python3?|py)[ \t]*\r?\n(.*?)```").expect("valid python block regex")
});

static TAGGED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)```").expect("valid fenced block regex")
});

static BARE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid bare block regex"));

static ENTRY_POINT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[ \t]*entry[ _-]?point[ \t]*:[ \t]*`?([A-Za-z_][A-Za-z0-9_]*)`?[ \t]*$")
        .expect("valid entry point regex")
});

static CLASS_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*class[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*(?:\(([^)]*)\))?[ \t]*:")
        .expect("valid class regex")
});

/// Builds the system instruction: authoring rules, two worked examples and the entry-point
/// contract.
pub fn system_prompt() -> String {
    format!(
        r#"You are a Manim expert. Generate SIMPLE and RELIABLE animation code. Follow these rules strictly:

1. Keep animations under 5 steps
2. Use only basic shapes and transformations
3. Include only essential elements
4. Use simple colors (YELLOW, BLUE, WHITE)
5. Keep animations short (under 10 seconds)
6. Use basic Text and MathTex only when necessary
7. Focus on one concept at a time

Example of a good simple animation:

```python
{}
```

Example of a graph animation:

```python
{}
```

Return exactly one ```python code block containing a single Scene subclass.
Do not import anything and do not call render(); configuration and rendering are added for you.
After the code block, write one line of the form:
Entry point: <SceneClassName>"#,
        SIMPLE_EXAMPLE, GRAPH_EXAMPLE
    )
}

pub fn build_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt()),
        ChatMessage::user(format!(
            "Create a simple Manim animation for: {}. Keep it basic and reliable.",
            prompt
        )),
    ]
}

/// Returns the body of the first python-tagged fenced block, falling back to any fenced block.
pub fn extract_code_block(completion: &str) -> Option<&str> {
    [&*PYTHON_BLOCK, &*TAGGED_BLOCK, &*BARE_BLOCK]
        .iter()
        .find_map(|re| re.captures(completion))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
}

/// The name given on an `Entry point: <Name>` line outside the code, if any.
pub fn declared_entry_point(completion: &str) -> Option<&str> {
    ENTRY_POINT_LINE
        .captures(completion)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// All `(name, bases)` class definitions in the code, in source order.
fn class_definitions(code: &str) -> Vec<(&str, &str)> {
    CLASS_DEF
        .captures_iter(code)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let bases = caps.get(2).map_or("", |m| m.as_str());
            Some((name, bases))
        })
        .collect()
}

/// Picks the class to instantiate from the code alone.
///
/// First class deriving from something `Scene`-like, else the first class, else
/// [`FALLBACK_ENTRY_POINT`].
pub fn infer_entry_point(code: &str) -> &str {
    let classes = class_definitions(code);
    classes
        .iter()
        .find(|(_, bases)| bases.contains("Scene"))
        .or_else(|| classes.first())
        .map_or(FALLBACK_ENTRY_POINT, |(name, _)| *name)
}

/// A declared entry point must name a class defined in the code; without a declaration the name
/// is inferred.
pub fn resolve_entry_point(completion: &str, code: &str) -> Result<String> {
    match declared_entry_point(completion) {
        Some(declared) => {
            if class_definitions(code).iter().any(|(name, _)| *name == declared) {
                Ok(declared.to_string())
            } else {
                Err(AnimationError::UndefinedEntryPoint(declared.to_string()))
            }
        }
        None => Ok(infer_entry_point(code).to_string()),
    }
}

/// Adds the fixed configuration preamble and the entry-point invocation around the generated
/// code. A media directory that is not valid UTF-8 cannot be embedded and is rejected.
pub fn wrap_program(code: &str, entry_point: &str, media_dir: &Path) -> Result<SynthesizedProgram> {
    let media_dir = media_dir.to_str().map(python_string).ok_or_else(|| {
        AnimationError::Config(format!(
            "Media directory '{}' is not valid UTF-8",
            media_dir.display()
        ))
    })?;
    let source_text = format!(
        r#"from manim import *
import numpy as np

config.background_color = "{BACKGROUND_COLOR}"
config.pixel_height = {PIXEL_HEIGHT}
config.pixel_width = {PIXEL_WIDTH}
config.frame_rate = {FRAME_RATE}
config.media_dir = {media_dir}

{code}

if __name__ == "__main__":
    {entry_point}().render()
"#,
        code = code.trim(),
    );
    Ok(SynthesizedProgram {
        source_text,
        entry_point: entry_point.to_string(),
    })
}

/// A JSON string literal is also a valid Python string literal.
fn python_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Turns a prompt into a runnable program through a language model.
pub struct Synthesizer<P> {
    provider: P,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl<P: LlmProvider> Synthesizer<P> {
    pub fn new(provider: P, model: impl Into<String>, settings: &SynthesisSettings) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout: settings.timeout(),
        }
    }

    /// Every failure comes back as [`AnimationError::Synthesis`].
    pub async fn synthesize(&self, prompt: &str, media_dir: &Path) -> Result<SynthesizedProgram> {
        self.try_synthesize(prompt, media_dir)
            .await
            .map_err(AnimationError::synthesis)
    }

    async fn try_synthesize(&self, prompt: &str, media_dir: &Path) -> Result<SynthesizedProgram> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: build_messages(prompt),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let completion = tokio::time::timeout(self.timeout, self.provider.complete(&request))
            .await
            .map_err(|_| AnimationError::Timeout {
                stage: "Code synthesis",
                seconds: self.timeout.as_secs(),
            })??;

        info!(
            "✅ Model responded in {}ms (tokens in/out: {:?}/{:?})",
            completion.latency_ms, completion.usage.input_tokens, completion.usage.output_tokens
        );

        let code = extract_code_block(&completion.text).ok_or_else(|| {
            error!("No code found in the response. Full response:\n{}", completion.text);
            AnimationError::NoCodeBlock
        })?;

        let entry_point = resolve_entry_point(&completion.text, code)?;
        let program = wrap_program(code, &entry_point, media_dir)?;
        debug!("Generated Manim code:\n{}", program.source_text);
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Completion, TokenUsage};

    struct CannedProvider(Option<String>);

    impl LlmProvider for CannedProvider {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
            match &self.0 {
                Some(text) => Ok(Completion {
                    text: text.clone(),
                    latency_ms: 1,
                    usage: TokenUsage::default(),
                }),
                None => Err(AnimationError::EmptyResponse),
            }
        }
    }

    struct SlowProvider;

    impl LlmProvider for SlowProvider {
        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(AnimationError::EmptyResponse)
        }
    }

    const PENDULUM: &str = "Here you go:\n\n```python\n\
        class PendulumScene(Scene):\n    def construct(self):\n        self.wait()\n```\n";

    fn settings(timeout_secs: u64) -> SynthesisSettings {
        SynthesisSettings {
            timeout_secs,
            ..SynthesisSettings::default()
        }
    }

    #[test]
    fn test_prefers_python_block() {
        let completion = "```text\nnot code\n```\nthen\n```python\nclass A(Scene):\n    pass\n```";
        assert_eq!(extract_code_block(completion), Some("class A(Scene):\n    pass"));
    }

    #[test]
    fn test_falls_back_to_any_block() {
        assert_eq!(
            extract_code_block("```\nclass B(Scene): pass\n```"),
            Some("class B(Scene): pass")
        );
        assert_eq!(extract_code_block("```py3k\nx = 1\n```"), Some("x = 1"));
        assert_eq!(extract_code_block("```x = 1```"), Some("x = 1"));
    }

    #[test]
    fn test_no_block_or_empty_block() {
        assert_eq!(extract_code_block("class A(Scene): pass"), None);
        assert_eq!(extract_code_block("```python\n\n```"), None);
    }

    #[test]
    fn test_entry_point_inference() {
        let code = "class Helper:\n    pass\n\nclass WaveScene(MovingCameraScene):\n    pass\n";
        assert_eq!(infer_entry_point(code), "WaveScene");
        assert_eq!(infer_entry_point("class Only:\n    pass"), "Only");
        assert_eq!(infer_entry_point("x = 1"), FALLBACK_ENTRY_POINT);
    }

    #[test]
    fn test_declared_entry_point_must_exist() {
        let code = "class PendulumScene(Scene):\n    pass";
        let ok = format!("```python\n{}\n```\nEntry point: PendulumScene\n", code);
        assert_eq!(resolve_entry_point(&ok, code).unwrap(), "PendulumScene");

        let bad = format!("```python\n{}\n```\nEntry point: Pendulum\n", code);
        assert!(matches!(
            resolve_entry_point(&bad, code),
            Err(AnimationError::UndefinedEntryPoint(name)) if name == "Pendulum"
        ));
    }

    #[test]
    fn test_wrap_program() {
        let program = wrap_program(
            "class PendulumScene(Scene):\n    pass\n",
            "PendulumScene",
            Path::new("/srv/public/animations"),
        )
        .unwrap();
        assert_eq!(program.entry_point, "PendulumScene");
        let src = &program.source_text;
        assert!(src.starts_with("from manim import *\nimport numpy as np\n"));
        assert!(src.contains("config.background_color = \"#000000\""));
        assert!(src.contains("config.pixel_height = 720"));
        assert!(src.contains("config.pixel_width = 1280"));
        assert!(src.contains("config.frame_rate = 30"));
        assert!(src.contains("config.media_dir = \"/srv/public/animations\""));
        assert!(src.ends_with("if __name__ == \"__main__\":\n    PendulumScene().render()\n"));
    }

    #[test]
    fn test_media_dir_is_escaped() {
        let program = wrap_program("x = 1", "Scene", Path::new("/tmp/we\"ird")).unwrap();
        assert!(program.source_text.contains(r#"config.media_dir = "/tmp/we\"ird""#));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_media_dir_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let media_dir = Path::new(OsStr::from_bytes(b"/srv/anim\xffations"));
        let err = wrap_program("x = 1", "Scene", media_dir).unwrap_err();
        assert!(matches!(err, AnimationError::Config(_)));
    }

    #[test]
    fn test_messages_embed_prompt() {
        let messages = build_messages("Show how a simple pendulum oscillates");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("Keep animations under 5 steps"));
        assert!(messages[0].content.contains("class GraphAnimation(Scene)"));
        assert!(messages[1].content.contains("Show how a simple pendulum oscillates"));
    }

    #[tokio::test]
    async fn test_synthesize_success() {
        let provider = CannedProvider(Some(PENDULUM.to_string()));
        let synth = Synthesizer::new(provider, "m", &settings(20));
        let program = synth.synthesize("pendulum", Path::new("/tmp/out")).await.unwrap();
        assert_eq!(program.entry_point, "PendulumScene");
        assert!(program.source_text.contains("PendulumScene().render()"));
    }

    #[tokio::test]
    async fn test_synthesize_without_code_fails() {
        let synth = Synthesizer::new(
            CannedProvider(Some("I cannot draw that.".to_string())),
            "m",
            &settings(20),
        );
        let err = synth.synthesize("pendulum", Path::new("/tmp/out")).await.unwrap_err();
        assert!(matches!(err, AnimationError::Synthesis { .. }));
    }

    #[tokio::test]
    async fn test_provider_error_is_synthesis_error() {
        let synth = Synthesizer::new(CannedProvider(None), "m", &settings(20));
        let err = synth.synthesize("pendulum", Path::new("/tmp/out")).await.unwrap_err();
        assert!(matches!(err, AnimationError::Synthesis { .. }));
    }

    #[tokio::test]
    async fn test_synthesis_timeout() {
        let synth = Synthesizer::new(SlowProvider, "m", &settings(1));
        let err = synth.synthesize("pendulum", Path::new("/tmp/out")).await.unwrap_err();
        match err {
            AnimationError::Synthesis { source } => {
                assert!(matches!(*source, AnimationError::Timeout { seconds: 1, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
