//! FaceFusion command builder.

use std::path::{Path, PathBuf};

use crate::config::ToolConfig;

/// Keeps the tool from fetching or re-verifying model artifacts at run time.
///
/// Every built command carries it exactly once. Models are provisioned ahead
/// of time and checked by [`crate::health::check_environment`].
pub const OFFLINE_FLAG: &str = "--skip-download";

/// Subcommand for non-interactive batch mode.
pub const HEADLESS_SUBCOMMAND: &str = "headless-run";

/// Placeholder tokens accepted in caller supplied argument lists.
pub const SOURCE_PLACEHOLDER: &str = "{source}";
pub const TARGET_PLACEHOLDER: &str = "{target}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Builder for FaceFusion invocations.
#[derive(Debug, Clone)]
pub struct FaceSwapCommand {
    /// Entry script, first argument to the interpreter
    script: String,
    /// Face image path
    source: PathBuf,
    /// Target video path
    target: PathBuf,
    /// Output video path
    output: PathBuf,
    /// Template arguments after the path flags
    extra_args: Vec<String>,
    /// Caller arguments replacing the template
    override_args: Option<Vec<String>>,
}

impl FaceSwapCommand {
    /// Create a bare command with the path flags only.
    pub fn new(
        script: impl Into<String>,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Self {
        Self {
            script: script.into(),
            source: source.as_ref().to_path_buf(),
            target: target.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            extra_args: Vec::new(),
            override_args: None,
        }
    }

    /// Default template, tuned from config.
    pub fn from_config(
        config: &ToolConfig,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Self {
        let mut cmd = Self::new(config.script.clone(), source, target, output)
            .processors(&config.processors)
            .execution_providers(&config.execution_providers)
            .thread_count(config.thread_count)
            .queue_count(config.queue_count)
            .video_memory_strategy(&config.video_memory_strategy)
            .face_detector_model(&config.face_detector_model);

        if let Some(preset) = &config.output_video_preset {
            cmd = cmd.output_video_preset(preset);
        }
        if let Some(quality) = config.output_video_quality {
            cmd = cmd.output_video_quality(quality);
        }
        cmd
    }

    /// Add a flag followed by one or more values.
    fn flag_values<I, S>(mut self, flag: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_args.push(flag.to_string());
        self.extra_args
            .extend(values.into_iter().map(|v| v.as_ref().to_string()));
        self
    }

    /// Restrict processing stages.
    pub fn processors(self, processors: &[String]) -> Self {
        self.flag_values("--processors", processors)
    }

    /// Select execution providers.
    pub fn execution_providers(self, providers: &[String]) -> Self {
        self.flag_values("--execution-providers", providers)
    }

    pub fn thread_count(self, count: u32) -> Self {
        self.flag_values("--execution-thread-count", [count.to_string()])
    }

    pub fn queue_count(self, count: u32) -> Self {
        self.flag_values("--execution-queue-count", [count.to_string()])
    }

    pub fn video_memory_strategy(self, strategy: &str) -> Self {
        self.flag_values("--video-memory-strategy", [strategy])
    }

    pub fn face_detector_model(self, model: &str) -> Self {
        self.flag_values("--face-detector-model", [model])
    }

    pub fn output_video_preset(self, preset: &str) -> Self {
        self.flag_values("--output-video-preset", [preset])
    }

    pub fn output_video_quality(self, quality: u8) -> Self {
        self.flag_values("--output-video-quality", [quality.min(100).to_string()])
    }

    /// Replace the template with caller arguments.
    ///
    /// The list is used verbatim after the entry script, with `{source}`,
    /// `{target}` and `{output}` substituted.
    pub fn with_override(mut self, args: Vec<String>) -> Self {
        self.override_args = Some(args);
        self
    }

    /// Build the argument list passed to the interpreter.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![self.script.clone()];

        match &self.override_args {
            Some(custom) => {
                args.extend(custom.iter().map(|arg| self.substitute(arg)));
            }
            None => {
                args.push(HEADLESS_SUBCOMMAND.to_string());
                args.push("--source-paths".to_string());
                args.push(self.source.to_string_lossy().to_string());
                args.push("--target-path".to_string());
                args.push(self.target.to_string_lossy().to_string());
                args.push("--output-path".to_string());
                args.push(self.output.to_string_lossy().to_string());
                args.extend(self.extra_args.iter().cloned());
            }
        }

        ensure_flag_once(&mut args, OFFLINE_FLAG);
        args
    }

    fn substitute(&self, arg: &str) -> String {
        arg.replace(SOURCE_PLACEHOLDER, &self.source.to_string_lossy())
            .replace(TARGET_PLACEHOLDER, &self.target.to_string_lossy())
            .replace(OUTPUT_PLACEHOLDER, &self.output.to_string_lossy())
    }
}

/// Leave exactly one occurrence of `flag`: keep the first, drop repeats,
/// append when absent.
pub fn ensure_flag_once(args: &mut Vec<String>, flag: &str) {
    let mut seen = false;
    args.retain(|arg| {
        if arg != flag {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        true
    });

    if !seen {
        args.push(flag.to_string());
    }
}
