//! Subprocess speech engines.
//!
//! Every engine runs as its own process so a hung or crashing synthesizer can
//! be killed without touching the bridge. Text always travels as a discrete
//! argv element; nothing is ever passed through a shell.

use announce_common::config::Config;
use announce_common::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Fixed pyttsx3 driver. Reads text, output path and rate from `sys.argv`, so
/// announcement text is data to the interpreter, never code.
pub const PYTTSX3_SCRIPT: &str = r#"import sys
import pyttsx3

text, output, rate = sys.argv[1], sys.argv[2], int(sys.argv[3])
engine = pyttsx3.init()
engine.setProperty("rate", rate)
engine.setProperty("volume", 1.0)
engine.save_to_file(text, output)
engine.runAndWait()
engine.stop()
"#;

/// A speech engine invoked as an external process.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Short engine name used in logs and errors.
    fn name(&self) -> &str;

    /// Hard limit for one synthesis run.
    fn timeout(&self) -> Duration;

    /// Pause between a successful exit and the output check, for engines
    /// that flush to disk asynchronously.
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Build the command that writes `text` as WAV to `output`.
    fn command(&self, text: &str, output: &Path) -> Command;

    /// Run the engine to completion.
    ///
    /// The timeout is enforced by the caller; dropping the returned future
    /// kills the child process.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        run_engine(self.name(), self.command(text, output)).await
    }
}

/// Execute an engine command and map its outcome.
///
/// - executable not found -> `Error::EngineUnavailable`
/// - non-zero exit -> `Error::Engine` carrying stderr
pub async fn run_engine(name: &str, mut command: Command) -> Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(engine = name, command = ?command, "Running speech engine");

    let output = match command.output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::engine_unavailable(name));
        }
        Err(e) => return Err(Error::engine(name, format!("failed to start: {}", e))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::engine(
            name,
            format!("{}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(())
}

/// espeak / espeak-ng, the lightweight primary engine.
#[derive(Debug, Clone)]
pub struct EspeakEngine {
    program: String,
    rate: u32,
    timeout: Duration,
}

impl EspeakEngine {
    /// Create an engine running `program` at `rate` words per minute.
    pub fn new(program: impl Into<String>, rate: u32, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            rate,
            timeout,
        }
    }

    /// Build from the primary-engine settings.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.primary_program.clone(),
            config.speech_rate,
            config.primary_timeout,
        )
    }
}

#[async_trait]
impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &str {
        "espeak"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn command(&self, text: &str, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-w").arg(output);
        cmd.arg("-s").arg(self.rate.to_string());
        // A leading '-' would be read as an option; espeak skips the space.
        if text.starts_with('-') {
            cmd.arg(format!(" {}", text));
        } else {
            cmd.arg(text);
        }
        cmd
    }
}

/// pyttsx3 through a Python interpreter, the heavier fallback engine.
#[derive(Debug, Clone)]
pub struct Pyttsx3Engine {
    interpreter: String,
    rate: u32,
    timeout: Duration,
    settle: Duration,
}

impl Pyttsx3Engine {
    /// Create an engine driven by `interpreter`.
    pub fn new(
        interpreter: impl Into<String>,
        rate: u32,
        timeout: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            rate,
            timeout,
            settle,
        }
    }

    /// Build from the fallback-engine settings.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.fallback_program.clone(),
            config.speech_rate,
            config.fallback_timeout,
            config.fallback_settle,
        )
    }
}

#[async_trait]
impl SpeechEngine for Pyttsx3Engine {
    fn name(&self) -> &str {
        "pyttsx3"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn settle_delay(&self) -> Duration {
        self.settle
    }

    fn command(&self, text: &str, output: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c").arg(PYTTSX3_SCRIPT);
        cmd.arg(text).arg(output).arg(self.rate.to_string());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_espeak_passes_text_as_single_argument() {
        let engine = EspeakEngine::new("espeak", 150, Duration::from_secs(15));
        let text = r#"Hello "world"; rm -rf / $(reboot) `id`"#;
        let cmd = engine.command(text, Path::new("/tmp/out.wav"));

        assert_eq!(cmd.as_std().get_program(), OsStr::new("espeak"));
        assert_eq!(
            args(&cmd),
            vec!["-w", "/tmp/out.wav", "-s", "150", text]
        );
    }

    #[test]
    fn test_espeak_guards_leading_dash() {
        let engine = EspeakEngine::new("espeak", 150, Duration::from_secs(15));
        let cmd = engine.command("-v de tricked", Path::new("out.wav"));
        let argv = args(&cmd);
        assert_eq!(argv.last().map(String::as_str), Some(" -v de tricked"));
    }

    #[test]
    fn test_pyttsx3_keeps_script_constant() {
        let engine = Pyttsx3Engine::new(
            "python3",
            150,
            Duration::from_secs(20),
            Duration::from_millis(200),
        );
        let text = r#"", r"/etc/passwd"); import os; os.system("id") #"#;
        let cmd = engine.command(text, Path::new("/tmp/out.wav"));
        let argv = args(&cmd);

        assert_eq!(cmd.as_std().get_program(), OsStr::new("python3"));
        assert_eq!(argv[0], "-c");
        assert_eq!(argv[1], PYTTSX3_SCRIPT);
        assert_eq!(argv[2], text);
        assert_eq!(argv[3], "/tmp/out.wav");
        assert_eq!(argv[4], "150");
        assert!(!PYTTSX3_SCRIPT.contains(text));
    }

    #[test]
    fn test_engine_settings_from_config() {
        let config = Config {
            primary_program: "espeak-ng".to_string(),
            primary_timeout: Duration::from_secs(7),
            fallback_program: "python3.11".to_string(),
            fallback_timeout: Duration::from_secs(30),
            fallback_settle: Duration::from_millis(300),
            speech_rate: 120,
            ..Config::default()
        };

        let primary = EspeakEngine::from_config(&config);
        assert_eq!(primary.timeout(), Duration::from_secs(7));
        assert_eq!(primary.settle_delay(), Duration::ZERO);
        assert_eq!(
            primary.command("hi", Path::new("a.wav")).as_std().get_program(),
            OsStr::new("espeak-ng")
        );

        let fallback = Pyttsx3Engine::from_config(&config);
        assert_eq!(fallback.timeout(), Duration::from_secs(30));
        assert_eq!(fallback.settle_delay(), Duration::from_millis(300));
        assert_eq!(args(&fallback.command("hi", Path::new("a.wav")))[4], "120");
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let engine = EspeakEngine::new(
            "/nonexistent/bin/espeak",
            150,
            Duration::from_secs(1),
        );
        let err = engine
            .synthesize("hello", Path::new("/tmp/never.wav"))
            .await
            .unwrap_err();
        assert!(err.is_engine_unavailable(), "{}", err);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo 'voice not found' >&2; exit 3");
        let err = run_engine("fake", cmd).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fake"), "{}", msg);
        assert!(msg.contains("voice not found"), "{}", msg);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_ok() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 0");
        assert!(run_engine("fake", cmd).await.is_ok());
    }
}
