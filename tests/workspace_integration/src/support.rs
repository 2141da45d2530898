//! Shared fixtures: a shell speech engine, a recording publisher and a live
//! artifact server on a loopback port.

use announce_bridge::{AnnouncementHandler, ArtifactServer, Publisher, ServerIdentity};
use announce_common::error::Result;
use announce_common::{Shutdown, shutdown_channel};
use announce_speech::{SpeechEngine, Synthesizer};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;

pub const OUTBOUND: &str = "display/announce";

/// `$1` is the text, `$2` the output path.
pub struct ShellEngine {
    pub name: &'static str,
    pub script: &'static str,
}

#[async_trait]
impl SpeechEngine for ShellEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn command(&self, text: &str, output: &Path) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(self.script).arg("sh").arg(text).arg(output);
        cmd
    }
}

pub const WRITES_TEXT: &str = r#"printf 'RIFF%s' "$1" > "$2""#;
pub const NOT_INSTALLED: &str = "exit 127";

#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        self.sent.lock().unwrap().push((topic.to_string(), payload));
        Ok(())
    }
}

pub struct LiveServer {
    pub handler: AnnouncementHandler<RecordingPublisher>,
    pub published: RecordingPublisher,
    pub port: u16,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl LiveServer {
    /// Serve `dir` on loopback and point the handler's URLs at it.
    pub async fn start(dir: &Path, primary: ShellEngine, fallback: ShellEngine) -> Self {
        let (shutdown, listener) = shutdown_channel();
        let server = ArtifactServer::new(dir, 0)
            .bind_to("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let port = server.local_addr().port();
        let task = tokio::spawn(async move {
            server.serve(listener).await.unwrap();
        });

        let synthesizer = Synthesizer::new(dir, Box::new(primary), Box::new(fallback), 10);
        let published = RecordingPublisher::default();
        let handler = AnnouncementHandler::new(
            synthesizer,
            ServerIdentity::new("127.0.0.1", port),
            OUTBOUND,
            published.clone(),
        );

        Self {
            handler,
            published,
            port,
            shutdown,
            task,
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.published
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, url)| url.clone())
            .collect()
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap();
    }
}
