//! HUB75 Announce Bridge
//!
//! Listens for announcement text over MQTT, renders it to a WAV file with
//! espeak (pyttsx3 as fallback), serves the file over HTTP and publishes its
//! URL back to the display.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: broker on localhost:1883, files served on port 8000
//! announce-bridge
//!
//! # Remote broker, different HTTP port
//! announce-bridge --broker-host 192.168.1.10 --http-port 8080
//! ```

use announce_bridge::{ArtifactServer, MessageBridge, ServerIdentity};
use announce_common::tracing::init_tracing;
use announce_common::{Config, shutdown_channel, wait_for_shutdown_signal};
use announce_speech::Synthesizer;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "announce-bridge")]
#[command(about = "MQTT-to-speech bridge for HUB75 ESP32 displays")]
#[command(version)]
struct Args {
    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER")]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT")]
    broker_port: Option<u16>,

    /// Port of the artifact HTTP server
    #[arg(long, env = "HTTP_SERVER_PORT")]
    http_port: Option<u16>,

    /// Directory for generated audio
    #[arg(long, env = "AUDIO_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Number of audio files to keep
    #[arg(long, env = "MAX_AUDIO_FILES")]
    max_audio_files: Option<usize>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.broker_host {
            config.broker_host = host;
        }
        if let Some(port) = self.broker_port {
            config.broker_port = port;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(max) = self.max_audio_files {
            config.max_audio_files = max;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("cannot create {}", config.output_dir.display()))?;

    let identity = ServerIdentity::from_config(&config).await;

    tracing::info!(
        broker = %config.broker_addr(),
        inbound = %config.inbound_topic,
        outbound = %config.outbound_topic,
        files = %identity.base_url(),
        dir = %config.output_dir.display(),
        "Starting announce-bridge"
    );

    let (shutdown, listener) = shutdown_channel();

    let server = ArtifactServer::new(config.output_dir.clone(), config.http_port)
        .bind()
        .await?;
    let server_task = tokio::spawn(server.serve(listener.clone()));

    let signal_trigger = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => signal_trigger.trigger(),
            Err(e) => tracing::error!(error = %e, "Cannot listen for shutdown signals"),
        }
    });

    let synthesizer = Synthesizer::from_config(&config);
    tracing::info!(engines = ?synthesizer.engine_names(), "Speech engines");

    let result = MessageBridge::new(config, synthesizer, identity)
        .run(listener)
        .await;

    shutdown.trigger();
    match server_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
        Ok(Ok(())) => {}
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
