//! Startup wiring: configuration into synthesizer, server and identity.

#[cfg(test)]
mod tests {
    use announce_bridge::{ArtifactServer, ServerIdentity};
    use announce_common::Config;
    use announce_speech::Synthesizer;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_default_configuration_is_valid() {
        let config = config_from(&[]);
        config.validate().unwrap();
        assert_eq!(config.inbound_topic, "display/announce/text");
        assert_eq!(config.outbound_topic, "display/announce");
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.max_audio_files, 10);
    }

    #[test]
    fn test_synthesizer_uses_espeak_then_pyttsx3() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            output_dir: tmp.path().to_path_buf(),
            ..config_from(&[])
        };
        let synthesizer = Synthesizer::from_config(&config);

        assert_eq!(synthesizer.engine_names(), vec!["espeak", "pyttsx3"]);
        assert_eq!(synthesizer.output_dir(), tmp.path());
        assert_eq!(synthesizer.retention().max_files(), 10);
    }

    #[tokio::test]
    async fn test_advertised_identity_matches_http_port() {
        let config = config_from(&[("ADVERTISE_HOST", "10.0.0.5"), ("HTTP_SERVER_PORT", "8080")]);
        let identity = ServerIdentity::from_config(&config).await;
        assert_eq!(
            identity.artifact_url("announcement_1.wav"),
            "http://10.0.0.5:8080/announcement_1.wav"
        );
    }

    #[tokio::test]
    async fn test_second_server_on_same_port_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let first = ArtifactServer::new(tmp.path(), 0)
            .bind_to("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let taken = first.local_addr();

        let second = ArtifactServer::new(tmp.path(), taken.port())
            .bind_to(taken)
            .await;

        assert!(second.is_err());
    }
}
