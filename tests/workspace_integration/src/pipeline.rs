//! Text in, URL out, audio downloadable from the URL.

#[cfg(all(test, unix))]
mod tests {
    use crate::support::{LiveServer, NOT_INSTALLED, OUTBOUND, ShellEngine, WRITES_TEXT};
    use announce_bridge::Outcome;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_published_url_serves_the_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let mut live = LiveServer::start(
            tmp.path(),
            ShellEngine { name: "espeak", script: WRITES_TEXT },
            ShellEngine { name: "pyttsx3", script: NOT_INSTALLED },
        )
        .await;

        let outcome = live.handler.handle(b"Hello world").await;
        let Outcome::Published(url) = outcome else {
            panic!("expected publish, got {:?}", outcome);
        };

        let sent = live.published.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(OUTBOUND.to_string(), url.clone())]);

        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"RIFFHello world");

        live.stop().await;
    }

    #[tokio::test]
    async fn test_fallback_engine_output_is_served() {
        let tmp = tempfile::tempdir().unwrap();
        let mut live = LiveServer::start(
            tmp.path(),
            ShellEngine { name: "espeak", script: NOT_INSTALLED },
            ShellEngine { name: "pyttsx3", script: WRITES_TEXT },
        )
        .await;

        let Outcome::Published(url) = live.handler.handle(b"Platform two").await else {
            panic!("fallback should have produced audio");
        };

        let body = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
        assert_eq!(body.as_ref(), b"RIFFPlatform two");

        live.stop().await;
    }

    #[tokio::test]
    async fn test_total_failure_publishes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut live = LiveServer::start(
            tmp.path(),
            ShellEngine { name: "espeak", script: NOT_INSTALLED },
            ShellEngine { name: "pyttsx3", script: NOT_INSTALLED },
        )
        .await;

        assert!(matches!(live.handler.handle(b"Silence").await, Outcome::Failed(_)));
        assert!(live.urls().is_empty());

        let health: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/healthz", live.port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["artifacts"], 0);

        live.stop().await;
    }

    #[tokio::test]
    async fn test_unicode_text_round_trips_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mut live = LiveServer::start(
            tmp.path(),
            ShellEngine { name: "espeak", script: WRITES_TEXT },
            ShellEngine { name: "pyttsx3", script: NOT_INSTALLED },
        )
        .await;

        let text = "Gleis 3: Zug fällt aus";
        let Outcome::Published(url) = live.handler.handle(text.as_bytes()).await else {
            panic!("expected publish");
        };

        let body = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
        assert_eq!(body.as_ref(), format!("RIFF{}", text).as_bytes());

        live.stop().await;
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Any non-blank text comes back as a downloadable, non-empty file.
        #[test]
        fn any_non_blank_text_is_downloadable(text in "[A-Za-z0-9 ,.!?'%$;&()-]{1,40}") {
            prop_assume!(!text.trim().is_empty());

            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let tmp = tempfile::tempdir().unwrap();

            let (status, body) = rt.block_on(async {
                let mut live = LiveServer::start(
                    tmp.path(),
                    ShellEngine { name: "espeak", script: WRITES_TEXT },
                    ShellEngine { name: "pyttsx3", script: NOT_INSTALLED },
                )
                .await;
                let outcome = live.handler.handle(text.as_bytes()).await;
                let Outcome::Published(url) = outcome else {
                    panic!("expected publish for {:?}, got {:?}", text, outcome);
                };
                let resp = reqwest::get(&url).await.unwrap();
                let status = resp.status();
                let body = resp.bytes().await.unwrap();
                live.stop().await;
                (status, body)
            });

            prop_assert_eq!(status, reqwest::StatusCode::OK);
            prop_assert!(!body.is_empty());
            let expected = format!("RIFF{}", text);
            prop_assert_eq!(body.as_ref(), expected.as_bytes());
        }
    }
}
