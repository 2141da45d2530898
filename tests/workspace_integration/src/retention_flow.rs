//! Retention as seen by a display downloading published URLs.

#[cfg(all(test, unix))]
mod tests {
    use crate::support::{LiveServer, NOT_INSTALLED, ShellEngine, WRITES_TEXT};
    use std::time::Duration;

    #[tokio::test]
    async fn test_evicted_url_becomes_404_and_newest_ten_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let mut live = LiveServer::start(
            tmp.path(),
            ShellEngine { name: "espeak", script: WRITES_TEXT },
            ShellEngine { name: "pyttsx3", script: NOT_INSTALLED },
        )
        .await;

        for i in 0..11 {
            live.handler.handle(format!("announcement {}", i).as_bytes()).await;
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let urls = live.urls();
        assert_eq!(urls.len(), 11);

        let first = reqwest::get(&urls[0]).await.unwrap();
        assert_eq!(first.status(), 404);

        for url in &urls[1..] {
            let resp = reqwest::get(url).await.unwrap();
            assert_eq!(resp.status(), 200, "{}", url);
        }

        let health: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{}/healthz", live.port))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["artifacts"], 10);

        live.stop().await;
    }
}
