//! Where sealed episode logs go once a trial ends.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, info};

use gridworld_kernel::EpisodeLog;

/// Destination for finished episode logs.
#[derive(Debug, Clone)]
pub enum LogSink {
    /// Pretty-printed JSON on stdout
    Stdout,
    /// JSON body POSTed to a collection endpoint
    Http { client: Client, url: String },
}

impl LogSink {
    /// HTTP sink when a URL is given, stdout otherwise.
    pub fn from_url(url: Option<&str>) -> Result<Self> {
        match url {
            Some(url) => Self::http(url),
            None => Ok(Self::Stdout),
        }
    }

    pub fn http(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for the log sink")?;
        Ok(Self::Http {
            client,
            url: url.to_string(),
        })
    }

    pub async fn deliver(&self, log: &EpisodeLog) -> Result<()> {
        match self {
            Self::Stdout => {
                println!("{}", log.to_json()?);
                Ok(())
            }
            Self::Http { client, url } => {
                let response = client
                    .post(url)
                    .json(log)
                    .send()
                    .await
                    .with_context(|| format!("Failed to send episode log to {}", url))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    anyhow::bail!("Log sink returned {}: {}", status, body);
                }

                debug!(url = %url, steps = log.len(), "Episode log delivered");
                info!(result = %log.result, "Episode log stored");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_selection() {
        assert!(matches!(LogSink::from_url(None).unwrap(), LogSink::Stdout));
        match LogSink::from_url(Some("http://localhost/test/game_log")).unwrap() {
            LogSink::Http { url, .. } => assert_eq!(url, "http://localhost/test/game_log"),
            LogSink::Stdout => panic!("expected an HTTP sink"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let sink = LogSink::http("http://127.0.0.1:9/episodes").unwrap();
        let log = EpisodeLog::from_json(
            r#"{"grid":{"rows":1,"cols":1,"walls":[],"goals":[]},"agentIds":["a"],"steps":[{"a":[0,0]}],"result":"done"}"#,
        )
        .unwrap();
        assert!(sink.deliver(&log).await.is_err());
    }
}
