//! Decisions delegated to an external service.
//!
//! Each decision spawns a request task that submits the answer through the
//! agent's [`MoveSubmitter`]. The environment keeps serving other agents while
//! the request is in flight. A newer decision cancels the pending one, and a
//! failed request holds position.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Decision, DecisionContext, Policy, Transition};
use crate::geometry::{Action, Position};
use crate::submission::MoveSubmitter;
use crate::world::Observation;

/// Body of a decision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub state: Position,
    pub reward: f64,
    pub observation: Observation,
    /// Opaque token returned by the previous response.
    pub agent_state: Option<String>,
}

/// Body of a decision response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub action: Action,
    #[serde(default)]
    pub agent_state: Option<String>,
}

/// Something that answers decision requests.
pub trait DecisionSource: Send + Sync + 'static {
    fn decide(&self, request: DecisionRequest) -> BoxFuture<'static, Result<DecisionResponse>>;
}

/// HTTP decision service: POSTs the request as JSON, expects a JSON response.
#[derive(Clone)]
pub struct DecisionClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DecisionClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DecisionSource for DecisionClient {
    fn decide(&self, request: DecisionRequest) -> BoxFuture<'static, Result<DecisionResponse>> {
        let client = self.client.clone();
        let url = self.url.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let response = client
                .post(&url)
                .timeout(timeout)
                .json(&request)
                .send()
                .await
                .context("Failed to send decision request")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                bail!("Decision request failed with status {}: {}", status, body);
            }

            response
                .json::<DecisionResponse>()
                .await
                .context("Failed to parse decision response")
        })
    }
}

/// Policy whose every decision comes from a [`DecisionSource`].
pub struct ExternalDecision<S: DecisionSource = DecisionClient> {
    source: Arc<S>,
    submitter: Option<MoveSubmitter>,
    token: Arc<Mutex<Option<String>>>,
    pending: Option<JoinHandle<()>>,
}

impl<S: DecisionSource> ExternalDecision<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            submitter: None,
            token: Arc::new(Mutex::new(None)),
            pending: None,
        }
    }

    /// The opaque token the service handed back last.
    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    fn request(&mut self, ctx: &DecisionContext<'_>, reward: f64) -> Result<Decision> {
        let Some(submitter) = self.submitter.clone() else {
            bail!("external policy for {} was never attached", ctx.agent_id);
        };
        let runtime = Handle::try_current()
            .context("External decisions need a running tokio runtime")?;

        self.cancel_pending();

        let request = DecisionRequest {
            state: ctx.position,
            reward,
            observation: ctx.observation.clone(),
            agent_state: self.token(),
        };
        let source = Arc::clone(&self.source);
        let token = Arc::clone(&self.token);

        self.pending = Some(runtime.spawn(async move {
            let action = match source.decide(request).await {
                Ok(response) => {
                    if let Ok(mut stored) = token.lock() {
                        *stored = response.agent_state;
                    }
                    response.action
                }
                Err(e) => {
                    warn!(agent = submitter.agent(), error = %e, "Remote decision failed, holding position");
                    Action::STAY
                }
            };
            debug!(agent = submitter.agent(), %action, "Remote decision received");
            submitter.submit(action);
        }));

        Ok(Decision::Defer)
    }
}

impl<S: DecisionSource> Policy for ExternalDecision<S> {
    fn name(&self) -> &str {
        "external"
    }

    fn attach(&mut self, submitter: MoveSubmitter) {
        self.submitter = Some(submitter);
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        self.request(ctx, 0.0)
    }

    fn on_transitioned(
        &mut self,
        transition: &Transition,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision> {
        self.request(ctx, transition.reward)
    }

    fn detach(&mut self) {
        self.cancel_pending();
    }
}

impl<S: DecisionSource> Drop for ExternalDecision<S> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
