//! EpisodeClient: the requesting side of episode queries.
//!
//! An [`EpisodeHandle`](super::EpisodeHandle) lives outside the actor system,
//! so it sends each query to its client actor. The client forwards it to the
//! episode through a new envelope; the episode answers through
//! `reply_envelope()`, and the client resolves the waiting handle call by
//! correlation id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use acton_reactive::prelude::*;
use tokio::sync::oneshot;
use tracing::warn;

use crate::geometry::Position;
use crate::messages::{EpisodeStatus, PositionReply, QueryPosition, QueryStatus, StatusReply};

/// A handle call waiting for its reply.
pub(crate) enum Waiter {
    Position(oneshot::Sender<Option<Position>>),
    Status(oneshot::Sender<EpisodeStatus>),
}

/// Pending handle calls by correlation id.
pub(crate) type Waiters = Arc<Mutex<HashMap<u64, Waiter>>>;

fn take_waiter(waiters: &Waiters, correlation_id: u64) -> Option<Waiter> {
    waiters.lock().ok()?.remove(&correlation_id)
}

/// Actor state for EpisodeClient.
#[derive(Default, Clone)]
pub(crate) struct EpisodeClientState {
    episode: Option<ActorHandle>,
    waiters: Waiters,
}

impl std::fmt::Debug for EpisodeClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.waiters.lock().map(|w| w.len()).unwrap_or_default();
        f.debug_struct("EpisodeClientState")
            .field("has_episode", &self.episode.is_some())
            .field("pending", &pending)
            .finish()
    }
}

pub(crate) struct EpisodeClient;

impl EpisodeClient {
    pub(crate) async fn spawn(
        runtime: &mut ActorRuntime,
        episode: ActorHandle,
        waiters: Waiters,
    ) -> ActorHandle {
        let mut actor =
            runtime.new_actor_with_name::<EpisodeClientState>("EpisodeClient".to_string());
        actor.model.episode = Some(episode);
        actor.model.waiters = waiters;

        // Queries go out with this actor as the reply address
        actor.act_on::<QueryPosition>(|actor, context| {
            let msg = context.message().clone();
            let Some(episode) = actor.model.episode.as_ref() else {
                return Reply::ready();
            };
            let request_envelope = context.new_envelope(&episode.reply_address());

            Reply::pending(async move {
                request_envelope.send(msg).await;
            })
        });

        actor.act_on::<QueryStatus>(|actor, context| {
            let msg = context.message().clone();
            let Some(episode) = actor.model.episode.as_ref() else {
                return Reply::ready();
            };
            let request_envelope = context.new_envelope(&episode.reply_address());

            Reply::pending(async move {
                request_envelope.send(msg).await;
            })
        });

        actor.act_on::<PositionReply>(|actor, context| {
            let reply = context.message();
            match take_waiter(&actor.model.waiters, reply.correlation_id) {
                Some(Waiter::Position(tx)) => {
                    // The caller may have given up
                    let _ = tx.send(reply.position);
                }
                _ => warn!(correlation_id = reply.correlation_id, "Unmatched position reply"),
            }
            Reply::ready()
        });

        actor.act_on::<StatusReply>(|actor, context| {
            let reply = context.message().clone();
            match take_waiter(&actor.model.waiters, reply.correlation_id) {
                Some(Waiter::Status(tx)) => {
                    let _ = tx.send(reply.status);
                }
                _ => warn!(correlation_id = reply.correlation_id, "Unmatched status reply"),
            }
            Reply::ready()
        });

        actor.start().await
    }
}
