//! EpisodeActor: runs an [`Environment`] as an acton-reactive actor.
//!
//! The actor is the environment's only owner. Move submissions, queries and
//! its own pacing messages all go through one mailbox. Every handler that
//! changes the environment is a `mutate_on`, so no step ever overlaps another.
//!
//! Deferred policies submit through the environment's inbox channel. A pump
//! task forwards that inbox into the mailbox in arrival order and also sits
//! out the turn delay, so a submission that arrived during the pause is always
//! handled (and dropped) before the next turn is solicited.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use acton_reactive::prelude::*;
use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::episode_client::{EpisodeClient, Waiter, Waiters};
use crate::environment::{Environment, Phase};
use crate::error::EnvironmentError;
use crate::geometry::{Action, Position};
use crate::log::EpisodeLog;
use crate::messages::{
    DriveEpisode, EpisodeStatus, PositionReply, QueryPosition, QueryStatus, ResumeTurns,
    StatusReply,
};
use crate::submission::{MoveSubmitter, Submission};

/// Actor state for EpisodeActor.
#[derive(Default, Clone)]
pub struct EpisodeActorState {
    /// `None` only before spawn
    env: Arc<Mutex<Option<Environment>>>,
    /// Turn pause requests for the pump task
    pacer: Option<mpsc::UnboundedSender<Duration>>,
    /// A pause was requested and `ResumeTurns` has not arrived yet
    pausing: bool,
}

impl std::fmt::Debug for EpisodeActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = self.with_env(|env| env.phase());
        f.debug_struct("EpisodeActorState")
            .field("phase", &phase)
            .field("pausing", &self.pausing)
            .finish()
    }
}

impl EpisodeActorState {
    fn with_env<T>(&self, f: impl FnOnce(&mut Environment) -> T) -> Option<T> {
        let mut guard = self.env.lock().ok()?;
        guard.as_mut().map(f)
    }

    /// Commit a ready round, or ask the pump for the turn pause.
    ///
    /// Returns true when a round was committed and the next may already be
    /// ready.
    fn settle(&mut self) -> bool {
        let Ok(mut guard) = self.env.lock() else {
            return false;
        };
        let Some(env) = guard.as_mut() else {
            return false;
        };

        match env.phase() {
            Phase::BetweenTurns(next) => {
                if !self.pausing {
                    self.pausing = true;
                    trace!(next, "Pausing before the next turn");
                    if let Some(pacer) = &self.pacer {
                        // The pump is gone only while the actor stops.
                        let _ = pacer.send(env.config().turn_delay());
                    }
                }
                false
            }
            _ if env.round_ready() => env.run_pending(),
            _ => false,
        }
    }
}

fn status_of(env: &Environment) -> EpisodeStatus {
    EpisodeStatus {
        world: env.world_snapshot(),
        phase: env.phase(),
        steps: env.steps(),
        active_agent: env.active_agent().map(str::to_string),
    }
}

/// Spawns episode actors.
pub struct EpisodeActor;

impl EpisodeActor {
    /// Initialize `env` and start driving it in `runtime`.
    ///
    /// Configuration errors are reported before anything is spawned.
    pub async fn spawn(
        runtime: &mut ActorRuntime,
        mut env: Environment,
    ) -> Result<EpisodeHandle, EnvironmentError> {
        let inbox = env.take_inbox()?;
        let submissions = env.inbox_sender();

        let (done_tx, done_rx) = oneshot::channel();
        env.init(Box::new(move |log: EpisodeLog| {
            // Ignore send errors - the handle may have been dropped
            let _ = done_tx.send(log);
        }))?;
        info!(protocol = ?env.config().protocol, agents = env.agent_ids().count(), "Episode actor started");

        let (pacer, pauses) = mpsc::unbounded_channel();
        let mut actor = runtime.new_actor_with_name::<EpisodeActorState>("Episode".to_string());
        actor.model.env = Arc::new(Mutex::new(Some(env)));
        actor.model.pacer = Some(pacer);

        configure_handlers(&mut actor);

        let episode = actor.start().await;
        let pump = tokio::spawn(pump(episode.clone(), inbox, pauses));

        let waiters = Waiters::default();
        let client = EpisodeClient::spawn(runtime, episode.clone(), waiters.clone()).await;

        Ok(EpisodeHandle {
            episode,
            client,
            waiters,
            next_id: AtomicU64::new(0),
            submissions,
            finished: Some(done_rx),
            pump,
        })
    }
}

/// Configure all message handlers for the episode actor.
fn configure_handlers(actor: &mut ManagedActor<Idle, EpisodeActorState>) {
    // Commit anything init left ready (autonomous first rounds, first pause)
    actor.after_start(|actor| {
        let handle = actor.handle().clone();
        Reply::pending(async move {
            handle.send(DriveEpisode).await;
        })
    });

    // Stopping early ends the episode without sealing a log
    actor.before_stop(|actor| {
        actor.model.with_env(|env| {
            env.abandon();
            debug!(steps = env.steps(), result = ?env.result(), "Episode actor stopped");
        });
        Reply::ready()
    });

    actor.mutate_on::<Submission>(|actor, context| {
        let Submission { agent, action } = context.message().clone();
        let outcome = actor.model.with_env(|env| env.submit_move(&agent, action));
        trace!(agent = %agent, %action, ?outcome, "Submission handled");

        if actor.model.settle() {
            let handle = actor.handle().clone();
            return Reply::pending(async move {
                handle.send(DriveEpisode).await;
            });
        }
        Reply::ready()
    });

    // One round per message so queries interleave with autonomous play
    actor.mutate_on::<DriveEpisode>(|actor, _context| {
        if actor.model.settle() {
            let handle = actor.handle().clone();
            return Reply::pending(async move {
                handle.send(DriveEpisode).await;
            });
        }
        Reply::ready()
    });

    actor.mutate_on::<ResumeTurns>(|actor, _context| {
        actor.model.pausing = false;
        actor.model.with_env(|env| env.run_pending());

        if actor.model.settle() {
            let handle = actor.handle().clone();
            return Reply::pending(async move {
                handle.send(DriveEpisode).await;
            });
        }
        Reply::ready()
    });

    actor.act_on::<QueryPosition>(|actor, context| {
        let msg = context.message().clone();
        let position = actor.model.with_env(|env| env.agent_position(&msg.agent)).flatten();
        let reply_envelope = context.reply_envelope();

        Reply::pending(async move {
            reply_envelope
                .send(PositionReply {
                    correlation_id: msg.correlation_id,
                    position,
                })
                .await;
        })
    });

    actor.act_on::<QueryStatus>(|actor, context| {
        let correlation_id = context.message().correlation_id;
        let Some(status) = actor.model.with_env(|env| status_of(env)) else {
            return Reply::ready();
        };
        let reply_envelope = context.reply_envelope();

        Reply::pending(async move {
            reply_envelope
                .send(StatusReply {
                    correlation_id,
                    status,
                })
                .await;
        })
    });
}

/// Forward inbox submissions into the actor's mailbox in arrival order and
/// run the turn pauses the actor asks for.
async fn pump(
    episode: ActorHandle,
    mut inbox: mpsc::UnboundedReceiver<Submission>,
    mut pauses: mpsc::UnboundedReceiver<Duration>,
) {
    loop {
        tokio::select! {
            biased;
            Some(submission) = inbox.recv() => {
                episode.send(submission).await;
            }
            pause = pauses.recv() => {
                let Some(delay) = pause else {
                    break;
                };

                let timer = tokio::time::sleep(delay);
                tokio::pin!(timer);
                loop {
                    tokio::select! {
                        biased;
                        Some(submission) = inbox.recv() => {
                            episode.send(submission).await;
                        }
                        _ = &mut timer => break,
                    }
                }

                // Submissions that raced the timer still belong to the pause.
                while let Ok(submission) = inbox.try_recv() {
                    episode.send(submission).await;
                }
                episode.send(ResumeTurns).await;
            }
        }
    }
    trace!("Episode pump stopped");
}

/// Client side of a running episode.
pub struct EpisodeHandle {
    episode: ActorHandle,
    client: ActorHandle,
    waiters: Waiters,
    next_id: AtomicU64,
    submissions: mpsc::UnboundedSender<Submission>,
    finished: Option<oneshot::Receiver<EpisodeLog>>,
    pump: JoinHandle<()>,
}

impl EpisodeHandle {
    /// Submission handle for `agent`. Moves for unknown agents are dropped.
    pub fn submitter(&self, agent: &str) -> MoveSubmitter {
        MoveSubmitter::new(agent, self.submissions.clone())
    }

    pub fn submit(&self, agent: &str, action: Action) -> bool {
        self.submitter(agent).submit(action)
    }

    /// The episode actor's handle, for wiring it to other actors.
    pub fn actor(&self) -> &ActorHandle {
        &self.episode
    }

    fn register(&self, waiter: Waiter) -> Result<u64> {
        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.waiters
            .lock()
            .map_err(|_| anyhow!("Episode reply table poisoned"))?
            .insert(correlation_id, waiter);
        Ok(correlation_id)
    }

    pub async fn position(&self, agent: &str) -> Result<Option<Position>> {
        let (reply, rx) = oneshot::channel();
        let correlation_id = self.register(Waiter::Position(reply))?;
        self.client
            .send(QueryPosition {
                correlation_id,
                agent: agent.to_string(),
            })
            .await;
        rx.await.context("Episode actor dropped the position query")
    }

    pub async fn status(&self) -> Result<EpisodeStatus> {
        let (reply, rx) = oneshot::channel();
        let correlation_id = self.register(Waiter::Status(reply))?;
        self.client.send(QueryStatus { correlation_id }).await;
        rx.await.context("Episode actor dropped the status query")
    }

    /// Wait for the sealed log. Fails if the episode was shut down first or
    /// the log was already taken.
    pub async fn finished(&mut self) -> Result<EpisodeLog> {
        let rx = self
            .finished
            .take()
            .context("Episode log was already taken")?;
        rx.await.context("Episode stopped before an end trigger fired")
    }

    /// Stop both actors. An episode that has not ended is abandoned.
    pub async fn shutdown(self) -> Result<()> {
        self.pump.abort();
        self.client.stop().await?;
        self.episode.stop().await?;

        // Queries that never got an answer fail instead of hanging.
        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.clear();
        }
        Ok(())
    }
}

impl std::fmt::Debug for EpisodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpisodeHandle")
            .field("episode", &self.episode.name())
            .field("finished_taken", &self.finished.is_none())
            .finish()
    }
}
