//! The episode coordinator.
//!
//! [`Environment`] is the single owner of agent positions and the episode log.
//! Everything that mutates the world goes through one acceptance path:
//!
//! ```text
//! policy decision ──┐
//!                   ├─▶ offer ─▶ stage / apply ─▶ notify ─▶ log ─▶ end triggers
//! MoveSubmitter ────┘
//! ```
//!
//! The environment never blocks and never spawns. Work that becomes ready
//! while a step is being processed (a fully staged round, the next turn) is
//! picked up by the next [`Environment::advance`] call, so steps never nest.
//! [`crate::actors::EpisodeActor`] drives it as an acton-reactive actor; tests drive it
//! synchronously with [`Environment::run_until_idle`].

mod simultaneous;
mod turn_based;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::agent::Agent;
use crate::config::{EnvironmentConfig, Protocol};
use crate::error::EnvironmentError;
use crate::geometry::{Action, Position};
use crate::grid::GridModel;
use crate::log::EpisodeLog;
use crate::policy::{Decision, DecisionContext, Policy, Transition};
use crate::reward::{self, RewardFn};
use crate::submission::{DropReason, MoveSubmitter, SubmitOutcome, Submission};
use crate::trigger::{EndTriggers, EpisodeView};
use crate::world::{AgentId, WorldSnapshot};

/// Receives the sealed log when the episode ends.
pub type EpisodeCallback = Box<dyn FnOnce(EpisodeLog) + Send>;

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting registrations; `init` not called yet.
    Idle,
    /// Simultaneous: collecting this round's moves.
    AwaitingMoves,
    /// A round or turn is being resolved.
    Applying,
    /// Turn-based: waiting on the agent at this index.
    AwaitingTurn(usize),
    /// Turn-based: a turn committed; the agent at this index is next.
    BetweenTurns(usize),
    Ended,
}

/// Where an offered action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Returned synchronously from a policy call.
    Policy,
    /// Arrived through `submit_move` or the inbox.
    Submission,
}

/// Which policy hook to call.
enum Hook {
    Init,
    Choose,
    Transitioned(Transition),
}

pub struct Environment {
    grid: Arc<GridModel>,
    config: EnvironmentConfig,
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
    reward: RewardFn,
    triggers: EndTriggers,
    phase: Phase,
    /// Simultaneous: this round's move per agent.
    slots: Vec<Option<Action>>,
    steps: usize,
    log: Option<EpisodeLog>,
    result: Option<String>,
    on_end: Option<EpisodeCallback>,
    inbox_tx: mpsc::UnboundedSender<Submission>,
    inbox_rx: Option<mpsc::UnboundedReceiver<Submission>>,
}

impl Environment {
    pub fn new(grid: GridModel, config: EnvironmentConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            grid: Arc::new(grid),
            config,
            agents: Vec::new(),
            index: HashMap::new(),
            reward: reward::zero(),
            triggers: EndTriggers::new(),
            phase: Phase::Idle,
            slots: Vec::new(),
            steps: 0,
            log: None,
            result: None,
            on_end: None,
            inbox_tx,
            inbox_rx: Some(inbox_rx),
        }
    }

    pub fn with_reward(mut self, reward: RewardFn) -> Self {
        self.reward = reward;
        self
    }

    pub fn with_triggers(mut self, triggers: EndTriggers) -> Self {
        self.triggers = triggers;
        self
    }

    fn initialized(&self) -> bool {
        self.log.is_some() || self.phase != Phase::Idle
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Register an agent with no observation.
    pub fn register_agent(
        &mut self,
        id: impl Into<AgentId>,
        start: Position,
        policy: impl Policy + 'static,
    ) -> Result<(), EnvironmentError> {
        self.register(Agent::new(id, start, policy))
    }

    /// Register an agent. Turn order is registration order.
    pub fn register(&mut self, mut agent: Agent) -> Result<(), EnvironmentError> {
        if self.initialized() {
            return Err(EnvironmentError::AlreadyInitialized);
        }
        if agent.id.is_empty() {
            return Err(EnvironmentError::EmptyAgentId);
        }
        if self.index.contains_key(&agent.id) {
            return Err(EnvironmentError::DuplicateAgent(agent.id.clone()));
        }
        if !self.grid.is_legal_position(agent.position) {
            return Err(EnvironmentError::IllegalStart {
                id: agent.id.clone(),
                position: agent.position,
            });
        }

        agent
            .policy
            .attach(MoveSubmitter::new(agent.id.clone(), self.inbox_tx.clone()));
        debug!(agent = %agent.id, policy = agent.policy.name(), start = %agent.position, "Agent registered");

        self.index.insert(agent.id.clone(), self.agents.len());
        self.agents.push(agent);
        self.slots.push(None);
        Ok(())
    }

    /// Validate the setup, run every policy's `init` and start the episode.
    ///
    /// `on_end` is called exactly once, with the sealed log, when an end
    /// trigger fires.
    pub fn init(&mut self, on_end: EpisodeCallback) -> Result<(), EnvironmentError> {
        if self.initialized() {
            return Err(EnvironmentError::AlreadyInitialized);
        }
        if self.agents.is_empty() {
            return Err(EnvironmentError::NoAgents);
        }
        for agent in &self.agents {
            if let Some(tracked) = agent
                .policy
                .tracked_agents()
                .iter()
                .find(|tracked| !self.index.contains_key(*tracked))
            {
                return Err(EnvironmentError::UnknownTrackedAgent {
                    agent: agent.id.clone(),
                    tracked: tracked.clone(),
                });
            }
        }
        self.triggers.validate()?;

        let ids: Vec<AgentId> = self.agents.iter().map(|a| a.id.clone()).collect();
        let turn_order = match self.config.protocol {
            Protocol::Simultaneous => None,
            Protocol::TurnBased => Some(ids.clone()),
        };
        self.log = Some(EpisodeLog::open(&self.grid, ids, turn_order));
        self.on_end = Some(on_end);

        info!(
            protocol = ?self.config.protocol,
            agents = self.agents.len(),
            triggers = self.triggers.len(),
            "Episode started"
        );

        match self.config.protocol {
            Protocol::Simultaneous => self.init_simultaneous(),
            Protocol::TurnBased => self.init_turn_based(),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Submissions and driving
    // ------------------------------------------------------------------

    /// Submit a move on behalf of `agent`.
    ///
    /// Stray submissions (unknown agent, wrong phase, not this agent's turn)
    /// are dropped without error.
    pub fn submit_move(&mut self, agent: &str, action: Action) -> SubmitOutcome {
        let Some(&idx) = self.index.get(agent) else {
            trace!(agent, %action, "Submission from unknown agent dropped");
            return SubmitOutcome::Dropped(DropReason::UnknownAgent);
        };
        self.offer(idx, action, Origin::Submission)
    }

    /// A submission handle for a registered agent.
    pub fn submitter(&self, agent: &str) -> Option<MoveSubmitter> {
        self.index
            .contains_key(agent)
            .then(|| MoveSubmitter::new(agent, self.inbox_tx.clone()))
    }

    /// Commit a fully staged round or solicit the pending turn.
    ///
    /// Returns false when there is nothing to do without new submissions.
    pub fn run_pending(&mut self) -> bool {
        match self.phase {
            Phase::AwaitingMoves if self.round_ready() => {
                self.commit_round();
                true
            }
            Phase::BetweenTurns(next) => {
                self.begin_turn(next);
                true
            }
            _ => false,
        }
    }

    /// Do one unit of work: pending work first, then one queued submission.
    ///
    /// The turn-based pacing delay is skipped; use the episode actor for
    /// paced play.
    pub fn advance(&mut self) -> bool {
        if self.run_pending() {
            return true;
        }
        let next = self.inbox_rx.as_mut().and_then(|rx| rx.try_recv().ok());
        match next {
            Some(submission) => {
                self.submit_move(&submission.agent, submission.action);
                true
            }
            None => false,
        }
    }

    /// Call [`advance`](Self::advance) until it reports no work or `max`
    /// units have run. Returns the number of units run.
    pub fn run_until_idle(&mut self, max: usize) -> usize {
        let mut units = 0;
        while units < max && self.advance() {
            units += 1;
        }
        units
    }

    /// Stop without firing the completion callback.
    pub fn abandon(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        self.phase = Phase::Ended;
        self.clear_slots();
        for agent in &mut self.agents {
            agent.policy.detach();
        }
        self.on_end = None;
        self.log = None;
        info!(steps = self.steps, "Episode abandoned");
    }

    pub(crate) fn take_inbox(
        &mut self,
    ) -> Result<mpsc::UnboundedReceiver<Submission>, EnvironmentError> {
        self.inbox_rx.take().ok_or(EnvironmentError::InboxTaken)
    }

    pub(crate) fn inbox_sender(&self) -> mpsc::UnboundedSender<Submission> {
        self.inbox_tx.clone()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn agent_position(&self, agent: &str) -> Option<Position> {
        self.index.get(agent).map(|&idx| self.agents[idx].position)
    }

    pub fn world_snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            grid: Arc::clone(&self.grid),
            positions: self
                .agents
                .iter()
                .map(|a| (a.id.clone(), a.position))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Name of the end trigger that fired.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Committed rounds or turns.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Agent ids in registration (and turn) order.
    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.id.as_str())
    }

    /// Agent whose turn it is, for turn-based episodes.
    pub fn active_agent(&self) -> Option<&str> {
        match self.phase {
            Phase::AwaitingTurn(idx) => Some(self.agents[idx].id.as_str()),
            _ => None,
        }
    }

    /// Whether every agent has a move staged for the current round.
    pub fn round_ready(&self) -> bool {
        self.phase == Phase::AwaitingMoves && self.slots.iter().all(Option::is_some)
    }

    // ------------------------------------------------------------------
    // Shared machinery
    // ------------------------------------------------------------------

    fn offer(&mut self, idx: usize, action: Action, origin: Origin) -> SubmitOutcome {
        let outcome = match self.config.protocol {
            Protocol::Simultaneous => self.offer_simultaneous(idx, action, origin),
            Protocol::TurnBased => self.offer_turn(idx, action),
        };
        if let SubmitOutcome::Dropped(reason) = outcome {
            trace!(agent = %self.agents[idx].id, %action, ?reason, ?origin, "Submission dropped");
        }
        outcome
    }

    fn phase_drop(&self) -> Option<DropReason> {
        match self.phase {
            Phase::Idle => Some(DropReason::NotStarted),
            Phase::Applying => Some(DropReason::Applying),
            Phase::BetweenTurns(_) => Some(DropReason::BetweenTurns),
            Phase::Ended => Some(DropReason::Ended),
            Phase::AwaitingMoves | Phase::AwaitingTurn(_) => None,
        }
    }

    /// Call one of the agent's policy hooks against `world`.
    fn consult(&mut self, idx: usize, world: &WorldSnapshot, hook: Hook) -> Result<Decision> {
        let agent = &mut self.agents[idx];
        let observation = agent.observe(world);
        let ctx = DecisionContext {
            agent_id: &agent.id,
            position: agent.position,
            observation: &observation,
            world,
        };
        match hook {
            Hook::Init => agent.policy.init(&ctx),
            Hook::Choose => agent.policy.choose_action(&ctx),
            Hook::Transitioned(transition) => agent.policy.on_transitioned(&transition, &ctx),
        }
    }

    /// Feed a policy's answer into the acceptance path. Faults count as a
    /// no-op submission.
    fn apply_decision(&mut self, idx: usize, decision: Result<Decision>) {
        let action = match decision {
            Ok(Decision::Act(action)) => action,
            Ok(Decision::Defer) => return,
            Err(e) => {
                warn!(
                    agent = %self.agents[idx].id,
                    policy = self.agents[idx].policy.name(),
                    error = %e,
                    "Policy fault, submitting no-op"
                );
                Action::STAY
            }
        };
        self.offer(idx, action, Origin::Policy);
    }

    /// Record the post-step layout and evaluate the end triggers.
    fn close_step(&mut self, world: &WorldSnapshot) {
        if let Some(log) = self.log.as_mut() {
            log.record(world.positions.clone());
        }
        let view = EpisodeView {
            world,
            step: self.steps,
        };
        if let Some(name) = self.triggers.first_match(&view).map(str::to_string) {
            self.finish(name);
        }
    }

    fn finish(&mut self, result: String) {
        if self.phase == Phase::Ended {
            return;
        }
        self.phase = Phase::Ended;
        self.clear_slots();
        for agent in &mut self.agents {
            agent.policy.detach();
        }

        info!(result = %result, steps = self.steps, "Episode ended");
        let log = self.log.take().map(|log| log.seal(result.clone()));
        self.result = Some(result);

        if let (Some(log), Some(on_end)) = (log, self.on_end.take()) {
            on_end(log);
        }
    }

    fn clear_slots(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("protocol", &self.config.protocol)
            .field("agents", &self.agents)
            .field("phase", &self.phase)
            .field("steps", &self.steps)
            .field("result", &self.result)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::policy::{Blocking, Stationary};
    use crate::trigger::step_limit;

    fn env() -> Environment {
        Environment::new(
            GridModel::new(3, 3, [Position::new(1, 1)], []).unwrap(),
            EnvironmentConfig::default(),
        )
    }

    fn noop() -> EpisodeCallback {
        Box::new(|_| {})
    }

    #[test]
    fn test_registration_errors() {
        let mut env = env();
        assert_eq!(
            env.register_agent("", Position::new(0, 0), Stationary),
            Err(EnvironmentError::EmptyAgentId)
        );
        assert!(matches!(
            env.register_agent("a", Position::new(1, 1), Stationary),
            Err(EnvironmentError::IllegalStart { .. })
        ));
        assert!(matches!(
            env.register_agent("a", Position::new(3, 0), Stationary),
            Err(EnvironmentError::IllegalStart { .. })
        ));
        env.register_agent("a", Position::new(0, 0), Stationary).unwrap();
        assert_eq!(
            env.register_agent("a", Position::new(2, 2), Stationary),
            Err(EnvironmentError::DuplicateAgent("a".into()))
        );
    }

    #[test]
    fn test_init_errors() {
        assert_eq!(env().init(noop()), Err(EnvironmentError::NoAgents));

        let mut tracking = env();
        tracking
            .register_agent(
                "robot",
                Position::new(0, 0),
                Blocking::new(Action::CARDINALS.to_vec(), "human", Position::new(2, 2)),
            )
            .unwrap();
        assert!(matches!(
            tracking.init(noop()),
            Err(EnvironmentError::UnknownTrackedAgent { .. })
        ));

        let mut bad_trigger = env().with_triggers(EndTriggers::new().with("", step_limit(1)));
        bad_trigger
            .register_agent("a", Position::new(0, 0), Stationary)
            .unwrap();
        assert!(matches!(
            bad_trigger.init(noop()),
            Err(EnvironmentError::InvalidTrigger(_))
        ));
    }

    #[test]
    fn test_double_init_and_late_registration() {
        let mut env = env();
        env.register_agent("a", Position::new(0, 0), Stationary).unwrap();
        env.init(noop()).unwrap();
        assert_eq!(env.init(noop()), Err(EnvironmentError::AlreadyInitialized));
        assert_eq!(
            env.register_agent("b", Position::new(2, 2), Stationary),
            Err(EnvironmentError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_submissions_before_init_are_dropped() {
        let mut env = env();
        env.register_agent("a", Position::new(0, 0), Stationary).unwrap();
        assert_eq!(
            env.submit_move("a", Action::EAST),
            SubmitOutcome::Dropped(DropReason::NotStarted)
        );
        assert_eq!(
            env.submit_move("ghost", Action::EAST),
            SubmitOutcome::Dropped(DropReason::UnknownAgent)
        );
        assert_eq!(env.agent_position("a"), Some(Position::new(0, 0)));
    }

    #[test]
    fn test_abandon_skips_callback() {
        let fired = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&fired);

        let mut env = env().with_triggers(EndTriggers::new().with("limit", step_limit(100)));
        env.register_agent("a", Position::new(0, 0), Stationary).unwrap();
        env.init(Box::new(move |_| *flag.lock().unwrap() = true)).unwrap();
        env.abandon();

        assert!(env.is_ended());
        assert_eq!(env.result(), None);
        assert!(!env.run_pending());
        assert!(!*fired.lock().unwrap());
    }
}
