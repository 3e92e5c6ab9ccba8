//! Protocol tests driven synchronously through `Environment::advance`.
//!
//! Covers:
//! - Simultaneous rounds resolve independently of submission order
//! - Turn-based episodes visit agents in registration order
//! - End triggers fire exactly once and freeze the episode
//! - Policy faults and replayed logs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use gridworld_kernel::policy::{
    GoalSeeking, InputAdapter, KeyMap, ManualInput, Playback, Pursuit, RandomWalk, Stationary,
};
use gridworld_kernel::trigger::{reached_cell, step_limit};
use gridworld_kernel::{
    Action, Decision, DecisionContext, DropReason, EndTriggers, Environment, EnvironmentConfig,
    EpisodeLog, GridModel, Policy, Position, SubmitOutcome, Transition,
};

/// Test helper: a manual agent nobody presses for, driven by `submit_move`.
fn manual() -> ManualInput {
    ManualInput::new(InputAdapter::new(KeyMap::buttons()))
}

/// Test helper: capture the sealed log handed to the completion callback.
fn capture() -> (
    Arc<Mutex<Option<EpisodeLog>>>,
    Box<dyn FnOnce(EpisodeLog) + Send>,
) {
    let slot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    (slot, Box::new(move |log: EpisodeLog| *sink.lock().unwrap() = Some(log)))
}

/// Records solicitations and transitions; always stays put.
struct Recorder {
    solicited: Arc<Mutex<Vec<String>>>,
    transitions: Arc<Mutex<Vec<(String, Transition)>>>,
}

impl Policy for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn init(&mut self, _ctx: &DecisionContext<'_>) -> Result<Decision> {
        Ok(Decision::Act(Action::STAY))
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        self.solicited.lock().unwrap().push(ctx.agent_id.to_string());
        Ok(Decision::Act(Action::STAY))
    }

    fn on_transitioned(
        &mut self,
        transition: &Transition,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision> {
        self.transitions
            .lock()
            .unwrap()
            .push((ctx.agent_id.to_string(), *transition));
        Ok(Decision::Act(Action::STAY))
    }
}

#[test]
fn test_simultaneous_round_is_order_independent() {
    let run = |order: &[&str]| {
        let mut env = Environment::new(GridModel::open(3, 4).unwrap(), EnvironmentConfig::default());
        env.register_agent("a", Position::new(0, 0), manual()).unwrap();
        env.register_agent("b", Position::new(2, 0), manual()).unwrap();
        env.register_agent("c", Position::new(3, 2), manual()).unwrap();
        env.init(Box::new(|_| {})).unwrap();

        for agent in order {
            let action = match *agent {
                "a" => Action::EAST,
                "b" => Action::WEST,
                _ => Action::NORTH, // off the grid: no-move
            };
            env.submit_move(agent, action);
        }
        assert_eq!(env.steps(), 1);
        env.world_snapshot().positions
    };

    let forward = run(&["a", "b", "c"]);
    assert_eq!(forward, run(&["c", "b", "a"]));
    assert_eq!(forward, run(&["b", "c", "a"]));

    // Both resolved against the pre-round layout, so they share a cell.
    assert_eq!(forward["a"], Position::new(1, 0));
    assert_eq!(forward["b"], Position::new(1, 0));
    assert_eq!(forward["c"], Position::new(3, 2));
}

#[test]
fn test_turn_based_cycles_in_registration_order() {
    let solicited = Arc::new(Mutex::new(Vec::new()));
    let transitions = Arc::new(Mutex::new(Vec::new()));

    let mut env = Environment::new(GridModel::open(3, 3).unwrap(), EnvironmentConfig::turn_based())
        .with_triggers(EndTriggers::new().with("limit", step_limit(7)));
    for (id, x) in [("a", 0), ("b", 1), ("c", 2)] {
        let recorder = Recorder {
            solicited: Arc::clone(&solicited),
            transitions: Arc::clone(&transitions),
        };
        env.register_agent(id, Position::new(x, 0), recorder).unwrap();
    }
    let (log, on_end) = capture();
    env.init(on_end).unwrap();
    env.run_until_idle(100);

    assert_eq!(env.result(), Some("limit"));
    assert_eq!(
        *solicited.lock().unwrap(),
        vec!["a", "b", "c", "a", "b", "c", "a"]
    );
    // Every agent hears about every turn.
    assert_eq!(transitions.lock().unwrap().len(), 7 * 3);

    let log = log.lock().unwrap().take().unwrap();
    assert_eq!(
        log.turn_order,
        Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
    );
    assert_eq!(log.len(), 8);
}

#[test]
fn test_turn_based_reward_only_for_mover() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let mut env = Environment::new(GridModel::open(3, 3).unwrap(), EnvironmentConfig::turn_based())
        .with_reward(Arc::new(|_: Position, action: Option<Action>, _: Position| {
            if action.is_some() { 1.0 } else { 0.0 }
        }))
        .with_triggers(EndTriggers::new().with("limit", step_limit(1)));
    env.register_agent("mover", Position::new(0, 0), manual()).unwrap();
    env.register_agent(
        "watcher",
        Position::new(2, 2),
        Recorder {
            solicited: Arc::new(Mutex::new(Vec::new())),
            transitions: Arc::clone(&transitions),
        },
    )
    .unwrap();
    env.init(Box::new(|_| {})).unwrap();

    assert_eq!(env.submit_move("mover", Action::EAST), SubmitOutcome::Committed);

    let transitions = transitions.lock().unwrap();
    assert_eq!(transitions.len(), 1);
    let (agent, transition) = &transitions[0];
    assert_eq!(agent, "watcher");
    assert_eq!(transition.action, None);
    assert_eq!(transition.reward, 0.0);
    assert_eq!(transition.previous, transition.position);
}

#[test]
fn test_goal_seeking_walks_east() {
    let mut env = Environment::new(GridModel::open(3, 6).unwrap(), EnvironmentConfig::default())
        .with_triggers(EndTriggers::new().with("arrived", reached_cell("seeker", Position::new(5, 1))));
    let actions = vec![Action::NORTH, Action::EAST, Action::SOUTH, Action::WEST];
    env.register_agent(
        "seeker",
        Position::new(0, 1),
        GoalSeeking::seeded(actions, Position::new(5, 1), 11),
    )
    .unwrap();
    let (log, on_end) = capture();
    env.init(on_end).unwrap();
    env.run_until_idle(50);

    let log = log.lock().unwrap().take().unwrap();
    assert_eq!(log.result, "arrived");
    let xs: Vec<i32> = log.trajectory("seeker").iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_termination_fires_exactly_once() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);

    let mut env = Environment::new(GridModel::open(1, 10).unwrap(), EnvironmentConfig::default())
        .with_triggers(EndTriggers::new().with("limit", step_limit(3)));
    env.register_agent("a", Position::new(0, 0), manual()).unwrap();
    env.init(Box::new(move |log: EpisodeLog| {
        assert_eq!(log.len(), 4);
        counter.fetch_add(1, Ordering::SeqCst);
    }))
    .unwrap();

    for _ in 0..3 {
        assert_eq!(env.submit_move("a", Action::EAST), SubmitOutcome::Committed);
    }
    for _ in 0..3 {
        assert_eq!(
            env.submit_move("a", Action::EAST),
            SubmitOutcome::Dropped(DropReason::Ended)
        );
    }
    assert!(!env.advance());

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(env.result(), Some("limit"));
    assert_eq!(env.steps(), 3);
    assert_eq!(env.agent_position("a"), Some(Position::new(3, 0)));
}

#[test]
fn test_end_to_end_corridor() {
    for config in [EnvironmentConfig::simultaneous(), EnvironmentConfig::turn_based()] {
        let mut env = Environment::new(GridModel::open(1, 5).unwrap(), config)
            .with_triggers(EndTriggers::new().with("reached", |view| {
                view.position("walker").is_some_and(|p| p.x == 4)
            }));
        env.register_agent("walker", Position::new(0, 0), RandomWalk::seeded(vec![Action::EAST], 5))
            .unwrap();
        let (log, on_end) = capture();
        env.init(on_end).unwrap();
        env.run_until_idle(100);

        assert_eq!(env.steps(), 4);
        let log = log.lock().unwrap().take().unwrap();
        assert_eq!(log.result, "reached");
        assert_eq!(log.len(), 5);
        assert_eq!(
            log.trajectory("walker"),
            (0..5).map(|x| Position::new(x, 0)).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_policy_fault_holds_position() {
    // No observation to pursue: every decision is a fault.
    let mut env = Environment::new(GridModel::open(3, 3).unwrap(), EnvironmentConfig::default())
        .with_triggers(EndTriggers::new().with("limit", step_limit(2)));
    env.register_agent("robot", Position::new(1, 1), Pursuit::seeded(Action::CARDINALS.to_vec(), 0))
        .unwrap();
    env.init(Box::new(|_| {})).unwrap();
    env.run_until_idle(10);

    assert_eq!(env.result(), Some("limit"));
    assert_eq!(env.agent_position("robot"), Some(Position::new(1, 1)));
}

#[test]
fn test_playback_reproduces_recorded_episode() {
    let build = |a: Box<dyn Policy>, b: Box<dyn Policy>| {
        let mut env = Environment::new(GridModel::open(5, 5).unwrap(), EnvironmentConfig::default())
            .with_triggers(EndTriggers::new().with("limit", step_limit(6)));
        env.register(gridworld_kernel::Agent::boxed("a", Position::new(0, 0), a))
            .unwrap();
        env.register(gridworld_kernel::Agent::boxed("b", Position::new(4, 4), b))
            .unwrap();
        let (log, on_end) = capture();
        env.init(on_end).unwrap();
        env.run_until_idle(100);
        let sealed = log.lock().unwrap().take().unwrap();
        sealed
    };

    let original = build(
        Box::new(RandomWalk::seeded(Action::CARDINALS.to_vec(), 1)),
        Box::new(RandomWalk::seeded(Action::CARDINALS.to_vec(), 2)),
    );
    let replay = build(
        Box::new(Playback::from_log(&original)),
        Box::new(Playback::from_log(&original)),
    );
    assert_eq!(replay.steps, original.steps);
}

#[test]
fn test_turn_based_init_decisions_are_superseded() {
    let mut env = Environment::new(GridModel::open(1, 5).unwrap(), EnvironmentConfig::turn_based());
    env.register_agent("first", Position::new(0, 0), manual()).unwrap();
    env.register_agent("still", Position::new(4, 0), Stationary).unwrap();
    env.init(Box::new(|_| {})).unwrap();

    // The stationary agent's init decision was dropped; the turn belongs to
    // the first agent and nothing has been committed.
    assert_eq!(env.active_agent(), Some("first"));
    assert_eq!(env.steps(), 0);
}
