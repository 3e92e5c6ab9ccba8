//! Simultaneous protocol: every agent stages a move, then the round commits
//! atomically against the pre-round layout.

use tracing::debug;

use super::{Environment, Hook, Origin, Phase};
use crate::geometry::{Action, Position};
use crate::policy::Transition;
use crate::submission::SubmitOutcome;

impl Environment {
    pub(super) fn init_simultaneous(&mut self) {
        self.phase = Phase::AwaitingMoves;

        let world = self.world_snapshot();
        for idx in 0..self.agents.len() {
            let decision = self.consult(idx, &world, Hook::Init);
            self.apply_decision(idx, decision);
        }

        if let Some(log) = self.log.as_mut() {
            log.record(world.positions);
        }
    }

    pub(super) fn offer_simultaneous(
        &mut self,
        idx: usize,
        action: Action,
        origin: Origin,
    ) -> SubmitOutcome {
        if let Some(reason) = self.phase_drop() {
            return SubmitOutcome::Dropped(reason);
        }

        // Resubmission before commit overwrites.
        self.slots[idx] = Some(action);

        // Policy decisions never commit re-entrantly; `advance` picks them up.
        if origin == Origin::Submission && self.round_ready() {
            self.commit_round();
            SubmitOutcome::Committed
        } else {
            SubmitOutcome::Staged
        }
    }

    pub(super) fn commit_round(&mut self) {
        self.phase = Phase::Applying;

        // Resolve pass: every candidate against the pre-round layout, then a
        // bulk update.
        let moves: Vec<(Position, Action, Position)> = self
            .agents
            .iter()
            .zip(self.slots.iter_mut())
            .map(|(agent, slot)| {
                let action = slot.take().unwrap_or(Action::STAY);
                (agent.position, action, self.grid.resolve(agent.position, action))
            })
            .collect();
        for (agent, &(_, _, new)) in self.agents.iter_mut().zip(&moves) {
            agent.position = new;
        }
        self.steps += 1;
        debug!(step = self.steps, "Round committed");

        // Notify pass. Decisions returned here stage the next round.
        self.phase = Phase::AwaitingMoves;
        let world = self.world_snapshot();
        for (idx, &(previous, action, position)) in moves.iter().enumerate() {
            let transition = Transition {
                previous,
                position,
                action: Some(action),
                reward: (self.reward)(previous, Some(action), position),
            };
            let decision = self.consult(idx, &world, Hook::Transitioned(transition));
            self.apply_decision(idx, decision);
        }

        self.close_step(&world);
    }
}
