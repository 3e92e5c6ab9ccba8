//! Human-driven agents: key or button presses mapped to actions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::trace;

use super::{Decision, DecisionContext, Policy};
use crate::geometry::Action;
use crate::submission::MoveSubmitter;

/// Key (or button id) to action table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    bindings: HashMap<String, Action>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, key: impl Into<String>, action: Action) -> Self {
        self.bindings.insert(key.into(), action);
        self
    }

    pub fn get(&self, key: &str) -> Option<Action> {
        self.bindings.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The four on-screen buttons of the trial page.
    pub fn buttons() -> Self {
        Self::new()
            .bind("1", Action::WEST)
            .bind("2", Action::NORTH)
            .bind("3", Action::EAST)
            .bind("4", Action::SOUTH)
    }

    /// WASD plus arrow key names.
    pub fn keyboard() -> Self {
        Self::new()
            .bind("w", Action::NORTH)
            .bind("a", Action::WEST)
            .bind("s", Action::SOUTH)
            .bind("d", Action::EAST)
            .bind("up", Action::NORTH)
            .bind("left", Action::WEST)
            .bind("down", Action::SOUTH)
            .bind("right", Action::EAST)
    }
}

#[derive(Debug)]
struct AdapterInner {
    keys: KeyMap,
    target: Mutex<Option<MoveSubmitter>>,
}

/// Routes presses to the subscribed agent.
///
/// Cloning yields another handle to the same adapter, so the input source can
/// keep one while the policy holds the other. Unmapped keys and presses while
/// nobody is subscribed are ignored.
#[derive(Debug, Clone)]
pub struct InputAdapter {
    inner: Arc<AdapterInner>,
}

impl InputAdapter {
    pub fn new(keys: KeyMap) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                keys,
                target: Mutex::new(None),
            }),
        }
    }

    pub fn keys(&self) -> &KeyMap {
        &self.inner.keys
    }

    pub fn subscribe(&self, submitter: MoveSubmitter) {
        if let Ok(mut target) = self.inner.target.lock() {
            *target = Some(submitter);
        }
    }

    pub fn unsubscribe(&self) {
        if let Ok(mut target) = self.inner.target.lock() {
            target.take();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .target
            .lock()
            .map(|target| target.is_some())
            .unwrap_or(false)
    }

    /// Forward the action bound to `key`. Returns whether anything was sent.
    pub fn press(&self, key: &str) -> bool {
        let Some(action) = self.inner.keys.get(key) else {
            trace!(key, "Unmapped key ignored");
            return false;
        };
        let Ok(target) = self.inner.target.lock() else {
            return false;
        };
        match target.as_ref() {
            Some(submitter) => submitter.submit(action),
            None => {
                trace!(key, "Press while unsubscribed ignored");
                false
            }
        }
    }
}

/// Policy whose actions come from an [`InputAdapter`].
pub struct ManualInput {
    adapter: InputAdapter,
}

impl ManualInput {
    pub fn new(adapter: InputAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &InputAdapter {
        &self.adapter
    }
}

impl Policy for ManualInput {
    fn name(&self) -> &str {
        "manual"
    }

    fn attach(&mut self, submitter: MoveSubmitter) {
        self.adapter.subscribe(submitter);
    }

    fn choose_action(&mut self, _ctx: &DecisionContext<'_>) -> Result<Decision> {
        Ok(Decision::Defer)
    }

    fn detach(&mut self) {
        self.adapter.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn test_button_table() {
        let keys = KeyMap::buttons();
        assert_eq!(keys.len(), 4);
        assert_eq!(keys.get("1"), Some(Action::new(-1, 0)));
        assert_eq!(keys.get("2"), Some(Action::new(0, 1)));
        assert_eq!(keys.get("3"), Some(Action::new(1, 0)));
        assert_eq!(keys.get("4"), Some(Action::new(0, -1)));
        assert_eq!(keys.get("5"), None);
    }

    #[test]
    fn test_press_lifecycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let adapter = InputAdapter::new(KeyMap::keyboard());
        let mut policy = ManualInput::new(adapter.clone());

        assert!(!adapter.press("w"), "nobody subscribed yet");

        policy.attach(MoveSubmitter::new("human", tx));
        assert!(adapter.is_subscribed());
        assert!(!adapter.press("q"), "unmapped key");
        assert!(adapter.press("right"));
        assert_eq!(rx.try_recv().unwrap().action, Action::EAST);

        policy.detach();
        assert!(!adapter.is_subscribed());
        assert!(!adapter.press("w"));
        assert!(rx.try_recv().is_err());
    }
}
