//! The authoritative state machine for the agent's single active task.
//!
//! ```text
//! Idle ──assign──▶ Running ──terminal(completed)──▶ Completing ──ack──▶ Idle
//!    ▲               │                                   │
//!    │               └──terminal(failed|stopped)──▶ Failed/Stopped ──▶ Idle
//!    │
//!    └── stuck-watchdog forces Completing→Idle after its timeout, latching completion_pending
//! ```
//!
//! All transitions are serialised under a single lock. `completion_pending`
//! is an orthogonal latch: it survives the Completing→Idle transition and
//! is cleared only by an explicit caller action (coordinator ACK or
//! [`TaskStateMachine::clear_completion_pending`]).

use std::sync::Mutex;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Completing,
    Stopped,
    Failed,
}

/// A snapshot of the machine: current state, the task it applies to (if
/// any), and when it last changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo {
    pub state: State,
    pub task_id: Option<String>,
    pub changed_at: DateTime<Utc>,
}

struct Inner {
    state: State,
    task_id: Option<String>,
    changed_at: DateTime<Utc>,
    completion_pending: Option<String>,
}

/// Self-contained module owning the transition mutex. Callers that also
/// need the job-manager's `activeJobs` lock must acquire it before this
/// one (manager lock → state lock) to avoid deadlock.
pub struct TaskStateMachine {
    inner: Mutex<Inner>,
}

impl Default for TaskStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Idle,
                task_id: None,
                changed_at: Utc::now(),
                completion_pending: None,
            }),
        }
    }

    pub fn get_state(&self) -> State {
        self.inner.lock().expect("state mutex poisoned").state
    }

    pub fn get_state_info(&self) -> StateInfo {
        let guard = self.inner.lock().expect("state mutex poisoned");
        StateInfo {
            state: guard.state,
            task_id: guard.task_id.clone(),
            changed_at: guard.changed_at,
        }
    }

    /// Move to `new_state` for `task_id`, refreshing `changed_at`.
    ///
    /// `task_id` is `None` for transitions back to Idle, since Idle has no
    /// associated task.
    pub fn transition_to(&self, new_state: State, task_id: Option<String>) {
        let mut guard = self.inner.lock().expect("state mutex poisoned");
        guard.state = new_state;
        guard.task_id = task_id;
        guard.changed_at = Utc::now();
    }

    /// Force an unconditional drop to Idle, used by forced recovery paths.
    pub fn transition_to_idle(&self) {
        self.transition_to(State::Idle, None);
    }

    pub fn set_completion_pending(&self, task_id: String) {
        let mut guard = self.inner.lock().expect("state mutex poisoned");
        guard.completion_pending = Some(task_id);
    }

    pub fn get_completion_pending(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("state mutex poisoned")
            .completion_pending
            .clone()
    }

    pub fn clear_completion_pending(&self) {
        let mut guard = self.inner.lock().expect("state mutex poisoned");
        guard.completion_pending = None;
    }

    /// Clears the latch only if it currently holds `task_id`, returning
    /// whether it was cleared. Used when a `CompletionAck` arrives for a
    /// specific task so a stale ack for a different task id is a no-op.
    pub fn clear_completion_pending_for(&self, task_id: &str) -> bool {
        let mut guard = self.inner.lock().expect("state mutex poisoned");
        if guard.completion_pending.as_deref() == Some(task_id) {
            guard.completion_pending = None;
            true
        } else {
            false
        }
    }

    /// Seconds since the last transition, used by the stuck-state watchdog.
    pub fn seconds_since_changed(&self) -> i64 {
        let guard = self.inner.lock().expect("state mutex poisoned");
        (Utc::now() - guard.changed_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_no_task() {
        let machine = TaskStateMachine::new();
        let info = machine.get_state_info();
        assert_eq!(info.state, State::Idle);
        assert_eq!(info.task_id, None);
    }

    #[test]
    fn completion_pending_survives_transition_to_idle() {
        let machine = TaskStateMachine::new();
        machine.transition_to(State::Running, Some("t-1".into()));
        machine.transition_to(State::Completing, Some("t-1".into()));
        machine.set_completion_pending("t-1".into());
        machine.transition_to(State::Idle, None);

        assert_eq!(machine.get_state(), State::Idle);
        assert_eq!(machine.get_completion_pending(), Some("t-1".to_string()));
    }

    #[test]
    fn ack_for_wrong_task_does_not_clear_latch() {
        let machine = TaskStateMachine::new();
        machine.set_completion_pending("t-1".into());
        assert!(!machine.clear_completion_pending_for("t-2"));
        assert_eq!(machine.get_completion_pending(), Some("t-1".to_string()));
        assert!(machine.clear_completion_pending_for("t-1"));
        assert_eq!(machine.get_completion_pending(), None);
    }

    #[test]
    fn changed_at_refreshes_on_every_transition() {
        let machine = TaskStateMachine::new();
        let first = machine.get_state_info().changed_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        machine.transition_to(State::Running, Some("t-1".into()));
        let second = machine.get_state_info().changed_at;
        assert!(second >= first);
    }
}
