//! Task status state machine.

use serde::{Deserialize, Serialize};

/// Status of one task inside a monitored chain.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Faulted
/// - Pending -> Running -> Canceled
/// - Pending -> Canceled (cancel observed before the task started)
///
/// Transitions only move forward; see [`TaskStatus::can_advance_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not started yet (initial state).
    Pending,

    /// The worker is executing the task unit.
    Running,

    /// The task unit returned normally.
    Completed,

    /// The task unit failed or panicked.
    Faulted,

    /// Cancellation was observed for this task.
    Canceled,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Faulted | TaskStatus::Canceled
        )
    }

    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Faulted | TaskStatus::Canceled => 2,
        }
    }

    /// Whether `self -> next` is a legal forward transition.
    pub fn can_advance_to(self, next: TaskStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending_to_running(TaskStatus::Pending, TaskStatus::Running, true)]
    #[case::pending_to_canceled(TaskStatus::Pending, TaskStatus::Canceled, true)]
    #[case::running_to_completed(TaskStatus::Running, TaskStatus::Completed, true)]
    #[case::running_to_faulted(TaskStatus::Running, TaskStatus::Faulted, true)]
    #[case::running_to_pending(TaskStatus::Running, TaskStatus::Pending, false)]
    #[case::completed_to_running(TaskStatus::Completed, TaskStatus::Running, false)]
    #[case::completed_to_faulted(TaskStatus::Completed, TaskStatus::Faulted, false)]
    #[case::pending_to_pending(TaskStatus::Pending, TaskStatus::Pending, false)]
    fn transitions_only_move_forward(
        #[case] from: TaskStatus,
        #[case] to: TaskStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_advance_to(to), allowed);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Faulted.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn status_serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&TaskStatus::Faulted).unwrap();
        assert_eq!(s, "\"FAULTED\"");
    }
}
