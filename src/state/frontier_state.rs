/// Frontier entry lifecycle
///
/// An entry starts `Pending` and moves exactly once, to `Done` or `Failed`.
use std::fmt;

/// Persisted state of a frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontierState {
    /// Discovered and waiting to be mirrored
    Pending,

    /// Page was rendered, transformed and written to disk
    Done,

    /// Page was abandoned (render retries exhausted or persist failure)
    Failed,
}

impl FrontierState {
    /// Returns true if no further processing will happen
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the state may move to `next`
    pub fn can_transition_to(&self, next: FrontierState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Done) | (Self::Pending, Self::Failed)
        )
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn all_states() -> [Self; 3] {
        [Self::Pending, Self::Done, Self::Failed]
    }
}

impl fmt::Display for FrontierState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!FrontierState::Pending.is_terminal());
        assert!(FrontierState::Done.is_terminal());
        assert!(FrontierState::Failed.is_terminal());
    }

    #[test]
    fn test_transitions_only_leave_pending() {
        assert!(FrontierState::Pending.can_transition_to(FrontierState::Done));
        assert!(FrontierState::Pending.can_transition_to(FrontierState::Failed));

        assert!(!FrontierState::Done.can_transition_to(FrontierState::Pending));
        assert!(!FrontierState::Failed.can_transition_to(FrontierState::Pending));
        assert!(!FrontierState::Done.can_transition_to(FrontierState::Failed));
        assert!(!FrontierState::Pending.can_transition_to(FrontierState::Pending));
    }

    #[test]
    fn test_db_string() {
        assert_eq!(FrontierState::Pending.to_db_string(), "pending");
        assert_eq!(FrontierState::from_db_string("done"), Some(FrontierState::Done));
        assert_eq!(FrontierState::from_db_string("fetching"), None);

        for state in FrontierState::all_states() {
            assert_eq!(FrontierState::from_db_string(state.to_db_string()), Some(state));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FrontierState::Failed), "failed");
    }
}
