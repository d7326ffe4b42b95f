use std::fmt;

/// Stage of the page the coordinator is currently working on
///
/// `Pending → Fetching → Transforming → Persisted`, with `Abandoned`
/// reachable from `Fetching` (retries exhausted) and `Transforming`
/// (persist failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStage {
    Pending,
    Fetching,
    Transforming,
    Persisted,
    Abandoned,
}

impl PageStage {
    /// Returns the stage reached after `self` succeeds
    pub fn advance(self) -> Self {
        match self {
            Self::Pending => Self::Fetching,
            Self::Fetching => Self::Transforming,
            Self::Transforming => Self::Persisted,
            terminal => terminal,
        }
    }

    /// Returns the stage reached after `self` fails
    pub fn abandon(self) -> Self {
        match self {
            Self::Persisted => Self::Persisted,
            _ => Self::Abandoned,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Abandoned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Transforming => "transforming",
            Self::Persisted => "persisted",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let stage = PageStage::Pending.advance();
        assert_eq!(stage, PageStage::Fetching);
        let stage = stage.advance();
        assert_eq!(stage, PageStage::Transforming);
        let stage = stage.advance();
        assert_eq!(stage, PageStage::Persisted);
        assert!(stage.is_terminal());
        assert_eq!(stage.advance(), PageStage::Persisted);
    }

    #[test]
    fn test_abandon() {
        assert_eq!(PageStage::Fetching.abandon(), PageStage::Abandoned);
        assert_eq!(PageStage::Transforming.abandon(), PageStage::Abandoned);
        assert_eq!(PageStage::Persisted.abandon(), PageStage::Persisted);
        assert!(PageStage::Abandoned.is_terminal());
        assert!(!PageStage::Transforming.is_terminal());
    }
}
