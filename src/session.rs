//! Per-user query credits for interactive sessions.
//!
//! A [`Session`] is created when a chat starts and dropped when it ends;
//! nothing is shared between sessions.

use crate::error::{Result, TrailError};

/// Credits a new session starts with.
pub const DEFAULT_CREDITS: u32 = 10;

/// Credit balance and query count of one interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    credits: u32,
    queries: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_CREDITS)
    }
}

impl Session {
    pub fn new(initial_credits: u32) -> Self {
        Self {
            credits: initial_credits,
            queries: 0,
        }
    }

    /// Remaining credits.
    pub fn credits(&self) -> u32 {
        self.credits
    }

    /// Queries paid for so far.
    pub fn queries(&self) -> u32 {
        self.queries
    }

    /// Pay for one query. Leaves the balance untouched when it is too low.
    pub fn spend(&mut self, amount: u32) -> Result<()> {
        if amount > self.credits {
            return Err(TrailError::InsufficientCredits {
                needed: amount,
                available: self.credits,
            });
        }
        self.credits -= amount;
        self.queries += 1;
        Ok(())
    }

    /// Add credits; returns the new balance.
    pub fn top_up(&mut self, amount: u32) -> u32 {
        self.credits = self.credits.saturating_add(amount);
        self.credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_until_empty() {
        let mut session = Session::new(2);
        session.spend(1).unwrap();
        session.spend(1).unwrap();
        let err = session.spend(1).unwrap_err();
        assert!(matches!(
            err,
            TrailError::InsufficientCredits { needed: 1, available: 0 }
        ));
        assert_eq!(session.credits(), 0);
        assert_eq!(session.queries(), 2);
    }

    #[test]
    fn test_top_up() {
        let mut session = Session::default();
        assert_eq!(session.credits(), DEFAULT_CREDITS);
        assert_eq!(session.top_up(5), 15);
        assert_eq!(Session::new(u32::MAX).top_up(1), u32::MAX);
    }

    #[test]
    fn test_failed_spend_keeps_balance() {
        let mut session = Session::new(3);
        assert!(session.spend(5).is_err());
        assert_eq!(session.credits(), 3);
        assert_eq!(session.queries(), 0);
    }
}
