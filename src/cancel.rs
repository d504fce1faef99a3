use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::Error;

/// Cooperative cancellation shared between a request and the work it spawns.
///
/// Extraction and comparison poll [`CancelToken::check`] between elements;
/// nothing is written anywhere on cancellation, the caller just drops the
/// partial in-memory result.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<(Instant, Duration)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(limit: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some((Instant::now() + limit, limit)),
        }
    }

    /// Shares this token's flag but runs against its own deadline.
    pub fn limited(&self, limit: Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some((Instant::now() + limit, limit)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some((deadline, limit)) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Error::TimedOut(limit));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(clone.check().is_ok());
        token.cancel();
        assert!(matches!(clone.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn limited_token_follows_parent_flag() {
        let parent = CancelToken::new();
        let child = parent.limited(Duration::from_secs(60));
        assert!(child.check().is_ok());
        parent.cancel();
        assert!(matches!(child.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn zero_timeout_expires_immediately() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(matches!(token.check(), Err(Error::TimedOut(_))));
    }
}
