use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{GitError, Result};

/// Cancellation scope bound to every command run and history walk.
///
/// Cancelling a context cancels every context derived from it. Deadlines
/// only tighten: a child never outlives its parent's deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        });
        child
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails with `Cancelled` or `Timeout` once the context is done.
    pub fn check(&self, description: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(GitError::Cancelled {
                description: description.to_string(),
            });
        }
        if self.is_expired() {
            return Err(GitError::Timeout {
                description: description.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_parent_cancels_children() {
        let root = Context::background();
        let child = root.child();
        let grandchild = child.with_timeout(Duration::from_secs(60));
        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert!(matches!(grandchild.check("walk"), Err(GitError::Cancelled { .. })));
    }

    #[test]
    fn cancelling_child_leaves_parent() {
        let root = Context::background();
        let child = root.child();
        child.cancel();
        assert!(!root.is_cancelled());
        assert!(root.check("walk").is_ok());
    }

    #[test]
    fn child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(10));
        let child = parent.with_timeout(Duration::from_secs(3600));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn expired_deadline_reports_timeout() {
        let ctx = Context::background().with_deadline(Instant::now());
        assert!(ctx.is_expired());
        assert!(matches!(ctx.check("log"), Err(GitError::Timeout { .. })));
    }
}
