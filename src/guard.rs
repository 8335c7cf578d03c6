//! One-shot completion latches for reentrant event handlers.

/// Tri-state latch for a protocol step that must run at most once.
///
/// A plain boolean set at the end of the step leaves a window where the
/// triggering condition is re-checked before the flag is written; `begin`
/// claims the step before its first await point, so a reentrant caller
/// observes `Starting` and backs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnceFlag {
    #[default]
    NotStarted,
    Starting,
    Started,
}

impl OnceFlag {
    pub fn new() -> Self {
        OnceFlag::NotStarted
    }

    /// Claim the step. Returns `true` for exactly one caller until the
    /// claim is rolled back with [`fail`](OnceFlag::fail).
    pub fn begin(&mut self) -> bool {
        if *self == OnceFlag::NotStarted {
            *self = OnceFlag::Starting;
            true
        } else {
            false
        }
    }

    /// Mark the claimed step complete.
    pub fn complete(&mut self) {
        *self = OnceFlag::Started;
    }

    /// Roll back a claimed step that failed so the caller may retry.
    /// A completed step stays completed.
    pub fn fail(&mut self) {
        if *self == OnceFlag::Starting {
            *self = OnceFlag::NotStarted;
        }
    }

    pub fn is_started(&self) -> bool {
        *self == OnceFlag::Started
    }

    pub fn in_progress(&self) -> bool {
        *self == OnceFlag::Starting
    }

    /// Return the latch to its initial state. Used on session teardown.
    pub fn reset(&mut self) {
        *self = OnceFlag::NotStarted;
    }
}
