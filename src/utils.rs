//! # Spin-Wait Helpers
//!
//! Low-level helpers for the short waits inside critical sections, such as
//! the ID generator waiting out an exhausted millisecond.

/// CPU relaxation hint for spin loops.
///
/// Lowers to PAUSE on x86_64 and to the spin-wait hint of other targets.
#[inline(always)]
pub fn cpu_relax() {
    std::hint::spin_loop();
}

/// Exponential backoff for wait loops.
///
/// ```text
///     Step 0-3: spin 1, 2, 4, 8 times with cpu_relax()
///     Step 4+:  yield to the OS scheduler
/// ```
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    step: u32,
    max_step: u32,
}

/// Step at which spinning gives way to yielding.
const SPIN_LIMIT: u32 = 4;

impl Backoff {
    /// Creates a new backoff helper with specified maximum steps.
    pub(crate) fn new(max_step: u32) -> Self {
        Self { step: 0, max_step }
    }

    /// Waits a little longer than the previous call did.
    #[inline]
    pub(crate) fn snooze(&mut self) {
        if self.step < SPIN_LIMIT {
            for _ in 0..(1 << self.step) {
                cpu_relax();
            }
        } else {
            std::thread::yield_now();
        }
        self.step = (self.step + 1).min(self.max_step);
    }

    /// Whether the backoff has stopped spinning and now yields.
    #[inline]
    pub(crate) fn is_yielding(&self) -> bool {
        self.step >= SPIN_LIMIT
    }
}
