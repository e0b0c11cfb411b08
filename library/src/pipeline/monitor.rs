//! Progress reporting and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::info;

/// Receives progress in `[0, 1]` and answers cancellation polls.
pub trait Monitor: Send + Sync {
    fn report(&self, progress: f32);

    fn is_cancel_requested(&self) -> bool;
}

/// Ignores progress, never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn report(&self, _progress: f32) {}

    fn is_cancel_requested(&self) -> bool {
        false
    }
}

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Remembers the latest progress and cancels through a token.
#[derive(Debug, Default)]
pub struct ProgressMonitor {
    token: CancellationToken,
    progress: AtomicU32,
}

impl ProgressMonitor {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            progress: AtomicU32::new(0f32.to_bits()),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }
}

impl Monitor for ProgressMonitor {
    fn report(&self, progress: f32) {
        self.progress
            .store(progress.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Logs progress at info level each time it crosses a tenth.
#[derive(Debug, Default)]
pub struct LogMonitor {
    inner: ProgressMonitor,
    last_step: AtomicU32,
}

impl LogMonitor {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            inner: ProgressMonitor::new(token),
            last_step: AtomicU32::new(0),
        }
    }
}

impl Monitor for LogMonitor {
    fn report(&self, progress: f32) {
        self.inner.report(progress);
        let step = (self.inner.progress() * 10.0).floor() as u32;
        if self.last_step.fetch_max(step, Ordering::Relaxed) < step {
            info!("Build progress {}%", step * 10);
        }
    }

    fn is_cancel_requested(&self) -> bool {
        self.inner.is_cancel_requested()
    }
}

/// Maps `[0, 1]` onto `[start, end]` of a parent monitor.
pub struct SubMonitor<'a> {
    parent: &'a dyn Monitor,
    start: f32,
    end: f32,
}

impl<'a> SubMonitor<'a> {
    pub fn new(parent: &'a dyn Monitor, start: f32, end: f32) -> Self {
        Self { parent, start, end }
    }

    /// Sub-range of part `index` out of `count` equal parts.
    pub fn part(parent: &'a dyn Monitor, index: usize, count: usize) -> Self {
        let count = count.max(1) as f32;
        Self::new(parent, index as f32 / count, (index + 1) as f32 / count)
    }
}

impl Monitor for SubMonitor<'_> {
    fn report(&self, progress: f32) {
        let progress = progress.clamp(0.0, 1.0);
        self.parent
            .report(self.start + (self.end - self.start) * progress);
    }

    fn is_cancel_requested(&self) -> bool {
        self.parent.is_cancel_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_monitor_maps_range() {
        let root = ProgressMonitor::default();
        let sub = SubMonitor::part(&root, 1, 4);
        sub.report(0.0);
        assert_eq!(root.progress(), 0.25);
        sub.report(1.0);
        assert_eq!(root.progress(), 0.5);
        sub.report(7.0);
        assert_eq!(root.progress(), 0.5);

        let nested = SubMonitor::new(&sub, 0.5, 1.0);
        nested.report(0.0);
        assert_eq!(root.progress(), 0.375);
    }

    #[test]
    fn test_cancellation_reaches_sub_monitors() {
        let token = CancellationToken::new();
        let root = ProgressMonitor::new(token.clone());
        let sub = SubMonitor::new(&root, 0.0, 0.5);
        assert!(!sub.is_cancel_requested());
        token.cancel();
        assert!(sub.is_cancel_requested());
    }
}
