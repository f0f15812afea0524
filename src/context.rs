//! Progress and cancellation state for a running batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

/// Per-run job tracking handed to the batch loop.
///
/// The loop reads the interrupted and skipped flags and writes the job
/// counter and label. Flags can be raised from another thread through an
/// [`InterruptHandle`].
pub struct RunContext {
    job_count: u64,
    job: String,
    jobs_done: u64,
    flags: InterruptHandle,
    progress: ProgressBar,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// A context with no visible progress output.
    #[must_use]
    pub fn new() -> Self {
        Self::with_progress(ProgressBar::hidden())
    }

    /// A context that draws a progress bar on stderr.
    #[must_use]
    pub fn with_progress_bar() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        Self::with_progress(pb)
    }

    fn with_progress(progress: ProgressBar) -> Self {
        Self {
            job_count: 0,
            job: String::new(),
            jobs_done: 0,
            flags: InterruptHandle::default(),
            progress,
        }
    }

    /// Handle for raising the interrupted/skipped flags.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.flags.clone()
    }

    #[must_use]
    pub fn job_count(&self) -> u64 {
        self.job_count
    }

    pub fn set_job_count(&mut self, count: u64) {
        self.job_count = count;
        self.progress.set_length(count);
    }

    /// Human-readable label for the current job.
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn set_job(&mut self, label: impl Into<String>) {
        self.job = label.into();
        self.progress.set_message(self.job.clone());
    }

    /// Number of jobs completed so far.
    #[must_use]
    pub fn jobs_done(&self) -> u64 {
        self.jobs_done
    }

    /// Record `n` completed jobs.
    pub fn advance(&mut self, n: u64) {
        self.jobs_done += n;
        self.progress.inc(n);
    }

    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.flags.interrupted.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn skipped(&self) -> bool {
        self.flags.skipped.load(Ordering::SeqCst)
    }

    pub fn clear_skipped(&self) {
        self.flags.skipped.store(false, Ordering::SeqCst);
    }

    /// Stop drawing progress output.
    pub fn finish(&self) {
        self.progress.finish_and_clear();
    }

    /// Whether [`RunContext::finish`] has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.progress.is_finished()
    }
}

/// Cloneable handle to a run's cancellation flags.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    interrupted: Arc<AtomicBool>,
    skipped: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Ask the run to stop before its next input file.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    /// Ask the backend to skip the current job.
    pub fn skip(&self) {
        self.skipped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_shares_flags() {
        let ctx = RunContext::new();
        let handle = ctx.interrupt_handle();
        assert!(!ctx.interrupted());

        handle.interrupt();
        handle.skip();
        assert!(ctx.interrupted());
        assert!(ctx.skipped());

        ctx.clear_skipped();
        assert!(!ctx.skipped());
        assert!(ctx.interrupted());
    }

    #[test]
    fn test_counters() {
        let mut ctx = RunContext::new();
        ctx.set_job_count(6);
        ctx.set_job("1 out of 3");
        ctx.advance(2);

        assert_eq!(ctx.job_count(), 6);
        assert_eq!(ctx.job(), "1 out of 3");
        assert_eq!(ctx.jobs_done(), 2);
        assert!(!ctx.is_finished());

        ctx.finish();
        assert!(ctx.is_finished());
    }
}
