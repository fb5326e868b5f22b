use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Receives scan progress as work items complete
pub trait ProgressReporter: Send + Sync {
    fn start(&self, total: usize);
    /// Called once per completed item, in completion order
    fn advance(&self, completed: usize, total: usize);
    fn finish(&self);
}

/// Terminal progress bar showing "processed X/Y"
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for BarProgress {
    fn start(&self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn advance(&self, completed: usize, total: usize) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(completed as u64);
                bar.set_message(format!("processed {}/{}", completed, total));
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish();
            }
        }
    }
}

/// Discards progress; for tests and non-interactive runs
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn start(&self, _total: usize) {}
    fn advance(&self, _completed: usize, _total: usize) {}
    fn finish(&self) {}
}
