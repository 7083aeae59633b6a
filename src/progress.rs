//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Number of compared steps between two progress refreshes
pub const PROGRESS_STEP: u64 = 1000;

/// Progress reporter for diff runs
#[derive(Debug)]
pub struct ProgressReporter {
    pub compare_pb: Option<ProgressBar>,
    show_progress: bool,
    start_time: std::time::Instant,
}

impl ProgressReporter {
    /// Create progress reporter for a diff between two resources
    pub fn new_for_diff(source: &str, target: &str) -> Self {
        let compare_pb = create_spinner(&format!("Comparing {} with {}...", source, target));

        Self {
            compare_pb: Some(compare_pb),
            show_progress: true,
            start_time: std::time::Instant::now(),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            compare_pb: None,
            show_progress: false,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.show_progress
    }

    /// Update the compared step count, refreshing every [`PROGRESS_STEP`] steps
    pub fn update_steps(&mut self, steps: u64, changes: u64) {
        if !self.show_progress || steps % PROGRESS_STEP != 0 {
            return;
        }
        if let Some(pb) = &self.compare_pb {
            pb.set_position(steps);
            pb.set_message(format!("{} records compared, {} changes", steps, changes));
        }
    }

    /// Finish the comparison
    pub fn finish_compare(&mut self, message: &str) {
        if let Some(pb) = self.compare_pb.take() {
            pb.finish_with_message(format!(
                "{} ({:.1}s)",
                message,
                self.start_time.elapsed().as_secs_f64()
            ));
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.compare_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
