//! Upload progress bar

use indicatif::{ProgressBar, ProgressStyle};

const PART_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} parts {msg}";

/// Progress bar driven by per-part callbacks
///
/// Hidden when the formatter does not allow progress output.
pub struct PartProgress {
    bar: ProgressBar,
}

impl PartProgress {
    pub fn new(visible: bool, message: &str) -> Self {
        let bar = if visible {
            ProgressBar::new(1)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_bar().template(PART_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(message.to_string());
        Self { bar }
    }

    /// Record that `index` of `0..=max_index` has been accepted
    pub fn part_done(&self, index: u64, max_index: u64) {
        self.bar.set_length(max_index + 1);
        self.bar.set_position(index + 1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_tracks_parts() {
        let progress = PartProgress::new(false, "a.bin");
        progress.part_done(0, 3);
        progress.part_done(1, 3);
        assert_eq!(progress.bar.length(), Some(4));
        assert_eq!(progress.bar.position(), 2);
        progress.finish();
    }
}
