//! Progress indicators for the nimbus CLI

use colored::Colorize;
use declarative::{ProgressCallback, RealizeResult};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar over every node of a convergence
///
/// Failed and skipped nodes are printed above the bar as they happen.
pub struct ConvergeProgress {
    pb: ProgressBar,
    waves: usize,
    verbose: bool,
}

impl ConvergeProgress {
    pub fn new(total: usize, waves: usize, verbose: bool) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { pb, waves, verbose }
    }

    /// Progress that draws nothing (quiet or JSON output)
    pub fn hidden(total: usize) -> Self {
        let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden());
        Self {
            pb,
            waves: 0,
            verbose: false,
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressCallback for ConvergeProgress {
    fn on_wave_start(&mut self, wave: usize, count: usize) {
        self.pb
            .set_message(format!("wave {}/{} ({count} nodes)", wave + 1, self.waves));
    }

    fn on_node_start(&mut self, identity: &str, kind: &str) {
        if self.verbose {
            let line = format!("  {} {} {}", "→".cyan(), identity, kind.dimmed());
            self.pb.suspend(|| println!("{line}"));
        }
    }

    fn on_node_complete(&mut self, identity: &str, result: &RealizeResult) {
        self.pb.inc(1);
        let line = match result {
            RealizeResult::Created if self.verbose => {
                format!("  {} {}", "✓".green(), identity)
            }
            RealizeResult::Created => return,
            RealizeResult::Failed { error } => {
                format!("  {} {} {}", "✗".red(), identity, error.dimmed())
            }
            RealizeResult::Skipped { reason } => {
                format!("  {} {} {}", "○".yellow(), identity, reason.dimmed())
            }
        };
        self.pb.suspend(|| println!("{line}"));
    }

    fn on_wave_complete(&mut self, wave: usize) {
        log::debug!("wave {} complete", wave + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_counts_nodes() {
        let mut progress = ConvergeProgress::hidden(2);
        progress.on_wave_start(0, 2);
        progress.on_node_complete("a", &RealizeResult::Created);
        progress.on_node_complete(
            "b",
            &RealizeResult::Skipped {
                reason: "upstream failed".into(),
            },
        );
        progress.on_wave_complete(0);
        assert_eq!(progress.pb.position(), 2);
        progress.finish();
    }
}
