//! Progress indicators with CI fallback

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress display for image pulls.
///
/// Shows a spinner with the latest pull line in interactive mode, or plain
/// lines in CI.
pub struct PullProgress {
    bar: Option<ProgressBar>,
}

impl PullProgress {
    pub fn new(ctx: &UiContext, image: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} Pulling {prefix}  {msg:.dim}  {elapsed:.dim}")
            {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar.set_prefix(image.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Pulling {}...", image);
            None
        };
        Self { bar }
    }

    /// Process a pull output line
    pub fn on_line(&self, line: String) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        match self.bar {
            Some(ref bar) => bar.set_message(truncate(trimmed, 60)),
            None => println!("  {}", trimmed),
        }
    }

    /// Finish and clear the progress display.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

fn truncate(line: &str, max: usize) -> String {
    if line.chars().count() > max {
        let head: String = line.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}
