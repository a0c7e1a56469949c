//! Progress reporting for long genotype scans.
//!
//! A bar is drawn on stderr when enabled and stderr is a terminal; otherwise
//! progress is only logged.

use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub struct Progress {
    bar: ProgressBar,
    label: String,
    total: u64,
}

impl Progress {
    pub fn new(label: &str, total: u64, enabled: bool) -> Self {
        let bar = if enabled && std::io::stderr().is_terminal() {
            let bar = ProgressBar::new(total);
            match ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] {bar:50.cyan/blue} {pos:>6}/{len:6}")
            {
                Ok(style) => bar.set_style(style.progress_chars("##-")),
                Err(e) => log::debug!("Invalid progress template: {}", e),
            }
            bar.set_message(label.to_string());
            bar
        } else {
            ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden())
        };
        Progress {
            bar,
            label: label.to_string(),
            total,
        }
    }

    pub fn inc(&self, delta: u64) {
        self.bar.inc(delta);
        log::debug!("{}: {}/{}", self.label, self.bar.position(), self.total);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}
