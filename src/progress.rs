//! Progress bar display for downloads and registry application

use indicatif::{ProgressBar, ProgressStyle};

fn style(template: &str, chars: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

/// Byte progress for one download; hidden when disabled
pub struct DownloadProgress {
    pb: ProgressBar,
}

impl DownloadProgress {
    pub fn new(enabled: bool, total: Option<u64>, url: &str) -> Self {
        if !enabled {
            return Self {
                pb: ProgressBar::hidden(),
            };
        }

        let pb = match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(style(
                    "  [{bar:40.green/yellow}] {bytes}/{total_bytes} {msg}",
                    "█▉▊▋▌▍▎▏  ",
                ));
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        let name = url.rsplit('/').next().unwrap_or(url);
        pb.set_message(name.to_string());
        Self { pb }
    }

    pub fn set_position(&self, bytes: u64) {
        self.pb.set_position(bytes);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Progress display for applying registries
pub struct ApplyProgress {
    pb: ProgressBar,
}

impl ApplyProgress {
    /// Create a new progress display with total registry count
    pub fn new(enabled: bool, total_registries: u64) -> Self {
        let pb = if enabled {
            let pb = ProgressBar::new(total_registries);
            pb.set_style(style("[{bar:40.cyan/blue}] {pos}/{len} {msg}", "#>-"));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self { pb }
    }

    /// Update to show the registry being applied
    pub fn start_registry(&self, name: &str) {
        self.pb.set_message(name.to_string());
    }

    /// Increment registry progress
    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    /// Abandon on error
    pub fn abandon(&self) {
        self.pb.abandon();
    }
}
