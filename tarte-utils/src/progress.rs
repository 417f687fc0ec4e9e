use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Progress bar over the disambiguation sites of an epoch.
pub fn epoch_progress(n_sites: usize, epoch_type: &str) -> ProgressBar {
    let progress_bar = ProgressBar::new(n_sites as u64);
    progress_bar.set_style(ProgressStyle::default_bar().template(&format!(
        "[Time: {{elapsed_precise}}, ETA: {{eta_precise}}] {{bar}} {{percent}}% {} {{msg}}",
        epoch_type
    )));

    progress_bar
}

/// Tagging speed, reported when dropped.
pub struct TaggerSpeed {
    start: Instant,
    n_sentences: usize,
}

impl TaggerSpeed {
    pub fn new() -> Self {
        TaggerSpeed {
            start: Instant::now(),
            n_sentences: 0,
        }
    }

    pub fn count_sentence(&mut self) {
        self.n_sentences += 1;
    }
}

impl Default for TaggerSpeed {
    fn default() -> Self {
        TaggerSpeed::new()
    }
}

impl Drop for TaggerSpeed {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let secs = elapsed.as_secs() as f64 + f64::from(elapsed.subsec_millis()) / 1000.;
        if secs > 0. {
            info!(
                "Tagged {} sentences in {:.1}s ({:.0} sentences/s)",
                self.n_sentences,
                secs,
                self.n_sentences as f64 / secs
            );
        }
    }
}
