//! Progress display for cache builds and copies

use indicatif::{ProgressBar, ProgressStyle};

/// Create a chunk-granular progress bar. Hidden automatically when stderr
/// is not a terminal.
pub fn chunk_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
            .unwrap()
            .progress_chars("=>-"),
    );
    bar
}
