//! Separation of the backend's `real <duration>` timing marker from program stderr.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::Elapsed;

/// A line `real 0m0.013s` (bash `time`) or `real 0.01` (`time -p`).
static TIMING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*real[ \t]+(\d+m[\d.]*s|\d+(?:\.\d+)?)[ \t]*\r?$")
        .expect("timing marker pattern is valid")
});

/// Split captured stderr into program stderr and the elapsed time.
///
/// The last marker wins since the timer reports after the program has
/// finished writing. Everything from the start of the marker line onward is
/// discarded, which also drops the `user`/`sys` lines that follow it.
pub fn split_timing(stderr: &str) -> (String, Elapsed) {
    match TIMING_MARKER.captures_iter(stderr).last() {
        Some(captures) => {
            let (Some(line), Some(duration)) = (captures.get(0), captures.get(1)) else {
                return (stderr.trim().to_string(), Elapsed::Unavailable);
            };
            (
                stderr[..line.start()].trim().to_string(),
                Elapsed::Measured(duration.as_str().to_string()),
            )
        }
        None => (stderr.trim().to_string(), Elapsed::Unavailable),
    }
}
