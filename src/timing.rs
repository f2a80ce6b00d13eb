//! Build timing utilities.

use std::time::{Duration, Instant};

/// Measures one image build (or any other phase) and reports it on finish.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Print `[1.2s] <label>` and return the elapsed time.
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("  [{}] {}", format_duration(elapsed), self.label);
        elapsed
    }
}

/// Seconds below a minute, minutes above.
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}s", secs)
    }
}
