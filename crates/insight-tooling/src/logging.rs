//! Structured logging helpers layered on `tracing`.

use std::time::{Duration, Instant};
use tracing::debug;

/// Log entry/exit and elapsed time around `future`.
pub async fn timed<F, T>(name: &str, future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    debug!("starting: {name}");
    let result = future.await;
    debug!("completed: {name} in {:?}", start.elapsed());
    result
}

/// RAII guard that logs entry on creation and exit (with elapsed time) on drop.
pub struct LogGuard {
    name: String,
    start: Instant,
}

impl LogGuard {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!("entering: {name}");
        Self { name, start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        debug!("exiting: {} (elapsed: {:?})", self.name, self.start.elapsed());
    }
}

pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{micros}μs")
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else if micros < 60_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else {
        let seconds = micros / 1_000_000;
        format!("{}m{}s", seconds / 60, seconds % 60)
    }
}

/// Redact common secret-bearing patterns (api keys, passwords, tokens,
/// bearer auth) before a string reaches a log line.
pub fn sanitize_for_logging(input: &str) -> String {
    let patterns = [
        (r"(?i)(api[\s_-]?key|apikey)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(password|passwd|pwd)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(token)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(secret)\s*[:=]\s*\S+", "$1: [REDACTED]"),
        (r"(?i)(authorization|auth)\s*:\s*bearer\s+\S+", "$1: Bearer [REDACTED]"),
    ];
    let mut result = input.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, replacement).to_string();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_switches_units() {
        assert_eq!(format_duration(Duration::from_micros(500)), "500μs");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
    }

    #[test]
    fn sanitize_redacts_known_secret_shapes() {
        assert!(sanitize_for_logging("api_key: sk-abc123").contains("[REDACTED]"));
        assert!(!sanitize_for_logging("api_key: sk-abc123").contains("sk-abc123"));
        assert!(sanitize_for_logging("Authorization: Bearer xyz").contains("[REDACTED]"));
    }

    #[test]
    fn sanitize_preserves_non_sensitive_text() {
        let input = "user: a@example.com, status: active";
        assert_eq!(sanitize_for_logging(input), input);
    }

    #[tokio::test]
    async fn timed_returns_the_future_output() {
        assert_eq!(timed("op", async { 7 }).await, 7);
    }
}
