//! Structured logging module using tracing
//!
//! Console output goes to stderr so `apply`/`chat` output on stdout stays clean;
//! an optional log file receives the same events without ANSI colors.

use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ellipse a string for display: first half + "..." + last half (no truncation of one end).
/// If `s` has ≤ `max_len` chars, returns `s` unchanged. Otherwise returns
/// `s[0..first_n] + "..." + s[last_n..]` where first_n + 3 + last_n ≤ max_len.
pub fn ellipse(s: &str, max_len: usize) -> String {
    const SEP: &str = "...";
    let sep_len = SEP.len();
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    if n <= max_len || max_len <= sep_len {
        return s.to_string();
    }
    let first_count = (max_len - sep_len) / 2;
    let last_count = (max_len - sep_len) - first_count;
    let first: String = chars[..first_count].iter().collect();
    let last: String = chars[n - last_count..].iter().collect();
    format!("{}{}{}", first, SEP, last)
}

fn filter_level(verbosity: u8) -> &'static str {
    // -v: warn, -vv: debug, -vvv: trace
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing with console and (optionally) file output.
///
/// Verbosity comes from the `-v` count only; `RUST_LOG` is ignored so the flags stay authoritative.
pub fn init_tracing(verbosity: u8, log_file_path: Option<PathBuf>) {
    let filter = EnvFilter::new(filter_level(verbosity));
    let registry = tracing_subscriber::registry().with(filter);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let file = log_file_path.and_then(|log_path| {
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()
    });

    match file {
        Some(file) => {
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_ansi(false);
            registry.with(console_layer).with(file_layer).init();
        }
        None => {
            registry.with(console_layer).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipse_keeps_short_strings() {
        assert_eq!(ellipse("short", 10), "short");
    }

    #[test]
    fn ellipse_keeps_both_ends() {
        let s = ellipse("abcdefghijklmnopqrstuvwxyz", 11);
        assert_eq!(s, "abcd...wxyz");
        assert_eq!(s.chars().count(), 11);
    }

    #[test]
    fn ellipse_counts_chars_not_bytes() {
        let s = ellipse("🔧🔧🔧🔧🔧🔧🔧🔧🔧🔧", 7);
        assert_eq!(s, "🔧🔧...🔧🔧");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(filter_level(0), "error");
        assert_eq!(filter_level(1), "warn");
        assert_eq!(filter_level(2), "debug");
        assert_eq!(filter_level(9), "trace");
    }
}
