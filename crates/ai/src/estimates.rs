//! Best-effort extraction of job-count estimates from a summary.
//!
//! Recognized forms:
//! - `Jobs: 42 (>80k: 10)`: a total, optionally followed by a high-pay sub-count
//! - `~42 open roles` and `~10 over $80k` as independent fallbacks

use std::sync::LazyLock;

use regex::Regex;

use scrub_core::Estimates;

static JOBS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Jobs?:\s*(~?\d+)(?:[^\d>]*[>≥]?\$?80k[:\s]*~?(\d+))?")
        .expect("jobs pattern is valid")
});

static OPEN_ROLES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(~?\d+)\s+open\s+roles").expect("open roles pattern is valid"));

static HIGH_PAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(~?\d+)\s*(?:over|>)[\s$]*80k").expect("high pay pattern is valid")
});

fn count(raw: &str) -> Option<u32> {
    raw.trim_start_matches('~').parse().ok()
}

/// Extract at most one primary and one secondary count. Never fails.
pub fn extract_estimates(summary: &str) -> Estimates {
    if let Some(caps) = JOBS_RE.captures(summary) {
        return Estimates {
            primary: caps.get(1).and_then(|m| count(m.as_str())),
            secondary: caps.get(2).and_then(|m| count(m.as_str())),
        };
    }

    Estimates {
        primary: OPEN_ROLES_RE
            .captures(summary)
            .and_then(|c| c.get(1))
            .and_then(|m| count(m.as_str())),
        secondary: HIGH_PAY_RE
            .captures(summary)
            .and_then(|c| c.get(1))
            .and_then(|m| count(m.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_with_high_pay_subcount() {
        let est = extract_estimates("No acquisitions. Jobs: 42 (>80k: 10)");
        assert_eq!(est.primary, Some(42));
        assert_eq!(est.secondary, Some(10));
    }

    #[test]
    fn jobs_total_only() {
        let est = extract_estimates("Renamed to Carto. jobs: ~7");
        assert_eq!(est, Estimates { primary: Some(7), secondary: None });
    }

    #[test]
    fn fallback_phrasing() {
        let est = extract_estimates("LinkedIn ~42 open roles; ~10 over $80k");
        assert_eq!(est.primary, Some(42));
        assert_eq!(est.secondary, Some(10));
    }

    #[test]
    fn no_counts_leaves_both_unset() {
        assert_eq!(extract_estimates("Acquired by Foo in 2021"), Estimates::default());
        assert_eq!(extract_estimates(""), Estimates::default());
    }

    #[test]
    fn overflowing_count_is_ignored() {
        let est = extract_estimates("Jobs: 99999999999999");
        assert_eq!(est.primary, None);
    }
}
