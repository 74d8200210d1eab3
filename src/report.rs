//! Human-readable report rendering for terminal output.
//!
//! Produces the start banner, the final statistics block and the outcome
//! section listing discovered credentials (or a notice that none were found).
use std::path::Path;

use colored::*;

use crate::config::RunConfig;
use crate::engine::RunSummary;
use crate::stats::StatsReport;

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push('\n');
    s
}

pub fn render_start(config: &RunConfig) -> String {
    let ports = config
        .ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = String::new();
    out.push_str(&format!(
        "{} Target: {} | Method: {} | Threads: {}\n",
        "[START]".bold().cyan(),
        config.host,
        config.method,
        config.threads
    ));
    out.push_str(&format!(
        "{} Ports: {} | Usernames: {} | Passwords: {} | Timeout: {:.1}s\n",
        "[INFO]".bold().blue(),
        ports,
        config.usernames.len(),
        config.passwords.len(),
        config.timeout.as_secs_f64()
    ));
    out
}

pub fn render_stats(stats: &StatsReport) -> String {
    let mut out = section_header(&"Statistics".bold().yellow().to_string());
    out.push_str(&format!(
        "Attempts: {} | Successes: {} | Probe errors: {}\n",
        stats.attempts, stats.successes, stats.probe_errors
    ));
    out.push_str(&format!("Rate: {:.2} attempts/sec\n", stats.rate));
    out.push_str(&format!(
        "Elapsed time: {:.2} seconds\n",
        stats.elapsed.as_secs_f64()
    ));
    out
}

pub fn render_outcome(summary: &RunSummary, audit_path: &Path) -> String {
    let mut out = String::new();
    if !summary.found_any() {
        out.push_str(&format!(
            "{} No valid credentials found\n",
            "[FAILED]".bold().red()
        ));
        return out;
    }
    for (port, credential) in summary.discoveries() {
        out.push_str(&format!(
            "{} {} on port {}\n",
            "[SUCCESS]".bold().green(),
            credential.to_string().green(),
            port
        ));
    }
    out.push_str(&format!(
        "{} Saved to {}\n",
        "[INFO]".bold().blue(),
        audit_path.display()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::engine::RoundResult;
    use std::time::Duration;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn snapshot_stats_block() {
        plain();
        let stats = StatsReport::new(12, 1, 2, Duration::from_secs(3));
        insta::assert_snapshot!(render_stats(&stats).trim_end());
    }

    #[test]
    fn outcome_lists_discoveries() {
        plain();
        let summary = RunSummary {
            rounds: vec![
                RoundResult {
                    port: 8291,
                    attempts: 3,
                    found: vec![],
                },
                RoundResult {
                    port: 8292,
                    attempts: 3,
                    found: vec![Credential::new("admin", "secret")],
                },
            ],
            stats: StatsReport::new(6, 1, 0, Duration::from_secs(1)),
        };
        let s = render_outcome(&summary, Path::new("out.csv"));
        assert!(s.contains("[SUCCESS] admin:secret on port 8292"));
        assert!(s.contains("Saved to out.csv"));
        assert!(!s.contains("No valid credentials"));
    }

    #[test]
    fn outcome_without_discoveries_says_so() {
        plain();
        let summary = RunSummary {
            rounds: vec![RoundResult {
                port: 8728,
                attempts: 4,
                found: vec![],
            }],
            stats: StatsReport::new(4, 0, 0, Duration::from_secs(1)),
        };
        let s = render_outcome(&summary, Path::new("out.csv"));
        assert_eq!(s, "[FAILED] No valid credentials found\n");
    }

    #[test]
    fn header_underline_ignores_ansi() {
        assert_eq!(visible_len("\u{1b}[1mStats\u{1b}[0m"), 5);
    }
}
