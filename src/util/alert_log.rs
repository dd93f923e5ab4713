use crate::alerts::{Alert, Severity};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("duewatch").join("alerts.log"))
}

/// One parsed line of the alert log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub severity:  Severity,
    pub message:   String,
}

/// Alerts in `new` whose key was not present in `prev`.
pub fn fresh<'a>(prev: &[Alert], new: &'a [Alert]) -> Vec<&'a Alert> {
    new.iter()
        .filter(|a| { let key = a.key(); !prev.iter().any(|p| p.key() == key) })
        .collect()
}

/// Append alerts to the persistent log file (best-effort).
pub fn append(alerts: &[&Alert]) {
    if let Some(path) = log_path() {
        append_to(&path, alerts);
    }
}

pub fn append_to(path: &Path, alerts: &[&Alert]) {
    if alerts.is_empty() { return; }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        for alert in alerts {
            let _ = writeln!(file, "{} [{}] {}", now, alert.severity.label(), alert.message);
        }
    }
}

/// Last `n` entries of the default log, oldest first.
pub fn load_recent(n: usize) -> Vec<LogEntry> {
    log_path().map(|p| load_recent_from(&p, n)).unwrap_or_default()
}

pub fn load_recent_from(path: &Path, n: usize) -> Vec<LogEntry> {
    let text = match fs::read_to_string(path) { Ok(t) => t, Err(_) => return Vec::new() };
    let entries: Vec<LogEntry> = text.lines().filter_map(parse_line).collect();
    let skip = entries.len().saturating_sub(n);
    entries.into_iter().skip(skip).collect()
}

fn parse_line(line: &str) -> Option<LogEntry> {
    // "YYYY-MM-DD HH:MM:SS [SEV] message"
    let open  = line.find(" [")?;
    let close = open + line[open..].find("] ")?;
    let severity = Severity::from_label(&line[open + 2..close])?;
    Some(LogEntry {
        timestamp: line[..open].to_string(),
        severity,
        message:   line[close + 2..].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::evaluate;
    use crate::models::entity::TrackedEntity;

    fn tracked(id: &str, days: i64) -> TrackedEntity {
        TrackedEntity { id: id.into(), requires_tracking: true, days_remaining: days, ..Default::default() }
    }

    #[test]
    fn fresh_only_reports_new_conditions() {
        let prev = evaluate(&[tracked("a", 2)], 3);
        let new  = evaluate(&[tracked("a", 2), tracked("b", 0)], 3);
        let ids: Vec<_> = fresh(&prev, &new).iter().map(|a| a.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn append_then_load_recent() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("alerts.log");
        let alerts = evaluate(&[tracked("a", 2), tracked("b", 0), tracked("c", 1)], 3);
        let refs: Vec<&Alert> = alerts.iter().collect();
        append_to(&path, &refs);

        let last_two = load_recent_from(&path, 2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].severity, Severity::Danger);
        assert_eq!(last_two[0].message, ": expires today!");
        assert_eq!(last_two[1].message, ": 1 day remaining");
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        assert!(parse_line("garbage").is_none());
        assert!(parse_line("2024-01-01 10:00:00 [NOPE] x").is_none());
        let e = parse_line("2024-01-01 10:00:00 [WARN] Bo: 2 days remaining").unwrap();
        assert_eq!(e.timestamp, "2024-01-01 10:00:00");
        assert_eq!(e.message, "Bo: 2 days remaining");
    }

    #[test]
    fn missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_recent_from(&dir.path().join("none.log"), 10).is_empty());
    }
}
