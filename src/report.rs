//! Reduce a joined population into summary numbers and one line per unit.

use crate::dispatch::Population;
use crate::unit::{opt_secs, UnitOutcome};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    #[serde(rename = "fastest_secs", serialize_with = "opt_secs")]
    pub fastest: Option<Duration>,
    #[serde(rename = "slowest_secs", serialize_with = "opt_secs")]
    pub slowest: Option<Duration>,
    #[serde(rename = "wall_secs", serialize_with = "secs")]
    pub wall: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub units: Vec<UnitOutcome>,
}

/// Single pass over the population. Only units without an error count as
/// completed and feed fastest/slowest.
pub fn summarize(population: Population) -> Report {
    let mut completed = 0;
    let mut fastest: Option<Duration> = None;
    let mut slowest: Option<Duration> = None;

    for unit in &population.units {
        if !unit.completed() {
            continue;
        }
        completed += 1;
        if let Some(elapsed) = unit.elapsed {
            fastest = Some(fastest.map_or(elapsed, |f| f.min(elapsed)));
            slowest = Some(slowest.map_or(elapsed, |s| s.max(elapsed)));
        }
    }

    Report {
        summary: Summary {
            total: population.units.len(),
            completed,
            fastest,
            slowest,
            wall: population.wall,
        },
        units: population.units,
    }
}

impl Report {
    /// One line per unit, in index order.
    pub fn lines(&self) -> Vec<String> {
        self.units.iter().map(format_unit).collect()
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let s = &self.summary;
        vec![
            format!("Time elapsed: {}", format_wall(s.wall)),
            format!("Fastest: {}", format_opt_secs(s.fastest)),
            format!("Slowest: {}", format_opt_secs(s.slowest)),
            format!("Completed: {}/{}", s.completed, s.total),
        ]
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn header_line(url: &str, population: usize) -> String {
    format!("Making requests to {} ({} units)", url, population)
}

pub fn format_unit(unit: &UnitOutcome) -> String {
    match &unit.error {
        None => format!(
            "REQ {:04} ({}) = Time: {:.2}s, Size: {}b, Status: {}, Verified: {}, Url: {}",
            unit.index,
            unit.handle.as_deref().unwrap_or("?"),
            unit.elapsed.unwrap_or_default().as_secs_f64(),
            unit.bytes,
            unit.status.map_or_else(|| "---".to_string(), |c| c.to_string()),
            unit.verification.marker(),
            unit.url,
        ),
        Some(err) => format!("REQ {:4} = Error: {}", unit.index, err),
    }
}

/// `~XmYs`, whole seconds.
fn format_wall(wall: Duration) -> String {
    let secs = wall.as_secs();
    format!("~{}m{}s", secs / 60, secs % 60)
}

fn format_opt_secs(d: Option<Duration>) -> String {
    match d {
        Some(d) => format!("{:.2}s", d.as_secs_f64()),
        None => "n/a".to_string(),
    }
}

fn secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnitError;
    use crate::unit::Verification;

    fn ok_unit(index: usize, millis: u64) -> UnitOutcome {
        UnitOutcome {
            index,
            handle: Some(format!("ThreadId({})", index + 2)),
            url: "http://localhost/x".to_string(),
            bytes: 1024,
            status: Some(200),
            elapsed: Some(Duration::from_millis(millis)),
            verification: Verification::NotRequested,
            error: None,
        }
    }

    fn failed_unit(index: usize, error: UnitError) -> UnitOutcome {
        UnitOutcome {
            elapsed: None,
            status: None,
            bytes: 0,
            error: Some(error),
            ..ok_unit(index, 0)
        }
    }

    #[test]
    fn single_successful_unit() {
        let report = summarize(Population {
            units: vec![ok_unit(0, 120)],
            wall: Duration::from_secs(1),
        });

        let lines = report.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "REQ 0000 (ThreadId(2)) = Time: 0.12s, Size: 1024b, Status: 200, Verified: -, Url: http://localhost/x"
        );
        assert_eq!(report.summary.completed, 1);
    }

    #[test]
    fn failures_are_excluded_from_timing_and_completion() {
        let report = summarize(Population {
            units: vec![
                ok_unit(0, 300),
                failed_unit(1, UnitError::transfer_failed("connection refused")),
                ok_unit(2, 10),
                failed_unit(3, UnitError::save_failed("Permission denied (os error 13)")),
            ],
            wall: Duration::from_secs(75),
        });

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.completed, 2);
        assert_eq!(report.summary.fastest, Some(Duration::from_millis(10)));
        assert_eq!(report.summary.slowest, Some(Duration::from_millis(300)));

        let lines = report.lines();
        assert_eq!(
            lines[1],
            "REQ    1 = Error: File transfer failed. (connection refused)"
        );
        assert_eq!(
            lines[3],
            "REQ    3 = Error: File save failed. (Permission denied (os error 13))"
        );
        assert_eq!(
            report.summary_lines(),
            vec![
                "Time elapsed: ~1m15s".to_string(),
                "Fastest: 0.01s".to_string(),
                "Slowest: 0.30s".to_string(),
                "Completed: 2/4".to_string(),
            ]
        );
    }

    #[test]
    fn nothing_completed_has_no_fastest_or_slowest() {
        let report = summarize(Population {
            units: vec![failed_unit(0, UnitError::transfer_failed("timeout"))],
            wall: Duration::from_millis(500),
        });
        assert_eq!(report.summary.completed, 0);
        assert!(report.summary.fastest.is_none());
        assert!(report.summary_lines().contains(&"Fastest: n/a".to_string()));
    }

    #[test]
    fn unset_status_and_markers_render() {
        let mut unit = ok_unit(5, 50);
        unit.status = None;
        unit.verification = Verification::Mismatch;
        let line = format_unit(&unit);
        assert!(line.contains("Status: ---"));
        assert!(line.contains("Verified: F"));
    }

    #[test]
    fn report_saves_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = summarize(Population {
            units: vec![ok_unit(0, 250), failed_unit(1, UnitError::transfer_failed("reset"))],
            wall: Duration::from_secs(2),
        });

        report.save_to_file(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["completed"], 1);
        assert_eq!(value["summary"]["wall_secs"], 2.0);
        assert_eq!(value["units"][0]["elapsed_secs"], 0.25);
        assert_eq!(value["units"][1]["error"]["kind"], "transfer_failed");
        assert_eq!(value["units"][0]["verification"], "not_requested");
    }
}
