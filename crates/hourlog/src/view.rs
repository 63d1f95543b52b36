//! Presentation of totals and the session log.
//!
//! [`Dashboard::build`] turns aggregated totals and the raw session list into
//! display-ready data: summary strings, two chart datasets and the log list.
//! A [`ViewRenderer`] draws it. [`TerminalView`] is the renderer used by the
//! CLI.

use std::io::Write;

use serde::Serialize;

use crate::aggregate::{AggregateTotals, Exclusions};
use crate::error::Result;
use crate::session::{Session, SessionType};

/// Width of a full bar in text charts, in cells.
const BAR_WIDTH: usize = 30;

/// Something that can display a dashboard and an inline error message.
pub trait ViewRenderer: Send + 'static {
    /// Redraw everything from `dashboard`.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn render(&mut self, dashboard: &Dashboard) -> Result<()>;

    /// Show an error message next to the form.
    fn show_error(&mut self, message: &str);

    /// Hide the error message.
    fn clear_error(&mut self);
}

/// Round to two decimals for display.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format hours with two decimals.
#[must_use]
pub fn format_hours(value: f64) -> String {
    format!("{value:.2}")
}

/// Headline totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// e.g. `"3.50 hours"`.
    pub instructional: String,
    /// e.g. `"0.50 hours"`.
    pub non_instructional: String,
}

/// One data series in a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// Series name.
    pub label: String,
    /// One value per chart label, rounded to two decimals.
    pub values: Vec<f64>,
}

/// Data behind one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    /// Chart title.
    pub title: String,
    /// Category labels.
    pub labels: Vec<String>,
    /// Series plotted against the labels.
    pub datasets: Vec<Dataset>,
}

/// One line item in the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Instructor name.
    pub instructor: String,
    /// Class name, possibly empty.
    pub class: String,
    /// `YYYY-MM-DD | HH:MM - HH:MM`.
    pub when: String,
    /// Raw type value.
    pub session_type: String,
    /// `Instructional` or `Non-Instructional`.
    pub type_label: String,
    /// Duration with two decimals.
    pub hours: String,
}

impl LogEntry {
    fn from_session(session: &Session) -> Self {
        Self {
            instructor: session.instructor_name.clone(),
            class: session.class_name.clone(),
            when: format!(
                "{} | {} - {}",
                session.date.format(crate::duration::DATE_FORMAT),
                session.start.format(crate::duration::CLOCK_FORMAT),
                session.end.format(crate::duration::CLOCK_FORMAT)
            ),
            session_type: session.session_type.to_string(),
            type_label: session.session_type.label().to_string(),
            hours: format_hours(session.duration_hours),
        }
    }
}

/// Everything the view displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Headline totals.
    pub summary: Summary,
    /// Instructional vs. non-instructional hours.
    pub distribution: ChartData,
    /// Hours per known instructor, split by type.
    pub by_instructor: ChartData,
    /// Sessions, newest first.
    pub log: Vec<LogEntry>,
    /// Sessions the totals left out.
    pub excluded: Exclusions,
}

impl Dashboard {
    /// Build the dashboard from totals and the newest-first session list.
    #[must_use]
    pub fn build(totals: &AggregateTotals, sessions: &[Session]) -> Self {
        let summary = Summary {
            instructional: format!("{} hours", format_hours(totals.total_instructional())),
            non_instructional: format!(
                "{} hours",
                format_hours(totals.total_non_instructional())
            ),
        };

        let distribution = ChartData {
            title: "Total Hours Distribution".to_string(),
            labels: vec![
                "Instructional Hours".to_string(),
                "Non-Instructional Hours".to_string(),
            ],
            datasets: vec![Dataset {
                label: "Hours".to_string(),
                values: vec![
                    round2(totals.total_instructional()),
                    round2(totals.total_non_instructional()),
                ],
            }],
        };

        let by_instructor = ChartData {
            title: "Hours by Instructor".to_string(),
            labels: totals
                .per_instructor
                .iter()
                .map(|entry| entry.name.clone())
                .collect(),
            datasets: vec![
                Dataset {
                    label: SessionType::Instructional.label().to_string(),
                    values: totals
                        .per_instructor
                        .iter()
                        .map(|entry| round2(entry.hours.instructional))
                        .collect(),
                },
                Dataset {
                    label: SessionType::NonInstructional.label().to_string(),
                    values: totals
                        .per_instructor
                        .iter()
                        .map(|entry| round2(entry.hours.non_instructional))
                        .collect(),
                },
            ],
        };

        Self {
            summary,
            distribution,
            by_instructor,
            log: sessions.iter().map(LogEntry::from_session).collect(),
            excluded: totals.excluded,
        }
    }
}

/// How [`TerminalView`] writes dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalMode {
    /// Summary, text bar charts and the log.
    #[default]
    Text,
    /// Summary and charts only.
    SummaryOnly,
    /// The log list only.
    LogOnly,
    /// The dashboard as pretty-printed JSON.
    Json,
}

/// Draws dashboards as text on any writer.
#[derive(Debug)]
pub struct TerminalView<W: Write + Send + 'static> {
    out: W,
    mode: TerminalMode,
    clear_screen: bool,
    log_limit: Option<usize>,
    error: Option<String>,
}

impl<W: Write + Send + 'static> TerminalView<W> {
    /// Create a view writing to `out`.
    pub fn new(out: W, mode: TerminalMode) -> Self {
        Self {
            out,
            mode,
            clear_screen: false,
            log_limit: None,
            error: None,
        }
    }

    /// Clear the terminal before every redraw.
    #[must_use]
    pub fn clearing_screen(mut self) -> Self {
        self.clear_screen = true;
        self
    }

    /// Show at most `limit` log entries.
    #[must_use]
    pub fn with_log_limit(mut self, limit: Option<usize>) -> Self {
        self.log_limit = limit;
        self
    }

    /// The message currently shown in the error region.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_summary(&mut self, dashboard: &Dashboard) -> std::io::Result<()> {
        writeln!(
            self.out,
            "Total Instructional:      {}",
            dashboard.summary.instructional
        )?;
        writeln!(
            self.out,
            "Total Non-Instructional:  {}",
            dashboard.summary.non_instructional
        )?;
        let excluded = dashboard.excluded;
        if excluded.unrecognized_type > 0 {
            writeln!(
                self.out,
                "  ({} sessions with an unrecognized type not counted)",
                excluded.unrecognized_type
            )?;
        }
        if excluded.unknown_instructor > 0 {
            writeln!(
                self.out,
                "  ({} sessions by instructors not on the roster)",
                excluded.unknown_instructor
            )?;
        }
        writeln!(self.out)?;

        write_distribution(&mut self.out, &dashboard.distribution)?;
        writeln!(self.out)?;
        write_grouped(&mut self.out, &dashboard.by_instructor)
    }

    fn write_log(&mut self, dashboard: &Dashboard) -> std::io::Result<()> {
        writeln!(self.out, "Logged Sessions")?;
        if dashboard.log.is_empty() {
            writeln!(self.out, "  (none)")?;
            return Ok(());
        }
        let limit = self.log_limit.unwrap_or(usize::MAX);
        for entry in dashboard.log.iter().take(limit) {
            if entry.class.is_empty() {
                writeln!(self.out, "  Instructor: {}", entry.instructor)?;
            } else {
                writeln!(
                    self.out,
                    "  Instructor: {}  Class: {}",
                    entry.instructor, entry.class
                )?;
            }
            writeln!(self.out, "  {}", entry.when)?;
            writeln!(self.out, "  {}: {} hrs", entry.type_label, entry.hours)?;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

impl<W: Write + Send + 'static> ViewRenderer for TerminalView<W> {
    fn render(&mut self, dashboard: &Dashboard) -> Result<()> {
        if self.clear_screen {
            write!(self.out, "\x1b[2J\x1b[H")?;
        }
        if let Some(error) = &self.error {
            writeln!(self.out, "Error: {error}")?;
            writeln!(self.out)?;
        }

        match self.mode {
            TerminalMode::Json => {
                serde_json::to_writer_pretty(&mut self.out, dashboard)?;
                writeln!(self.out)?;
            }
            TerminalMode::SummaryOnly => self.write_summary(dashboard)?,
            TerminalMode::LogOnly => self.write_log(dashboard)?,
            TerminalMode::Text => {
                self.write_summary(dashboard)?;
                writeln!(self.out)?;
                self.write_log(dashboard)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Number of filled cells for `value` on a bar where `max` fills it.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bar_cells(value: f64, max: f64) -> usize {
    if max <= 0.0 || value <= 0.0 {
        return 0;
    }
    ((value / max) * BAR_WIDTH as f64).round().min(BAR_WIDTH as f64) as usize
}

fn bar(filled: usize) -> String {
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Draw a one-series chart as bars scaled to the series total, with shares.
fn write_distribution(out: &mut impl Write, chart: &ChartData) -> std::io::Result<()> {
    writeln!(out, "{}", chart.title)?;
    let values = chart
        .datasets
        .first()
        .map(|d| d.values.as_slice())
        .unwrap_or_default();
    let total: f64 = values.iter().sum();
    let width = label_width(&chart.labels);

    for (label, value) in chart.labels.iter().zip(values) {
        let share = if total > 0.0 { value / total * 100.0 } else { 0.0 };
        writeln!(
            out,
            "  {label:<width$}  {}  {share:>5.1}%  {}",
            bar(bar_cells(*value, total)),
            format_hours(*value)
        )?;
    }
    Ok(())
}

/// Draw a multi-series chart, one bar per label and series, on a shared scale.
fn write_grouped(out: &mut impl Write, chart: &ChartData) -> std::io::Result<()> {
    writeln!(out, "{}", chart.title)?;
    if chart.labels.is_empty() {
        writeln!(out, "  (no instructors on the roster)")?;
        return Ok(());
    }

    let max = chart
        .datasets
        .iter()
        .flat_map(|d| d.values.iter().copied())
        .fold(0.0_f64, f64::max);
    let width = label_width(&chart.labels);
    let series_width = chart
        .datasets
        .iter()
        .map(|d| d.label.chars().count())
        .max()
        .unwrap_or(0);

    for (index, label) in chart.labels.iter().enumerate() {
        for (n, dataset) in chart.datasets.iter().enumerate() {
            let value = dataset.values.get(index).copied().unwrap_or(0.0);
            let name = if n == 0 { label.as_str() } else { "" };
            writeln!(
                out,
                "  {name:<width$}  {:<series_width$}  {}  {}",
                dataset.label,
                bar(bar_cells(value, max)),
                format_hours(value)
            )?;
        }
    }
    Ok(())
}

fn label_width(labels: &[String]) -> usize {
    labels.iter().map(|l| l.chars().count()).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::duration::{parse_clock, parse_date};
    use crate::roster::Roster;

    fn session(name: &str, session_type: SessionType, start: &str, end: &str) -> Session {
        Session::new(
            name,
            "Algebra I",
            parse_date("2024-03-11").unwrap(),
            session_type,
            parse_clock(start).unwrap(),
            parse_clock(end).unwrap(),
        )
        .unwrap()
    }

    fn sample() -> (AggregateTotals, Vec<Session>) {
        let sessions = vec![
            session("Morrison", SessionType::Instructional, "13:00", "15:00"),
            session("Aragon", SessionType::NonInstructional, "11:00", "11:30"),
            session("Aragon", SessionType::Instructional, "09:00", "10:30"),
        ];
        (aggregate(&sessions, &Roster::default()), sessions)
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.0 / 6.0), 0.17);
        assert_eq!(round2(3.5), 3.5);
        assert_eq!(format_hours(1.0 / 3.0), "0.33");
        assert_eq!(format_hours(2.0), "2.00");
    }

    #[test]
    fn test_dashboard_summary_and_charts() {
        let (totals, sessions) = sample();
        let dashboard = Dashboard::build(&totals, &sessions);

        assert_eq!(dashboard.summary.instructional, "3.50 hours");
        assert_eq!(dashboard.summary.non_instructional, "0.50 hours");
        assert_eq!(dashboard.distribution.datasets[0].values, vec![3.5, 0.5]);
        assert_eq!(
            dashboard.by_instructor.labels,
            vec!["Aragon", "Morrison", "Howard"]
        );
        assert_eq!(dashboard.by_instructor.datasets[0].values, vec![1.5, 2.0, 0.0]);
        assert_eq!(dashboard.by_instructor.datasets[1].values, vec![0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_dashboard_log_keeps_order() {
        let (totals, sessions) = sample();
        let dashboard = Dashboard::build(&totals, &sessions);

        assert_eq!(dashboard.log.len(), 3);
        assert_eq!(dashboard.log[0].instructor, "Morrison");
        assert_eq!(dashboard.log[2].when, "2024-03-11 | 09:00 - 10:30");
        assert_eq!(dashboard.log[1].type_label, "Non-Instructional");
        assert_eq!(dashboard.log[1].session_type, "non-instructional");
        assert_eq!(dashboard.log[2].hours, "1.50");
    }

    #[test]
    fn test_empty_dashboard() {
        let roster = Roster::default();
        let dashboard = Dashboard::build(&AggregateTotals::zeroed(&roster), &[]);

        assert_eq!(dashboard.summary.instructional, "0.00 hours");
        assert!(dashboard.log.is_empty());
        assert_eq!(dashboard.by_instructor.labels.len(), 3);
    }

    #[test]
    fn test_bar_cells() {
        assert_eq!(bar_cells(0.0, 10.0), 0);
        assert_eq!(bar_cells(5.0, 0.0), 0);
        assert_eq!(bar_cells(5.0, 10.0), BAR_WIDTH / 2);
        assert_eq!(bar_cells(10.0, 10.0), BAR_WIDTH);
        assert_eq!(bar(3).chars().count(), BAR_WIDTH);
    }

    #[test]
    fn test_terminal_text_render() {
        let (totals, sessions) = sample();
        let mut view = TerminalView::new(Vec::new(), TerminalMode::Text);
        view.render(&Dashboard::build(&totals, &sessions)).unwrap();
        let text = String::from_utf8(view.into_inner()).unwrap();

        assert!(text.contains("Total Instructional:      3.50 hours"));
        assert!(text.contains("Total Hours Distribution"));
        assert!(text.contains("87.5%"));
        assert!(text.contains("Hours by Instructor"));
        assert!(text.contains("Instructor: Aragon  Class: Algebra I"));
        assert!(text.contains("Instructional: 1.50 hrs"));
        assert!(text.contains("Non-Instructional: 0.50 hrs"));
    }

    #[test]
    fn test_terminal_log_limit() {
        let (totals, sessions) = sample();
        let mut view = TerminalView::new(Vec::new(), TerminalMode::LogOnly).with_log_limit(Some(1));
        view.render(&Dashboard::build(&totals, &sessions)).unwrap();
        let text = String::from_utf8(view.into_inner()).unwrap();

        assert!(text.contains("Morrison"));
        assert!(!text.contains("Aragon"));
        assert!(!text.contains("Total Instructional"));
    }

    #[test]
    fn test_terminal_json_render() {
        let (totals, sessions) = sample();
        let mut view = TerminalView::new(Vec::new(), TerminalMode::Json);
        view.render(&Dashboard::build(&totals, &sessions)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&view.into_inner()).unwrap();

        assert_eq!(value["summary"]["instructional"], "3.50 hours");
        assert_eq!(value["log"][0]["instructor"], "Morrison");
        assert_eq!(value["excluded"]["unrecognized_type"], 0);
    }

    #[test]
    fn test_error_region() {
        let roster = Roster::default();
        let dashboard = Dashboard::build(&AggregateTotals::zeroed(&roster), &[]);
        let mut view = TerminalView::new(Vec::new(), TerminalMode::SummaryOnly);

        view.show_error("database is locked");
        assert_eq!(view.error(), Some("database is locked"));
        view.render(&dashboard).unwrap();

        view.clear_error();
        assert!(view.error().is_none());
        view.render(&dashboard).unwrap();

        let text = String::from_utf8(view.into_inner()).unwrap();
        assert_eq!(text.matches("Error: database is locked").count(), 1);
    }

    #[test]
    fn test_exclusions_are_reported() {
        let sessions = vec![
            session("Smith", SessionType::Instructional, "09:00", "10:00"),
            session("Aragon", SessionType::Other("lunch".to_string()), "12:00", "13:00"),
        ];
        let totals = aggregate(&sessions, &Roster::default());
        let mut view = TerminalView::new(Vec::new(), TerminalMode::SummaryOnly);
        view.render(&Dashboard::build(&totals, &sessions)).unwrap();
        let text = String::from_utf8(view.into_inner()).unwrap();

        assert!(text.contains("1 sessions with an unrecognized type"));
        assert!(text.contains("1 sessions by instructors not on the roster"));
    }
}
