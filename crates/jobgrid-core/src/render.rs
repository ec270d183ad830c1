use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use jobgrid_shared::JobStatus;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::grid::{Dispatch, DrawOp, GridFrame, GridHit};
use crate::layout::{JobRectangle, LayoutReport};
use crate::navigation::ViewState;
use crate::timeline::Indicator;
use crate::view_window::ViewWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    format: OutputFormat,
    color: bool,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        let color = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { format, color }
    }

    pub fn plain(format: OutputFormat) -> Self {
        Self {
            format,
            color: false,
        }
    }

    #[tracing::instrument(skip_all, fields(view = %window.view))]
    pub fn print_window<W: Write>(&self, out: &mut W, window: &ViewWindow) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            return write_json(out, window);
        }

        writeln!(out, "{}", self.paint(&window.title, "1"))?;
        let headers = vec![
            "#".to_string(),
            "Date".to_string(),
            "Day".to_string(),
            "Month".to_string(),
        ];
        let rows = window
            .days
            .iter()
            .map(|day| {
                let month = if day.is_current_month {
                    "in".to_string()
                } else {
                    self.paint("out", "90")
                };
                vec![
                    day.index.to_string(),
                    day.date.format("%Y-%m-%d").to_string(),
                    day.date.format("%a").to_string(),
                    month,
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all, fields(rects = rects.len()))]
    pub fn print_layout<W: Write>(
        &self,
        out: &mut W,
        rects: &[JobRectangle],
        report: &LayoutReport,
    ) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            #[derive(Serialize)]
            struct LayoutOutput<'a> {
                rects: &'a [JobRectangle],
                report: &'a LayoutReport,
            }
            return write_json(out, &LayoutOutput { rects, report });
        }

        let headers = ["Job", "Day", "Top", "Left", "Width", "Height", "Lane", "Note"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = rects
            .iter()
            .map(|rect| {
                let note = if rect.fallback {
                    self.paint("fallback", "31")
                } else {
                    String::new()
                };
                vec![
                    rect.job_id.clone(),
                    rect.day_index.to_string(),
                    format!("{:.1}", rect.top),
                    format!("{:.1}", rect.left),
                    format!("{:.1}", rect.width),
                    format!("{:.1}", rect.height),
                    format!("{}/{}", rect.lane + 1, rect.lane_count),
                    note,
                ]
            })
            .collect();
        write_table(&mut *out, headers, rows)?;

        writeln!(
            out,
            "placed {} hidden {} unscheduled {} bad-date {} outside {} fallback {} repaired {}",
            report.placed,
            report.hidden,
            report.skipped_unscheduled,
            report.skipped_bad_date,
            report.out_of_window,
            report.fallbacks,
            report.degenerate
        )?;
        Ok(())
    }

    pub fn print_indicator<W: Write>(
        &self,
        out: &mut W,
        indicator: &Indicator,
    ) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            return write_json(out, indicator);
        }

        if indicator.visible {
            writeln!(
                out,
                "now {} day {} top {:.1}",
                self.paint(&indicator.label, "31"),
                indicator.day_index,
                indicator.top
            )?;
        } else {
            writeln!(out, "now {} (not in view)", indicator.label)?;
        }
        Ok(())
    }

    pub fn print_state<W: Write>(&self, out: &mut W, state: &ViewState) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            return write_json(out, state);
        }

        let selected = state
            .selected_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:<5} anchor {} selected {}",
            state.view.as_key(),
            state.anchor_date.format("%Y-%m-%d"),
            selected
        )?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(ops = frame.ops.len()))]
    pub fn print_frame<W: Write>(&self, out: &mut W, frame: &GridFrame) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            return write_json(out, frame);
        }

        writeln!(out, "{}", self.paint(&frame.title, "1"))?;
        writeln!(out, "{}", frame.header_labels.join(" | "))?;

        let headers = ["Op", "Day", "Top", "Left", "Label", "Detail"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = frame
            .ops
            .iter()
            .filter_map(|op| self.frame_row(op))
            .collect();
        write_table(&mut *out, headers, rows)?;

        let stats = &frame.stats;
        writeln!(
            out,
            "jobs {} pending {} in-progress {} completed {} cancelled {} unscheduled {}",
            stats.total,
            stats.pending,
            stats.in_progress,
            stats.completed,
            stats.cancelled,
            stats.unscheduled
        )?;
        Ok(())
    }

    pub fn print_hit<W: Write>(
        &self,
        out: &mut W,
        hit: Option<&GridHit>,
        dispatch: Option<&Dispatch>,
    ) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            #[derive(Serialize)]
            struct HitOutput<'a> {
                hit: Option<&'a GridHit>,
                dispatch: Option<&'a Dispatch>,
            }
            return write_json(out, &HitOutput { hit, dispatch });
        }

        match hit {
            Some(GridHit::Job { job_id }) => writeln!(out, "job {job_id}")?,
            Some(GridHit::Slot { date, time }) => {
                writeln!(out, "slot {} {time}", date.format("%Y-%m-%d"))?
            }
            Some(GridHit::Day { date }) => writeln!(out, "day {}", date.format("%Y-%m-%d"))?,
            None => writeln!(out, "nothing")?,
        }
        if let Some(dispatch) = dispatch {
            writeln!(out, "-> {}", serde_json::to_string(dispatch)?)?;
        }
        Ok(())
    }

    // Hour lines are implied by the card tops; skip them in text output.
    fn frame_row(&self, op: &DrawOp) -> Option<Vec<String>> {
        let row = match op {
            DrawOp::HourLine { .. } => return None,
            DrawOp::DayHeader {
                day_index,
                left,
                label,
                is_today,
                ..
            } => vec![
                "header".to_string(),
                day_index.to_string(),
                String::new(),
                format!("{left:.1}"),
                label.clone(),
                if *is_today {
                    self.paint("today", "36")
                } else {
                    String::new()
                },
            ],
            DrawOp::Card {
                rect,
                title,
                subtitle,
                status,
                actions,
                ..
            } => vec![
                "card".to_string(),
                rect.day_index.to_string(),
                format!("{:.1}", rect.top),
                format!("{:.1}", rect.left),
                self.paint(title, status_code(*status)),
                format!(
                    "{subtitle} [{}]",
                    actions
                        .iter()
                        .map(|action| format!("{action:?}").to_ascii_lowercase())
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            ],
            DrawOp::Cell {
                day_index,
                top,
                left,
                label,
                outside,
                chips,
                overflow,
                ..
            } => {
                let mut detail = chips
                    .iter()
                    .map(|chip| chip.label.clone())
                    .collect::<Vec<_>>()
                    .join("; ");
                if let Some(more) = overflow {
                    detail = format!("{detail}; {more}");
                }
                let label = if *outside {
                    self.paint(label, "90")
                } else {
                    label.clone()
                };
                vec![
                    "cell".to_string(),
                    day_index.to_string(),
                    format!("{top:.1}"),
                    format!("{left:.1}"),
                    label,
                    detail,
                ]
            }
            DrawOp::NowLine {
                day_index,
                top,
                left,
                label,
                ..
            } => vec![
                "now".to_string(),
                day_index.to_string(),
                format!("{top:.1}"),
                format!("{left:.1}"),
                self.paint(label, "31"),
                String::new(),
            ],
        };
        Some(row)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn status_code(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "0",
        JobStatus::InProgress => "33",
        JobStatus::Completed => "32",
        JobStatus::Cancelled => "90",
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Weekday};

    use super::*;
    use crate::view_window::ViewMode;

    fn week() -> ViewWindow {
        ViewWindow::compute(
            NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date"),
            ViewMode::Week,
            Weekday::Sun,
        )
    }

    #[test]
    fn table_columns_line_up() {
        let mut out = Vec::new();
        Renderer::plain(OutputFormat::Table)
            .print_window(&mut out, &week())
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Jun 9 - Jun 15, 2024");
        assert!(lines[1].starts_with("# Date"));
        assert!(lines[3].starts_with("0 2024-06-09 Sun"));
        assert_eq!(lines.len(), 3 + 7);
    }

    #[test]
    fn json_output_is_parseable() {
        let mut out = Vec::new();
        Renderer::plain(OutputFormat::Json)
            .print_window(&mut out, &week())
            .expect("render");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["view"], "week");
        assert_eq!(value["days"].as_array().map(Vec::len), Some(7));
    }

    #[test]
    fn strip_ansi_keeps_visible_text() {
        assert_eq!(strip_ansi("\x1b[31mlate\x1b[0m"), "late");
        assert_eq!(UnicodeWidthStr::width(strip_ansi("\x1b[1mÉté\x1b[0m").as_str()), 3);
    }
}
