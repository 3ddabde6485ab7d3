use std::io::Write;

use anyhow::{Context, Result};

use crate::import::{ImportResult, ValidationIssue};
use crate::project::Project;
use crate::summary::TimeSummary;
use crate::time_entry::{format_minutes_to_display, TimeCategory, TimeCategoryConfig, TimeEntry, TimeEntryKind};

/// コマンドの結果をコンソールに表示するためのtrait。
pub trait ConsolePresenter {
    /// 時間エントリーを日付順に表示する。
    ///
    /// # Arguments
    ///
    /// * `entries` - 表示する時間エントリー
    fn show_time_entries(&mut self, entries: &[TimeEntry]) -> Result<()>;

    /// 実績と予定の合計、カテゴリごとの内訳を表示する。
    fn show_summary(&mut self, summary: &TimeSummary) -> Result<()>;

    /// CSV取り込みの件数とエラー・警告を表示する。
    fn show_import_result(&mut self, result: &ImportResult) -> Result<()>;

    /// カテゴリ設定を、予定に使う色と組にして表示する。
    fn show_categories(&mut self, categories: &[(TimeCategoryConfig, String)]) -> Result<()>;

    fn show_projects(&mut self, projects: &[Project]) -> Result<()>;
}

/// Markdownのlist形式で表示する。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    fn write_issue(&mut self, level: &str, issue: &ValidationIssue) -> Result<()> {
        writeln!(
            self.writer,
            "- {} row {} {} \"{}\": {}",
            level, issue.row, issue.field, issue.value, issue.message
        )
        .with_context(|| format!("Failed to write import {}: {:?}", level, issue))
    }
}

impl<'a, W: Write> ConsolePresenter for ConsoleMarkdownList<'a, W> {
    // 同じ日付のエントリーは元の順序を保つ。
    fn show_time_entries(&mut self, entries: &[TimeEntry]) -> Result<()> {
        let mut sorted_entries = entries.to_vec();
        sorted_entries.sort_by_key(|entry| entry.date);

        for entry in sorted_entries {
            let note = entry
                .note
                .as_deref()
                .map(|note| format!(": {}", note))
                .unwrap_or_default();
            writeln!(
                self.writer,
                "- {} [{}] {} {} ({}){}",
                entry.date,
                entry.category,
                kind_label(entry.kind),
                format_minutes_to_display(entry.minutes),
                entry.id,
                note
            )
            .with_context(|| format!("Failed to write time entry: {:?}", entry))?;
        }

        Ok(())
    }

    fn show_summary(&mut self, summary: &TimeSummary) -> Result<()> {
        writeln!(
            self.writer,
            "- total: actual {} / forecast {}",
            format_minutes_to_display(summary.total_actual),
            format_minutes_to_display(summary.total_forecast)
        )
        .context("Failed to write summary total")?;

        for category in TimeCategory::ALL {
            let totals = summary.category(category);
            writeln!(
                self.writer,
                "  - {}: actual {} / forecast {}",
                category.label(),
                format_minutes_to_display(totals.actual),
                format_minutes_to_display(totals.forecast)
            )
            .with_context(|| format!("Failed to write summary for {}", category))?;
        }

        Ok(())
    }

    fn show_import_result(&mut self, result: &ImportResult) -> Result<()> {
        writeln!(
            self.writer,
            "{} records, {} errors, {} warnings",
            result.records.len(),
            result.errors.len(),
            result.warnings.len()
        )
        .context("Failed to write import counts")?;

        for issue in &result.errors {
            self.write_issue("error", issue)?;
        }
        for issue in &result.warnings {
            self.write_issue("warning", issue)?;
        }

        Ok(())
    }

    fn show_categories(&mut self, categories: &[(TimeCategoryConfig, String)]) -> Result<()> {
        for (config, forecast_color) in categories {
            let min = config
                .min_minutes
                .map(|min| format!(" (min {})", format_minutes_to_display(min)))
                .unwrap_or_default();
            writeln!(
                self.writer,
                "- {} {}: {} / forecast {}{}",
                config.key, config.label, config.color, forecast_color, min
            )
            .with_context(|| format!("Failed to write category: {:?}", config))?;
        }

        Ok(())
    }

    fn show_projects(&mut self, projects: &[Project]) -> Result<()> {
        for project in projects {
            let travel = project
                .travel_time_minutes
                .map(format_minutes_to_display)
                .unwrap_or_else(|| "-".to_string());
            let milestones: String = project
                .draft
                .milestones
                .iter()
                .filter_map(|milestone| {
                    milestone
                        .start_date
                        .map(|date| format!(" {} {}", milestone.kind.label(), date))
                })
                .collect();
            writeln!(
                self.writer,
                "- {} {} [{}] travel {}{}",
                project.id,
                project.name(),
                project.draft.status.label(),
                travel,
                milestones
            )
            .with_context(|| format!("Failed to write project: {}", project.id))?;
        }

        Ok(())
    }
}

fn kind_label(kind: TimeEntryKind) -> &'static str {
    match kind {
        TimeEntryKind::Actual => "actual",
        TimeEntryKind::Forecast => "forecast",
    }
}
