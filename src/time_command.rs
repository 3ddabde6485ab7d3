use anyhow::{ensure, Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::datetime;
use crate::project::ProjectStore;
use crate::storage::KeyValueStorage;
use crate::summary::{summarize, TimeSummary};
use crate::time_entry::{
    NewTimeEntry, TimeCategory, TimeEntry, TimeEntryKind, TimeEntrySource, TimeEntryUpdate,
};
use crate::time_entry_store::TimeEntryStore;

/// `time`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct TimeArgs {
    #[clap(subcommand)]
    action: TimeAction,
}

#[derive(Debug, clap::Subcommand)]
enum TimeAction {
    /// Records a time entry
    Add {
        #[clap(short = 'p', long = "project")]
        project: String,
        #[clap(short = 'c', long = "category", help = "TRAJET, ADMIN, EXEC or AUTRE")]
        category: TimeCategory,
        #[clap(short = 'm', long = "minutes")]
        minutes: i64,
        #[clap(short = 'k', long = "kind", default_value = "actual", help = "actual or forecast")]
        kind: TimeEntryKind,
        #[clap(short = 'd', long = "date", help = "Date in the format YYYY-MM-DD, defaults to today")]
        date: Option<NaiveDate>,
        #[clap(short = 'n', long = "note")]
        note: Option<String>,
    },
    /// Changes fields of an existing time entry
    Update {
        id: String,
        #[clap(short = 'c', long = "category")]
        category: Option<TimeCategory>,
        #[clap(short = 'm', long = "minutes")]
        minutes: Option<i64>,
        #[clap(short = 'k', long = "kind")]
        kind: Option<TimeEntryKind>,
        #[clap(short = 'd', long = "date")]
        date: Option<NaiveDate>,
        #[clap(short = 'n', long = "note", conflicts_with = "clear-note")]
        note: Option<String>,
        #[clap(long = "clear-note")]
        clear_note: bool,
    },
    /// Deletes a time entry
    Remove { id: String },
    /// Lists time entries
    List {
        #[clap(short = 'p', long = "project")]
        project: Option<String>,
        #[clap(short = 'k', long = "kind")]
        kind: Option<TimeEntryKind>,
    },
    /// Shows actual and forecast totals
    Summary {
        #[clap(short = 'p', long = "project")]
        project: Option<String>,
    },
    /// Records the project's default travel time
    Travel {
        #[clap(short = 'p', long = "project")]
        project: String,
        #[clap(short = 'd', long = "date")]
        date: Option<NaiveDate>,
        #[clap(short = 'm', long = "minutes", help = "Sets the project's default travel time first")]
        minutes: Option<i64>,
    },
}

/// `time`サブコマンドの結果。表示は呼び出し側で行う。
#[derive(Debug, PartialEq)]
pub enum TimeOutcome {
    Entry(TimeEntry),
    Entries(Vec<TimeEntry>),
    Summary(TimeSummary),
    Removed(String),
}

pub struct TimeCommand<'a, S: KeyValueStorage> {
    store: &'a mut TimeEntryStore<S>,
    projects: &'a mut ProjectStore<S>,
}

impl<'a, S: KeyValueStorage> TimeCommand<'a, S> {
    /// 新しい`TimeCommand`を返す。
    ///
    /// # Arguments
    /// * `store` - 時間エントリーのストア
    /// * `projects` - 移動時間の参照と設定に使う案件ストア
    pub fn new(store: &'a mut TimeEntryStore<S>, projects: &'a mut ProjectStore<S>) -> Self {
        Self { store, projects }
    }

    /// `time`サブコマンドの処理を行う。
    ///
    /// 日付の指定が無い場合はUTCの今日の日付を使う。
    pub fn run(&mut self, args: TimeArgs) -> Result<TimeOutcome> {
        match args.action {
            TimeAction::Add {
                project,
                category,
                minutes,
                kind,
                date,
                note,
            } => {
                self.ensure_project(&project)?;
                let entry = self
                    .store
                    .add(NewTimeEntry {
                        project_id: project,
                        category,
                        kind,
                        minutes,
                        date: date.unwrap_or_else(datetime::today),
                        note: non_blank(note),
                        source: TimeEntrySource::Manual,
                    })
                    .context("Failed to add time entry")?;
                Ok(TimeOutcome::Entry(entry))
            }
            TimeAction::Update {
                id,
                category,
                minutes,
                kind,
                date,
                note,
                clear_note,
            } => {
                let note = if clear_note {
                    Some(None)
                } else {
                    note.map(|note| non_blank(Some(note)))
                };
                let entry = self
                    .store
                    .update(
                        &id,
                        TimeEntryUpdate {
                            category,
                            minutes,
                            kind,
                            date,
                            note,
                            ..TimeEntryUpdate::default()
                        },
                    )
                    .with_context(|| format!("Failed to update time entry {}", id))?;
                Ok(TimeOutcome::Entry(entry))
            }
            TimeAction::Remove { id } => {
                self.store.remove(&id);
                Ok(TimeOutcome::Removed(id))
            }
            TimeAction::List { project, kind } => {
                let entries = match (project, kind) {
                    (Some(project), Some(kind)) => {
                        self.store.entries_for_project_by_kind(&project, kind)
                    }
                    (Some(project), None) => self.store.entries_for_project(&project),
                    (None, kind) => self
                        .store
                        .entries()
                        .iter()
                        .filter(|entry| kind.map_or(true, |k| entry.kind == k))
                        .cloned()
                        .collect(),
                };
                Ok(TimeOutcome::Entries(entries))
            }
            TimeAction::Summary { project } => {
                let summary = match project {
                    Some(project) => self.store.summary(&project),
                    None => summarize(self.store.entries()),
                };
                Ok(TimeOutcome::Summary(summary))
            }
            TimeAction::Travel {
                project,
                date,
                minutes,
            } => {
                self.ensure_project(&project)?;
                if let Some(minutes) = minutes {
                    ensure!(minutes > 0, "Travel time must exceed 0 minutes");
                    self.projects.set_travel_time(&project, minutes);
                    info!("Default travel time of {} set to {} minutes", project, minutes);
                }
                let project = self
                    .projects
                    .get_project_by_id(&project)
                    .cloned()
                    .with_context(|| format!("Project not found: {}", project))?;
                let entry = self
                    .store
                    .add_travel_entry(&project, date.unwrap_or_else(datetime::today))
                    .context("Failed to add travel entry")?;
                Ok(TimeOutcome::Entry(entry))
            }
        }
    }

    fn ensure_project(&self, id: &str) -> Result<()> {
        self.projects
            .get_project_by_id(id)
            .map(|_| ())
            .with_context(|| format!("Project not found: {}", id))
    }
}

fn non_blank(note: Option<String>) -> Option<String> {
    note.map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty())
}
