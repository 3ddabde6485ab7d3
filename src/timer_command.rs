use std::io::Write;
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::project::ProjectStore;
use crate::storage::KeyValueStorage;
use crate::time_entry::{TimeCategory, TimeEntry};
use crate::time_entry_store::TimeEntryStore;
use crate::timer::{format_elapsed, Timer, TimerState};

const HELP: &str = "commands: p pause, r resume/start, s stop, y confirm, n cancel, note <text>, cat <category>, q quit";

/// `timer`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct TimerArgs {
    #[clap(short = 'p', long = "project", help = "Project id to record time for")]
    project: String,

    #[clap(
        short = 'c',
        long = "category",
        default_value = "ADMIN",
        help = "TRAJET, ADMIN, EXEC or AUTRE"
    )]
    category: TimeCategory,
}

pub struct TimerCommand<'a, S: KeyValueStorage> {
    store: &'a mut TimeEntryStore<S>,
    projects: &'a ProjectStore<S>,
}

impl<'a, S: KeyValueStorage> TimerCommand<'a, S> {
    /// 新しい`TimerCommand`を返す。
    pub fn new(store: &'a mut TimeEntryStore<S>, projects: &'a ProjectStore<S>) -> Self {
        Self { store, projects }
    }

    /// `timer`サブコマンドの処理を行う。
    ///
    /// タイマーを開始し、入力の1行を1コマンドとして処理する。確認されたエントリーを返す。
    /// 入力が終わるか`q`で終了し、記録していない計測は破棄する。
    ///
    /// # Arguments
    ///
    /// * `args` - `timer`サブコマンドの引数
    /// * `input` - コマンドを読み込む入力
    /// * `output` - 状態とメッセージの出力先
    pub async fn run<R, W>(&mut self, args: TimerArgs, input: R, output: &mut W) -> Result<Vec<TimeEntry>>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let projects = self.projects;
        let project = projects
            .get_project_by_id(&args.project)
            .with_context(|| format!("Project not found: {}", args.project))?;
        writeln!(output, "Timer for {}", project).context("Failed to write timer header")?;
        writeln!(output, "{}", HELP).context("Failed to write timer help")?;

        let mut timer = Timer::new(&project.id, args.category);
        timer.start().context("Failed to start timer")?;

        let mut recorded = Vec::new();
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read command")? {
            let line = line.trim();
            debug!("Timer command: {:?}", line);
            if line == "q" {
                break;
            }

            let message = match self.handle(&mut timer, line) {
                Ok(Some(entry)) => {
                    let message = format!(
                        "Recorded {} minutes of {} ({})",
                        entry.minutes, entry.category, entry.id
                    );
                    recorded.push(entry);
                    message
                }
                Ok(None) => status(&timer),
                Err(message) => message,
            };
            writeln!(output, "{}", message).context("Failed to write timer status")?;
        }

        if timer.state() != TimerState::Idle {
            warn!("Discarding {} of unrecorded time", format_elapsed(timer.elapsed_seconds()));
        }
        Ok(recorded)
    }

    /// 1行のコマンドを実行する。利用者に見せるエラーは`Err`のメッセージで返す。
    fn handle(&mut self, timer: &mut Timer, line: &str) -> std::result::Result<Option<TimeEntry>, String> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "p" => timer.pause().map(|_| None).map_err(|e| e.to_string()),
            "r" => timer.start().map(|_| None).map_err(|e| e.to_string()),
            "s" => timer.stop().map(|_| None).map_err(|e| e.to_string()),
            "y" => timer.confirm(self.store).map(Some).map_err(|e| e.to_string()),
            "n" => timer.cancel().map(|_| None).map_err(|e| e.to_string()),
            "note" => {
                timer.set_note(rest.trim());
                Ok(None)
            }
            "cat" => {
                let category = TimeCategory::from_str(rest).map_err(|e| e.to_string())?;
                timer.set_category(category).map(|_| None).map_err(|e| e.to_string())
            }
            _ => Err(format!("unknown command \"{}\", {}", line, HELP)),
        }
    }
}

/// タイマーの状態を1行で表す。確認待ちなら記録される分数も示す。
fn status(timer: &Timer) -> String {
    match timer.state() {
        TimerState::AwaitingConfirmation => format!(
            "[{} {}] record {} minutes of {}? (y/n)",
            timer.state(),
            format_elapsed(timer.elapsed_seconds()),
            timer.rounded_minutes(),
            timer.category()
        ),
        state => format!(
            "[{} {}] {}",
            state,
            format_elapsed(timer.elapsed_seconds()),
            timer.category()
        ),
    }
}
