use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::datetime;
use crate::storage::KeyValueStorage;
use crate::time_entry::{NewTimeEntry, TimeCategory, TimeEntry, TimeEntryKind, TimeEntrySource};
use crate::time_entry_store::{TimeEntryError, TimeEntryStore};

/// 経過時間を更新する間隔。
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// タイマーの状態。
///
/// `AwaitingConfirmation`は停止後に記録するか確認している状態で、確認か取り消しで`Idle`に戻る。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    AwaitingConfirmation,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerState::Idle => "idle",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::AwaitingConfirmation => "awaiting confirmation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: TimerState,
    },
    #[error("category can only be changed while the timer is idle")]
    CategoryLocked,
    #[error(transparent)]
    Rejected(#[from] TimeEntryError),
}

/// 1つの案件の作業時間を計るタイマー。
///
/// 経過秒数は時計から求めるため、一時停止から再開しても既に経過した時間は失われない。
/// 動作中は1秒ごとに経過秒数を更新するタスクを1つだけ持つ。
/// `start`はtokioのランタイム上で呼び出す必要がある。
pub struct Timer {
    project_id: String,
    category: TimeCategory,
    note: String,
    state: TimerState,
    started_at: DateTime<Utc>,
    elapsed: Arc<AtomicI64>,
    ticker: Option<JoinHandle<()>>,
}

impl Timer {
    /// 新しい`Timer`を返す。
    ///
    /// # Arguments
    ///
    /// * `project_id` - 計測対象の案件のID
    /// * `category` - 記録するカテゴリ。停止中のみ変更できる
    pub fn new(project_id: &str, category: TimeCategory) -> Self {
        Self {
            project_id: project_id.to_string(),
            category,
            note: String::new(),
            state: TimerState::Idle,
            started_at: datetime::now(),
            elapsed: Arc::new(AtomicI64::new(0)),
            ticker: None,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn category(&self) -> TimeCategory {
        self.category
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn elapsed_seconds(&self) -> i64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    /// 記録される分数。1秒でも経過していれば1分に切り上げる。
    pub fn rounded_minutes(&self) -> i64 {
        (self.elapsed_seconds() + 59) / 60
    }

    pub fn set_category(&mut self, category: TimeCategory) -> Result<(), TimerError> {
        if self.state != TimerState::Idle {
            return Err(TimerError::CategoryLocked);
        }
        self.category = category;
        Ok(())
    }

    pub fn set_note(&mut self, note: &str) {
        self.note = note.to_string();
    }

    /// 計測を開始する。一時停止中なら経過時間を保ったまま再開する。
    pub fn start(&mut self) -> Result<(), TimerError> {
        match self.state {
            TimerState::Idle => {
                self.started_at = datetime::now();
                self.elapsed.store(0, Ordering::Relaxed);
            }
            TimerState::Paused => {
                self.started_at =
                    datetime::now() - chrono::Duration::seconds(self.elapsed_seconds());
            }
            state => {
                return Err(TimerError::InvalidTransition {
                    action: "start",
                    state,
                })
            }
        }

        self.spawn_ticker();
        self.state = TimerState::Running;
        info!("Timer started for {} ({})", self.project_id, self.category);
        Ok(())
    }

    /// 計測を一時停止する。経過秒数はこの時点の値で止まる。
    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::Running {
            return Err(TimerError::InvalidTransition {
                action: "pause",
                state: self.state,
            });
        }
        self.sync_elapsed();
        self.cancel_ticker();
        self.state = TimerState::Paused;
        debug!("Timer paused at {}s", self.elapsed_seconds());
        Ok(())
    }

    /// 計測を止めて確認待ちにする。エントリーはまだ作成しない。
    pub fn stop(&mut self) -> Result<(), TimerError> {
        match self.state {
            TimerState::Running => self.sync_elapsed(),
            TimerState::Paused => {}
            state => {
                return Err(TimerError::InvalidTransition {
                    action: "stop",
                    state,
                })
            }
        }
        self.cancel_ticker();
        self.state = TimerState::AwaitingConfirmation;
        debug!("Timer stopped at {}s", self.elapsed_seconds());
        Ok(())
    }

    /// 計測した時間を実績として記録する。
    ///
    /// 分数は切り上げる。検証に失敗した場合はエントリーを作らず、確認待ちのまま残るので、
    /// カテゴリを見直すか`cancel`で破棄できる。
    pub fn confirm<S: KeyValueStorage>(
        &mut self,
        store: &mut TimeEntryStore<S>,
    ) -> Result<TimeEntry, TimerError> {
        if self.state != TimerState::AwaitingConfirmation {
            return Err(TimerError::InvalidTransition {
                action: "confirm",
                state: self.state,
            });
        }

        let minutes = self.rounded_minutes();
        store.validate(self.category, minutes)?;

        let note = self.note.trim();
        let entry = store.add(NewTimeEntry {
            project_id: self.project_id.clone(),
            category: self.category,
            kind: TimeEntryKind::Actual,
            minutes,
            date: datetime::today(),
            note: (!note.is_empty()).then(|| note.to_string()),
            source: TimeEntrySource::Timer,
        })?;

        self.reset();
        Ok(entry)
    }

    /// 確認待ちの計測を破棄する。
    pub fn cancel(&mut self) -> Result<(), TimerError> {
        if self.state != TimerState::AwaitingConfirmation {
            return Err(TimerError::InvalidTransition {
                action: "cancel",
                state: self.state,
            });
        }
        info!("Timer for {} discarded", self.project_id);
        self.reset();
        Ok(())
    }

    /// どの状態からでも経過0の停止状態に戻す。
    pub fn reset(&mut self) {
        self.cancel_ticker();
        self.state = TimerState::Idle;
        self.elapsed.store(0, Ordering::Relaxed);
        self.note.clear();
    }

    fn sync_elapsed(&self) {
        self.elapsed
            .store(datetime::seconds_since(self.started_at), Ordering::Relaxed);
    }

    /// 既存のタスクを止めてから、経過秒数を更新するタスクを起動する。
    fn spawn_ticker(&mut self) {
        self.cancel_ticker();

        let started_at = self.started_at;
        let elapsed = Arc::clone(&self.elapsed);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            loop {
                interval.tick().await;
                elapsed.store(datetime::seconds_since(started_at), Ordering::Relaxed);
            }
        }));
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}

/// 経過秒数を`MM:SS`、1時間以上なら`H:MM:SS`で表す。
pub fn format_elapsed(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
