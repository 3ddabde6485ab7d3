use chrono::NaiveDate;
use log::{info, warn};
use thiserror::Error;
use ulid::Ulid;

use crate::datetime;
use crate::project::Project;
use crate::storage::{load_json, save_json, KeyValueStorage};
use crate::summary::{summarize, TimeSummary};
use crate::time_entry::{
    default_time_categories, NewTimeEntry, TimeCategory, TimeCategoryConfig, TimeEntry,
    TimeEntryKind, TimeEntrySource, TimeEntryUpdate,
};

/// 時間エントリーを保存するキー。
pub const TIME_ENTRIES_KEY: &str = "affaires-time-entries";
/// カテゴリ設定を保存するキー。
pub const TIME_SETTINGS_KEY: &str = "affaires-time-settings";

/// 設定に無いカテゴリの色。
const FALLBACK_COLOR: &str = "hsl(220 15% 55%)";

/// 時間エントリーの操作が拒否された理由。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeEntryError {
    #[error("minimum duration for {label} is {min_minutes} minutes")]
    BelowMinimum { label: String, min_minutes: i64 },
    #[error("duration must exceed 0")]
    NotPositive,
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("no default travel time set for project {0}")]
    MissingTravelTime(String),
}

/// 時間エントリーとカテゴリ設定を保持するストア。
///
/// `load`で初期化し、変更のたびに全体を保存する。終了時は`flush`で書き出す。
pub struct TimeEntryStore<S: KeyValueStorage> {
    storage: S,
    entries: Vec<TimeEntry>,
    categories: Vec<TimeCategoryConfig>,
}

impl<S: KeyValueStorage> TimeEntryStore<S> {
    /// ストレージからエントリーとカテゴリ設定を読み込む。
    ///
    /// 保存データが無い、または壊れている場合はエントリーは空、カテゴリは既定値で始める。
    pub fn load(storage: S) -> Self {
        let entries: Vec<TimeEntry> = load_json(&storage, TIME_ENTRIES_KEY).unwrap_or_default();
        let categories: Vec<TimeCategoryConfig> =
            load_json(&storage, TIME_SETTINGS_KEY).unwrap_or_else(default_time_categories);
        info!(
            "Loaded {} time entries and {} categories",
            entries.len(),
            categories.len()
        );

        Self {
            storage,
            entries,
            categories,
        }
    }

    /// カテゴリと分数の組み合わせが記録可能か検証する。
    ///
    /// カテゴリの最小時間を先に判定し、その後で0以下を判定する。
    /// 両方に該当する場合は最小時間のエラーが返る。
    pub fn validate(&self, category: TimeCategory, minutes: i64) -> Result<(), TimeEntryError> {
        if let Some(config) = self.category_config(category) {
            if let Some(min_minutes) = config.min_minutes.filter(|min| *min > 0) {
                if minutes < min_minutes {
                    return Err(TimeEntryError::BelowMinimum {
                        label: config.label.clone(),
                        min_minutes,
                    });
                }
            }
        }
        if minutes <= 0 {
            return Err(TimeEntryError::NotPositive);
        }
        Ok(())
    }

    /// エントリーを検証して追加する。
    ///
    /// # Arguments
    ///
    /// * `entry` - 追加するエントリー。`id`と`created_at`はここで割り当てる
    pub fn add(&mut self, entry: NewTimeEntry) -> Result<TimeEntry, TimeEntryError> {
        if let Err(e) = self.validate(entry.category, entry.minutes) {
            warn!("Rejected time entry for {}: {}", entry.project_id, e);
            return Err(e);
        }

        let created = TimeEntry {
            id: new_entry_id(),
            project_id: entry.project_id,
            category: entry.category,
            kind: entry.kind,
            minutes: entry.minutes,
            date: entry.date,
            note: entry.note,
            source: entry.source,
            created_at: datetime::now(),
            updated_at: None,
        };
        info!(
            "Recorded {} minutes of {} for {}",
            created.minutes, created.category, created.project_id
        );
        self.entries.push(created.clone());
        self.persist_entries();

        Ok(created)
    }

    /// エントリーを部分更新する。
    ///
    /// 更新後のカテゴリと分数で検証し直す。指定の無いフィールドは既存の値を使う。
    pub fn update(&mut self, id: &str, update: TimeEntryUpdate) -> Result<TimeEntry, TimeEntryError> {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            warn!("Time entry {} not found", id);
            return Err(TimeEntryError::NotFound(id.to_string()));
        };

        let current = &self.entries[index];
        let category = update.category.unwrap_or(current.category);
        let minutes = update.minutes.unwrap_or(current.minutes);
        if let Err(e) = self.validate(category, minutes) {
            warn!("Rejected update of time entry {}: {}", id, e);
            return Err(e);
        }

        let entry = &mut self.entries[index];
        if let Some(project_id) = update.project_id {
            entry.project_id = project_id;
        }
        if let Some(kind) = update.kind {
            entry.kind = kind;
        }
        if let Some(date) = update.date {
            entry.date = date;
        }
        if let Some(note) = update.note {
            entry.note = note;
        }
        if let Some(source) = update.source {
            entry.source = source;
        }
        entry.category = category;
        entry.minutes = minutes;
        entry.updated_at = Some(datetime::now());
        let updated = entry.clone();

        self.persist_entries();
        Ok(updated)
    }

    /// エントリーを削除する。存在しないIDでも何もせずに戻る。
    pub fn remove(&mut self, id: &str) {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        if self.entries.len() != before {
            info!("Removed time entry {}", id);
        }
        self.persist_entries();
    }

    /// 案件の既定の移動時間で、移動の実績エントリーを作成する。
    pub fn add_travel_entry(
        &mut self,
        project: &Project,
        date: NaiveDate,
    ) -> Result<TimeEntry, TimeEntryError> {
        let minutes = project
            .travel_time_minutes
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| TimeEntryError::MissingTravelTime(project.id.clone()))?;

        self.add(NewTimeEntry {
            project_id: project.id.clone(),
            category: TimeCategory::Travel,
            kind: TimeEntryKind::Actual,
            minutes,
            date,
            note: None,
            source: TimeEntrySource::TravelDefault,
        })
    }

    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    pub fn entries_for_project(&self, project_id: &str) -> Vec<TimeEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn entries_for_project_by_kind(
        &self,
        project_id: &str,
        kind: TimeEntryKind,
    ) -> Vec<TimeEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.project_id == project_id && entry.kind == kind)
            .cloned()
            .collect()
    }

    /// 案件の集計を現在のエントリーから計算する。キャッシュはしない。
    pub fn summary(&self, project_id: &str) -> TimeSummary {
        summarize(&self.entries_for_project(project_id))
    }

    pub fn categories(&self) -> &[TimeCategoryConfig] {
        &self.categories
    }

    pub fn category_config(&self, category: TimeCategory) -> Option<&TimeCategoryConfig> {
        self.categories.iter().find(|config| config.key == category)
    }

    /// 表示色を返す。予定は実績の色を淡くしたものを使う。
    pub fn category_color(&self, category: TimeCategory, kind: TimeEntryKind) -> String {
        let Some(config) = self.category_config(category) else {
            return FALLBACK_COLOR.to_string();
        };
        match kind {
            TimeEntryKind::Actual => config.color.clone(),
            TimeEntryKind::Forecast => {
                forecast_color(&config.color).unwrap_or_else(|| config.color.clone())
            }
        }
    }

    /// カテゴリの色を変更する。
    pub fn update_category_color(&mut self, category: TimeCategory, color: &str) {
        for config in self.categories.iter_mut().filter(|c| c.key == category) {
            config.color = color.to_string();
        }
        self.persist_categories();
    }

    /// エントリーとカテゴリ設定を書き出す。
    pub fn flush(&self) {
        self.persist_entries();
        self.persist_categories();
    }

    fn persist_entries(&self) {
        save_json(&self.storage, TIME_ENTRIES_KEY, &self.entries);
    }

    fn persist_categories(&self) {
        save_json(&self.storage, TIME_SETTINGS_KEY, &self.categories);
    }
}

/// `te-`に続けて小文字のULIDを付けたIDを返す。同じミリ秒内でも重複しない。
fn new_entry_id() -> String {
    format!("te-{}", Ulid::new().to_string().to_lowercase())
}

/// `hsl(H S% L%)`を彩度-30(下限10)、明度+20(上限85)にした色を返す。
fn forecast_color(color: &str) -> Option<String> {
    let inner = color.trim().strip_prefix("hsl(")?.strip_suffix(')')?;
    let mut parts = inner.split_whitespace();
    let hue: u32 = parts.next()?.parse().ok()?;
    let saturation: i64 = parts.next()?.strip_suffix('%')?.parse().ok()?;
    let lightness: i64 = parts.next()?.strip_suffix('%')?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(format!(
        "hsl({} {}% {}%)",
        hue,
        (saturation - 30).max(10),
        (lightness + 20).min(85)
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{NaiveDate, TimeZone, Utc};
    use rstest::rstest;

    use super::{forecast_color, TimeEntryError, TimeEntryStore, TIME_ENTRIES_KEY, TIME_SETTINGS_KEY};
    use crate::datetime::mock_datetime;
    use crate::project::{Project, ProjectDraft};
    use crate::storage::{KeyValueStorage, MemoryStorage, MockKeyValueStorage, StorageError};
    use crate::time_entry::{
        NewTimeEntry, TimeCategory, TimeEntryKind, TimeEntrySource, TimeEntryUpdate,
    };

    fn new_store() -> TimeEntryStore<MemoryStorage> {
        TimeEntryStore::load(MemoryStorage::default())
    }

    /// テスト用の新規エントリーを作成する。
    fn new_entry(project_id: &str, category: TimeCategory, minutes: i64) -> NewTimeEntry {
        NewTimeEntry {
            project_id: project_id.to_string(),
            category,
            kind: TimeEntryKind::Actual,
            minutes,
            date: NaiveDate::from_ymd_opt(2024, 5, 21).unwrap(),
            note: None,
            source: TimeEntrySource::Manual,
        }
    }

    /// 0以下はカテゴリに関係なく拒否されることを確認する。
    #[rstest]
    #[case(TimeCategory::Travel, 0)]
    #[case(TimeCategory::Travel, -5)]
    #[case(TimeCategory::Other, 0)]
    #[case(TimeCategory::Admin, 0)]
    #[case(TimeCategory::Exec, -1)]
    fn test_validate_rejects_non_positive(#[case] category: TimeCategory, #[case] minutes: i64) {
        assert!(new_store().validate(category, minutes).is_err());
    }

    /// 床値のあるカテゴリでは、0以下でも床値のメッセージが優先されることを確認する。
    #[rstest]
    #[case::below_floor(TimeCategory::Admin, 29, "minimum duration for Administratif is 30 minutes")]
    #[case::zero_with_floor(TimeCategory::Exec, 0, "minimum duration for Dossier d'exécution is 30 minutes")]
    #[case::zero_without_floor(TimeCategory::Travel, 0, "duration must exceed 0")]
    fn test_validate_message_order(
        #[case] category: TimeCategory,
        #[case] minutes: i64,
        #[case] expected: &str,
    ) {
        let err = new_store().validate(category, minutes).unwrap_err();

        assert_eq!(err.to_string(), expected);
    }

    #[rstest]
    #[case(TimeCategory::Admin, 30)]
    #[case(TimeCategory::Exec, 90)]
    #[case(TimeCategory::Travel, 1)]
    #[case(TimeCategory::Other, 5)]
    fn test_validate_accepts(#[case] category: TimeCategory, #[case] minutes: i64) {
        assert_eq!(new_store().validate(category, minutes), Ok(()));
    }

    #[test]
    fn test_add_assigns_id_and_created_at() {
        let now = Utc.with_ymd_and_hms(2024, 5, 21, 10, 0, 0).unwrap();
        mock_datetime::set_mock_time(now);
        let mut store = new_store();

        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 45)).unwrap();

        assert!(entry.id.starts_with("te-"));
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.updated_at, None);
        assert_eq!(store.entries(), &[entry]);
    }

    /// 同じ入力で連続して追加してもIDが重複しないことを確認する。
    #[test]
    fn test_add_ids_never_collide() {
        mock_datetime::set_mock_time(Utc.with_ymd_and_hms(2024, 5, 21, 10, 0, 0).unwrap());
        let mut store = new_store();

        let ids: HashSet<String> = (0..100)
            .map(|_| store.add(new_entry("prj-1", TimeCategory::Other, 10)).unwrap().id)
            .collect();

        assert_eq!(ids.len(), 100);
    }

    /// 検証に失敗した場合は状態も保存データも変わらないことを確認する。
    #[test]
    fn test_add_invalid_does_not_mutate() {
        let mut store = new_store();

        let result = store.add(new_entry("prj-1", TimeCategory::Admin, 10));

        assert!(matches!(result, Err(TimeEntryError::BelowMinimum { min_minutes: 30, .. })));
        assert!(store.entries().is_empty());
        assert_eq!(store.storage.value(TIME_ENTRIES_KEY), None);
    }

    #[test]
    fn test_update_unknown_id() {
        let mut store = new_store();

        let result = store.update("te-missing", TimeEntryUpdate::default());

        assert_eq!(result, Err(TimeEntryError::NotFound("te-missing".to_string())));
    }

    /// カテゴリだけを変えた場合も、既存の分数で再検証されることを確認する。
    #[test]
    fn test_update_revalidates_with_effective_values() {
        let mut store = new_store();
        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 20)).unwrap();

        let result = store.update(
            &entry.id,
            TimeEntryUpdate {
                category: Some(TimeCategory::Admin),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(TimeEntryError::BelowMinimum { .. })));
        assert_eq!(store.entries()[0].category, TimeCategory::Travel);
        assert_eq!(store.entries()[0].updated_at, None);
    }

    #[test]
    fn test_update_merges_fields() {
        let created_at = Utc.with_ymd_and_hms(2024, 5, 21, 10, 0, 0).unwrap();
        mock_datetime::set_mock_time(created_at);
        let mut store = new_store();
        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 20)).unwrap();
        mock_datetime::advance_seconds(3600);

        let updated = store
            .update(
                &entry.id,
                TimeEntryUpdate {
                    category: Some(TimeCategory::Admin),
                    minutes: Some(45),
                    note: Some(Some("réunion chantier".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.category, TimeCategory::Admin);
        assert_eq!(updated.minutes, 45);
        assert_eq!(updated.note.as_deref(), Some("réunion chantier"));
        assert_eq!(updated.created_at, created_at);
        assert_eq!(updated.updated_at, Some(created_at + chrono::Duration::hours(1)));
        assert_eq!(store.entries(), &[updated]);
    }

    /// 存在しないIDの削除は何もしないことを確認する。
    #[test]
    fn test_remove_is_idempotent() {
        let mut store = new_store();
        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 20)).unwrap();

        store.remove(&entry.id);
        store.remove(&entry.id);
        store.remove("te-missing");

        assert!(store.entries().is_empty());
    }

    #[test]
    fn test_queries_filter_by_project_and_kind() {
        let mut store = new_store();
        store.add(new_entry("prj-1", TimeCategory::Travel, 20)).unwrap();
        store.add(new_entry("prj-2", TimeCategory::Travel, 30)).unwrap();
        let mut forecast = new_entry("prj-1", TimeCategory::Exec, 120);
        forecast.kind = TimeEntryKind::Forecast;
        store.add(forecast).unwrap();

        assert_eq!(store.entries_for_project("prj-1").len(), 2);
        assert_eq!(
            store
                .entries_for_project_by_kind("prj-1", TimeEntryKind::Forecast)
                .iter()
                .map(|e| e.minutes)
                .collect::<Vec<_>>(),
            vec![120]
        );
        assert!(store.entries_for_project("prj-3").is_empty());
    }

    /// 変更のたびに集計が再計算されることを確認する。
    #[test]
    fn test_summary_reflects_current_entries() {
        let mut store = new_store();
        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 20)).unwrap();
        store.add(new_entry("prj-2", TimeCategory::Travel, 30)).unwrap();
        assert_eq!(store.summary("prj-1").total_actual, 20);

        store
            .update(
                &entry.id,
                TimeEntryUpdate {
                    minutes: Some(50),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.summary("prj-1").total_actual, 50);

        store.remove(&entry.id);
        assert_eq!(store.summary("prj-1").total_actual, 0);
    }

    /// 保存したエントリーが再読み込みで復元されることを確認する。
    #[test]
    fn test_entries_survive_reload() {
        let mut store = new_store();
        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 20)).unwrap();
        let stored = store.storage.value(TIME_ENTRIES_KEY).unwrap();

        let reloaded = TimeEntryStore::load(MemoryStorage::with_value(TIME_ENTRIES_KEY, &stored));

        assert_eq!(reloaded.entries(), &[entry]);
    }

    /// 色の変更は`flush`を呼ばなくても保存されることを確認する。
    #[test]
    fn test_category_color_survives_reload_without_flush() {
        let mut store = new_store();
        store.update_category_color(TimeCategory::Exec, "hsl(100 50% 40%)");
        let stored = store.storage.value(TIME_SETTINGS_KEY).unwrap();

        let reloaded = TimeEntryStore::load(MemoryStorage::with_value(TIME_SETTINGS_KEY, &stored));

        assert_eq!(
            reloaded.category_color(TimeCategory::Exec, TimeEntryKind::Actual),
            "hsl(100 50% 40%)"
        );
    }

    /// 壊れた保存データからは空のエントリーと既定のカテゴリで始まることを確認する。
    #[test]
    fn test_load_falls_back_on_corrupt_data() {
        let storage = MemoryStorage::with_value(TIME_ENTRIES_KEY, "[{\"id\":");
        storage.set(TIME_SETTINGS_KEY, "not json").unwrap();

        let store = TimeEntryStore::load(storage);

        assert!(store.entries().is_empty());
        assert_eq!(store.categories().len(), 4);
        assert_eq!(
            store.category_config(TimeCategory::Admin).unwrap().min_minutes,
            Some(30)
        );
    }

    /// 保存に失敗してもメモリ上の変更は有効なことを確認する。
    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let mut storage = MockKeyValueStorage::new();
        storage.expect_get().returning(|_| Ok(None));
        storage.expect_set().returning(|key, _| {
            Err(StorageError::Write {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded"),
            })
        });
        let mut store = TimeEntryStore::load(storage);

        let entry = store.add(new_entry("prj-1", TimeCategory::Travel, 20));

        assert!(entry.is_ok());
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_add_travel_entry() {
        let mut store = new_store();
        let mut project = Project::from_draft(ProjectDraft::named("Alpha"));
        let date = NaiveDate::from_ymd_opt(2024, 5, 21).unwrap();

        assert_eq!(
            store.add_travel_entry(&project, date),
            Err(TimeEntryError::MissingTravelTime(project.id.clone()))
        );

        project.travel_time_minutes = Some(40);
        let entry = store.add_travel_entry(&project, date).unwrap();

        assert_eq!(entry.category, TimeCategory::Travel);
        assert_eq!(entry.source, TimeEntrySource::TravelDefault);
        assert_eq!(entry.kind, TimeEntryKind::Actual);
        assert_eq!(entry.minutes, 40);
    }

    #[rstest]
    #[case::regular("hsl(280 60% 55%)", Some("hsl(280 30% 75%)"))]
    #[case::floors_saturation("hsl(10 20% 50%)", Some("hsl(10 10% 70%)"))]
    #[case::caps_lightness("hsl(45 80% 70%)", Some("hsl(45 50% 85%)"))]
    #[case::not_hsl("#ff0000", None)]
    #[case::malformed("hsl(10, 20%, 30%)", None)]
    fn test_forecast_color(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(forecast_color(input).as_deref(), expected);
    }

    #[test]
    fn test_category_color_by_kind() {
        let mut store = new_store();

        assert_eq!(
            store.category_color(TimeCategory::Travel, TimeEntryKind::Actual),
            "hsl(200 70% 50%)"
        );
        assert_eq!(
            store.category_color(TimeCategory::Travel, TimeEntryKind::Forecast),
            "hsl(200 40% 70%)"
        );

        store.update_category_color(TimeCategory::Travel, "#123456");
        assert_eq!(
            store.category_color(TimeCategory::Travel, TimeEntryKind::Forecast),
            "#123456"
        );
        assert!(store
            .storage
            .value(TIME_SETTINGS_KEY)
            .unwrap()
            .contains("#123456"));
    }
}
