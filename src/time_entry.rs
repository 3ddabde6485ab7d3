use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 作業時間のカテゴリ。
///
/// 保存形式はダッシュボードの既存データに合わせて`TRAJET`/`AUTRE`などのトークンを使う。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeCategory {
    #[serde(rename = "TRAJET")]
    Travel,
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "EXEC")]
    Exec,
    #[serde(rename = "AUTRE")]
    Other,
}

impl TimeCategory {
    pub const ALL: [TimeCategory; 4] = [
        TimeCategory::Travel,
        TimeCategory::Admin,
        TimeCategory::Exec,
        TimeCategory::Other,
    ];

    /// 保存形式のトークンを返す。
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeCategory::Travel => "TRAJET",
            TimeCategory::Admin => "ADMIN",
            TimeCategory::Exec => "EXEC",
            TimeCategory::Other => "AUTRE",
        }
    }

    /// 画面表示用のラベルを返す。
    pub fn label(&self) -> &'static str {
        match self {
            TimeCategory::Travel => "Trajet",
            TimeCategory::Admin => "Administratif",
            TimeCategory::Exec => "Dossier d'exécution",
            TimeCategory::Other => "Autre",
        }
    }
}

impl fmt::Display for TimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 文字列から列挙値への変換に失敗した時のエラー。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseValueError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseValueError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for TimeCategory {
    type Err = ParseValueError;

    /// 保存形式のトークンと英語名のどちらも受け付ける。大文字小文字は区別しない。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRAJET" | "TRAVEL" => Ok(TimeCategory::Travel),
            "ADMIN" => Ok(TimeCategory::Admin),
            "EXEC" => Ok(TimeCategory::Exec),
            "AUTRE" | "OTHER" => Ok(TimeCategory::Other),
            _ => Err(ParseValueError::new("time category", s)),
        }
    }
}

/// 実績か予定か。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeEntryKind {
    Actual,
    Forecast,
}

impl FromStr for TimeEntryKind {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTUAL" => Ok(TimeEntryKind::Actual),
            "FORECAST" => Ok(TimeEntryKind::Forecast),
            _ => Err(ParseValueError::new("time entry kind", s)),
        }
    }
}

/// エントリーの作成元。記録用であり検証には使わない。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeEntrySource {
    Timer,
    Manual,
    TravelDefault,
    Calendar,
}

/// プロジェクトに対して記録された作業時間。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub project_id: String,
    pub category: TimeCategory,
    pub kind: TimeEntryKind,
    pub minutes: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub source: TimeEntrySource,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// 新規作成時の入力。`id`と`created_at`はストアが割り当てる。
#[derive(Clone, Debug, PartialEq)]
pub struct NewTimeEntry {
    pub project_id: String,
    pub category: TimeCategory,
    pub kind: TimeEntryKind,
    pub minutes: i64,
    pub date: NaiveDate,
    pub note: Option<String>,
    pub source: TimeEntrySource,
}

/// 部分更新の入力。`None`のフィールドは既存の値を保つ。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeEntryUpdate {
    pub project_id: Option<String>,
    pub category: Option<TimeCategory>,
    pub kind: Option<TimeEntryKind>,
    pub minutes: Option<i64>,
    pub date: Option<NaiveDate>,
    /// `Some(None)`でノートを消す。
    pub note: Option<Option<String>>,
    pub source: Option<TimeEntrySource>,
}

/// カテゴリごとの設定。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeCategoryConfig {
    pub key: TimeCategory,
    pub label: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_minutes: Option<i64>,
}

/// 初期状態のカテゴリ設定を返す。ADMINとEXECは30分未満を受け付けない。
pub fn default_time_categories() -> Vec<TimeCategoryConfig> {
    let config = |key: TimeCategory, color: &str, min_minutes: Option<i64>| TimeCategoryConfig {
        key,
        label: key.label().to_string(),
        color: color.to_string(),
        min_minutes,
    };

    vec![
        config(TimeCategory::Travel, "hsl(200 70% 50%)", None),
        config(TimeCategory::Admin, "hsl(280 60% 55%)", Some(30)),
        config(TimeCategory::Exec, "hsl(142 60% 45%)", Some(30)),
        config(TimeCategory::Other, "hsl(45 80% 50%)", None),
    ]
}

/// 分を`1h05`のような表示用文字列にする。
pub fn format_minutes_to_display(minutes: i64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if hours == 0 {
        return format!("{}min", mins);
    }
    if mins == 0 {
        return format!("{}h", hours);
    }
    format!("{}h{:02}", hours, mins)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::{default_time_categories, format_minutes_to_display, TimeCategory, TimeEntry};

    #[rstest]
    #[case::minutes_only(45, "45min")]
    #[case::zero(0, "0min")]
    #[case::whole_hours(120, "2h")]
    #[case::hours_and_minutes(65, "1h05")]
    #[case::long(605, "10h05")]
    fn test_format_minutes_to_display(#[case] minutes: i64, #[case] expected: &str) {
        assert_eq!(format_minutes_to_display(minutes), expected);
    }

    #[rstest]
    #[case("TRAJET", TimeCategory::Travel)]
    #[case("travel", TimeCategory::Travel)]
    #[case(" admin ", TimeCategory::Admin)]
    #[case("Exec", TimeCategory::Exec)]
    #[case("autre", TimeCategory::Other)]
    #[case("OTHER", TimeCategory::Other)]
    fn test_category_from_str(#[case] input: &str, #[case] expected: TimeCategory) {
        assert_eq!(TimeCategory::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_category_from_str_unknown() {
        let err = TimeCategory::from_str("lunch").unwrap_err();
        assert_eq!(err.to_string(), "unknown time category: lunch");
    }

    /// 床値を持つのはADMINとEXECだけであることを確認する。
    #[test]
    fn test_default_categories_floors() {
        let floors: Vec<_> = default_time_categories()
            .into_iter()
            .map(|config| (config.key, config.min_minutes))
            .collect();

        assert_eq!(
            floors,
            vec![
                (TimeCategory::Travel, None),
                (TimeCategory::Admin, Some(30)),
                (TimeCategory::Exec, Some(30)),
                (TimeCategory::Other, None),
            ]
        );
    }

    /// 既存ダッシュボードが保存したJSONを読み込めることを確認する。
    #[test]
    fn test_deserialize_stored_entry() {
        let json = r#"{
            "id": "te-1716300000000",
            "projectId": "1716299999999",
            "category": "TRAJET",
            "kind": "ACTUAL",
            "minutes": 45,
            "date": "2024-05-21",
            "createdAt": "2024-05-21T14:00:00.000Z",
            "source": "TRAVEL_DEFAULT"
        }"#;

        let entry: TimeEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.category, TimeCategory::Travel);
        assert_eq!(entry.minutes, 45);
        assert_eq!(entry.note, None);
        assert_eq!(entry.updated_at, None);
    }
}
