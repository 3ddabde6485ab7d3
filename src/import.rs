use std::collections::HashMap;

use chrono::NaiveDate;
use log::debug;
use once_cell::sync::Lazy;

use crate::column_mapping::{ColumnMapping, MappedField};
use crate::project::{Milestone, MilestoneType, ProjectDraft, ProjectPriority, ProjectStatus};

/// 日付範囲の区切りとして扱う文字列。この順に試す。
const RANGE_SEPARATORS: [&str; 4] = ["→", "->", " - ", " au "];

/// ヘッダー行の分と1始まりの分を足した、報告用の行番号のずれ。
const ROW_NUMBER_OFFSET: usize = 2;

/// マイルストーンと、その日付を持つ列の対応。
const MILESTONE_FIELDS: [(MilestoneType, MappedField); 6] = [
    (MilestoneType::Vt, MappedField::DateVt),
    (MilestoneType::Ltrk, MappedField::DateLtrk),
    (MilestoneType::Gc, MappedField::DateGc),
    (MilestoneType::Montage, MappedField::DateMontage),
    (MilestoneType::Grutage, MappedField::DateGrutage),
    (MilestoneType::Mer, MappedField::DateMer),
];

static STATUS_SYNONYMS: Lazy<HashMap<&'static str, ProjectStatus>> = Lazy::new(|| {
    HashMap::from([
        ("stand-by", ProjectStatus::Standby),
        ("standby", ProjectStatus::Standby),
        ("attente dp", ProjectStatus::AttenteDp),
        ("attente-dp", ProjectStatus::AttenteDp),
        ("vt", ProjectStatus::Vt),
        ("doe", ProjectStatus::Doe),
        ("en cours", ProjectStatus::EnCours),
        ("en-cours", ProjectStatus::EnCours),
        ("gc", ProjectStatus::Gc),
        ("pré-sav", ProjectStatus::PreSav),
        ("pre-sav", ProjectStatus::PreSav),
        ("cat", ProjectStatus::Cat),
        ("factu", ProjectStatus::Factu),
        ("consuel", ProjectStatus::Consuel),
        ("enedis", ProjectStatus::Enedis),
        ("enedis warn", ProjectStatus::Enedis),
        ("terminé", ProjectStatus::Termine),
        ("termine", ProjectStatus::Termine),
    ])
});

static PRIORITY_SYNONYMS: Lazy<HashMap<&'static str, ProjectPriority>> = Lazy::new(|| {
    HashMap::from([
        ("basse", ProjectPriority::Low),
        ("low", ProjectPriority::Low),
        ("moyenne", ProjectPriority::Medium),
        ("medium", ProjectPriority::Medium),
        ("haute", ProjectPriority::High),
        ("high", ProjectPriority::High),
        ("très haute", ProjectPriority::VeryHigh),
        ("very-high", ProjectPriority::VeryHigh),
        // 旧データの独自ラベル
        ("pik zoizo", ProjectPriority::High),
    ])
});

/// 取り込み時に見つかった問題。エラーなら行は取り込まれず、警告なら既定値で取り込まれる。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub row: usize,
    pub field: String,
    pub value: String,
    pub message: String,
}

/// 取り込みの結果。ストアへの反映は呼び出し側が別に行う。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub records: Vec<ProjectDraft>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// CSVの行を案件の下書きに変換する。
///
/// 名前が無い行はエラーとして飛ばす。ステータスと優先度が読めない場合は警告を出して
/// 既定値で取り込む。空欄と読めない日付は何も報告せずに既定値とする。
///
/// # Arguments
///
/// * `rows` - ヘッダーを除いたCSVの行
/// * `headers` - CSVのヘッダー
/// * `mapping` - フィールドとヘッダーの対応
pub fn validate(rows: &[Vec<String>], headers: &[String], mapping: &ColumnMapping) -> ImportResult {
    let columns = ColumnLookup { headers, mapping };
    let mut result = ImportResult::default();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + ROW_NUMBER_OFFSET;

        let name = columns.cell(row, MappedField::Name).map(str::trim).unwrap_or("");
        if name.is_empty() {
            debug!("Skipping row {}: missing name", row_number);
            result.errors.push(ValidationIssue {
                row: row_number,
                field: MappedField::Name.key().to_string(),
                value: String::new(),
                message: "project name is required".to_string(),
            });
            continue;
        }

        let status_value = columns.cell(row, MappedField::Status).unwrap_or("");
        let status = match lookup(&STATUS_SYNONYMS, status_value) {
            Some(status) => status,
            None => {
                if !status_value.trim().is_empty() {
                    result.warnings.push(ValidationIssue {
                        row: row_number,
                        field: MappedField::Status.key().to_string(),
                        value: status_value.to_string(),
                        message: format!(
                            "unrecognized status \"{}\", set to \"standby\"",
                            status_value
                        ),
                    });
                }
                ProjectStatus::Standby
            }
        };

        let priority_value = columns.cell(row, MappedField::Priority).unwrap_or("");
        let priority = match lookup(&PRIORITY_SYNONYMS, priority_value) {
            Some(priority) => priority,
            None => {
                if !priority_value.trim().is_empty() {
                    result.warnings.push(ValidationIssue {
                        row: row_number,
                        field: MappedField::Priority.key().to_string(),
                        value: priority_value.to_string(),
                        message: format!(
                            "unrecognized priority \"{}\", set to \"medium\"",
                            priority_value
                        ),
                    });
                }
                ProjectPriority::Medium
            }
        };

        let milestones = MILESTONE_FIELDS
            .iter()
            .map(|(kind, field)| {
                let (start_date, end_date) =
                    parse_date_range(columns.cell(row, *field).unwrap_or(""));
                Milestone {
                    kind: *kind,
                    start_date,
                    end_date,
                    completed: false,
                }
            })
            .collect();

        let stt = columns
            .index(MappedField::Stt)
            .map(|i| parse_stt(row.get(i).map(String::as_str).unwrap_or("")));

        result.records.push(ProjectDraft {
            name: name.to_string(),
            sharepoint_link: columns.text(row, MappedField::SharepointLink),
            status,
            priority,
            ntrk: columns.text(row, MappedField::Ntrk),
            stt,
            comments: columns.text(row, MappedField::Comments),
            milestones,
        });
    }

    result
}

/// フィールドから行内の値を引く。列の足りない行でも範囲外にはならない。
struct ColumnLookup<'a> {
    headers: &'a [String],
    mapping: &'a ColumnMapping,
}

impl<'a> ColumnLookup<'a> {
    /// 対応付けられたヘッダーの位置。同名のヘッダーが複数あれば最初のもの。
    fn index(&self, field: MappedField) -> Option<usize> {
        let header = self.mapping.get(field)?;
        self.headers.iter().position(|h| h == header)
    }

    fn cell<'r>(&self, row: &'r [String], field: MappedField) -> Option<&'r str> {
        self.index(field)
            .and_then(|i| row.get(i))
            .map(String::as_str)
    }

    /// 前後の空白を除いた値。空なら`None`。
    fn text(&self, row: &[String], field: MappedField) -> Option<String> {
        self.cell(row, field)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

fn lookup<T: Copy>(table: &HashMap<&'static str, T>, value: &str) -> Option<T> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    table.get(normalized.as_str()).copied()
}

/// 区切りで2つに分かれる場合はその2つを返す。
fn split_range(value: &str) -> Option<(&str, &str)> {
    RANGE_SEPARATORS.iter().find_map(|separator| {
        let parts: Vec<&str> = value.split(separator).collect();
        match parts.as_slice() {
            [start, end] => Some((start.trim(), end.trim())),
            _ => None,
        }
    })
}

/// 単独の日付または日付範囲を開始日と終了日に分ける。
fn parse_date_range(value: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
    if value.trim().is_empty() {
        return (None, None);
    }
    match split_range(value) {
        Some((start, end)) => (parse_date(start), parse_date(end)),
        None => (parse_date(value), None),
    }
}

/// `DD/MM/YYYY`か`YYYY-MM-DD`を日付にする。範囲なら開始日を返す。
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some((start, _)) = split_range(value) {
        return parse_date(start);
    }

    parse_day_month_year(value).or_else(|| parse_iso_date(value))
}

fn parse_day_month_year(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };
    if !is_digits(day, 1..=2) || !is_digits(month, 1..=2) || !is_digits(year, 4..=4) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return None;
    };
    if !is_digits(year, 4..=4) || !is_digits(month, 2..=2) || !is_digits(day, 2..=2) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn is_digits(value: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&value.len()) && value.chars().all(|c| c.is_ascii_digit())
}

/// STTを`,`か`;`で分割する。
fn parse_stt(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
