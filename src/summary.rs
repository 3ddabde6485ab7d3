use std::collections::BTreeMap;

use crate::time_entry::{TimeCategory, TimeEntry, TimeEntryKind};

/// カテゴリ単位の実績・予定の合計(分)。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CategoryTotals {
    pub actual: i64,
    pub forecast: i64,
}

/// エントリー集合から導出される集計結果。保存はしない。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeSummary {
    pub total_actual: i64,
    pub total_forecast: i64,
    pub by_category: BTreeMap<TimeCategory, CategoryTotals>,
}

impl Default for TimeSummary {
    fn default() -> Self {
        Self {
            total_actual: 0,
            total_forecast: 0,
            by_category: TimeCategory::ALL
                .iter()
                .map(|category| (*category, CategoryTotals::default()))
                .collect(),
        }
    }
}

impl TimeSummary {
    /// カテゴリの合計を返す。
    pub fn category(&self, category: TimeCategory) -> CategoryTotals {
        self.by_category.get(&category).copied().unwrap_or_default()
    }
}

/// エントリーを実績・予定、さらにカテゴリごとに集計する。
///
/// プロジェクトでの絞り込みは呼び出し側で行う。与えられたスライスをそのまま集計するので、
/// 並び順に依存しない。
pub fn summarize(entries: &[TimeEntry]) -> TimeSummary {
    entries
        .iter()
        .fold(TimeSummary::default(), |mut summary, entry| {
            let totals = summary.by_category.entry(entry.category).or_default();
            match entry.kind {
                TimeEntryKind::Actual => {
                    summary.total_actual += entry.minutes;
                    totals.actual += entry.minutes;
                }
                TimeEntryKind::Forecast => {
                    summary.total_forecast += entry.minutes;
                    totals.forecast += entry.minutes;
                }
            }
            summary
        })
}
