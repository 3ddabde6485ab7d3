use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::project::{Milestone, MilestoneType, Project};

const EXPORT_HEADERS: [&str; 13] = [
    "Nom du projet",
    "Lien Sharepoint",
    "État",
    "n TRK",
    "Priorité",
    "STT",
    "Commentaire",
    "Date VT",
    "Date L.TRK",
    "Dates GC",
    "Date Montage",
    "Date Grutage",
    "Date MER",
];

const BOM: &str = "\u{FEFF}";

/// 案件一覧を取り込みと同じ列構成のCSVにする。
///
/// 自由入力の値だけをクォートし、ステータスと優先度は表示ラベルで出力する。
pub fn export_to_csv(projects: &[Project]) -> String {
    let mut lines = vec![EXPORT_HEADERS.join(",")];

    lines.extend(projects.iter().map(|project| {
        let draft = &project.draft;
        let stt = draft.stt.as_ref().map(|stt| stt.join(", "));
        let mut cells = vec![
            escape_csv(Some(draft.name.as_str())),
            escape_csv(draft.sharepoint_link.as_deref()),
            draft.status.label().to_string(),
            escape_csv(draft.ntrk.as_deref()),
            draft.priority.label().to_string(),
            escape_csv(stt.as_deref()),
            escape_csv(draft.comments.as_deref()),
        ];
        cells.extend(
            MilestoneType::ALL
                .iter()
                .map(|kind| format_milestone(draft.milestone(*kind))),
        );
        cells.join(",")
    }));

    lines.join("\n")
}

/// BOM付きのUTF-8でCSVを書き出す。
pub fn write_csv(path: &Path, content: &str) -> Result<()> {
    fs::write(path, format!("{}{}", BOM, content))
        .with_context(|| format!("Failed to write CSV to {}", path.display()))
}

/// カンマ、ダブルクォート、改行を含む値をクォートする。
fn escape_csv(value: Option<&str>) -> String {
    match value {
        None | Some("") => String::new(),
        Some(value) if value.contains([',', '"', '\n']) => {
            format!("\"{}\"", value.replace('"', "\"\""))
        }
        Some(value) => value.to_string(),
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

fn format_milestone(milestone: Option<&Milestone>) -> String {
    match milestone {
        Some(Milestone {
            start_date: Some(start),
            end_date: Some(end),
            ..
        }) => format!("{} → {}", format_date(Some(*start)), format_date(Some(*end))),
        Some(milestone) => format_date(milestone.start_date),
        None => String::new(),
    }
}
