use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::time_entry::ParseValueError;

/// 取り込み先の正規化されたフィールド。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MappedField {
    Planif,
    Name,
    SharepointLink,
    Status,
    Ntrk,
    Priority,
    DateVt,
    DateLtrk,
    DateGc,
    DateMontage,
    DateGrutage,
    Stt,
    Comments,
    CmdStt,
    CmdEngins,
    DateMer,
    LastModified,
    Owner,
    Commercial,
    ProjectManager,
    Amount,
    Feeling,
}

impl MappedField {
    pub const ALL: [MappedField; 22] = [
        MappedField::Planif,
        MappedField::Name,
        MappedField::SharepointLink,
        MappedField::Status,
        MappedField::Ntrk,
        MappedField::Priority,
        MappedField::DateVt,
        MappedField::DateLtrk,
        MappedField::DateGc,
        MappedField::DateMontage,
        MappedField::DateGrutage,
        MappedField::Stt,
        MappedField::Comments,
        MappedField::CmdStt,
        MappedField::CmdEngins,
        MappedField::DateMer,
        MappedField::LastModified,
        MappedField::Owner,
        MappedField::Commercial,
        MappedField::ProjectManager,
        MappedField::Amount,
        MappedField::Feeling,
    ];

    /// フィールドのキー名を返す。取り込み結果の`field`にもこの名前を使う。
    pub fn key(&self) -> &'static str {
        match self {
            MappedField::Planif => "planif",
            MappedField::Name => "name",
            MappedField::SharepointLink => "sharepointLink",
            MappedField::Status => "status",
            MappedField::Ntrk => "ntrk",
            MappedField::Priority => "priority",
            MappedField::DateVt => "dateVT",
            MappedField::DateLtrk => "dateLTRK",
            MappedField::DateGc => "dateGC",
            MappedField::DateMontage => "dateMontage",
            MappedField::DateGrutage => "dateGrutage",
            MappedField::Stt => "stt",
            MappedField::Comments => "comments",
            MappedField::CmdStt => "cmdSTT",
            MappedField::CmdEngins => "cmdEngins",
            MappedField::DateMer => "dateMER",
            MappedField::LastModified => "lastModified",
            MappedField::Owner => "owner",
            MappedField::Commercial => "commercial",
            MappedField::ProjectManager => "projectManager",
            MappedField::Amount => "amount",
            MappedField::Feeling => "feeling",
        }
    }
}

impl FromStr for MappedField {
    type Err = ParseValueError;

    /// キー名を大文字小文字を区別せずに解釈する。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MappedField::ALL
            .iter()
            .find(|field| field.key().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ParseValueError::new("column field", s))
    }
}

/// よく使われるヘッダー名(小文字)からフィールドへの対応表。
static HEADER_SYNONYMS: Lazy<HashMap<&'static str, MappedField>> = Lazy::new(|| {
    HashMap::from([
        ("planif", MappedField::Planif),
        ("nom du projet", MappedField::Name),
        ("nom", MappedField::Name),
        ("name", MappedField::Name),
        ("lien sharepoint", MappedField::SharepointLink),
        ("sharepoint", MappedField::SharepointLink),
        ("état", MappedField::Status),
        ("etat", MappedField::Status),
        ("status", MappedField::Status),
        ("n trk", MappedField::Ntrk),
        ("ntrk", MappedField::Ntrk),
        ("priorité", MappedField::Priority),
        ("priorite", MappedField::Priority),
        ("priority", MappedField::Priority),
        ("date vt", MappedField::DateVt),
        ("date l.trk", MappedField::DateLtrk),
        ("dates gc", MappedField::DateGc),
        ("date gc", MappedField::DateGc),
        ("date montage", MappedField::DateMontage),
        ("date grutage", MappedField::DateGrutage),
        ("stt", MappedField::Stt),
        ("commentaire", MappedField::Comments),
        ("comments", MappedField::Comments),
        ("cmd stt", MappedField::CmdStt),
        ("cmd engins", MappedField::CmdEngins),
        ("date mer", MappedField::DateMer),
        ("dernière modification", MappedField::LastModified),
        ("derniere modification", MappedField::LastModified),
        ("propriétaire", MappedField::Owner),
        ("proprietaire", MappedField::Owner),
        ("commercial", MappedField::Commercial),
        ("chef de projet", MappedField::ProjectManager),
        ("montant", MappedField::Amount),
        ("ressenti", MappedField::Feeling),
    ])
});

/// フィールドごとに選ばれた元CSVのヘッダー。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: BTreeMap<MappedField, String>,
}

impl ColumnMapping {
    pub fn get(&self, field: MappedField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    /// フィールドの対応を上書きする。
    pub fn set(&mut self, field: MappedField, header: &str) {
        self.columns.insert(field, header.to_string());
    }

    pub fn clear(&mut self, field: MappedField) {
        self.columns.remove(&field);
    }

    /// 対応付け済みのフィールドをフィールド順に返す。
    pub fn iter(&self) -> impl Iterator<Item = (MappedField, &str)> {
        self.columns.iter().map(|(field, header)| (*field, header.as_str()))
    }
}

/// ヘッダー名から対応表を使って自動で対応付ける。
///
/// 同じフィールドに複数のヘッダーが該当する場合は先に現れたものを採用する。
/// 対応表に無いヘッダーは無視する。
pub fn auto_map(headers: &[String]) -> ColumnMapping {
    headers
        .iter()
        .fold(ColumnMapping::default(), |mut mapping, header| {
            let normalized = header.trim().to_lowercase();
            if let Some(field) = HEADER_SYNONYMS.get(normalized.as_str()) {
                mapping.columns.entry(*field).or_insert_with(|| header.clone());
            }
            mapping
        })
}
