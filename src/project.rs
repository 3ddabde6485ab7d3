use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::datetime;
use crate::storage::{load_json, save_json, KeyValueStorage};

/// プロジェクト一覧を保存するキー。
pub const PROJECTS_KEY: &str = "affaires-projects";

/// 案件のステータス。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Standby,
    AttenteDp,
    Vt,
    Doe,
    EnCours,
    Gc,
    PreSav,
    Cat,
    Factu,
    Consuel,
    Enedis,
    Termine,
}

impl ProjectStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Standby => "Stand-by",
            ProjectStatus::AttenteDp => "Attente DP",
            ProjectStatus::Vt => "VT",
            ProjectStatus::Doe => "DOE",
            ProjectStatus::EnCours => "En cours",
            ProjectStatus::Gc => "GC",
            ProjectStatus::PreSav => "Pré-SAV",
            ProjectStatus::Cat => "CAT",
            ProjectStatus::Factu => "Factu",
            ProjectStatus::Consuel => "Consuel",
            ProjectStatus::Enedis => "Enedis",
            ProjectStatus::Termine => "Terminé",
        }
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Standby
    }
}

/// 案件の優先度。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectPriority {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ProjectPriority {
    pub fn label(&self) -> &'static str {
        match self {
            ProjectPriority::Low => "Basse",
            ProjectPriority::Medium => "Moyenne",
            ProjectPriority::High => "Haute",
            ProjectPriority::VeryHigh => "Très haute",
        }
    }
}

impl Default for ProjectPriority {
    fn default() -> Self {
        ProjectPriority::Medium
    }
}

/// 6つの固定マイルストーン。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneType {
    Vt,
    Ltrk,
    Gc,
    Montage,
    Grutage,
    Mer,
}

impl MilestoneType {
    /// 表示・出力の順序。
    pub const ALL: [MilestoneType; 6] = [
        MilestoneType::Vt,
        MilestoneType::Ltrk,
        MilestoneType::Gc,
        MilestoneType::Montage,
        MilestoneType::Grutage,
        MilestoneType::Mer,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MilestoneType::Vt => "VT",
            MilestoneType::Ltrk => "LTRK",
            MilestoneType::Gc => "GC",
            MilestoneType::Montage => "Montage",
            MilestoneType::Grutage => "Grutage",
            MilestoneType::Mer => "MER",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(rename = "type")]
    pub kind: MilestoneType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub completed: bool,
}

impl Milestone {
    /// 日付の無い未完了のマイルストーンを返す。
    pub fn empty(kind: MilestoneType) -> Self {
        Self {
            kind,
            start_date: None,
            end_date: None,
            completed: false,
        }
    }
}

/// 取り込み直後の、まだIDを持たない案件。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharepoint_link: Option<String>,
    pub status: ProjectStatus,
    pub priority: ProjectPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntrk: Option<String>,
    /// 列が無かった場合は`None`、空で取り込んだ場合は空のVec。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stt: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub milestones: Vec<Milestone>,
}

impl ProjectDraft {
    /// 名前だけを持つ案件を返す。マイルストーンは6つとも空で揃える。
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sharepoint_link: None,
            status: ProjectStatus::default(),
            priority: ProjectPriority::default(),
            ntrk: None,
            stt: None,
            comments: None,
            milestones: MilestoneType::ALL.iter().map(|kind| Milestone::empty(*kind)).collect(),
        }
    }

    pub fn milestone(&self, kind: MilestoneType) -> Option<&Milestone> {
        self.milestones.iter().find(|milestone| milestone.kind == kind)
    }
}

/// 保存済みの案件。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(flatten)]
    pub draft: ProjectDraft,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// 下書きに新しいIDを割り当てて案件にする。
    pub fn from_draft(draft: ProjectDraft) -> Self {
        let now = datetime::now();
        Self {
            id: format!("prj-{}", Ulid::new().to_string().to_lowercase()),
            draft,
            address: None,
            travel_time_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.draft.name
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.draft.name, self.id)
    }
}

/// 案件一覧を保持するストア。
///
/// 時間管理と取り込みの両方から参照されるが、どちらもこのストアを所有しない。
pub struct ProjectStore<S: KeyValueStorage> {
    storage: S,
    projects: Vec<Project>,
}

impl<S: KeyValueStorage> ProjectStore<S> {
    /// ストレージから案件一覧を読み込む。データが無ければ空で始める。
    pub fn load(storage: S) -> Self {
        let projects: Vec<Project> = load_json(&storage, PROJECTS_KEY).unwrap_or_default();
        info!("Loaded {} projects", projects.len());
        Self { storage, projects }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn get_project_by_id(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|project| project.id == id)
    }

    /// 下書きから案件を作成して追加する。
    pub fn add_project(&mut self, draft: ProjectDraft) -> Project {
        let project = Project::from_draft(draft);
        self.projects.push(project.clone());
        self.persist();
        project
    }

    /// 案件をまとめて取り込む。同じIDが既にあれば置き換える。
    pub fn import_projects(&mut self, projects: Vec<Project>) {
        let count = projects.len();
        for project in projects {
            match self.projects.iter_mut().find(|p| p.id == project.id) {
                Some(existing) => {
                    debug!("Replacing project {}", project.id);
                    *existing = project;
                }
                None => self.projects.push(project),
            }
        }
        info!("Imported {} projects", count);
        self.persist();
    }

    /// 案件の既定の移動時間を設定する。案件が無ければ`false`を返す。
    pub fn set_travel_time(&mut self, id: &str, minutes: i64) -> bool {
        let Some(project) = self.projects.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        project.travel_time_minutes = Some(minutes);
        project.updated_at = datetime::now();
        self.persist();
        true
    }

    fn persist(&self) {
        save_json(&self.storage, PROJECTS_KEY, &self.projects);
    }
}
