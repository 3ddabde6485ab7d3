use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::column_mapping::{auto_map, MappedField};
use crate::csv_parser;
use crate::import::{validate, ImportResult};
use crate::project::{Project, ProjectStore};
use crate::storage::KeyValueStorage;

/// `import`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    #[clap(help = "CSV file exported from the planning spreadsheet")]
    file: PathBuf,

    #[clap(
        long = "map",
        help = "Overrides a column mapping as field=Header, an empty header unmaps the field",
        parse(try_from_str = parse_mapping_override),
    )]
    map: Vec<(MappedField, Option<String>)>,

    #[clap(long = "commit", help = "Saves the valid records to the project store")]
    commit: bool,
}

pub struct ImportCommand<'a, S: KeyValueStorage> {
    projects: &'a mut ProjectStore<S>,
}

impl<'a, S: KeyValueStorage> ImportCommand<'a, S> {
    /// 新しい`ImportCommand`を返す。
    ///
    /// # Arguments
    /// * `projects` - `--commit`時に取り込み先となる案件ストア
    pub fn new(projects: &'a mut ProjectStore<S>) -> Self {
        Self { projects }
    }

    /// `import`サブコマンドの処理を行う。
    ///
    /// CSVを読み込んでヘッダーを自動で対応付け、`--map`の指定で上書きしてから検証する。
    /// `--commit`が無ければ検証結果を返すだけでストアは変更しない。
    pub async fn run(&mut self, args: ImportArgs) -> Result<ImportResult> {
        let content = tokio::fs::read_to_string(&args.file)
            .await
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        let parsed = csv_parser::parse(&content);
        info!(
            "Parsed {} rows with {} columns",
            parsed.rows.len(),
            parsed.headers.len()
        );

        let mut mapping = auto_map(&parsed.headers);
        for (field, header) in args.map {
            match header {
                Some(header) => mapping.set(field, &header),
                None => mapping.clear(field),
            }
        }
        for (field, header) in mapping.iter() {
            debug!("Column {} <- {:?}", field.key(), header);
        }

        let result = validate(&parsed.rows, &parsed.headers, &mapping);
        info!(
            "Validated {} records ({} errors, {} warnings)",
            result.records.len(),
            result.errors.len(),
            result.warnings.len()
        );

        if args.commit {
            let projects: Vec<Project> = result
                .records
                .iter()
                .cloned()
                .map(Project::from_draft)
                .collect();
            self.projects.import_projects(projects);
        }

        Ok(result)
    }
}

/// `field=Header`形式の指定をパースする。
fn parse_mapping_override(s: &str) -> Result<(MappedField, Option<String>)> {
    let (field, header) = s
        .split_once('=')
        .with_context(|| format!("Expected field=Header, got: {}", s))?;
    let field = MappedField::from_str(field)
        .with_context(|| format!("Failed to parse column field: {}", field))?;
    let header = header.trim();

    Ok((field, (!header.is_empty()).then(|| header.to_string())))
}
