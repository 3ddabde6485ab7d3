use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::export::{export_to_csv, write_csv};
use crate::project::ProjectStore;
use crate::storage::KeyValueStorage;

/// `export`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    #[clap(help = "Destination CSV file")]
    file: PathBuf,
}

pub struct ExportCommand<'a, S: KeyValueStorage> {
    projects: &'a ProjectStore<S>,
}

impl<'a, S: KeyValueStorage> ExportCommand<'a, S> {
    /// 新しい`ExportCommand`を返す。
    pub fn new(projects: &'a ProjectStore<S>) -> Self {
        Self { projects }
    }

    /// 全案件をCSVに書き出し、書き出した件数を返す。
    pub fn run(&self, args: ExportArgs) -> Result<usize> {
        let projects = self.projects.projects();
        write_csv(&args.file, &export_to_csv(projects))
            .context("Failed to export projects")?;
        info!("Exported {} projects to {}", projects.len(), args.file.display());

        Ok(projects.len())
    }
}
