use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use tokio::io::BufReader;

mod categories_command;
mod column_mapping;
mod config;
mod console;
mod csv_parser;
mod datetime;
mod export;
mod export_command;
mod import;
mod import_command;
mod logger;
mod project;
mod projects_command;
mod storage;
mod summary;
mod time_command;
mod time_entry;
mod time_entry_store;
mod timer;
mod timer_command;

use categories_command::{CategoriesArgs, CategoriesCommand};
use config::Config;
use console::{ConsoleMarkdownList, ConsolePresenter};
use export_command::{ExportArgs, ExportCommand};
use import_command::{ImportArgs, ImportCommand};
use project::ProjectStore;
use projects_command::{ProjectsArgs, ProjectsCommand};
use storage::FileStorage;
use time_command::{TimeArgs, TimeCommand, TimeOutcome};
use time_entry_store::TimeEntryStore;
use timer_command::{TimerArgs, TimerCommand};

/// 案件の作業時間の記録と、案件一覧のCSV取り込み・書き出しを行うCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- import planning.csv --commit
/// $ cargo run -- time add -p prj-01hz... -c TRAJET -m 45
/// $ cargo run -- timer -p prj-01hz... -c EXEC
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        long = "data-dir",
        global = true,
        help = "Directory holding the stored data, overrides AFFAIRES_DATA_DIR"
    )]
    data_dir: Option<PathBuf>,

    #[clap(short = 'v', long = "verbose", global = true, help = "Shows debug logs")]
    verbose: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Validates a planning CSV and optionally imports it
    Import(ImportArgs),
    /// Writes all projects to a CSV file
    Export(ExportArgs),
    /// Lists or creates projects
    Projects(ProjectsArgs),
    /// Manages time entries
    Time(TimeArgs),
    /// Runs an interactive timer for a project
    Timer(TimerArgs),
    /// Lists time categories and changes their colors
    Categories(CategoriesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::init(args.verbose)?;
    let config = Config::resolve(args.data_dir)?;

    let storage = FileStorage::new(&config.data_dir);
    debug!("Storing data in {}", storage.dir().display());
    let mut projects = ProjectStore::load(storage);
    let mut store = TimeEntryStore::load(FileStorage::new(&config.data_dir));
    let mut stdout = io::stdout();
    let mut presenter = ConsoleMarkdownList::new(&mut stdout);

    match args.subcommand {
        SubCommands::Import(import) => {
            let result = ImportCommand::new(&mut projects).run(import).await?;
            presenter.show_import_result(&result)?;
        }
        SubCommands::Export(export) => {
            let count = ExportCommand::new(&projects).run(export)?;
            debug!("{} projects exported", count);
        }
        SubCommands::Projects(list) => {
            let projects = ProjectsCommand::new(&mut projects).run(list)?;
            presenter.show_projects(&projects)?;
        }
        SubCommands::Time(time) => match TimeCommand::new(&mut store, &mut projects).run(time)? {
            TimeOutcome::Entry(entry) => presenter.show_time_entries(&[entry])?,
            TimeOutcome::Entries(entries) => presenter.show_time_entries(&entries)?,
            TimeOutcome::Summary(summary) => presenter.show_summary(&summary)?,
            TimeOutcome::Removed(id) => debug!("Removed {}", id),
        },
        SubCommands::Timer(timer) => {
            let input = BufReader::new(tokio::io::stdin());
            let recorded = TimerCommand::new(&mut store, &projects)
                .run(timer, input, &mut io::stdout())
                .await?;
            store.flush();
            presenter.show_time_entries(&recorded)?;
        }
        SubCommands::Categories(categories) => {
            let categories = CategoriesCommand::new(&mut store).run(categories);
            presenter.show_categories(&categories)?;
        }
    }

    Ok(())
}
