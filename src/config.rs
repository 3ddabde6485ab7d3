use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::debug;

/// データディレクトリを上書きする環境変数。
pub const DATA_DIR_ENV: &str = "AFFAIRES_DATA_DIR";

const APP_DIR_NAME: &str = "affaires";

/// 実行時の設定。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// ストアのJSONファイルを置くディレクトリ。
    pub data_dir: PathBuf,
}

impl Config {
    /// コマンドライン引数、環境変数、OS既定のデータディレクトリの順に解決する。
    ///
    /// # Arguments
    ///
    /// * `data_dir` - `--data-dir`で指定されたディレクトリ
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
        let config = resolve_with(
            data_dir,
            env::var_os(DATA_DIR_ENV).map(PathBuf::from),
            dirs::data_dir(),
        )?;
        debug!("Using data directory: {}", config.data_dir.display());
        Ok(config)
    }
}

fn resolve_with(
    flag: Option<PathBuf>,
    env_dir: Option<PathBuf>,
    platform_dir: Option<PathBuf>,
) -> Result<Config> {
    let data_dir = match flag.or(env_dir.filter(|dir| !dir.as_os_str().is_empty())) {
        Some(dir) => dir,
        None => platform_dir
            .context("Failed to determine the data directory, set --data-dir or AFFAIRES_DATA_DIR")?
            .join(APP_DIR_NAME),
    };
    Ok(Config { data_dir })
}
