use std::io;

use anyhow::{Context, Result};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// 標準エラー出力へのロガーを初期化する。
///
/// 標準出力はコマンドの結果に使うため、ログは標準エラー出力にだけ書く。
///
/// # Arguments
///
/// * `verbose` - `true`ならdebugレベルまで出力する
pub fn init(verbose: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::BrightBlack);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level_filter(verbose))
        .chain(io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}

fn level_filter(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
