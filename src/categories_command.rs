use std::str::FromStr;

use anyhow::{Context, Result};
use log::info;

use crate::storage::KeyValueStorage;
use crate::time_entry::{TimeCategory, TimeCategoryConfig, TimeEntryKind};
use crate::time_entry_store::TimeEntryStore;

/// `categories`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct CategoriesArgs {
    #[clap(
        long = "color",
        help = "Sets a category color as CATEGORY=COLOR, e.g. TRAJET=hsl(200 70% 50%)",
        parse(try_from_str = parse_color),
    )]
    colors: Vec<(TimeCategory, String)>,
}

pub struct CategoriesCommand<'a, S: KeyValueStorage> {
    store: &'a mut TimeEntryStore<S>,
}

impl<'a, S: KeyValueStorage> CategoriesCommand<'a, S> {
    pub fn new(store: &'a mut TimeEntryStore<S>) -> Self {
        Self { store }
    }

    /// 指定された色を反映し、カテゴリ設定と予定に使う色の一覧を返す。
    pub fn run(&mut self, args: CategoriesArgs) -> Vec<(TimeCategoryConfig, String)> {
        for (category, color) in args.colors {
            info!("Setting color of {} to {}", category, color);
            self.store.update_category_color(category, &color);
        }
        self.store
            .categories()
            .iter()
            .map(|config| {
                let forecast = self.store.category_color(config.key, TimeEntryKind::Forecast);
                (config.clone(), forecast)
            })
            .collect()
    }
}

fn parse_color(s: &str) -> Result<(TimeCategory, String)> {
    let (category, color) = s
        .split_once('=')
        .with_context(|| format!("Expected CATEGORY=COLOR, got: {}", s))?;
    let category = TimeCategory::from_str(category)
        .with_context(|| format!("Failed to parse category: {}", category))?;
    let color = color.trim();
    anyhow::ensure!(!color.is_empty(), "Color must not be empty: {}", s);

    Ok((category, color.to_string()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{parse_color, CategoriesArgs, CategoriesCommand};
    use crate::storage::MemoryStorage;
    use crate::time_entry::{TimeCategory, TimeEntryKind};
    use crate::time_entry_store::TimeEntryStore;

    #[test]
    fn test_categories_command_updates_color() {
        let mut store = TimeEntryStore::load(MemoryStorage::default());
        let args = CategoriesArgs {
            colors: vec![(TimeCategory::Other, "hsl(10 50% 50%)".to_string())],
        };

        let categories = CategoriesCommand::new(&mut store).run(args);

        assert_eq!(categories.len(), 4);
        assert_eq!(categories[3].0.color, "hsl(10 50% 50%)");
        assert_eq!(categories[3].1, "hsl(10 20% 70%)");
        assert_eq!(
            store.category_color(TimeCategory::Other, TimeEntryKind::Actual),
            "hsl(10 50% 50%)"
        );
    }

    #[rstest]
    #[case::token("TRAJET=hsl(1 2% 3%)", TimeCategory::Travel, "hsl(1 2% 3%)")]
    #[case::english_name("other= #ff0000 ", TimeCategory::Other, "#ff0000")]
    fn test_parse_color(#[case] input: &str, #[case] category: TimeCategory, #[case] color: &str) {
        assert_eq!(parse_color(input).unwrap(), (category, color.to_string()));
    }

    #[rstest]
    #[case::no_separator("TRAJET")]
    #[case::unknown_category("LUNCH=red")]
    #[case::empty_color("ADMIN=")]
    fn test_parse_color_invalid(#[case] input: &str) {
        assert!(parse_color(input).is_err());
    }
}
