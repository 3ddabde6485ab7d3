use anyhow::{ensure, Result};
use log::info;

use crate::project::{Project, ProjectDraft, ProjectStore};
use crate::storage::KeyValueStorage;

/// `projects`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ProjectsArgs {
    #[clap(long = "add", help = "Creates a project with the given name")]
    add: Option<String>,
}

pub struct ProjectsCommand<'a, S: KeyValueStorage> {
    projects: &'a mut ProjectStore<S>,
}

impl<'a, S: KeyValueStorage> ProjectsCommand<'a, S> {
    pub fn new(projects: &'a mut ProjectStore<S>) -> Self {
        Self { projects }
    }

    /// `--add`があれば案件を作成し、案件の一覧を返す。
    pub fn run(&mut self, args: ProjectsArgs) -> Result<Vec<Project>> {
        if let Some(name) = args.add {
            let name = name.trim();
            ensure!(!name.is_empty(), "Project name must not be empty");
            let project = self.projects.add_project(ProjectDraft::named(name));
            info!("Created project {}", project);
        }
        Ok(self.projects.projects().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectsArgs, ProjectsCommand};
    use crate::project::ProjectStore;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_projects_command_adds_and_lists() {
        let mut store = ProjectStore::load(MemoryStorage::default());
        let mut command = ProjectsCommand::new(&mut store);

        command.run(ProjectsArgs { add: Some(" Alpha ".to_string()) }).unwrap();
        let projects = command.run(ProjectsArgs { add: None }).unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name(), "Alpha");
        assert!(projects[0].id.starts_with("prj-"));
    }

    #[test]
    fn test_projects_command_rejects_blank_name() {
        let mut store = ProjectStore::load(MemoryStorage::default());

        let result = ProjectsCommand::new(&mut store).run(ProjectsArgs {
            add: Some("  ".to_string()),
        });

        assert!(result.is_err());
        assert!(store.projects().is_empty());
    }
}
