use crate::output;
use cadence_core::facade::{Facade, ListKind, Listing};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum WorktreeSubcommand {
    /// List live worktrees, marking ghosts
    List,

    /// Show change status for a task's worktree
    Status { task_id: String },

    /// Remove a task's worktree
    Remove {
        task_id: String,
        /// Remove even with uncommitted changes
        #[arg(long)]
        force: bool,
    },

    /// Prune ghosts and optionally remove completed tasks' worktrees
    Cleanup {
        #[arg(long)]
        remove_completed: bool,
    },
}

pub fn run(root: &Path, subcommand: WorktreeSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        WorktreeSubcommand::List => {
            let facade = Facade::open(root)?;
            let Listing::Worktrees(listings) = facade.list(ListKind::Worktrees, None)? else {
                unreachable!("worktrees listing");
            };
            if json {
                output::print_json(&listings)?;
            } else {
                let rows = listings
                    .iter()
                    .map(|l| {
                        vec![
                            l.record.task_id.clone(),
                            l.record.branch.clone(),
                            l.record.path.display().to_string(),
                            if l.ghost {
                                "ghost".to_string()
                            } else {
                                l.record.status.to_string()
                            },
                        ]
                    })
                    .collect();
                output::print_table(&["TASK", "BRANCH", "PATH", "STATE"], rows);
            }
        }

        WorktreeSubcommand::Status { task_id } => {
            let facade = Facade::open(root)?;
            let changes = facade.worktrees().status(&task_id)?;
            if json {
                output::print_json(&changes)?;
            } else {
                println!(
                    "changes: {}, ahead: {}, behind: {}",
                    changes.has_changes, changes.commits_ahead, changes.commits_behind
                );
            }
        }

        WorktreeSubcommand::Remove { task_id, force } => {
            let facade = Facade::open(root)?;
            facade.worktrees().remove(&task_id, force)?;
            println!("removed worktree for {task_id}");
        }

        WorktreeSubcommand::Cleanup { remove_completed } => {
            let facade = Facade::open(root)?;
            let scrum = facade.scrum();
            let cleaned = facade.worktrees().cleanup(remove_completed, &|task_id| {
                scrum
                    .task(task_id)
                    .map(|t| t.status == cadence_core::types::TaskStatus::Completed)
                    .unwrap_or(false)
            })?;
            println!("cleaned up {} worktrees", cleaned.len());
        }
    }
    Ok(())
}
