use crate::output;
use cadence_core::facade::{Facade, ListKind, Listing};
use cadence_core::scrum::NewTask;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Create a task under a story
    Create {
        story_id: String,
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "tech", default_value = "")]
        technical_details: String,
        #[arg(long)]
        hours: Option<f64>,
        /// Dependency task ID (repeatable)
        #[arg(long = "depends-on")]
        dependencies: Vec<String>,
        /// Test criterion (repeatable)
        #[arg(long = "test")]
        test_criteria: Vec<String>,
    },

    /// List tasks, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },

    /// Pin a task to an agent
    Assign { task_id: String, agent: String },

    /// Show which agent the matcher would pick
    Match { task_id: String },

    /// Execute a single task through its matched agent
    Delegate { task_id: String },
}

pub fn run(root: &Path, subcommand: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        TaskSubcommand::Create {
            story_id,
            title,
            description,
            technical_details,
            hours,
            dependencies,
            test_criteria,
        } => {
            let facade = Facade::open(root)?;
            let task = facade.create_task(NewTask {
                story_id,
                title,
                description,
                technical_details,
                estimated_hours: hours,
                test_criteria,
                dependencies,
                ..NewTask::default()
            })?;
            if json {
                output::print_json(&task)?;
            } else {
                println!("created {}: {}", task.id, task.title);
            }
        }

        TaskSubcommand::List { status } => {
            let facade = Facade::open(root)?;
            let Listing::Tasks(tasks) = facade.list(ListKind::Tasks, status.as_deref())? else {
                unreachable!("tasks listing");
            };
            if json {
                output::print_json(&tasks)?;
            } else {
                let rows = tasks
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.clone(),
                            t.story_id.clone(),
                            t.title.clone(),
                            t.status.to_string(),
                            t.assigned_agent.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                output::print_table(&["ID", "STORY", "TITLE", "STATUS", "AGENT"], rows);
            }
        }

        TaskSubcommand::Assign { task_id, agent } => {
            let facade = Facade::open(root)?;
            let task = facade.assign_agent(&task_id, &agent)?;
            if json {
                output::print_json(&task)?;
            } else {
                println!("assigned {} to {agent}", task.id);
            }
        }

        TaskSubcommand::Match { task_id } => {
            let mut facade = Facade::open(root)?;
            let outcome = facade.match_agent(&task_id)?;
            if json {
                output::print_json(&outcome)?;
            } else {
                println!(
                    "{} (confidence {:.2}): {}",
                    outcome.agent, outcome.confidence, outcome.reason
                );
            }
        }

        TaskSubcommand::Delegate { task_id } => {
            let mut facade = Facade::open(root)?;
            let result = facade.delegate(&task_id)?;
            if json {
                output::print_json(&result)?;
            } else {
                println!("{}: {}", task_id, result.summary);
                if let Some(url) = &result.created_pr_url {
                    println!("PR: {url}");
                }
            }
        }
    }
    Ok(())
}
