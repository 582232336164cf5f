use crate::output;
use cadence_core::event::Event;
use cadence_core::facade::Facade;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum SprintSubcommand {
    /// Create a sprint and auto-plan its scope from the backlog
    Plan {
        name: String,
        #[arg(long, default_value = "")]
        goal: String,
        #[arg(long)]
        duration_days: Option<u32>,
        /// Create an empty sprint without pulling backlog items
        #[arg(long)]
        no_auto: bool,
    },

    /// Start a planned sprint and run it to completion
    Start {
        sprint_id: String,
        /// Remove worktrees of completed tasks afterwards
        #[arg(long)]
        cleanup: bool,
    },

    /// Complete an active sprint with a retrospective note
    Complete {
        sprint_id: String,
        #[arg(long)]
        retrospective: Option<String>,
    },

    /// Show a sprint report
    Report { sprint_id: String },

    /// Mean completed points over recent sprints
    Velocity {
        #[arg(long, default_value = "3")]
        window: usize,
    },
}

pub fn run(root: &Path, subcommand: SprintSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        SprintSubcommand::Plan {
            name,
            goal,
            duration_days,
            no_auto,
        } => {
            let facade = Facade::open(root)?;
            let sprint = facade.plan_sprint(&name, &goal, duration_days, !no_auto)?;
            if json {
                output::print_json(&sprint)?;
            } else {
                println!(
                    "planned {}: {} items, {} points committed",
                    sprint.id,
                    sprint.committed_items.len(),
                    sprint.committed_points
                );
            }
        }

        SprintSubcommand::Start { sprint_id, cleanup } => {
            let mut facade = Facade::open(root)?;
            if !json {
                // Narrate progress from the event stream while the loop runs.
                facade.subscribe(|event| match event {
                    Event::TaskClaimed { task_id, agent, .. } => {
                        println!("▶ {task_id} → {agent}");
                    }
                    Event::TaskCompleted { task_id, .. } => println!("✓ {task_id}"),
                    Event::TaskFailed { task_id, reason, .. } => {
                        println!("✗ {task_id}: {reason}");
                    }
                    _ => {}
                });
            }
            let report = facade.start(&sprint_id, cleanup)?;
            if json {
                output::print_json(&report)?;
            } else {
                println!(
                    "sprint {}: {} completed, {} failed",
                    sprint_id, report.completed, report.failed
                );
                if let Some(reason) = &report.halted_reason {
                    println!("halted: {reason}");
                }
            }
        }

        SprintSubcommand::Complete {
            sprint_id,
            retrospective,
        } => {
            let facade = Facade::open(root)?;
            let sprint = facade.complete_sprint(&sprint_id, retrospective)?;
            if json {
                output::print_json(&sprint)?;
            } else {
                println!(
                    "completed {}: {}/{} points",
                    sprint.id, sprint.completed_points, sprint.committed_points
                );
            }
        }

        SprintSubcommand::Report { sprint_id } => {
            let facade = Facade::open(root)?;
            let report = facade.sprint_report(&sprint_id)?;
            if json {
                output::print_json(&report)?;
            } else {
                println!("{} — {} [{}]", report.sprint_id, report.name, report.status);
                println!(
                    "  {}/{} points ({:.0}%), {} stories, {} bugs",
                    report.completed_points,
                    report.committed_points,
                    report.completion_percent,
                    report.stories,
                    report.bugs
                );
            }
        }

        SprintSubcommand::Velocity { window } => {
            let facade = Facade::open(root)?;
            let velocity = facade.velocity(window)?;
            if json {
                output::print_json(&serde_json::json!({ "velocity": velocity }))?;
            } else {
                println!("velocity over last {window} sprints: {velocity:.1}");
            }
        }
    }
    Ok(())
}
