use crate::output;
use cadence_core::facade::{Facade, ListKind, Listing};
use cadence_core::scrum::NewBug;
use cadence_core::types::{Priority, Severity};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum BugSubcommand {
    /// File a bug report
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Reproduction step (repeatable)
        #[arg(long = "step")]
        steps: Vec<String>,
        #[arg(long, default_value = "")]
        expected: String,
        #[arg(long, default_value = "")]
        actual: String,
        #[arg(long, default_value = "medium")]
        severity: String,
        #[arg(long, default_value = "high")]
        priority: String,
    },

    /// List bugs, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
}

fn parse_severity(s: &str) -> Severity {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "low" => Severity::Low,
        _ => Severity::Medium,
    }
}

fn parse_priority(s: &str) -> Priority {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Priority::Critical,
        "medium" => Priority::Medium,
        "low" => Priority::Low,
        _ => Priority::High,
    }
}

pub fn run(root: &Path, subcommand: BugSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        BugSubcommand::Create {
            title,
            description,
            steps,
            expected,
            actual,
            severity,
            priority,
        } => {
            let facade = Facade::open(root)?;
            let bug = facade.create_bug(NewBug {
                title,
                description,
                steps_to_reproduce: steps,
                expected,
                actual,
                severity: parse_severity(&severity),
                priority: parse_priority(&priority),
                story_points: None,
            })?;
            if json {
                output::print_json(&bug)?;
            } else {
                println!(
                    "created {}: {} ({} points)",
                    bug.id,
                    bug.title,
                    bug.points()
                );
            }
        }

        BugSubcommand::List { status } => {
            let facade = Facade::open(root)?;
            let Listing::Bugs(bugs) = facade.list(ListKind::Bugs, status.as_deref())? else {
                unreachable!("bugs listing");
            };
            if json {
                output::print_json(&bugs)?;
            } else {
                let rows = bugs
                    .iter()
                    .map(|b| {
                        vec![
                            b.id.clone(),
                            b.title.clone(),
                            b.severity.to_string(),
                            b.status.to_string(),
                            b.points().to_string(),
                        ]
                    })
                    .collect();
                output::print_table(&["ID", "TITLE", "SEVERITY", "STATUS", "POINTS"], rows);
            }
        }
    }
    Ok(())
}
