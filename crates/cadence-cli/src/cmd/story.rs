use crate::output;
use cadence_core::facade::{Facade, ListKind, Listing};
use cadence_core::scrum::{EstimateMode, NewStory};
use cadence_core::types::Priority;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum StorySubcommand {
    /// Create a user story
    Create {
        title: String,
        /// "As a <role>"
        #[arg(long, default_value = "user")]
        role: String,
        /// "I want <want>"
        #[arg(long)]
        want: String,
        /// "so that <benefit>"
        #[arg(long)]
        benefit: String,
        /// Acceptance criterion (repeatable)
        #[arg(long = "criterion")]
        criteria: Vec<String>,
        #[arg(long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        epic: Option<String>,
    },

    /// List stories, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },

    /// Estimate one story (or every unestimated backlog story)
    Estimate {
        /// Story ID; omit to estimate all
        story_id: Option<String>,
        /// Explicit Fibonacci points; omit for auto-estimation
        #[arg(long)]
        points: Option<u32>,
    },
}

fn parse_priority(s: &str) -> Priority {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Priority::Critical,
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

pub fn run(root: &Path, subcommand: StorySubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        StorySubcommand::Create {
            title,
            role,
            want,
            benefit,
            criteria,
            priority,
            epic,
        } => {
            let facade = Facade::open(root)?;
            let story = facade.create_story(NewStory {
                title,
                role,
                want,
                benefit,
                acceptance_criteria: criteria,
                priority: parse_priority(&priority),
                epic_id: epic,
            })?;
            if json {
                output::print_json(&story)?;
            } else {
                println!("created {}: {}", story.id, story.title);
            }
        }

        StorySubcommand::List { status } => {
            let facade = Facade::open(root)?;
            let Listing::Stories(stories) =
                facade.list(ListKind::Stories, status.as_deref())?
            else {
                unreachable!("stories listing");
            };
            if json {
                output::print_json(&stories)?;
            } else {
                let rows = stories
                    .iter()
                    .map(|s| {
                        vec![
                            s.id.clone(),
                            s.title.clone(),
                            s.status.to_string(),
                            s.priority.to_string(),
                            s.story_points.map(|p| p.to_string()).unwrap_or_default(),
                        ]
                    })
                    .collect();
                output::print_table(&["ID", "TITLE", "STATUS", "PRIORITY", "POINTS"], rows);
            }
        }

        StorySubcommand::Estimate { story_id, points } => {
            let facade = Facade::open(root)?;
            let mode = match points {
                Some(points) => EstimateMode::Points(points),
                None => EstimateMode::Auto,
            };
            let stories = facade.estimate(story_id.as_deref(), mode)?;
            if json {
                output::print_json(&stories)?;
            } else {
                for story in stories {
                    println!(
                        "{}: {} points",
                        story.id,
                        story.story_points.unwrap_or_default()
                    );
                }
            }
        }
    }
    Ok(())
}
