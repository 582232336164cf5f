use crate::output;
use cadence_core::facade::{Facade, ListKind, Listing};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum AgentSubcommand {
    /// List registered agents
    List,

    /// Show one agent descriptor
    Show { name: String },
}

pub fn run(root: &Path, subcommand: AgentSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        AgentSubcommand::List => {
            let facade = Facade::open(root)?;
            let Listing::Agents(agents) = facade.list(ListKind::Agents, None)? else {
                unreachable!("agents listing");
            };
            if json {
                output::print_json(&agents)?;
            } else {
                let rows = agents
                    .iter()
                    .map(|a| {
                        vec![
                            a.name.clone(),
                            a.display_name.clone(),
                            a.language.clone().unwrap_or_default(),
                            a.frameworks.join(", "),
                        ]
                    })
                    .collect();
                output::print_table(&["NAME", "DISPLAY", "LANGUAGE", "FRAMEWORKS"], rows);
            }
        }

        AgentSubcommand::Show { name } => {
            let facade = Facade::open(root)?;
            let agent = facade
                .registry()
                .get(&name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("agent not found: {name}"))?;
            if json {
                output::print_json(&agent)?;
            } else {
                println!("{} {} ({})", agent.emoji, agent.display_name, agent.name);
                if let Some(language) = &agent.language {
                    println!("  language: {language}");
                }
                if let Some(test) = &agent.test_command {
                    println!("  test: {test}");
                }
                if let Some(coverage) = &agent.coverage_command {
                    println!("  coverage: {coverage}");
                }
            }
        }
    }
    Ok(())
}
