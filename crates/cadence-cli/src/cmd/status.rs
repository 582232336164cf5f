use crate::output;
use cadence_core::facade::Facade;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let facade = Facade::open(root)?;
    let report = facade.status()?;

    if json {
        output::print_json(&report)?;
        return Ok(());
    }

    println!("project: {}", report.project);
    match &report.active_sprint {
        Some(sprint) => println!(
            "active sprint: {} ({}/{} points)",
            sprint.sprint_id, sprint.completed_points, sprint.committed_points
        ),
        None => println!("active sprint: none"),
    }
    println!(
        "backlog: {} stories ({} points), {} open bugs ({} critical)",
        report.backlog.backlog_stories,
        report.backlog.total_points,
        report.backlog.open_bugs,
        report.backlog.critical_bugs
    );
    println!("open task points: {}", report.backlog.open_task_points);
    println!("agents: {}", report.agents);
    println!("live worktrees: {}", report.live_worktrees);
    Ok(())
}
