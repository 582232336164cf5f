use cadence_core::facade::Facade;
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let project_name = match name {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };
    Facade::init(root, &project_name)?;
    println!("initialized cadence project '{project_name}' at {}", root.display());
    Ok(())
}

pub fn backup(root: &Path) -> anyhow::Result<()> {
    let facade = Facade::open(root)?;
    let dest = facade.backup()?;
    println!("backed up data to {}", dest.display());
    Ok(())
}
