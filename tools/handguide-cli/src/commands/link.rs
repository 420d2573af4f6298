//! Print a study deep link.

use std::path::PathBuf;

use anyhow::Context;
use handguide_study_model::{encode_study_link, parse_tasks};

pub fn run(tasks: PathBuf, participant: Option<String>) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&tasks)
        .with_context(|| format!("Cannot read task file: {}", tasks.display()))?;
    let tasks = parse_tasks(&json)?;
    let link = encode_study_link(participant.as_deref(), &tasks)?;
    println!("{link}");
    Ok(())
}
