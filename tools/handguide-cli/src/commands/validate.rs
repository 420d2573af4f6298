//! Validate a task file.

use std::path::PathBuf;

use anyhow::Context;
use handguide_study_model::{parse_tasks, TaskKind};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Cannot read task file: {}", path.display()))?;

    println!("Validating: {}", path.display());

    let tasks = match parse_tasks(&json) {
        Ok(tasks) => tasks,
        Err(e) => {
            println!("  [FAIL] {e}");
            anyhow::bail!("Task file is invalid");
        }
    };

    println!("  [OK] {} task(s)", tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        let markers = match task.kind {
            TaskKind::Hold => format!("hold {} ms", task.hold_duration),
            TaskKind::Move => format!("{} marker(s)", task.markers.len()),
        };
        println!(
            "     {:>2}. {} [{} {}] {} trial(s) x {} repetition(s), {}, radius {} mm",
            i + 1,
            task.tag,
            task.kind.as_str(),
            task.hand.as_str(),
            task.trials,
            task.repetitions,
            markers,
            task.distance_threshold
        );
    }

    Ok(())
}
