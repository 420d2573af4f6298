//! Run a study over a landmark recording.

use anyhow::Context;
use handguide_common::logging::study_span;
use handguide_common::{ConfigStore, HandguideError, SerialConfig, SessionClock};
use handguide_detection::{DetectorSet, LandmarkAdapter, ReplayProvider};
use handguide_serial::SerialLink;
use handguide_session::{run_study, FrameTicker, LogCueSink, StudySession};
use handguide_study_model::{
    decode_study_link, generate_participant_id, parse_tasks, Task, TaskPayload,
};
use tracing::Instrument;

use crate::RunArgs;

pub async fn run(store: &ConfigStore, args: RunArgs) -> anyhow::Result<()> {
    let (tasks, link_participant) = load_tasks(&args)?;
    let participant = args
        .participant
        .clone()
        .or(link_participant)
        .unwrap_or_else(generate_participant_id);
    let config = store.snapshot();
    config.validate()?;

    println!("HandGuide study");
    println!("  Participant: {participant}");
    println!("  Tasks:       {}", tasks.len());
    println!("  Replay:      {}", args.replay.display());

    let provider = ReplayProvider::from_path(&args.replay)
        .with_context(|| format!("Cannot load replay: {}", args.replay.display()))?;
    let mut adapter = LandmarkAdapter::new(
        DetectorSet::default(),
        config.calibration,
        &config.testbed,
        config.detection,
    );
    adapter.initialize(&provider).await?;

    let clock = SessionClock::start();
    let mut session = StudySession::new(participant, tasks, config.clone(), clock.clone())?
        .watch_config(store.subscribe())
        .with_cues(Box::new(LogCueSink::new(!args.no_bell)));

    if let Some(port) = args.port.clone().or(config.serial.port.clone()) {
        let serial = SerialConfig {
            baud_rate: args.baud.unwrap_or(config.serial.baud_rate),
            ..config.serial.clone()
        };
        match SerialLink::open(&port, &serial) {
            Ok(link) => {
                println!("  Wearable:    {port} @ {} baud", serial.baud_rate);
                store.update(|c| c.serial.port = Some(port.clone()))?;
                session = session.with_serial(link);
            }
            Err(e) => {
                tracing::warn!(port = %port, error = %e, "Continuing without the wearable");
                println!("  Wearable:    not connected ({e})");
            }
        }
    }

    println!();
    println!("Running (Ctrl-C to stop)...");

    let span = study_span(session.participant_id(), &args.replay.display().to_string());
    let mut ticks = FrameTicker::new(args.fps, clock);
    let summary = async {
        tokio::select! {
            summary = run_study(&mut adapter, &mut session, &mut ticks) => Some(summary),
            _ = tokio::signal::ctrl_c() => None,
        }
    }
    .instrument(span.clone())
    .await;

    match &summary {
        Some(summary) => println!(
            "Run ended ({:?}): {} frames, {} advances, {} samples, {} detector failures",
            summary.end, summary.frames, summary.advances, summary.samples, summary.failures
        ),
        None => println!("Interrupted after {} frames", session.frames()),
    }

    if session.log().is_empty() {
        println!("No engaged frames, nothing to export");
    } else {
        let bundle = span.in_scope(|| session.export(args.output.as_deref()))?;
        println!("Exported {} ({})", bundle.path.display(), bundle.entries.join(", "));
    }

    if let Some(link) = session.take_serial() {
        link.shutdown().await;
    }
    adapter.teardown();
    Ok(())
}

fn load_tasks(args: &RunArgs) -> anyhow::Result<(Vec<Task>, Option<String>)> {
    if let Some(path) = &args.tasks {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read task file: {}", path.display()))?;
        return Ok((parse_tasks(&json)?, None));
    }

    let Some(link) = &args.link else {
        anyhow::bail!("Either --tasks or --link is required");
    };
    let link = decode_study_link(link);
    let participant = link.participant_or_generated();
    match link.payload {
        TaskPayload::Loaded(tasks) => Ok((tasks, Some(participant))),
        TaskPayload::Missing => {
            Err(HandguideError::corrupt_task_data("study link carries no task data").into())
        }
        TaskPayload::Corrupt { reason } => Err(HandguideError::corrupt_task_data(reason).into()),
    }
}
