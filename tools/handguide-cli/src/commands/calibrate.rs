//! Display and world calibration.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use handguide_common::logging::calibration_span;
use handguide_common::{ConfigStore, HandguideError};
use handguide_detection::{
    DetectorSet, LandmarkAdapter, ReplayProvider, ScriptedTicks, TickOutcome, TickSource,
};
use handguide_processing_core::calibration::DisplayInput;
use handguide_processing_core::{DisplayCalibration, WorldCalibration, WorldCalibrationStatus};
use handguide_study_model::CalibrationTool;
use tracing::Instrument;

/// Interactive display calibration on stdin.
pub fn display(store: &ConfigStore, tool: Option<String>) -> anyhow::Result<()> {
    let config = store.snapshot();
    let tool = match tool.as_deref().map(DisplayInput::parse) {
        None => config.calibration_tool,
        Some(Some(DisplayInput::Tool(tool))) => tool,
        Some(_) => anyhow::bail!("Unknown calibration tool (expected ruler, credit, or dollar)"),
    };
    let mut calibration = DisplayCalibration::new(&config.calibration, tool);

    println!("Display calibration");
    println!("  +/-      adjust devicePPI by one");
    println!("  <number> set devicePPI");
    println!("  ruler|credit|dollar  switch reference");
    println!("  <enter>  confirm");
    print_reference(&calibration);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            anyhow::bail!("Input closed before calibration was confirmed");
        };
        let line = line?;
        let Some(input) = DisplayInput::parse(&line) else {
            println!("  Unrecognized input: {}", line.trim());
            continue;
        };
        if calibration.apply(input) {
            break;
        }
        print_reference(&calibration);
    }

    let updated = store.update(|c| {
        c.calibration = calibration.factors(&c.calibration);
        c.calibration_tool = calibration.tool();
    })?;
    println!("Saved devicePPI {}", updated.calibration.device_ppi);
    Ok(())
}

fn print_reference(calibration: &DisplayCalibration) {
    let size = calibration.reference_size_px();
    let name = match calibration.tool() {
        CalibrationTool::Ruler => "ruler",
        CalibrationTool::Credit => "credit card",
        CalibrationTool::Dollar => "dollar bill",
    };
    if size.height > 0.0 {
        println!(
            "  devicePPI {} : {name} drawn at {:.1} x {:.1} px",
            calibration.device_ppi(),
            size.width,
            size.height
        );
    } else {
        println!(
            "  devicePPI {} : {name} drawn at {:.1} px ({} ticks)",
            calibration.device_ppi(),
            size.width,
            calibration.ruler_ticks().len()
        );
    }
}

/// Dual-pinch world calibration over a landmark recording.
pub async fn world(store: &ConfigStore, replay: PathBuf, fps: u32) -> anyhow::Result<()> {
    let config = store.snapshot();
    let provider = ReplayProvider::from_path(&replay)
        .with_context(|| format!("Cannot load replay: {}", replay.display()))?;

    let mut adapter = LandmarkAdapter::new(
        DetectorSet {
            pose: false,
            hands: true,
        },
        config.calibration,
        &config.testbed,
        config.detection,
    );
    adapter.initialize(&provider).await?;

    let period_ms = (1000 / fps.max(1)) as u64;
    let mut ticks = ScriptedTicks::every(period_ms, provider.frame_count(), 0);
    let mut calibration = WorldCalibration::default();
    let mut last_progress = 0u32;

    let span = calibration_span(&replay.display().to_string());
    let result = async {
        loop {
            let Some(now_ms) = ticks.next_tick().await else {
                break None;
            };
            let detections = match adapter.tick() {
                Ok(TickOutcome::Detected(d)) => d,
                Ok(TickOutcome::Ended) => break None,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "Frame skipped");
                    continue;
                }
            };
            let Some(tips) = detections.fingertips.as_ref() else {
                continue;
            };

            match calibration.update(&detections.pinches, tips, now_ms) {
                WorldCalibrationStatus::Waiting => last_progress = 0,
                WorldCalibrationStatus::Holding { progress, .. } => {
                    let pct = (progress * 100.0) as u32 / 10 * 10;
                    if pct > last_progress {
                        println!("  holding ... {pct}%");
                        last_progress = pct;
                    }
                }
                WorldCalibrationStatus::Complete {
                    world_ppi,
                    distance_px,
                } => break Some((world_ppi, distance_px)),
            }
        }
    }
    .instrument(span)
    .await;
    adapter.teardown();

    let Some((world_ppi, distance_px)) = result else {
        return Err(HandguideError::calibration(
            "recording ended before both hands held the pinch long enough",
        )
        .into());
    };

    store.update(|c| c.calibration.world_ppi = world_ppi)?;
    println!("Saved worldPPI {world_ppi} (pinch distance {distance_px:.1} px)");
    Ok(())
}
