//! Export of a finished study.
//!
//! A bundle is one zip archive named `handguidance_<participant>.zip`
//! (or `handguidance_imutrial_<participant>.zip` when IMU rows were
//! captured):
//!
//! ```text
//! handguidance_P-1a2b3.zip
//! ├── data_mm.csv
//! ├── data_px.csv
//! ├── data_imu.csv     (IMU trials only)
//! └── task.json
//! ```
//!
//! A table without rows is written as an empty entry with no header.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use handguide_common::error::{HandguideError, HandguideResult};
use handguide_study_model::{serialize_tasks, Task};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::datalog::DataLog;

pub const MM_ENTRY: &str = "data_mm.csv";
pub const PX_ENTRY: &str = "data_px.csv";
pub const IMU_ENTRY: &str = "data_imu.csv";
pub const TASK_ENTRY: &str = "task.json";

/// Archive written by [`export_bundle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBundle {
    pub path: PathBuf,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

/// Base name of a participant's bundle, without extension.
pub fn bundle_name(participant_id: &str, imu_trial: bool) -> String {
    let safe: String = participant_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if imu_trial {
        format!("handguidance_imutrial_{safe}")
    } else {
        format!("handguidance_{safe}")
    }
}

/// Serialize rows as CSV, header row first. Null cells are empty.
pub fn csv_table<T: Serialize>(rows: &[T]) -> HandguideResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| HandguideError::session(format!("CSV encoding failed: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| HandguideError::session(format!("CSV flush failed: {e}")))
}

fn zip_error(err: zip::result::ZipError) -> HandguideError {
    HandguideError::session(format!("Archive write failed: {err}"))
}

/// Write the bundle for `participant_id` into `parent`.
///
/// An existing archive of the same name is replaced.
pub fn export_bundle(
    parent: &Path,
    participant_id: &str,
    log: &DataLog,
    tasks: &[Task],
) -> HandguideResult<ExportBundle> {
    std::fs::create_dir_all(parent).map_err(|e| HandguideError::from_io_at(e, parent))?;
    let path = parent.join(format!("{}.zip", bundle_name(participant_id, log.has_imu())));

    let mut tables = vec![
        (MM_ENTRY, csv_table(log.mm())?),
        (PX_ENTRY, csv_table(log.px())?),
    ];
    if log.has_imu() {
        tables.push((IMU_ENTRY, csv_table(log.imu())?));
    }
    tables.push((TASK_ENTRY, serialize_tasks(tasks)?.into_bytes()));

    let file = File::create(&path).map_err(|e| HandguideError::from_io_at(e, &path))?;
    let mut archive = ZipWriter::new(file);

    let mut entries = Vec::with_capacity(tables.len());
    for (name, bytes) in &tables {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        archive.start_file(*name, options).map_err(zip_error)?;
        archive.write_all(bytes)?;
        entries.push(name.to_string());
    }
    archive.finish().map_err(zip_error)?;

    tracing::info!(
        path = %path.display(),
        rows = log.len(),
        imu = log.has_imu(),
        "Study data exported"
    );
    Ok(ExportBundle { path, entries })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::datalog::FrameContext;
    use handguide_processing_core::{EngagedFrame, TaskRunState};
    use handguide_study_model::{MmPosition, MmSample};
    use zip::ZipArchive;

    fn task() -> Task {
        let mut task = Task::from_defaults("reach \"far\"", &Default::default());
        task.markers.push(MmPosition::new(10.0, 0.0));
        task
    }

    fn logged(imu: Option<Option<(f32, f32, f32)>>) -> DataLog {
        let engaged = EngagedFrame {
            elapsed_ms: 250,
            state: TaskRunState::default(),
            target_mm: MmPosition::new(10.0, 0.0),
            hand_mm: MmPosition::new(12.0, 0.0),
            distance_mm: 2.0,
        };
        let frame = FrameContext {
            participant_id: "P-00001",
            unix_timestamp: 1_700_000_000_250,
            world_ppi: 25.4,
            px_per_mm: 1.0,
            imu,
        };
        let mut log = DataLog::new();
        log.record(&task(), &engaged, &frame);
        log
    }

    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let table = String::from_utf8(csv_table(logged(None).mm()).unwrap()).unwrap();
        let mut lines = table.lines();
        assert_eq!(
            lines.next(),
            Some(
                "unix_timestamp,time_sec,participant_id,task_tag,task_type,user_hand,\
                 task_idx,trial_idx,repetition_idx,target_idx,target_x_mm,target_y_mm,\
                 target_threshold_mm,user_left_x_mm,user_left_y_mm,user_right_x_mm,\
                 user_right_y_mm,target_dist_mm"
            )
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1700000000250,0.25,P-00001,\"reach \"\"far\"\"\",MOVE,Right,0,"));

        assert!(csv_table::<MmSample>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_imu_values_are_empty_cells() {
        let table = String::from_utf8(csv_table(logged(Some(None)).imu()).unwrap()).unwrap();
        let row = table.lines().nth(1).unwrap();
        assert!(row.ends_with(",0,0,0,0,,,"));
    }

    #[test]
    fn test_bundle_name() {
        assert_eq!(bundle_name("P-1a2b3", false), "handguidance_P-1a2b3");
        assert_eq!(bundle_name("P-1a2b3", true), "handguidance_imutrial_P-1a2b3");
        assert_eq!(bundle_name("../x y", false), "handguidance____x_y");
    }

    #[test]
    fn test_archive_entries_and_headers() {
        let parent = std::env::temp_dir().join("handguide_test_export_archive");
        let _ = std::fs::remove_dir_all(&parent);
        let tasks = vec![task()];

        let bundle = export_bundle(&parent, "P-00001", &logged(Some(Some((0.0, 0.0, 9.8)))), &tasks)
            .unwrap();
        assert!(bundle.path.ends_with("handguidance_imutrial_P-00001.zip"));
        assert_eq!(bundle.entries, [MM_ENTRY, PX_ENTRY, IMU_ENTRY, TASK_ENTRY]);

        let mut archive = ZipArchive::new(File::open(&bundle.path).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(names, [IMU_ENTRY, MM_ENTRY, PX_ENTRY, TASK_ENTRY]);

        let header = |content: String| content.lines().next().unwrap_or_default().to_string();
        assert!(header(read_entry(&mut archive, MM_ENTRY)).ends_with(",target_dist_mm"));
        assert!(header(read_entry(&mut archive, PX_ENTRY)).ends_with(",world_ppi,scaling_factor"));
        assert_eq!(
            header(read_entry(&mut archive, IMU_ENTRY)),
            "unix_timestamp,time_sec,participant_id,task_tag,task_type,task_idx,\
             trial_idx,repetition_idx,target_idx,ax,ay,az"
        );
        let json = read_entry(&mut archive, TASK_ENTRY);
        assert_eq!(handguide_study_model::parse_tasks(&json).unwrap(), tasks);

        let _ = std::fs::remove_dir_all(&parent);
    }

    #[test]
    fn test_export_without_imu() {
        let parent = std::env::temp_dir().join("handguide_test_export_plain");
        let _ = std::fs::remove_dir_all(&parent);

        let bundle = export_bundle(&parent, "P-00002", &DataLog::new(), &[task()]).unwrap();
        assert!(bundle.path.ends_with("handguidance_P-00002.zip"));
        assert_eq!(bundle.entries, [MM_ENTRY, PX_ENTRY, TASK_ENTRY]);

        let mut archive = ZipArchive::new(File::open(&bundle.path).unwrap()).unwrap();
        assert!(archive.by_name(IMU_ENTRY).is_err());
        assert!(read_entry(&mut archive, MM_ENTRY).is_empty());

        let _ = std::fs::remove_dir_all(&parent);
    }
}
