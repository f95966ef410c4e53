use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use touchset_common::error::TouchsetError;
use touchset_common::error::TouchsetResult;
use touchset_dataset_store::{DatasetReader, DatasetWriter, MatchedPoint, RecordAttributes};
use touchset_export_engine::{
    spawn_export, ExportEvent, ExportOutcome, ExportPipeline, ExportRequest, ExportSettings,
    ExportState, RecordSink,
};
use touchset_processing_core::{FrameTensor, Rotation};
use touchset_session_model::{CalibrationOffset, PointerEvent, PointerEventLog, StateChangeLog};
use touchset_video_source::MemoryFrameSource;

fn temp_output(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir.join("dataset.tsds")
}

fn cleanup(path: &std::path::Path) {
    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).ok();
    }
}

fn settings() -> ExportSettings {
    ExportSettings {
        target_size: 8,
        progress_every: 10,
        chunk_records: 16,
        match_tolerance_us: None,
    }
}

fn pipeline(
    source: MemoryFrameSource,
    events: Vec<PointerEvent>,
    calibration: Option<CalibrationOffset>,
    labels: &StateChangeLog,
) -> ExportPipeline {
    ExportPipeline::new(
        Box::new(source),
        Arc::new(PointerEventLog::from_events(events)),
        calibration,
        labels,
        settings(),
    )
}

fn anchor() -> Option<CalibrationOffset> {
    Some(CalibrationOffset::new(10, 1_000_000))
}

#[test]
fn single_decode_failure_skips_one_frame_and_completes() {
    let output = temp_output("touchset_it_export_decode_failure");
    let source = MemoryFrameSource::solid(100, 16, 9, [200, 100, 50], 30.0).with_decode_failure(50);
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());

    let mut reports = Vec::new();
    let outcome = job
        .run(
            &ExportRequest::new(0, 100, &output),
            &AtomicBool::new(false),
            |p| reports.push(p),
        )
        .unwrap();

    assert_eq!(outcome, ExportOutcome::Completed { records: 99 });
    assert_eq!(job.state(), ExportState::Completed);

    let last = reports.last().unwrap();
    assert_eq!(last.state, ExportState::Completed);
    assert_eq!(last.frames_attempted, 100);
    assert_eq!(last.frames_written, 99);
    assert_eq!(last.frames_skipped, 1);

    let reader = DatasetReader::open(&output).unwrap();
    assert!(reader.is_finalized());
    assert_eq!(reader.len(), 99);
    assert_eq!(reader.schema().unwrap().image_shape, [1, 8 * 8 * 3]);
    cleanup(&output);
}

#[test]
fn progress_counts_attempted_frames_at_a_fixed_cadence() {
    let output = temp_output("touchset_it_export_cadence");
    // Every third frame is undecodable; attempted still advances.
    let mut source = MemoryFrameSource::solid(45, 4, 4, [1, 2, 3], 30.0);
    for frame in (0..45).step_by(3) {
        source = source.with_decode_failure(frame);
    }
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());

    let mut reports = Vec::new();
    let outcome = job
        .run(
            &ExportRequest::new(0, 45, &output),
            &AtomicBool::new(false),
            |p| reports.push(p),
        )
        .unwrap();

    assert_eq!(outcome.records(), 30);
    let attempted: Vec<u64> = reports.iter().map(|p| p.frames_attempted).collect();
    assert_eq!(attempted, vec![10, 20, 30, 40, 45]);
    assert!(reports[..4].iter().all(|p| p.state == ExportState::Running));
    assert_eq!(reports[4].state, ExportState::Completed);
    assert_eq!(reports[4].total_frames, 45);
    cleanup(&output);
}

#[test]
fn empty_range_completes_without_creating_a_store() {
    let output = temp_output("touchset_it_export_empty");
    let source = MemoryFrameSource::solid(10, 4, 4, [0, 0, 0], 30.0);
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());

    let mut reports = Vec::new();
    let outcome = job
        .run(
            &ExportRequest::new(5, 5, &output),
            &AtomicBool::new(false),
            |p| reports.push(p),
        )
        .unwrap();

    assert_eq!(outcome, ExportOutcome::Completed { records: 0 });
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].state, ExportState::Completed);
    assert!(!output.exists());
}

#[test]
fn missing_calibration_is_rejected_before_start() {
    let output = temp_output("touchset_it_export_no_anchor");
    let source = MemoryFrameSource::solid(10, 4, 4, [0, 0, 0], 30.0);
    let mut job = pipeline(source, Vec::new(), None, &StateChangeLog::new());

    let err = job
        .run(
            &ExportRequest::new(0, 10, &output),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap_err();

    assert!(matches!(err, TouchsetError::CalibrationMissing));
    assert_eq!(job.state(), ExportState::Idle);
    assert!(!output.exists());
}

#[test]
fn matched_point_and_label_snapshot_are_written() {
    let output = temp_output("touchset_it_export_match");
    let source = MemoryFrameSource::solid(20, 6, 4, [255, 255, 255], 30.0);
    let events = vec![
        PointerEvent::at(1_033_333, 5.0, 7.0).with_pressure(0.8),
        PointerEvent::at(1_500_000, 90.0, 90.0),
    ];

    let mut labels = StateChangeLog::new();
    labels.set(5, true);
    labels.set(8, false);
    let mut job = pipeline(source, events, anchor(), &labels);
    // Edits after the pipeline is built do not reach the export.
    labels.set(12, true);

    let outcome = job
        .run(
            &ExportRequest::new(0, 20, &output).with_rotation(Rotation::Deg90),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();
    assert_eq!(outcome, ExportOutcome::Completed { records: 20 });

    let mut reader = DatasetReader::open(&output).unwrap();
    assert_eq!(
        reader.attributes(11).unwrap(),
        RecordAttributes::new(false, MatchedPoint::Matched { x: 5.0, y: 7.0 })
    );
    assert_eq!(reader.attributes(10).unwrap().point, MatchedPoint::Unmatched);
    assert_eq!(reader.attributes(12).unwrap().point, MatchedPoint::Unmatched);
    assert!(reader.attributes(6).unwrap().label);
    assert_eq!(reader.positive_count().unwrap(), 3);
    cleanup(&output);
}

#[test]
fn cancellation_between_frames_keeps_what_was_written() {
    let output = temp_output("touchset_it_export_cancel");
    let source = MemoryFrameSource::solid(100, 4, 4, [9, 9, 9], 30.0);
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());

    let cancel = AtomicBool::new(false);
    let mut last = None;
    let outcome = job
        .run(&ExportRequest::new(0, 100, &output), &cancel, |p| {
            if p.frames_attempted == 20 {
                cancel.store(true, Ordering::Relaxed);
            }
            last = Some(p);
        })
        .unwrap();

    assert_eq!(outcome, ExportOutcome::Cancelled { records: 20 });
    assert_eq!(last.unwrap().state, ExportState::Cancelled);

    let reader = DatasetReader::open(&output).unwrap();
    assert!(reader.is_finalized());
    assert_eq!(reader.len(), 20);
    cleanup(&output);
}

#[test]
fn unwritable_output_fails_with_zero_records() {
    let blocker = std::env::temp_dir().join("touchset_it_export_blocker");
    let _ = std::fs::remove_dir_all(&blocker);
    std::fs::write(&blocker, b"not a directory").unwrap();

    let source = MemoryFrameSource::solid(10, 4, 4, [0, 0, 0], 30.0);
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());
    let outcome = job
        .run(
            &ExportRequest::new(0, 10, blocker.join("dataset.tsds")),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();

    assert!(matches!(outcome, ExportOutcome::Failed { records: 0, .. }));
    assert_eq!(job.state(), ExportState::Failed);
    std::fs::remove_file(&blocker).ok();
}

#[test]
fn end_frame_is_clamped_to_the_video() {
    let output = temp_output("touchset_it_export_clamp");
    let source = MemoryFrameSource::solid(12, 4, 4, [0, 0, 0], 30.0);
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());

    let outcome = job
        .run(
            &ExportRequest::new(4, 1_000, &output),
            &AtomicBool::new(false),
            |_| {},
        )
        .unwrap();
    assert_eq!(outcome.records(), 8);
    cleanup(&output);
}

/// A dataset writer whose `fail_on`-th append reports a full disk.
struct FullDiskWriter {
    inner: DatasetWriter,
    fail_on: u64,
    appends: u64,
}

impl RecordSink for FullDiskWriter {
    fn write_record(
        &mut self,
        image: &FrameTensor,
        attributes: RecordAttributes,
    ) -> TouchsetResult<()> {
        self.appends += 1;
        if self.appends == self.fail_on {
            return Err(TouchsetError::dataset("No space left on device"));
        }
        self.inner.write_record(image, attributes)
    }

    fn finalize(&mut self) -> TouchsetResult<()> {
        self.inner.finalize()
    }

    fn records_durable(&self) -> u64 {
        self.inner.records_durable()
    }
}

#[test]
fn append_failure_aborts_with_a_readable_partial_dataset() {
    let output = temp_output("touchset_it_export_append_failure");
    let source = MemoryFrameSource::solid(60, 4, 4, [9, 9, 9], 30.0);
    let mut job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new())
        .with_sink_factory(|path, _settings| {
            let inner = DatasetWriter::create(path)?.with_chunk_records(10);
            Ok(Box::new(FullDiskWriter {
                inner,
                fail_on: 25,
                appends: 0,
            }) as Box<dyn RecordSink>)
        });

    let mut reports = Vec::new();
    let outcome = job
        .run(
            &ExportRequest::new(0, 60, &output),
            &AtomicBool::new(false),
            |p| reports.push(p),
        )
        .unwrap();

    match &outcome {
        ExportOutcome::Failed { records, cause } => {
            assert_eq!(*records, 24);
            assert!(cause.contains("No space left"), "{cause}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(job.state(), ExportState::Failed);

    let last = reports.last().unwrap();
    assert_eq!(last.state, ExportState::Failed);
    assert_eq!(last.frames_attempted, 25);
    assert_eq!(last.frames_written, 24);

    let reader = DatasetReader::open(&output).unwrap();
    assert!(reader.is_finalized());
    assert_eq!(reader.len(), outcome.records());
    cleanup(&output);
}

#[tokio::test]
async fn background_export_streams_progress_then_outcome() {
    let output = temp_output("touchset_it_export_spawn");
    let source = MemoryFrameSource::solid(25, 4, 4, [3, 3, 3], 30.0);
    let job = pipeline(source, Vec::new(), anchor(), &StateChangeLog::new());

    let mut handle = spawn_export(job, ExportRequest::new(0, 25, &output));
    let mut events = Vec::new();
    while let Some(event) = handle.progress.recv().await {
        events.push(event);
    }

    match events.last() {
        Some(ExportEvent::Finished(outcome)) => {
            assert_eq!(*outcome, ExportOutcome::Completed { records: 25 })
        }
        other => panic!("expected Finished, got {other:?}"),
    }
    let progress_events = events
        .iter()
        .filter(|e| matches!(e, ExportEvent::Progress(_)))
        .count();
    assert_eq!(progress_events, 3);

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.records(), 25);
    cleanup(&output);
}
