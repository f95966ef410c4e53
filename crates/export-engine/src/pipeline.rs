//! Export job configuration and the per-frame pipeline.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use touchset_common::clock::ProgressCadence;
use touchset_common::config::ExportDefaults;
use touchset_common::error::{TouchsetError, TouchsetResult};
use touchset_dataset_store::{MatchedPoint, RecordAttributes};
use touchset_processing_core::{FrameNormalizer, Rotation};
use touchset_session_model::{CalibrationOffset, FrameMatcher, PointerEventLog, StateChangeLog};
use touchset_video_source::VideoFrameSource;

use crate::progress::{ExportOutcome, ExportProgress, ExportState};
use crate::sink::{create_dataset_writer, RecordSink, SinkFactory};

/// One export request.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub start_frame: i32,

    /// Exclusive; clamped to the video's frame count.
    pub end_frame: i32,

    pub rotation: Rotation,

    /// Dataset file to create.
    pub output_path: PathBuf,
}

impl ExportRequest {
    pub fn new(start_frame: i32, end_frame: i32, output_path: impl Into<PathBuf>) -> Self {
        Self {
            start_frame,
            end_frame,
            rotation: Rotation::Deg0,
            output_path: output_path.into(),
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Frame range after clamping to `[0, frame_count)`.
    ///
    /// An empty result is reported as [`TouchsetError::EmptyRange`].
    pub fn frame_range(&self, frame_count: i32) -> TouchsetResult<Range<i32>> {
        let start = self.start_frame.max(0);
        let end = self.end_frame.min(frame_count.max(0));
        if start >= end {
            return Err(TouchsetError::EmptyRange { start, end });
        }
        Ok(start..end)
    }
}

/// Tunables for an export job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    /// Side length of the square tensors.
    pub target_size: u32,

    /// Report progress every N attempted frames.
    pub progress_every: u64,

    /// Records per on-disk chunk.
    pub chunk_records: usize,

    /// Match tolerance override; `None` means half a frame period.
    pub match_tolerance_us: Option<u64>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from(&ExportDefaults::default())
    }
}

impl From<&ExportDefaults> for ExportSettings {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            target_size: defaults.target_size,
            progress_every: defaults.progress_every,
            chunk_records: defaults.chunk_records,
            match_tolerance_us: defaults.match_tolerance_us,
        }
    }
}

/// Runs one export job over a frame source.
///
/// The pipeline owns its frame source and a snapshot of the labels taken
/// at construction; live edits to the caller's state log do not reach an
/// export in flight. Records go to a dataset file unless another sink
/// factory is installed.
pub struct ExportPipeline {
    source: Box<dyn VideoFrameSource>,
    pointer_log: Arc<PointerEventLog>,
    calibration: Option<CalibrationOffset>,
    labels: StateChangeLog,
    settings: ExportSettings,
    sink_factory: SinkFactory,
    state: ExportState,
}

/// Everything `run` needs once the request has been validated.
struct ExportPlan {
    calibration: CalibrationOffset,
    range: Range<i32>,
    normalizer: FrameNormalizer,
}

impl ExportPipeline {
    pub fn new(
        source: Box<dyn VideoFrameSource>,
        pointer_log: Arc<PointerEventLog>,
        calibration: Option<CalibrationOffset>,
        labels: &StateChangeLog,
        settings: ExportSettings,
    ) -> Self {
        Self {
            source,
            pointer_log,
            calibration,
            labels: labels.snapshot(),
            settings,
            sink_factory: Box::new(create_dataset_writer),
            state: ExportState::Idle,
        }
    }

    /// Replace how the record sink is opened for each run.
    pub fn with_sink_factory(
        mut self,
        factory: impl FnMut(&Path, &ExportSettings) -> TouchsetResult<Box<dyn RecordSink>>
            + Send
            + 'static,
    ) -> Self {
        self.sink_factory = Box::new(factory);
        self
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Validate a request without touching the output path.
    ///
    /// Returns [`TouchsetError::CalibrationMissing`] if no anchor is set and
    /// [`TouchsetError::EmptyRange`] if nothing is left after clamping.
    pub fn preflight(&self, request: &ExportRequest) -> TouchsetResult<Range<i32>> {
        self.plan(request).map(|plan| plan.range)
    }

    fn plan(&self, request: &ExportRequest) -> TouchsetResult<ExportPlan> {
        let calibration = self.calibration.ok_or(TouchsetError::CalibrationMissing)?;
        let normalizer = FrameNormalizer::new(self.settings.target_size)?;
        let range = request.frame_range(self.source.info().frame_count)?;
        Ok(ExportPlan {
            calibration,
            range,
            normalizer,
        })
    }

    /// Run the export to completion, failure or cancellation.
    ///
    /// Pre-flight rejections (missing calibration, bad settings) are
    /// returned as errors and leave the job `Idle`. An empty range is a
    /// successful no-op that creates no file. Every other exit path
    /// finalizes the store and reports the durable record count.
    pub fn run(
        &mut self,
        request: &ExportRequest,
        cancel: &AtomicBool,
        mut on_progress: impl FnMut(ExportProgress),
    ) -> TouchsetResult<ExportOutcome> {
        let plan = match self.plan(request) {
            Ok(plan) => plan,
            Err(TouchsetError::EmptyRange { start, end }) => {
                tracing::info!(start, end, "Empty frame range, nothing to export");
                self.state = ExportState::Completed;
                let mut progress = ExportProgress::start(0);
                progress.state = ExportState::Completed;
                on_progress(progress);
                return Ok(ExportOutcome::Completed { records: 0 });
            }
            Err(e) => return Err(e),
        };

        let total_frames = plan.range.len() as u64;
        self.state = ExportState::Running;
        let mut progress = ExportProgress::start(total_frames);

        tracing::info!(
            output = %request.output_path.display(),
            backend = self.source.name(),
            start = plan.range.start,
            end = plan.range.end,
            rotation = request.rotation.degrees(),
            size = self.settings.target_size,
            "Starting export"
        );

        let mut writer = match (self.sink_factory)(&request.output_path, &self.settings) {
            Ok(writer) => writer,
            Err(e) => {
                tracing::error!(error = %e, "Cannot create dataset");
                return Ok(self.finish(
                    ExportOutcome::Failed {
                        records: 0,
                        cause: e.to_string(),
                    },
                    progress,
                    &mut on_progress,
                ));
            }
        };

        let fps = self.source.info().fps;
        let mut matcher = FrameMatcher::new(&self.pointer_log, plan.calibration, fps);
        if let Some(tolerance) = self.settings.match_tolerance_us {
            matcher = matcher.with_threshold_us(tolerance);
        }
        let mut cadence = ProgressCadence::new(self.settings.progress_every);
        let mut failure: Option<String> = None;
        let mut cancelled = false;

        for frame in plan.range.clone() {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(frame, "Export cancelled");
                cancelled = true;
                break;
            }
            progress.frames_attempted += 1;

            let raw = match self.source.read(frame) {
                Ok(raw) => raw,
                Err(TouchsetError::EndOfStream { .. }) => {
                    tracing::warn!(frame, "Video ended before the requested range");
                    progress.frames_attempted -= 1;
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(frame, error = %e, "Skipping undecodable frame");
                    progress.frames_skipped += 1;
                    report(&mut cadence, &progress, &mut on_progress);
                    continue;
                }
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            };

            let tensor = match plan.normalizer.normalize(&raw, request.rotation) {
                Ok(tensor) => tensor,
                Err(e) => {
                    tracing::warn!(frame, error = %e, "Skipping frame that cannot be normalized");
                    progress.frames_skipped += 1;
                    report(&mut cadence, &progress, &mut on_progress);
                    continue;
                }
            };

            let point = MatchedPoint::from(matcher.match_frame(frame).map(|e| e.position()));
            let attributes = RecordAttributes::new(self.labels.query_at(frame), point);

            if let Err(e) = writer.write_record(&tensor, attributes) {
                tracing::error!(frame, error = %e, "Dataset append failed, aborting export");
                failure = Some(e.to_string());
                break;
            }
            progress.frames_written += 1;
            if point.is_matched() {
                progress.frames_matched += 1;
            }

            report(&mut cadence, &progress, &mut on_progress);
        }

        let finalized = writer.finalize();
        let records = writer.records_durable();

        let outcome = match (failure, finalized) {
            (Some(cause), _) => ExportOutcome::Failed { records, cause },
            (None, Err(e)) => ExportOutcome::Failed {
                records,
                cause: e.to_string(),
            },
            (None, Ok(())) if cancelled => ExportOutcome::Cancelled { records },
            (None, Ok(())) => ExportOutcome::Completed { records },
        };

        Ok(self.finish(outcome, progress, &mut on_progress))
    }

    fn finish(
        &mut self,
        outcome: ExportOutcome,
        mut progress: ExportProgress,
        on_progress: &mut impl FnMut(ExportProgress),
    ) -> ExportOutcome {
        self.state = outcome.state();
        progress.state = self.state;
        on_progress(progress);

        match &outcome {
            ExportOutcome::Failed { records, cause } => {
                tracing::error!(records, cause = %cause, "Export failed");
            }
            _ => tracing::info!(
                records = outcome.records(),
                attempted = progress.frames_attempted,
                skipped = progress.frames_skipped,
                matched = progress.frames_matched,
                state = ?self.state,
                "Export finished"
            ),
        }
        outcome
    }
}

fn report(
    cadence: &mut ProgressCadence,
    progress: &ExportProgress,
    on_progress: &mut impl FnMut(ExportProgress),
) {
    if cadence.should_report(progress.frames_attempted) {
        on_progress(*progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_range_clamps_to_video() {
        let request = ExportRequest::new(-5, 500, "/tmp/unused.tsds");
        assert_eq!(request.frame_range(120).unwrap(), 0..120);

        let request = ExportRequest::new(10, 20, "/tmp/unused.tsds");
        assert_eq!(request.frame_range(120).unwrap(), 10..20);
    }

    #[test]
    fn test_frame_range_empty_cases() {
        for (start, end, count) in [(5, 5, 100), (10, 3, 100), (200, 300, 100), (0, 10, 0)] {
            let err = ExportRequest::new(start, end, "/tmp/unused.tsds")
                .frame_range(count)
                .unwrap_err();
            assert!(matches!(err, TouchsetError::EmptyRange { .. }));
        }
    }

    #[test]
    fn test_settings_follow_config_defaults() {
        let settings = ExportSettings::default();
        assert_eq!(settings.target_size, 224);
        assert_eq!(settings.progress_every, 10);
        assert_eq!(settings.match_tolerance_us, None);
    }
}
