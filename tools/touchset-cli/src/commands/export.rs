//! Export a session to a dataset file.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use touchset_common::config::AppConfig;
use touchset_common::error::TouchsetError;
use touchset_export_engine::{
    derive_labels, spawn_export, ExportEvent, ExportPipeline, ExportRequest, ExportSettings,
};
use touchset_processing_core::Rotation;

use super::{load_session, open_video};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    start: i32,
    end: Option<i32>,
    rotation: i32,
    size: Option<u32>,
    auto_labels: bool,
    json: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    println!("Exporting session at: {}", path.display());

    let session = load_session(&path)?;
    let rotation = Rotation::from_degrees(rotation)?;
    let source = open_video(&session)?;
    let info = source.info();

    let mut settings = ExportSettings::from(&config.export);
    if let Some(size) = size {
        settings.target_size = size;
    }

    let end = end.unwrap_or(info.frame_count);
    let output_path = output.unwrap_or_else(|| session.root.join("exports").join("dataset.tsds"));

    let labels = match (auto_labels, session.session.calibration) {
        (true, Some(calibration)) => derive_labels(
            &session.pointer_log,
            calibration,
            info.fps,
            start.max(0)..end.min(info.frame_count),
            settings.match_tolerance_us,
        ),
        _ => session.session.labels.clone(),
    };

    println!("  Output: {}", output_path.display());
    println!("  Frames: {start}..{end} of {} @ {:.3}fps", info.frame_count, info.fps);
    println!("  Image: {0}x{0}, rotation {1}", settings.target_size, rotation.degrees());
    println!(
        "  Labels: {} ({} changes)",
        if auto_labels { "automatic" } else { "saved" },
        labels.len()
    );

    let pipeline = ExportPipeline::new(
        source,
        Arc::new(session.pointer_log),
        session.session.calibration,
        &labels,
        settings,
    );
    let request = ExportRequest::new(start, end, &output_path).with_rotation(rotation);
    match pipeline.preflight(&request) {
        Ok(_) | Err(TouchsetError::EmptyRange { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    let mut handle = spawn_export(pipeline, request);
    let cancel = handle.cancel_flag();
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.progress.recv() => match event {
                Some(ExportEvent::Progress(p)) => {
                    print!(
                        "\r  Progress: {:.1}% ({}/{} frames, {} skipped, {} matched)  ",
                        p.fraction() * 100.0,
                        p.frames_attempted,
                        p.total_frames,
                        p.frames_skipped,
                        p.frames_matched,
                    );
                    std::io::stdout().flush().ok();
                }
                Some(ExportEvent::Finished(_)) | None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                println!("\n  Cancelling after the current frame...");
                cancel.store(true, Ordering::Relaxed);
                interrupted = true;
            }
        }
    }
    println!();

    let outcome = handle.wait().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Export {outcome}: {}", output_path.display());
    }

    if !outcome.is_success() {
        anyhow::bail!("Export did not complete: {outcome}");
    }
    Ok(())
}
