//! Show session information.

use std::path::PathBuf;

use touchset_common::clock::FrameClock;
use touchset_common::config::AppConfig;

use super::{load_session, open_video};

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let session = load_session(&path)?;
    let s = &session.session;

    println!("Session: {}", s.name);
    println!("  Version: {}", s.version);
    println!("  Created: {}", s.created_at);
    println!("  Modified: {}", s.modified_at);
    println!();

    println!("Video: {}", s.video);
    let fps = match open_video(&session) {
        Ok(source) => {
            let info = source.info();
            println!("  Backend: {}", source.name());
            println!(
                "  Frames: {} @ {:.3}fps ({}x{})",
                info.frame_count, info.fps, info.width, info.height
            );
            Some(info.fps)
        }
        Err(e) => {
            println!("  Unavailable: {e}");
            None
        }
    };
    if let Some(fps) = s.fps_override {
        println!("  FPS override: {fps}");
    }
    println!();

    println!("Pointer events: {}", s.pointer_events);
    println!("  Events: {}", session.pointer_log.len());
    if let Some((first, last)) = session.pointer_log.time_span() {
        println!(
            "  Span: {first}..={last} us ({:.2}s)",
            (last - first) as f64 / 1_000_000.0
        );
    }
    println!();

    println!("Calibration:");
    match s.calibration {
        Some(anchor) => {
            println!(
                "  Frame {} <-> {} us",
                anchor.anchor_frame, anchor.anchor_timestamp_us
            );
            if let Some(fps) = fps {
                let clock = FrameClock::new(fps);
                println!(
                    "  Match tolerance: {}",
                    describe_tolerance(config.export.match_tolerance_us, &clock)
                );
                if let Some((first, last)) = session.pointer_log.time_span() {
                    let (frame, ts) = (anchor.anchor_frame, anchor.anchor_timestamp_us);
                    let first_frame = clock.frame_for_timestamp(frame, ts, first);
                    let last_frame = clock.frame_for_timestamp(frame, ts, last);
                    println!("  Pointer data covers frames {first_frame}..={last_frame}");
                }
            }
        }
        None => println!("  Not set (run `touchset mark`)"),
    }
    println!();

    println!("Labels: {} changes", s.labels.len());
    let entries: Vec<(i32, bool)> = s.labels.iter().collect();
    if let (Some(&(first, _)), Some(&(last, last_value))) = (entries.first(), entries.last()) {
        for (start, end, value) in s.labels.segments(first..last + 1) {
            if !value {
                continue;
            }
            if end == last + 1 && last_value {
                println!("  touch {start}.. (open run)");
            } else {
                println!("  touch {start}..{end} ({} frames)", end - start);
            }
        }
        println!(
            "  {} touch frames before frame {last}",
            s.labels.count_true(first..last)
        );
    }

    Ok(())
}

/// The tolerance export and `labels --auto` will use.
fn describe_tolerance(configured: Option<u64>, clock: &FrameClock) -> String {
    match configured {
        Some(tolerance) => format!("{tolerance} us (configured)"),
        None => format!("{} us (half a frame)", clock.half_frame_us()),
    }
}
