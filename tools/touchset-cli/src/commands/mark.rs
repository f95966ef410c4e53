//! Set the calibration anchor of a session.

use std::path::PathBuf;

use touchset_session_model::CalibrationOffset;

use super::load_session;

pub fn run(
    path: PathBuf,
    frame: i32,
    timestamp: Option<u64>,
    event_index: Option<usize>,
) -> anyhow::Result<()> {
    if frame < 0 {
        anyhow::bail!("Frame index must be non-negative, got {frame}");
    }

    let mut session = load_session(&path)?;

    let anchor = match (timestamp, event_index) {
        (Some(ts), _) => CalibrationOffset::new(frame, ts),
        (None, Some(index)) => {
            CalibrationOffset::from_event_index(frame, &session.pointer_log, index).ok_or_else(
                || {
                    anyhow::anyhow!(
                        "Event index {index} out of range (log holds {} events)",
                        session.pointer_log.len()
                    )
                },
            )?
        }
        (None, None) => anyhow::bail!("Pass either --timestamp or --event-index"),
    };

    let previous = session.mark(anchor);
    session
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to save session: {e}"))?;

    println!(
        "Calibration set: frame {} <-> {} us",
        anchor.anchor_frame, anchor.anchor_timestamp_us
    );
    if let Some(prev) = previous {
        println!(
            "  (replaced frame {} <-> {} us)",
            prev.anchor_frame, prev.anchor_timestamp_us
        );
    }
    if let Some((first, last)) = session.pointer_log.time_span() {
        if anchor.anchor_timestamp_us < first || anchor.anchor_timestamp_us > last {
            println!("  Warning: timestamp lies outside the pointer log ({first}..={last} us)");
        }
    }

    Ok(())
}
