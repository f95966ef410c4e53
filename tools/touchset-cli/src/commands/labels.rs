//! Show, edit or derive the touch labels of a session.

use std::path::PathBuf;

use touchset_common::config::AppConfig;
use touchset_export_engine::derive_labels;

use super::{load_session, open_video};

pub fn run(
    path: PathBuf,
    auto: bool,
    start: i32,
    end: Option<i32>,
    set: Vec<String>,
    clear: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let mut session = load_session(&path)?;
    let mut changed = false;

    if clear {
        session.session.labels.clear();
        println!("Cleared all labels.");
        changed = true;
    }

    if auto {
        let calibration = session
            .session
            .calibration
            .ok_or_else(|| anyhow::anyhow!("Calibration anchor not set (run `touchset mark`)"))?;
        let info = open_video(&session)?.info();
        let end = end.unwrap_or(info.frame_count).min(info.frame_count);

        session.session.labels = derive_labels(
            &session.pointer_log,
            calibration,
            info.fps,
            start.max(0)..end,
            config.export.match_tolerance_us,
        );
        println!(
            "Derived {} label changes over frames {}..{}",
            session.session.labels.len(),
            start.max(0),
            end
        );
        changed = true;
    }

    for entry in &set {
        let (frame, value) = parse_assignment(entry)?;
        session.session.labels.set(frame, value);
        changed = true;
    }

    if changed {
        session
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to save session: {e}"))?;
    }

    let labels = &session.session.labels;
    if labels.is_empty() {
        println!("No labels (every frame is no-touch).");
        return Ok(());
    }

    println!("Labels ({} changes):", labels.len());
    for (frame, value) in labels.iter() {
        println!("  {frame:>8}  {}", if value { "touch" } else { "no touch" });
    }

    Ok(())
}

/// Parse `FRAME=0|1`.
fn parse_assignment(entry: &str) -> anyhow::Result<(i32, bool)> {
    let (frame, value) = entry
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected FRAME=0|1, got '{entry}'"))?;
    let frame: i32 = frame
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid frame in '{entry}': {e}"))?;
    let value = match value.trim() {
        "1" | "true" | "on" => true,
        "0" | "false" | "off" => false,
        other => anyhow::bail!("Invalid label value '{other}' (use 0 or 1)"),
    };
    Ok((frame, value))
}
