//! Initialize a new Touchset session.

use std::path::PathBuf;

use touchset_session_model::{LoadedSession, Session};

pub fn run(
    name: String,
    video: PathBuf,
    events: PathBuf,
    output: PathBuf,
    fps: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(fps) = fps {
        if !(fps.is_finite() && fps > 0.0) {
            anyhow::bail!("Invalid frame rate: {fps}");
        }
    }

    let session_dir = output.join(&name);
    println!("Creating session '{}' at {}", name, session_dir.display());

    // Sources stay where they are; store absolute paths so the session
    // directory can live anywhere.
    let video = std::fs::canonicalize(&video).unwrap_or(video);
    let events = std::fs::canonicalize(&events).unwrap_or(events);

    let mut session = Session::new(
        &name,
        video.to_string_lossy(),
        events.to_string_lossy(),
    );
    session.fps_override = fps;

    let loaded = LoadedSession::create(&session_dir, session)
        .map_err(|e| anyhow::anyhow!("Failed to create session: {e}"))?;

    println!("Session created successfully:");
    println!("  Directory: {}", loaded.root.display());
    println!("  Video: {}", loaded.session.video);
    println!("  Pointer events: {} loaded", loaded.pointer_log.len());
    if let Some(fps) = fps {
        println!("  FPS override: {fps}");
    }

    let issues = loaded.validate_sources();
    if !issues.is_empty() {
        println!();
        for issue in &issues {
            println!("  - {issue}");
        }
    }
    println!();
    println!("Next: touchset mark {} --frame <F> --timestamp <T>", loaded.root.display());

    Ok(())
}
