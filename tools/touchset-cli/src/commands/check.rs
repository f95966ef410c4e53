//! Check system capabilities.

use touchset_common::config::{config_file_path, AppConfig};
use touchset_video_source::ffmpeg_available;

pub fn run(write_config: bool) -> anyhow::Result<()> {
    println!("Touchset System Check");
    println!("{}", "=".repeat(50));

    if ffmpeg_available() {
        println!("[OK] ffmpeg / ffprobe found on PATH");
    } else {
        println!("[WARN] ffmpeg / ffprobe not found: only frame directories can be exported");
    }

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[--] Config: {} (not present, using defaults)", path.display());
    }

    let config = AppConfig::load();
    println!(
        "     target size {}, progress every {} frames, {} records per chunk",
        config.export.target_size, config.export.progress_every, config.export.chunk_records
    );
    match config.export.match_tolerance_us {
        Some(tolerance) => println!("     match tolerance {tolerance} us"),
        None => println!("     match tolerance: half a frame period"),
    }

    if write_config {
        config
            .save()
            .map_err(|e| anyhow::anyhow!("Failed to write config: {e}"))?;
        println!("[OK] Wrote config to {}", path.display());
    }

    Ok(())
}
