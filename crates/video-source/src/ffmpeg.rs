//! ffmpeg-backed frame source.
//!
//! Frame geometry, rate and count come from `ffprobe`. Pixels come from an
//! `ffmpeg` child writing `rgb24` raw video to a pipe; each frame is exactly
//! `width * height * 3` bytes, so sequential reads never seek. A pipe that
//! closes cleanly on a frame boundary is the real end of the stream, which
//! may come before ffprobe's frame count.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::Deserialize;
use touchset_common::error::{TouchsetError, TouchsetResult};

use crate::{check_bounds, VideoFrameSource, VideoInfo};

/// Decodes a video container through ffmpeg.
pub struct FfmpegFrameSource {
    path: PathBuf,
    info: VideoInfo,
    decoder: Option<DecoderProcess>,
    /// Index the open pipe will yield next.
    next_frame: i32,
    /// First index ffmpeg could not produce because the stream ended there.
    real_end: Option<i32>,
}

struct DecoderProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
}

impl DecoderProcess {
    fn spawn(path: &Path, start_frame: i32, fps: f64) -> TouchsetResult<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);
        if start_frame > 0 {
            // Half a frame early so the target frame's pts is the first one >= the seek point.
            let seek_secs = ((start_frame as f64 - 0.5) / fps).max(0.0);
            cmd.arg("-ss").arg(format!("{seek_secs:.6}"));
        }
        cmd.arg("-i")
            .arg(path)
            .args([
                "-map", "0:v:0", "-vsync", "0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| TouchsetError::video(format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TouchsetError::video("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TouchsetError::video("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::debug!(pid = child.id(), start_frame, "ffmpeg decoder started");

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(1 << 20, stdout),
            stderr_task: Some(stderr_task),
        })
    }

    /// Stop the child and return whatever it printed to stderr.
    fn shutdown(mut self) -> String {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.take_stderr()
    }

    /// Reap a child that closed its stdout. True if it exited cleanly.
    fn exited_cleanly(mut self) -> (bool, String) {
        let success = self
            .child
            .wait()
            .map(|status| status.success())
            .unwrap_or(false);
        (success, self.take_stderr())
    }

    fn take_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }
}

/// Fill `buf` from `reader`, returning how many bytes arrived before EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Drop for DecoderProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FfmpegFrameSource {
    /// Probe `path` and prepare a decoder. The child is started lazily on first read.
    pub fn open(path: impl AsRef<Path>) -> TouchsetResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(TouchsetError::FileNotFound { path });
        }
        if !ffmpeg_available() {
            return Err(TouchsetError::unsupported(
                "ffmpeg/ffprobe not found in PATH; install ffmpeg or export from an image sequence",
            ));
        }

        let info = probe_video(&path)?;
        Ok(Self {
            path,
            info,
            decoder: None,
            next_frame: 0,
            real_end: None,
        })
    }

    /// Override the probed frame rate (variable-rate containers often misreport it).
    pub fn with_fps(mut self, fps: f64) -> Self {
        if fps.is_finite() && fps > 0.0 {
            self.info.fps = fps;
            self.decoder = None;
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn frame_bytes(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }
}

impl VideoFrameSource for FfmpegFrameSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read(&mut self, frame_index: i32) -> TouchsetResult<RgbImage> {
        check_bounds(frame_index, self.info.frame_count)?;
        if self.real_end.is_some_and(|end| frame_index >= end) {
            return Err(TouchsetError::EndOfStream { frame: frame_index });
        }

        if self.decoder.is_none() || frame_index != self.next_frame {
            tracing::debug!(
                from = self.next_frame,
                to = frame_index,
                "Seeking ffmpeg decoder"
            );
            self.decoder = None;
            self.decoder = Some(DecoderProcess::spawn(
                &self.path,
                frame_index,
                self.info.fps,
            )?);
            self.next_frame = frame_index;
        }

        let mut buffer = vec![0u8; self.frame_bytes()];
        let read_result = match self.decoder.as_mut() {
            Some(decoder) => read_full(&mut decoder.stdout, &mut buffer),
            None => return Err(TouchsetError::video("ffmpeg decoder not running")),
        };

        match read_result {
            Ok(filled) if filled == buffer.len() => {}
            Ok(0) => {
                // A clean exit with nothing left means the container is
                // shorter than ffprobe claimed.
                let (clean, stderr) = self
                    .decoder
                    .take()
                    .map(DecoderProcess::exited_cleanly)
                    .unwrap_or_default();
                if clean {
                    tracing::warn!(
                        frame = frame_index,
                        probed = self.info.frame_count,
                        "ffmpeg stream ended early"
                    );
                    self.real_end = Some(frame_index);
                    return Err(TouchsetError::EndOfStream { frame: frame_index });
                }
                return Err(short_read(frame_index, "no data", &stderr));
            }
            Ok(filled) => {
                let stderr = self
                    .decoder
                    .take()
                    .map(DecoderProcess::shutdown)
                    .unwrap_or_default();
                let what = format!("{filled} of {} bytes", buffer.len());
                return Err(short_read(frame_index, &what, &stderr));
            }
            Err(err) => {
                // Drop the pipe; the next read respawns with an explicit seek.
                let stderr = self
                    .decoder
                    .take()
                    .map(DecoderProcess::shutdown)
                    .unwrap_or_default();
                return Err(short_read(frame_index, &err.to_string(), &stderr));
            }
        }

        self.next_frame = frame_index + 1;
        RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .ok_or_else(|| TouchsetError::decode(frame_index, "frame buffer size mismatch"))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn short_read(frame: i32, what: &str, stderr: &str) -> TouchsetError {
    let detail = stderr.trim();
    if detail.is_empty() {
        TouchsetError::decode(frame, format!("short read from ffmpeg: {what}"))
    } else {
        TouchsetError::decode(frame, format!("short read from ffmpeg: {what}: {detail}"))
    }
}

/// Whether both `ffmpeg` and `ffprobe` are on PATH.
pub fn ffmpeg_available() -> bool {
    command_exists("ffmpeg") && command_exists("ffprobe")
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn probe_video(path: &Path) -> TouchsetResult<VideoInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-count_packets",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,nb_read_packets,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| TouchsetError::video(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(TouchsetError::video(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    info_from_probe(&probe)
}

fn info_from_probe(probe: &ProbeOutput) -> TouchsetResult<VideoInfo> {
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| TouchsetError::video("No video stream found"))?;

    let width = stream.width.unwrap_or(0);
    let height = stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(TouchsetError::video("Video stream has no dimensions"));
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rational))
        .ok_or_else(|| TouchsetError::video("Could not determine frame rate"))?;

    let parse_count = |s: &Option<String>| s.as_deref().and_then(|v| v.parse::<i32>().ok());
    let duration = stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());

    let frame_count = parse_count(&stream.nb_read_packets)
        .or_else(|| parse_count(&stream.nb_frames))
        .filter(|count| *count > 0)
        .or_else(|| duration.map(|d| (d * fps).round() as i32))
        .ok_or_else(|| TouchsetError::video("Could not determine frame count"))?;

    Ok(VideoInfo {
        frame_count,
        fps,
        width,
        height,
    })
}

/// Parse ffprobe's `num/den` rate strings.
fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/').unwrap_or((value, "1"));
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}
