pub mod check;
pub mod export;
pub mod info;
pub mod init;
pub mod inspect;
pub mod labels;
pub mod mark;

use std::path::Path;

use touchset_session_model::LoadedSession;
use touchset_video_source::{open_source, VideoFrameSource};

pub(crate) fn load_session(path: &Path) -> anyhow::Result<LoadedSession> {
    LoadedSession::load(path).map_err(|e| anyhow::anyhow!("Failed to load session: {e}"))
}

pub(crate) fn open_video(session: &LoadedSession) -> anyhow::Result<Box<dyn VideoFrameSource>> {
    open_source(&session.video_path(), session.session.fps_override)
        .map_err(|e| anyhow::anyhow!("Failed to open video: {e}"))
}
