use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use tracelog_core::frame::{Frame, frames_from_json};
use tracing::debug;

/// Reads frame JSON from a file, or from stdin when the path is `-`.
pub fn read_frames(path: &Path) -> anyhow::Result<Vec<Frame>> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed reading frames from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?
    };

    let frames = frames_from_json(&raw)
        .with_context(|| format!("failed parsing frames from {}", path.display()))?;
    debug!(path = %path.display(), frames = frames.len(), "loaded frames");
    Ok(frames)
}
