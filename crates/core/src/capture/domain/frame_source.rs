use crate::shared::frame::Frame;

pub type ReadError = Box<dyn std::error::Error + Send + Sync>;

/// A live, blocking source of RGB frames (a webcam in production).
///
/// `Ok(None)` means the source is exhausted or was closed; the live loop
/// ends cleanly. A read error also ends the loop, after being logged.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError>;
}

/// Replays a fixed list of frames, then reports exhaustion.
pub struct FrameList {
    frames: std::vec::IntoIter<Frame>,
}

impl FrameList {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for FrameList {
    fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
        Ok(self.frames.next())
    }
}
