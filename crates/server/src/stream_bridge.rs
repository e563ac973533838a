use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tokio::sync::mpsc;

use moodlens_core::pipeline::stream_hub::StreamPart;

/// How often an idle bridge checks whether its client has gone.
const CLOSE_POLL: Duration = Duration::from_millis(250);

/// Forwards one hub subscription into an async channel on a dedicated thread.
///
/// The thread exits, dropping the subscription, at the first of: the hub
/// disconnecting, a failed send, or the async side found closed while idle.
/// A departed client therefore releases its hub slot within `CLOSE_POLL`
/// even when the camera has stopped producing frames.
pub fn bridge(parts: Receiver<StreamPart>, buffer: usize) -> mpsc::Receiver<StreamPart> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    std::thread::spawn(move || loop {
        match parts.recv_timeout(CLOSE_POLL) {
            Ok(part) => {
                if tx.blocking_send(part).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    });
    rx
}
