use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::capture::domain::frame_source::{FrameSource, ReadError};
use crate::pipeline::live_stream::LiveStream;
use crate::pipeline::pipeline_metrics::LogPipelineMetrics;

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 4;
const PROGRESS_EVERY_FRAMES: usize = 300;

/// Opens the camera. Called on the capture thread each time streaming starts.
pub type SourceFactory = Box<dyn Fn() -> Result<Box<dyn FrameSource>, ReadError> + Send + Sync>;

/// One encoded stream part, shared by every subscriber.
pub type StreamPart = Arc<[u8]>;

/// Multiplexes one camera read loop over any number of stream clients.
///
/// The first subscriber starts the capture thread; every part is offered
/// to each subscriber's bounded channel, and a subscriber whose channel is
/// full misses that part. The loop stops and releases the camera once the
/// last subscriber has gone, or when the camera ends, in which case every
/// subscriber sees its channel disconnect.
#[derive(Clone)]
pub struct StreamHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    live: LiveStream,
    open_source: SourceFactory,
    capacity: usize,
    state: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    subscribers: Vec<Sender<StreamPart>>,
    running: bool,
    generation: u64,
    worker: Option<JoinHandle<()>>,
}

impl StreamHub {
    pub fn new(live: LiveStream, open_source: SourceFactory) -> Self {
        Self::with_capacity(live, open_source, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(live: LiveStream, open_source: SourceFactory, capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                live,
                open_source,
                capacity: capacity.max(1),
                state: Mutex::new(HubState::default()),
            }),
        }
    }

    /// Registers a new client, starting the capture loop if it is idle.
    pub fn subscribe(&self) -> Receiver<StreamPart> {
        let (tx, rx) = crossbeam_channel::bounded(self.inner.capacity);
        let mut state = self.inner.lock();
        state.subscribers.push(tx);
        log::info!("Stream client joined ({} active)", state.subscribers.len());

        if !state.running {
            state.running = true;
            state.generation += 1;
            let generation = state.generation;
            let previous = state.worker.take();
            let inner = self.inner.clone();
            state.worker = Some(std::thread::spawn(move || {
                // The previous loop may still hold the device
                if let Some(previous) = previous {
                    let _ = previous.join();
                }
                inner.capture(generation);
            }));
        }
        rx
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn capture(&self, generation: u64) {
        let mut source = match (self.open_source)() {
            Ok(source) => source,
            Err(e) => {
                log::error!("Could not open camera: {e}");
                self.finish(generation);
                return;
            }
        };
        log::info!("Live stream started");
        let mut metrics = LogPipelineMetrics::new(PROGRESS_EVERY_FRAMES);
        self.live
            .run(source.as_mut(), &mut metrics, |part| self.broadcast(part));
        drop(source);
        self.finish(generation);
        log::info!("Live stream stopped, camera released");
    }

    /// Offers `part` to every subscriber. Returns `false`, marking the loop
    /// stopped, once nobody is listening.
    fn broadcast(&self, part: Vec<u8>) -> bool {
        let part: StreamPart = part.into();
        let mut state = self.lock();
        state.subscribers.retain(|tx| match tx.try_send(part.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => {
                log::info!("Stream client left");
                false
            }
        });
        if state.subscribers.is_empty() {
            state.running = false;
            return false;
        }
        true
    }

    /// Ends the loop of `generation` if it is still the active one,
    /// disconnecting its subscribers.
    fn finish(&self, generation: u64) {
        let mut state = self.lock();
        if state.running && state.generation == generation {
            state.running = false;
            state.subscribers.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::frame_source::FrameList;
    use crate::classification::domain::emotion_classifier::EmotionModel;
    use crate::pipeline::frame_inference::tests::{two_face_frame, BrightnessClassifier};
    use crate::pipeline::live_stream::tests::live_stream;
    use crate::shared::frame::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Serves frames forever.
    struct EndlessSource;

    impl FrameSource for EndlessSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, ReadError> {
            std::thread::sleep(Duration::from_millis(2));
            Ok(Some(two_face_frame()))
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn model() -> EmotionModel {
        EmotionModel::loaded(BrightnessClassifier::new(None))
    }

    #[test]
    fn test_subscriber_receives_every_frame_then_end() {
        let hub = StreamHub::with_capacity(
            live_stream(model()),
            Box::new(|| {
                Ok(Box::new(FrameList::new(vec![two_face_frame(); 3])) as Box<dyn FrameSource>)
            }),
            16,
        );
        let rx = hub.subscribe();
        let parts: Vec<_> = rx.iter().collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.starts_with(b"--frame\r\n")));
        assert!(wait_until(|| !hub.is_running()));
    }

    #[test]
    fn test_camera_opened_once_for_concurrent_clients() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = opens.clone();
        let hub = StreamHub::new(
            live_stream(model()),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(EndlessSource) as Box<dyn FrameSource>)
            }),
        );
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert!(a.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(b.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 2);

        drop(a);
        drop(b);
        assert!(wait_until(|| !hub.is_running()));
    }

    #[test]
    fn test_stalled_client_misses_parts_without_blocking_others() {
        let capacity = 2;
        let hub = StreamHub::with_capacity(
            live_stream(model()),
            Box::new(|| Ok(Box::new(EndlessSource) as Box<dyn FrameSource>)),
            capacity,
        );
        let stalled = hub.subscribe();
        let active = hub.subscribe();

        let wanted = capacity * 5;
        for _ in 0..wanted {
            assert!(active.recv_timeout(Duration::from_secs(5)).is_ok());
        }
        assert_eq!(stalled.len(), capacity);
        assert_eq!(hub.subscriber_count(), 2);
        assert!(hub.is_running());

        drop(stalled);
        drop(active);
        assert!(wait_until(|| !hub.is_running()));
    }

    #[test]
    fn test_loop_restarts_after_last_client_leaves() {
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = opens.clone();
        let hub = StreamHub::new(
            live_stream(model()),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(EndlessSource) as Box<dyn FrameSource>)
            }),
        );
        let first = hub.subscribe();
        assert!(first.recv_timeout(Duration::from_secs(5)).is_ok());
        drop(first);
        assert!(wait_until(|| !hub.is_running()));

        let second = hub.subscribe();
        assert!(second.recv_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(opens.load(Ordering::SeqCst), 2);
        drop(second);
        assert!(wait_until(|| !hub.is_running()));
    }

    #[test]
    fn test_open_failure_disconnects_subscribers() {
        let hub = StreamHub::new(
            live_stream(model()),
            Box::new(|| Err(ReadError::from("no camera attached"))),
        );
        let rx = hub.subscribe();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
        assert!(wait_until(|| !hub.is_running()));
    }
}
