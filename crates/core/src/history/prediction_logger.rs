use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

use crate::classification::domain::emotion_label::EmotionLabel;
use crate::history::emotion_counts::EmotionCounts;
use crate::shared::constants::TIMESTAMP_FORMAT;

/// Wall-clock source for record timestamps.
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// One logged prediction. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PredictionRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: NaiveDateTime,
    #[serde(rename = "emotion")]
    label: EmotionLabel,
}

impl PredictionRecord {
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn label(&self) -> EmotionLabel {
        self.label
    }
}

fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

/// Append-only, in-memory log of every prediction made by this process.
///
/// Shared as `Arc<PredictionLogger>` between request handlers and the live
/// loop. One mutex guards the sequence; readers get an owned copy taken
/// under the same lock, so they never observe a partially appended state.
/// There is no eviction and nothing survives a restart.
pub struct PredictionLogger {
    records: Mutex<Vec<PredictionRecord>>,
    clock: Clock,
}

impl PredictionLogger {
    pub fn new() -> Self {
        Self::with_clock(Box::new(|| Local::now().naive_local()))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Records `label` with the current wall-clock time, truncated to seconds.
    pub fn append(&self, label: EmotionLabel) {
        let now = (self.clock)();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);
        self.lock().push(PredictionRecord { timestamp, label });
    }

    /// Every record so far, in chronological (insertion) order.
    pub fn snapshot(&self) -> Vec<PredictionRecord> {
        self.lock().clone()
    }

    /// Per-label counts over the full log; labels never seen count zero.
    pub fn aggregate(&self) -> EmotionCounts {
        let records = self.lock();
        EmotionCounts::from_labels(records.iter().map(|r| r.label))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every record. Used between tests and on explicit reset.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PredictionRecord>> {
        // A panic while holding the lock cannot leave a half-pushed record
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PredictionLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn ticking_clock() -> Clock {
        let tick = AtomicI64::new(0);
        Box::new(move || {
            let base = NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_milli_opt(12, 0, 0, 750)
                .unwrap();
            base + chrono::Duration::seconds(tick.fetch_add(1, Ordering::SeqCst))
        })
    }

    #[test]
    fn test_append_preserves_order() {
        let logger = PredictionLogger::with_clock(ticking_clock());
        logger.append(EmotionLabel::Happy);
        logger.append(EmotionLabel::Sad);
        logger.append(EmotionLabel::Happy);

        let labels: Vec<_> = logger.snapshot().iter().map(|r| r.label()).collect();
        assert_eq!(
            labels,
            vec![EmotionLabel::Happy, EmotionLabel::Sad, EmotionLabel::Happy]
        );
    }

    #[test]
    fn test_timestamps_are_second_precision() {
        let logger = PredictionLogger::with_clock(ticking_clock());
        logger.append(EmotionLabel::Fear);
        let record = &logger.snapshot()[0];
        assert_eq!(record.timestamp().nanosecond(), 0);
    }

    #[test]
    fn test_record_serializes_like_log_entry() {
        let logger = PredictionLogger::with_clock(ticking_clock());
        logger.append(EmotionLabel::Angry);
        let json = serde_json::to_value(logger.snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"timestamp": "2024-05-01 12:00:00", "emotion": "Angry"}])
        );
    }

    #[test]
    fn test_identical_labels_are_not_deduplicated() {
        let logger = PredictionLogger::new();
        logger.append(EmotionLabel::Neutral);
        logger.append(EmotionLabel::Neutral);
        assert_eq!(logger.len(), 2);
    }

    #[test]
    fn test_aggregate_counts_every_label() {
        let logger = PredictionLogger::new();
        let labels = [
            EmotionLabel::Happy,
            EmotionLabel::Happy,
            EmotionLabel::Sad,
            EmotionLabel::Surprise,
        ];
        for l in labels {
            logger.append(l);
        }
        let counts = logger.aggregate();
        assert_eq!(counts.get(EmotionLabel::Happy), 2);
        assert_eq!(counts.get(EmotionLabel::Sad), 1);
        assert_eq!(counts.get(EmotionLabel::Angry), 0);
        assert_eq!(counts.total(), labels.len());
    }

    #[test]
    fn test_clear_resets() {
        let logger = PredictionLogger::new();
        logger.append(EmotionLabel::Disgust);
        logger.clear();
        assert!(logger.is_empty());
        assert_eq!(logger.aggregate().total(), 0);
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let logger = Arc::new(PredictionLogger::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        logger.append(EmotionLabel::ALL[(t + i) % 7]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(logger.len(), 2000);
        assert_eq!(logger.aggregate().total(), 2000);
    }
}
