use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::classification::domain::emotion_label::EmotionLabel;

/// Occurrences of each label, derived from the prediction log on demand.
///
/// Every known label is present, zero included. Serializes as a JSON object
/// keyed by label name in classifier order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmotionCounts {
    counts: [usize; EmotionLabel::ALL.len()],
}

impl EmotionCounts {
    pub fn from_labels(labels: impl IntoIterator<Item = EmotionLabel>) -> Self {
        let mut counts = Self::default();
        for label in labels {
            counts.counts[label.index()] += 1;
        }
        counts
    }

    pub fn get(&self, label: EmotionLabel) -> usize {
        self.counts[label.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, usize)> + '_ {
        EmotionLabel::ALL.iter().map(|&l| (l, self.get(l)))
    }
}

impl Serialize for EmotionCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label.as_str(), &count)?;
        }
        map.end()
    }
}
