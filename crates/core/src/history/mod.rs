pub mod emotion_counts;
pub mod prediction_logger;
