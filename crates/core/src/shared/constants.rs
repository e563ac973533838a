/// Face detector model (BlazeFace short-range, 128×128 input).
pub const FACE_MODEL_NAME: &str = "face_detection_short.onnx";

/// Emotion classifier model (FER-2013 style, 48×48 input, 7 classes).
pub const EMOTION_MODEL_NAME: &str = "emotion_model.onnx";

/// Spatial resolution the emotion classifier was trained on.
pub const EMOTION_INPUT_SIZE: u32 = 48;

/// Directory checked for models shipped next to the binary.
pub const BUNDLED_MODEL_DIR: &str = "models";

/// Boundary token of the live `multipart/x-mixed-replace` stream.
pub const STREAM_BOUNDARY: &str = "frame";

pub const DEFAULT_PORT: u16 = 10000;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Timestamp layout of prediction records (wall clock, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
