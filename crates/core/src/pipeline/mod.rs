pub mod classify_image_use_case;
pub mod frame_inference;
pub mod inference_error;
pub mod live_stream;
pub mod pipeline_metrics;
pub mod stream_hub;
