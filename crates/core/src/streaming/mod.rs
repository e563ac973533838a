pub mod stream_encoder;
