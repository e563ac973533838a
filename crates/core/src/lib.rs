pub mod annotation;
pub mod capture;
pub mod classification;
pub mod decoding;
pub mod detection;
pub mod history;
pub mod normalization;
pub mod pipeline;
pub mod shared;
pub mod streaming;
