pub mod channel_policy;
pub mod normalized_region;
pub mod region_normalizer;
