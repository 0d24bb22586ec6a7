pub mod batch;
pub mod chunk_plan;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod evaluate;
pub mod ground_truth;
pub mod metrics;
pub mod normalize;
pub mod report;
pub mod util;
