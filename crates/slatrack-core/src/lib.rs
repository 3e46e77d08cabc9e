pub mod calendar;
pub mod charts;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod outputs;
pub mod pipeline;
pub mod sql;
