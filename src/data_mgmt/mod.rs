pub mod aggregator;
pub mod models;
pub mod publish;
pub mod windowing;
