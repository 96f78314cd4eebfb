pub mod metrics;
pub mod news;
pub mod portfolio;
pub mod recommendation;
pub mod series;
