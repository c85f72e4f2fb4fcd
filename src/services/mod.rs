pub mod crawler;
pub mod features;
pub mod pipeline;
pub mod providers;
pub mod recommendations;
pub mod retry;
pub mod similarity;

pub use crawler::Crawler;
pub use pipeline::{CrawlSummary, Pipeline, RunReport};
pub use recommendations::RecommendationIndex;
pub use retry::RetryPolicy;
