//! Medicare Advantage enrollment rollup.
//!
//! Raw plan-by-county enrollment rows are mapped onto parent company groups
//! by [`normalizer::NameNormalizer`] and folded into one dense row per county
//! by [`aggregator::CountyAggregator`]. [`feed`] and [`report`] handle CSV
//! input and output.

pub mod aggregator;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalizer;
pub mod report;
