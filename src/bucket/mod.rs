pub mod aggregator;
pub mod classifier;

pub use aggregator::{
    AggregatorConfig, BucketAggregator, Ingested, PriorTotals, TimestampLabel, TimestampZone,
};
pub use classifier::{classify, BucketAccumulator, BucketKey, BucketWidth};
