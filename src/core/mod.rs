pub mod aggregator;
pub mod library;
pub mod persister;
pub mod pipeline;
pub mod resolver;
pub mod stream;
