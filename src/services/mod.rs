pub mod aggregator;
pub mod cache;
pub mod color;
pub mod motogp;
pub mod refresher;
pub mod standings;
pub mod store;
