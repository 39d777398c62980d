//! ClickHouse storage for harvested posts, user actions and metrics snapshots.

pub mod actions;
pub mod client;
pub mod config;
pub mod metrics;
pub mod posts;
pub mod schema;

pub use client::ClickHouseClient;
pub use actions::UserActionRow;
pub use config::ClickHouseConfig;
pub use metrics::{count_snapshots, insert_metrics};
pub use posts::{ClickHouseStore, PostRow};
