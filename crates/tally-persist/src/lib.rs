pub mod models;
pub mod mapper;
pub mod store;
pub mod error;

pub use models::{UsageRecord, UsageRow, UsageStats, format_timestamp};
pub use mapper::{map_response, ResponseMapper};
pub use store::{StoreState, UsageStore};
pub use error::{PersistError, Result};
