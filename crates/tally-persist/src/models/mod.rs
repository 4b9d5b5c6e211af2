mod usage_record;
mod usage_row;

pub use usage_record::{format_timestamp, UsageRecord, STORAGE_UTC_OFFSET_WEST_SECS};
pub use usage_row::{UsageRow, UsageStats};
