use std::time::Duration;

/// The store refuses `IN` filters with more values than this
pub const MAX_IN_CLAUSE: usize = 30;

/// Advances given up to this day of the following month still count against a salary month
pub const ADVANCE_CUTOFF_DAY: u32 = 15;

pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_FEED_CAPACITY: usize = 256;
