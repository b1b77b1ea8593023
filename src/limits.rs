//! Hard input limits. Requests beyond these are rejected up front so the
//! minute walk stays bounded no matter what a caller sends.

/// Earliest accepted instant: 2000-01-01T00:00:00Z, in Unix seconds.
pub const MIN_VALID_TIMESTAMP: i64 = 946_684_800;

/// Latest accepted instant: 2100-01-01T00:00:00Z, in Unix seconds.
pub const MAX_VALID_TIMESTAMP: i64 = 4_102_444_800;

/// Longest appointment window: 7 days of minutes.
pub const MAX_APPOINTMENT_MINUTES: i64 = 10_080;

/// Longest shift window accepted from planning staff: 31 days of minutes.
pub const MAX_SHIFT_MINUTES: i64 = 44_640;

/// Widest range a utilization / listing query may cover: 366 days of minutes.
pub const MAX_QUERY_WINDOW_MINUTES: i64 = 527_040;

pub const MAX_PROVIDER_NAME_LEN: usize = 200;

pub const MAX_DOCK_CODE_LEN: usize = 32;
