/// Task identifiers are the opaque job ids assigned by the remote service.
pub type TaskId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
