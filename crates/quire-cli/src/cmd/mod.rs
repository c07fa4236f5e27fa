pub mod comment;
pub mod comments;
pub mod init;
pub mod moderate;
pub mod post;
pub mod serve;
pub mod token;

use chrono::{DateTime, Local, Utc};

/// Local wall-clock rendering for human output.
pub fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
