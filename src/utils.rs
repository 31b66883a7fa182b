use chrono::{DateTime, Local, Utc};

/// 当前 Unix 时间戳（秒）
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// 把时间戳格式化为本地时间，用于 stat 输出
pub fn format_timestamp(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(t) => t
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("@{}", ts),
    }
}
