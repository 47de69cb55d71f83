//! Small time helpers, mirroring `garage_util::time::now_msec`.

pub fn now_msec() -> u64 {
	chrono::Utc::now().timestamp_millis() as u64
}
