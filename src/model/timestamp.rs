use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{invalid_argument, StateResult};

/// Seconds/nanos pair matching `google.protobuf.Timestamp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        let mut timestamp = Self { seconds, nanos };
        timestamp.normalize();
        timestamp
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => Self {
                seconds: duration.as_secs() as i64,
                nanos: duration.subsec_nanos() as i32,
            },
            Err(err) => {
                let duration = err.duration();
                Self::new(
                    -(duration.as_secs() as i64),
                    -(duration.subsec_nanos() as i32),
                )
            }
        }
    }

    /// Formats the timestamp the way the REST surface does
    /// (`2024-01-02T03:04:05.000000006Z`).
    pub fn to_rfc3339(&self) -> String {
        Utc.timestamp_opt(self.seconds, self.nanos as u32)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    pub fn parse_rfc3339(value: &str) -> StateResult<Self> {
        let datetime = DateTime::parse_from_rfc3339(value)
            .map_err(|err| invalid_argument(format!("Invalid timestamp: {err}")))?;
        let datetime_utc = datetime.with_timezone(&Utc);
        Ok(Timestamp::new(
            datetime_utc.timestamp(),
            datetime_utc.timestamp_subsec_nanos() as i32,
        ))
    }

    fn normalize(&mut self) {
        let extra_seconds = self.nanos.div_euclid(1_000_000_000);
        self.seconds += extra_seconds as i64;
        self.nanos = self.nanos.rem_euclid(1_000_000_000);
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.seconds.cmp(&other.seconds) {
            Ordering::Equal => self.nanos.cmp(&other.nanos),
            ordering => ordering,
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value.timestamp(), value.timestamp_subsec_nanos() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_nanoseconds() {
        let timestamp = Timestamp::new(1, 1_500_000_000);
        assert_eq!(timestamp.seconds, 2);
        assert_eq!(timestamp.nanos, 500_000_000);

        let negative = Timestamp::new(0, -1);
        assert_eq!(negative.seconds, -1);
        assert_eq!(negative.nanos, 999_999_999);
    }

    #[test]
    fn ordering() {
        let earlier = Timestamp::new(1, 999);
        let later = Timestamp::new(2, 0);
        assert!(earlier < later);
    }

    #[test]
    fn rfc3339_formatting() {
        let timestamp = Timestamp::new(0, 6);
        assert_eq!(timestamp.to_rfc3339(), "1970-01-01T00:00:00.000000006Z");
        assert_eq!(
            Timestamp::parse_rfc3339("1970-01-01T00:00:01.5Z").unwrap(),
            Timestamp::new(1, 500_000_000)
        );
    }
}
