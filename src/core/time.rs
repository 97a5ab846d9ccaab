use chrono::{DateTime, Utc};

pub const FIXED_TIME_ENV: &str = "STORMSITE_FIXED_TIME";

pub fn now_utc() -> DateTime<Utc> {
    if let Ok(value) = std::env::var(FIXED_TIME_ENV) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
            return dt.with_timezone(&Utc);
        }
    }
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_recent_without_override() {
        if std::env::var(FIXED_TIME_ENV).is_ok() {
            return;
        }
        let delta = Utc::now() - now_utc();
        assert!(delta.num_seconds().abs() < 5);
    }
}
