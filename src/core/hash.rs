use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn site_id(nickname: &str, address: &str, created_at: &DateTime<Utc>) -> String {
    let buf = format!("{}|{}|{}", nickname, address, created_at.to_rfc3339());
    format!("site_{}", &sha256_hex(buf.as_bytes())[..8])
}

/// Stable key for feed entries that arrive without an identifier.
pub fn hazard_key(event: &str, area_desc: &str, index: usize) -> String {
    let buf = format!("{}|{}|{}", event, area_desc, index);
    format!("hz_{}", &sha256_hex(buf.as_bytes())[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn site_id_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let a = site_id("Plant 4", "1 Main St, Tulsa, OK", &at);
        let b = site_id("Plant 4", "1 Main St, Tulsa, OK", &at);
        assert_eq!(a, b);
        assert!(a.starts_with("site_"));
        assert_eq!(a.len(), "site_".len() + 8);
    }

    #[test]
    fn hazard_key_depends_on_position() {
        assert_ne!(
            hazard_key("Flood Watch", "Tulsa", 0),
            hazard_key("Flood Watch", "Tulsa", 1)
        );
    }
}
