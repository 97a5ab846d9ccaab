use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::core::error::StormError;
use crate::core::types::{EffectiveAlertState, Site};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreInfo {
    pub path: PathBuf,
    pub sites: usize,
    pub last_update: Option<DateTime<Utc>>,
}

/// SQLite-backed site registry. Each row keeps a few query columns next to
/// the full site as JSON.
pub struct SiteStore {
    conn: Connection,
    path: PathBuf,
}

impl SiteStore {
    pub fn open(path: &Path) -> Result<Self, StormError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            path: path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StormError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StormError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sites (
              id TEXT PRIMARY KEY,
              nickname TEXT NOT NULL,
              tier TEXT NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL,
              data_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sites_created ON sites(created_at);
            ",
        )?;
        Ok(())
    }

    pub fn create_site(&mut self, site: &Site) -> Result<(), StormError> {
        let exists = self.get_site(&site.id)?.is_some();
        if exists {
            return Err(StormError::InvalidSite(format!("duplicate site id {}", site.id)));
        }
        write_site(&self.conn, site)?;
        Ok(())
    }

    pub fn update_site(&mut self, site: &Site) -> Result<(), StormError> {
        if self.get_site(&site.id)?.is_none() {
            return Err(StormError::SiteNotFound(site.id.clone()));
        }
        write_site(&self.conn, site)?;
        Ok(())
    }

    pub fn delete_site(&mut self, id: &str) -> Result<Site, StormError> {
        let site = self
            .get_site(id)?
            .ok_or_else(|| StormError::SiteNotFound(id.to_string()))?;
        self.conn
            .execute("DELETE FROM sites WHERE id = ?1", params![id])?;
        Ok(site)
    }

    pub fn get_site(&self, id: &str) -> Result<Option<Site>, StormError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT data_json FROM sites WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn list_sites(&self) -> Result<Vec<Site>, StormError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data_json FROM sites ORDER BY created_at, id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut sites = Vec::new();
        for json in rows {
            sites.push(serde_json::from_str(&json?)?);
        }
        Ok(sites)
    }

    /// Writes one refresh cycle's states in a single transaction. Sites that
    /// were deleted while the cycle ran are skipped. Returns the number written.
    pub fn commit_states(
        &mut self,
        states: &[(String, EffectiveAlertState)],
    ) -> Result<usize, StormError> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        for (id, state) in states {
            let json: Option<String> = tx
                .query_row(
                    "SELECT data_json FROM sites WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(json) = json else {
                tracing::debug!("site {} removed during refresh; dropping state", id);
                continue;
            };
            let mut site: Site = serde_json::from_str(&json)?;
            site.alert = state.clone();
            site.updated_at = state.updated_at;
            write_site(&tx, &site)?;
            written += 1;
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn info(&self) -> Result<StoreInfo, StormError> {
        let (count, last): (i64, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MAX(updated_at) FROM sites",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let last_update = last
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(StoreInfo {
            path: self.path.clone(),
            sites: count.max(0) as usize,
            last_update,
        })
    }
}

fn write_site(conn: &Connection, site: &Site) -> Result<(), StormError> {
    let data_json = serde_json::to_string(site)?;
    conn.execute(
        "INSERT OR REPLACE INTO sites (id, nickname, tier, created_at, updated_at, data_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            site.id,
            site.nickname,
            site.alert.tier.as_str(),
            site.created_at.to_rfc3339(),
            site.updated_at.to_rfc3339(),
            data_json
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        AlertSource, Coordinate, EffectiveAlertState, HazardIcon, SiteCategory, StructuredAddress,
        Tier,
    };
    use chrono::TimeZone;

    fn site(id: &str, minute: u32) -> Site {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 12, minute, 0).unwrap();
        Site {
            id: id.to_string(),
            nickname: format!("Site {id}"),
            address: StructuredAddress {
                street: "1 Main St".into(),
                city: "Tulsa".into(),
                region: "OK".into(),
                postal_code: "74103".into(),
                ..Default::default()
            },
            coordinate: Coordinate {
                lat: 36.15,
                lng: -95.99,
            },
            category: SiteCategory::Warehouse,
            contact: None,
            alert: EffectiveAlertState::clear("No active weather alerts."),
            created_at: at,
            updated_at: at,
        }
    }

    fn temp_store(tag: &str) -> (SiteStore, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "stormsite-store-{}-{}.db",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        (SiteStore::open(&path).unwrap(), path)
    }

    #[test]
    fn create_get_list_delete() {
        let (mut store, path) = temp_store("crud");
        store.create_site(&site("site_b", 2)).unwrap();
        store.create_site(&site("site_a", 1)).unwrap();
        assert!(store.create_site(&site("site_a", 1)).is_err());

        let listed: Vec<String> = store.list_sites().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(listed, vec!["site_a", "site_b"]);
        assert_eq!(store.get_site("site_b").unwrap().unwrap().address.city, "Tulsa");

        let removed = store.delete_site("site_a").unwrap();
        assert_eq!(removed.id, "site_a");
        assert!(matches!(
            store.delete_site("site_a"),
            Err(StormError::SiteNotFound(_))
        ));
        assert_eq!(store.info().unwrap().sites, 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn update_requires_existing_site() {
        let mut store = SiteStore::open_in_memory().unwrap();
        let mut s = site("site_x", 0);
        assert!(matches!(store.update_site(&s), Err(StormError::SiteNotFound(_))));
        store.create_site(&s).unwrap();
        s.nickname = "Renamed".into();
        store.update_site(&s).unwrap();
        assert_eq!(store.get_site("site_x").unwrap().unwrap().nickname, "Renamed");
    }

    #[test]
    fn commit_skips_deleted_sites() {
        let mut store = SiteStore::open_in_memory().unwrap();
        store.create_site(&site("site_1", 0)).unwrap();
        let warned = EffectiveAlertState {
            tier: Tier::Warning,
            label: "Tornado Warning".into(),
            headline: "Severe Weather Warning".into(),
            description: "Take cover".into(),
            icon: HazardIcon::Tornado,
            source: AlertSource::Feed,
            hazard_id: Some("hz1".into()),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 6, 13, 0, 0).unwrap(),
        };
        let written = store
            .commit_states(&[
                ("site_1".to_string(), warned.clone()),
                ("site_gone".to_string(), warned.clone()),
            ])
            .unwrap();
        assert_eq!(written, 1);
        let stored = store.get_site("site_1").unwrap().unwrap();
        assert_eq!(stored.alert, warned);
        assert_eq!(
            store.info().unwrap().last_update,
            Some(Utc.with_ymd_and_hms(2024, 5, 6, 13, 0, 0).unwrap())
        );
    }
}
