//! Persistent config store: a single-row `SQLite` table holding the active
//! network mode and credentials.
//!
//! The console and API write this row; the network mode engine reads it on
//! every apply. A missing file, missing row or unreadable store is a valid
//! degraded state meaning "use the default mode" - the engine never fails
//! because the store is absent.

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::netmode::{NetworkConfig, NetworkMode};

/// Errors from the config store. Kept structured so the console can tell
/// "no store yet" apart from "store broken".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle on the single-row network configuration store.
pub struct ConfigStore {
    conn: Connection,
}

impl ConfigStore {
    /// Open (creating if necessary) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS network_config (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                mode TEXT NOT NULL,
                wifi_ssid TEXT NOT NULL DEFAULT '',
                wifi_password TEXT NOT NULL DEFAULT '',
                use_static_ip INTEGER NOT NULL DEFAULT 0,
                static_ip TEXT NOT NULL DEFAULT '',
                static_netmask TEXT NOT NULL DEFAULT '',
                static_gateway TEXT NOT NULL DEFAULT '',
                static_dns_primary TEXT NOT NULL DEFAULT '',
                static_dns_secondary TEXT NOT NULL DEFAULT ''
            );",
        )?;
        Ok(Self { conn })
    }

    /// Load the configuration row, if one has ever been written.
    pub fn load(&self) -> Result<Option<NetworkConfig>> {
        let row = self
            .conn
            .query_row(
                "SELECT mode, wifi_ssid, wifi_password, use_static_ip, static_ip,
                        static_netmask, static_gateway, static_dns_primary, static_dns_secondary
                 FROM network_config WHERE id = 1",
                [],
                |row| {
                    Ok(NetworkConfig {
                        mode: NetworkMode::parse(&row.get::<_, String>(0)?),
                        wifi_ssid: row.get(1)?,
                        wifi_password: row.get(2)?,
                        use_static_ip: row.get(3)?,
                        static_ip: row.get(4)?,
                        static_netmask: row.get(5)?,
                        static_gateway: row.get(6)?,
                        static_dns_primary: row.get(7)?,
                        static_dns_secondary: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Overwrite the configuration row. The row is never deleted.
    pub fn save(&self, cfg: &NetworkConfig) -> Result<()> {
        self.conn.execute(
            "INSERT INTO network_config
                (id, mode, wifi_ssid, wifi_password, use_static_ip, static_ip,
                 static_netmask, static_gateway, static_dns_primary, static_dns_secondary)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                mode = ?1, wifi_ssid = ?2, wifi_password = ?3, use_static_ip = ?4,
                static_ip = ?5, static_netmask = ?6, static_gateway = ?7,
                static_dns_primary = ?8, static_dns_secondary = ?9",
            rusqlite::params![
                cfg.mode.as_str(),
                cfg.wifi_ssid,
                cfg.wifi_password,
                cfg.use_static_ip,
                cfg.static_ip,
                cfg.static_netmask,
                cfg.static_gateway,
                cfg.static_dns_primary,
                cfg.static_dns_secondary,
            ],
        )?;
        Ok(())
    }
}

/// Read the network configuration, tolerating a missing or broken store.
///
/// Absence of the file, of the row, or any read error yields the default
/// configuration (mode `OFFLINE`) with a log line - the engine must keep
/// working on a corrupt SD card.
pub fn read_network_config(path: &Path) -> NetworkConfig {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config store, using default mode");
        return NetworkConfig::default();
    }
    match ConfigStore::open(path).and_then(|s| s.load()) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            tracing::debug!("Config store has no row yet, using default mode");
            NetworkConfig::default()
        },
        Err(e) => {
            tracing::warn!(error = %e, "Config store unreadable, using default mode");
            NetworkConfig::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netmode::NetworkMode;

    #[test]
    fn missing_row_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(&dir.path().join("net.db")).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.db");
        let store = ConfigStore::open(&path).unwrap();

        let cfg = NetworkConfig {
            mode: NetworkMode::OnlineWifi,
            wifi_ssid: "upstream".into(),
            wifi_password: "hunter2hunter2".into(),
            use_static_ip: true,
            static_ip: "192.168.1.40".into(),
            static_netmask: "255.255.255.0".into(),
            static_gateway: "192.168.1.1".into(),
            static_dns_primary: "1.1.1.1".into(),
            static_dns_secondary: String::new(),
        };
        store.save(&cfg).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), cfg);

        // Overwrite, never append: still exactly one row.
        let cfg2 = NetworkConfig {
            mode: NetworkMode::ServerEth,
            ..NetworkConfig::default()
        };
        store.save(&cfg2).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), cfg2);
    }

    #[test]
    fn read_network_config_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = read_network_config(&dir.path().join("nope.db"));
        assert_eq!(cfg.mode, NetworkMode::Offline);
    }

    #[test]
    fn read_network_config_defaults_on_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.db");
        std::fs::write(&path, b"this is not a database").unwrap();
        let cfg = read_network_config(&path);
        assert_eq!(cfg.mode, NetworkMode::Offline);
    }
}
