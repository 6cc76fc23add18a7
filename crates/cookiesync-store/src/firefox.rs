//! Firefox profile discovery and the `permissions.sqlite` record store
//!
//! Cookie exceptions live in the `moz_perms` table of a profile's
//! `permissions.sqlite`. Rows with `type = 'cookie'` map onto
//! [`ExceptionRecord`]s: permission 1 is allow, 2 is block, 8 is
//! allow-for-session, `expireType` 0/1/2 is never/session/at-time, and both
//! `expireTime` and `modificationTime` are unix epoch milliseconds.
//!
//! Profiles are found through `profiles.ini` in the per-user Firefox
//! directory, the same file the browser itself consults.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use config::FileFormat;
use cookiesync_types::{
    Error, ExceptionKind, ExceptionRecord, ExpiryPolicy, PermissionValue, RecordSet, RecordStore,
    Result,
};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One profile entry from `profiles.ini`
#[derive(Debug, Clone)]
pub struct FirefoxProfile {
    /// Profile name as shown in the profile manager
    pub name: String,
    /// Absolute path of the profile directory
    pub path: PathBuf,
    /// Whether `profiles.ini` marks this profile as the default
    pub is_default: bool,
}

/// Per-user Firefox directory holding `profiles.ini`
fn firefox_root() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| Error::store("Could not determine the home directory"))?;
    #[cfg(target_os = "macos")]
    let root = home.join("Library/Application Support/Firefox");
    #[cfg(target_os = "windows")]
    let root = dirs::data_dir()
        .unwrap_or_else(|| home.join("AppData/Roaming"))
        .join("Mozilla/Firefox");
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let root = home.join(".mozilla/firefox");
    Ok(root)
}

/// Parse the profiles listed in `<root>/profiles.ini`
///
/// Relative profile paths are resolved against `root`. Sections without a
/// `Name` key (installs, locked-profile markers) are skipped.
pub fn profiles_in(root: &Path) -> Result<Vec<FirefoxProfile>> {
    let ini = root.join("profiles.ini");
    let parsed = config::Config::builder()
        .add_source(config::File::from(ini.as_path()).format(FileFormat::Ini))
        .build()
        .map_err(|e| Error::store(format!("Failed to read {}: {}", ini.display(), e)))?;
    let sections: HashMap<String, HashMap<String, String>> = parsed
        .try_deserialize()
        .map_err(|e| Error::store(format!("Malformed {}: {}", ini.display(), e)))?;

    let mut profiles = Vec::new();
    for (section, keys) in &sections {
        if !section.starts_with("profile") {
            continue;
        }
        let Some(name) = keys.get("name") else {
            continue;
        };
        let Some(path) = keys.get("path") else {
            continue;
        };
        let is_relative = keys.get("isrelative").map(String::as_str) != Some("0");
        let path = if is_relative {
            root.join(path)
        } else {
            PathBuf::from(path)
        };
        profiles.push(FirefoxProfile {
            name: name.clone(),
            path,
            is_default: keys.get("default").map(String::as_str) == Some("1"),
        });
    }
    profiles.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Found {} profiles in {}", profiles.len(), ini.display());
    Ok(profiles)
}

/// Resolve a profile directory under the given Firefox root
pub fn discover_profile_in(root: &Path, name: Option<&str>) -> Result<PathBuf> {
    let profiles = profiles_in(root)?;
    match name {
        Some(wanted) => profiles
            .into_iter()
            .find(|p| p.name == wanted)
            .map(|p| p.path)
            .ok_or_else(|| Error::store(format!("No profile named '{wanted}' found"))),
        None => {
            let mut defaults: Vec<_> = profiles.into_iter().filter(|p| p.is_default).collect();
            match defaults.len() {
                0 => Err(Error::store("No default profile found")),
                1 => Ok(defaults.remove(0).path),
                n => Err(Error::store(format!(
                    "Ambiguous default profile, {n} candidates"
                ))),
            }
        }
    }
}

/// Resolve the profile directory to synchronize
///
/// An explicit `path` wins over everything; otherwise the profile is looked
/// up in `profiles.ini` by `name`, or the default profile is taken.
pub fn discover_profile(name: Option<&str>, path: Option<&Path>) -> Result<PathBuf> {
    if let Some(explicit) = path {
        if !explicit.is_dir() {
            return Err(Error::store(format!(
                "Profile directory {} does not exist",
                explicit.display()
            )));
        }
        return Ok(explicit.to_path_buf());
    }
    discover_profile_in(&firefox_root()?, name)
}

fn permission_to_db(value: PermissionValue) -> i64 {
    match value {
        PermissionValue::Allow => 1,
        PermissionValue::Block => 2,
        PermissionValue::AllowSession => 8,
    }
}

fn permission_from_db(value: i64) -> Option<PermissionValue> {
    match value {
        1 => Some(PermissionValue::Allow),
        2 => Some(PermissionValue::Block),
        8 => Some(PermissionValue::AllowSession),
        _ => None,
    }
}

fn expiry_to_db(expiry: ExpiryPolicy) -> (i64, i64) {
    match expiry {
        ExpiryPolicy::Never => (0, 0),
        ExpiryPolicy::Session => (1, 0),
        ExpiryPolicy::At(when) => (2, when.timestamp_millis()),
    }
}

fn expiry_from_db(expire_type: i64, expire_time: i64) -> Option<ExpiryPolicy> {
    match expire_type {
        0 => Some(ExpiryPolicy::Never),
        1 => Some(ExpiryPolicy::Session),
        2 => millis_to_datetime(expire_time).map(ExpiryPolicy::At),
        _ => None,
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

fn db_err(context: &str, error: rusqlite::Error) -> Error {
    Error::store(format!("{context}: {error}"))
}

/// Record store backed by a profile's `permissions.sqlite`
///
/// All database work runs on the blocking thread pool; rusqlite connections
/// are opened per operation, matching how short-lived the queries are.
#[derive(Debug, Clone)]
pub struct FirefoxRecordStore {
    db_path: PathBuf,
}

impl FirefoxRecordStore {
    /// Open the store for a profile directory
    pub fn new(profile_dir: &Path) -> Result<Self> {
        let db_path = profile_dir.join("permissions.sqlite");
        if !db_path.is_file() {
            return Err(Error::store(format!(
                "Database file {} does not exist",
                db_path.display()
            )));
        }
        Ok(Self { db_path })
    }

    /// Path of the backing database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn read_records(path: &Path) -> Result<RecordSet> {
        let conn = Connection::open(path)
            .map_err(|e| db_err("Failed to open profile database", e))?;
        let mut stmt = conn
            .prepare(
                "SELECT origin, permission, expireType, expireTime, modificationTime \
                 FROM moz_perms WHERE type = 'cookie'",
            )
            .map_err(|e| db_err("Failed to query cookie exceptions", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(|e| db_err("Failed to read cookie exceptions", e))?;

        let mut records = RecordSet::new();
        for row in rows {
            let (origin, permission, expire_type, expire_time, modification_time) =
                row.map_err(|e| db_err("Failed to read cookie exception row", e))?;
            let Some(permission) = permission_from_db(permission) else {
                warn!("Skipping '{origin}': unknown permission value {permission}");
                continue;
            };
            let Some(expiry) = expiry_from_db(expire_type, expire_time) else {
                warn!("Skipping '{origin}': unknown expiry {expire_type}/{expire_time}");
                continue;
            };
            let Some(modified) = millis_to_datetime(modification_time) else {
                warn!("Skipping '{origin}': unrepresentable timestamp {modification_time}");
                continue;
            };
            records.insert(ExceptionRecord {
                origin,
                kind: ExceptionKind::Cookie,
                permission,
                expiry,
                modified,
            });
        }
        Ok(records)
    }

    fn write_records(path: &Path, records: &RecordSet) -> Result<()> {
        for record in records.records() {
            if !record.verify() {
                return Err(Error::store(format!(
                    "Refusing to write invalid record {}",
                    record.key()
                )));
            }
        }

        let mut conn = Connection::open(path)
            .map_err(|e| db_err("Failed to open profile database", e))?;
        let tx = conn
            .transaction()
            .map_err(|e| db_err("Failed to start transaction", e))?;
        tx.execute("DELETE FROM moz_perms WHERE type = 'cookie'", [])
            .map_err(|e| db_err("Failed to clear cookie exceptions", e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO moz_perms \
                     (origin, type, permission, expireType, expireTime, modificationTime) \
                     VALUES (?1, 'cookie', ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| db_err("Failed to prepare insert", e))?;
            for record in records.records() {
                let (expire_type, expire_time) = expiry_to_db(record.expiry);
                stmt.execute(params![
                    record.origin,
                    permission_to_db(record.permission),
                    expire_type,
                    expire_time,
                    record.modified.timestamp_millis(),
                ])
                .map_err(|e| db_err("Failed to insert cookie exception", e))?;
            }
        }
        tx.commit()
            .map_err(|e| db_err("Failed to commit cookie exceptions", e))?;
        info!("Wrote {} cookie exceptions to the profile", records.len());
        Ok(())
    }

    fn clear_records(path: &Path) -> Result<()> {
        let conn = Connection::open(path)
            .map_err(|e| db_err("Failed to open profile database", e))?;
        let deleted = conn
            .execute("DELETE FROM moz_perms WHERE type = 'cookie'", [])
            .map_err(|e| db_err("Failed to delete cookie exceptions", e))?;
        info!("Deleted {deleted} cookie exceptions from the profile");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FirefoxRecordStore {
    async fn read_all(&self) -> Result<RecordSet> {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || Self::read_records(&path))
            .await
            .map_err(|e| Error::store(format!("Database task failed: {e}")))?
    }

    async fn write_all(&self, records: &RecordSet) -> Result<()> {
        let path = self.db_path.clone();
        let records = records.clone();
        tokio::task::spawn_blocking(move || Self::write_records(&path, &records))
            .await
            .map_err(|e| Error::store(format!("Database task failed: {e}")))?
    }

    async fn clear_all(&self) -> Result<()> {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || Self::clear_records(&path))
            .await
            .map_err(|e| Error::store(format!("Database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_profile_db(dir: &Path) -> PathBuf {
        let path = dir.join("permissions.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE moz_perms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                origin TEXT,
                type TEXT,
                permission INTEGER,
                expireType INTEGER,
                expireTime INTEGER,
                modificationTime INTEGER
            );",
        )
        .unwrap();
        path
    }

    fn insert_row(
        path: &Path,
        origin: &str,
        kind: &str,
        permission: i64,
        expire_type: i64,
        expire_time: i64,
        modification_time: i64,
    ) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "INSERT INTO moz_perms \
             (origin, type, permission, expireType, expireTime, modificationTime) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![origin, kind, permission, expire_type, expire_time, modification_time],
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_read_maps_permission_and_expiry_values() {
        let temp = TempDir::new().unwrap();
        let db = create_profile_db(temp.path());
        insert_row(&db, "https://a.example", "cookie", 1, 0, 0, 1_700_000_000_000);
        insert_row(&db, "https://b.example", "cookie", 2, 0, 0, 1_700_000_001_000);
        insert_row(&db, "https://c.example", "cookie", 8, 1, 0, 1_700_000_002_000);

        let store = FirefoxRecordStore::new(temp.path()).unwrap();
        let records = store.read_all().await.unwrap();
        assert_eq!(records.len(), 3);

        let by_origin = |origin: &str| {
            records
                .records()
                .find(|r| r.origin == origin)
                .unwrap()
                .clone()
        };
        assert_eq!(by_origin("https://a.example").permission, PermissionValue::Allow);
        assert_eq!(by_origin("https://b.example").permission, PermissionValue::Block);
        let session = by_origin("https://c.example");
        assert_eq!(session.permission, PermissionValue::AllowSession);
        assert_eq!(session.expiry, ExpiryPolicy::Session);
        assert_eq!(
            by_origin("https://a.example").modified.timestamp_millis(),
            1_700_000_000_000
        );
    }

    #[tokio::test]
    async fn test_unknown_permission_rows_are_skipped() {
        let temp = TempDir::new().unwrap();
        let db = create_profile_db(temp.path());
        insert_row(&db, "https://a.example", "cookie", 1, 0, 0, 1_700_000_000_000);
        insert_row(&db, "https://odd.example", "cookie", 16, 0, 0, 1_700_000_000_000);

        let store = FirefoxRecordStore::new(temp.path()).unwrap();
        let records = store.read_all().await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_non_cookie_rows_are_invisible() {
        let temp = TempDir::new().unwrap();
        let db = create_profile_db(temp.path());
        insert_row(&db, "https://a.example", "geo", 1, 0, 0, 1_700_000_000_000);

        let store = FirefoxRecordStore::new(temp.path()).unwrap();
        assert!(store.read_all().await.unwrap().is_empty());

        store.clear_all().await.unwrap();
        // The geolocation row survives a cookie clear
        let conn = Connection::open(&db).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM moz_perms", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_write_replaces_cookie_rows() {
        let temp = TempDir::new().unwrap();
        let db = create_profile_db(temp.path());
        insert_row(&db, "https://old.example", "cookie", 1, 0, 0, 1_600_000_000_000);

        let store = FirefoxRecordStore::new(temp.path()).unwrap();
        let records: RecordSet = [
            ExceptionRecord::cookie(
                "https://new.example",
                PermissionValue::AllowSession,
                millis_to_datetime(1_700_000_000_000).unwrap(),
            ),
        ]
        .into_iter()
        .collect();
        store.write_all(&records).await.unwrap();

        let read_back = store.read_all().await.unwrap();
        assert_eq!(read_back, records);
    }

    #[tokio::test]
    async fn test_write_rejects_invalid_records() {
        let temp = TempDir::new().unwrap();
        create_profile_db(temp.path());

        let store = FirefoxRecordStore::new(temp.path()).unwrap();
        let records: RecordSet = [ExceptionRecord::cookie(
            "not-a-url",
            PermissionValue::Allow,
            millis_to_datetime(1_700_000_000_000).unwrap(),
        )]
        .into_iter()
        .collect();

        let err = store.write_all(&records).await.unwrap_err();
        assert!(err.to_string().contains("invalid record"));
    }

    #[tokio::test]
    async fn test_missing_database_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(FirefoxRecordStore::new(temp.path()).is_err());
    }

    #[test]
    fn test_profile_discovery_from_profiles_ini() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("profiles.ini"),
            "[Install4F96D1932A9F858E]\n\
             Default=abcd.default-release\n\
             Locked=1\n\
             \n\
             [Profile1]\n\
             Name=work\n\
             IsRelative=1\n\
             Path=efgh.work\n\
             \n\
             [Profile0]\n\
             Name=default-release\n\
             IsRelative=1\n\
             Path=abcd.default-release\n\
             Default=1\n",
        )
        .unwrap();

        let profiles = profiles_in(temp.path()).unwrap();
        assert_eq!(profiles.len(), 2);

        let default = discover_profile_in(temp.path(), None).unwrap();
        assert_eq!(default, temp.path().join("abcd.default-release"));

        let by_name = discover_profile_in(temp.path(), Some("work")).unwrap();
        assert_eq!(by_name, temp.path().join("efgh.work"));

        assert!(discover_profile_in(temp.path(), Some("missing")).is_err());
    }

    #[test]
    fn test_absolute_profile_paths_are_kept() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("profiles.ini"),
            "[Profile0]\n\
             Name=portable\n\
             IsRelative=0\n\
             Path=/opt/firefox/portable\n\
             Default=1\n",
        )
        .unwrap();

        let path = discover_profile_in(temp.path(), None).unwrap();
        assert_eq!(path, PathBuf::from("/opt/firefox/portable"));
    }
}
