use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::utils::{backups_dir_in, canonical_slug, ensure_dir, schemes_dir_in};

use super::{ChangeFeed, ChangeListener, KeyValueStore, Result, StoreError};

const DOC_EXTENSION: &str = "json";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TMP_SUFFIX: &str = "tmp";
const DEFAULT_RETENTION: usize = 5;

/// File-per-key persistence backend. Writes are staged to a temporary file
/// and renamed into place; the previous document version is copied into a
/// timestamped backup before being overwritten, with old backups pruned to
/// the retention limit.
#[derive(Clone)]
pub struct JsonStore {
    docs_dir: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
    feed: ChangeFeed,
}

impl JsonStore {
    pub fn new(root: PathBuf, retention: Option<usize>) -> Result<Self> {
        ensure_dir(&root)?;
        let docs_dir = schemes_dir_in(&root);
        let backups_dir = backups_dir_in(&root);
        ensure_dir(&docs_dir)?;
        ensure_dir(&backups_dir)?;
        Ok(Self {
            docs_dir,
            backups_dir,
            retention: retention.unwrap_or(DEFAULT_RETENTION).max(1),
            feed: ChangeFeed::default(),
        })
    }

    pub fn new_default() -> Result<Self> {
        Self::new(crate::utils::app_data_dir(), None)
    }

    pub fn doc_path(&self, key: &str) -> PathBuf {
        self.docs_dir
            .join(format!("{}.{}", canonical_slug(key), DOC_EXTENSION))
    }

    fn backup_dir(&self, key: &str) -> PathBuf {
        self.backups_dir.join(canonical_slug(key))
    }

    pub fn list_backups(&self, key: &str) -> Result<Vec<String>> {
        let dir = self.backup_dir(key);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DOC_EXTENSION) {
                continue;
            }
            let file_name = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            entries.push(file_name);
        }
        entries.sort_by(|a, b| parse_backup_timestamp(b).cmp(&parse_backup_timestamp(a)));
        Ok(entries)
    }

    /// Restores the document at `key` from a named backup file and returns
    /// the restored value.
    pub fn restore(&self, key: &str, backup_name: &str) -> Result<Value> {
        let backup_path = self.backup_dir(key).join(backup_name);
        if !backup_path.exists() {
            return Err(StoreError::Backend(format!(
                "backup `{}` not found",
                backup_name
            )));
        }
        let data = fs::read_to_string(&backup_path)?;
        let value: Value = serde_json::from_str(&data)?;
        let target = self.doc_path(key);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        let tmp = tmp_path(&target);
        write_file(&tmp, &data)?;
        fs::rename(&tmp, &target)?;
        self.feed.notify(key);
        Ok(value)
    }

    fn backup_existing(&self, key: &str, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let dir = self.backup_dir(key);
        ensure_dir(&dir)?;
        let timestamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string();
        let backup_name = format!(
            "{}_{}.{}",
            canonical_slug(key),
            timestamp,
            DOC_EXTENSION
        );
        fs::copy(path, dir.join(backup_name))?;
        self.prune_backups(key)?;
        Ok(())
    }

    fn prune_backups(&self, key: &str) -> Result<()> {
        let backups = self.list_backups(key)?;
        if backups.len() <= self.retention {
            return Ok(());
        }
        let dir = self.backup_dir(key);
        for name in backups.iter().skip(self.retention) {
            let _ = fs::remove_file(dir.join(name));
        }
        Ok(())
    }
}

impl KeyValueStore for JsonStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.doc_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.doc_path(key);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        self.backup_existing(key, &path)?;
        let json = serde_json::to_string_pretty(&value)?;
        let tmp = tmp_path(&path);
        write_file(&tmp, &json)?;
        fs::rename(&tmp, &path)?;
        self.feed.notify(key);
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.feed.subscribe(listener);
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_file(path: &Path, data: &str) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_suffix(".json")?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let time_part = parts.last()?;
    let date_part = parts.get(parts.len() - 2)?;
    if !is_digits(date_part, 8) || !is_digits(time_part, 6) {
        return None;
    }
    let raw = format!("{}{}", date_part, time_part);
    NaiveDateTime::parse_from_str(&raw, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    fn store_with_temp_dir() -> (JsonStore, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let store = JsonStore::new(temp.path().to_path_buf(), Some(3)).expect("json store");
        (store, temp)
    }

    #[test]
    fn set_and_get_round_trip() {
        let (store, _guard) = store_with_temp_dir();
        store
            .set("scheme/jimpitan", serde_json::json!({"unit_amount": 1000}))
            .expect("set document");
        let value = store
            .get("scheme/jimpitan")
            .expect("get document")
            .expect("document present");
        assert_eq!(value["unit_amount"], 1000);
    }

    #[test]
    fn missing_key_reads_as_none() {
        let (store, _guard) = store_with_temp_dir();
        assert!(store.get("scheme/absent").expect("get").is_none());
    }

    #[test]
    fn overwrite_leaves_timestamped_backup() {
        let (store, _guard) = store_with_temp_dir();
        store
            .set("scheme/youth", serde_json::json!({"v": 1}))
            .expect("first write");
        store
            .set("scheme/youth", serde_json::json!({"v": 2}))
            .expect("second write");
        let backups = store.list_backups("scheme/youth").expect("list backups");
        assert!(
            !backups.is_empty(),
            "expected a backup of the overwritten document"
        );
        let restored = store
            .restore("scheme/youth", &backups[0])
            .expect("restore backup");
        assert_eq!(restored["v"], 1);
    }

    #[test]
    fn restore_notifies_listeners() {
        let (store, _guard) = store_with_temp_dir();
        store
            .set("scheme/youth", serde_json::json!({"v": 1}))
            .expect("first write");
        store
            .set("scheme/youth", serde_json::json!({"v": 2}))
            .expect("second write");
        let backups = store.list_backups("scheme/youth").expect("list backups");

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.subscribe(Box::new(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        store
            .restore("scheme/youth", &backups[0])
            .expect("restore backup");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let value = store
            .get("scheme/youth")
            .expect("get")
            .expect("document present");
        assert_eq!(value["v"], 1, "readers see the restored document");
    }

    #[test]
    fn listeners_fire_on_set() {
        let (store, _guard) = store_with_temp_dir();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        store.subscribe(Box::new(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        store
            .set("scheme/solidarity", serde_json::json!({}))
            .expect("set");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
