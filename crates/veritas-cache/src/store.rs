//! RocksDB storage backend for the local trust cache.

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::error::CacheError;
use crate::records::{
    CacheRecord, CachedContext, CachedPublicKey, CachedRevokedVc, CachedStatusList, Category,
};

/// Bumped whenever a record layout changes; a mismatch wipes the store.
pub const SCHEMA_VERSION: &str = "1";

const CF_PUBLIC_KEYS_BY_CONTROLLER: &str = "public_keys_by_controller";
const CF_ORG_INDEX: &str = "org_index";
const CF_SYNC_STATE: &str = "sync_state";
const CF_META: &str = "meta";

const META_SCHEMA_VERSION: &[u8] = b"schema_version";
const SEP: char = '\x1f';

/// Organization-scoped record store.
///
/// Each record category lives in its own column family. `org_index` maps
/// `category SEP org SEP primary_key` to nothing, so a replace-sync can find
/// every record owned by an organization without scanning the category.
pub struct LocalCacheStore {
    db: DB,
}

impl LocalCacheStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut cf_descriptors: Vec<ColumnFamilyDescriptor> = Category::ALL
            .iter()
            .map(|c| ColumnFamilyDescriptor::new(c.cf_name(), Options::default()))
            .collect();
        for name in [CF_PUBLIC_KEYS_BY_CONTROLLER, CF_ORG_INDEX, CF_SYNC_STATE, CF_META] {
            cf_descriptors.push(ColumnFamilyDescriptor::new(name, Options::default()));
        }

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        let store = Self { db };
        store.check_schema_version()?;
        Ok(store)
    }

    fn check_schema_version(&self) -> Result<(), CacheError> {
        let meta = self.cf(CF_META)?;
        match self.db.get_cf(meta, META_SCHEMA_VERSION)? {
            Some(v) if v == SCHEMA_VERSION.as_bytes() => return Ok(()),
            Some(v) => {
                tracing::warn!(
                    found = %String::from_utf8_lossy(&v),
                    expected = SCHEMA_VERSION,
                    "cache schema version changed, wiping store"
                );
                self.clear_all()?;
            }
            None => {}
        }
        self.db.put_cf(meta, META_SCHEMA_VERSION, SCHEMA_VERSION)?;
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, CacheError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CacheError::MissingColumnFamily(name.to_string()))
    }

    fn org_index_key(category: Category, org: &str, primary_key: &str) -> String {
        format!("{}{SEP}{}{SEP}{}", category.cf_name(), org, primary_key)
    }

    fn org_index_prefix(category: Category, org: &str) -> String {
        format!("{}{SEP}{}{SEP}", category.cf_name(), org)
    }

    fn controller_index_key(controller: &str, primary_key: &str) -> String {
        format!("{}{SEP}{}", controller, primary_key)
    }

    /// Keys in `cf_name` that start with `prefix`.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>, CacheError> {
        let cf = self.cf(cf_name)?;
        let mut keys = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    /// Stage removal of `record` and its index entries.
    fn stage_delete<R: CacheRecord>(&self, batch: &mut WriteBatch, record: &R) -> Result<(), CacheError> {
        let key = record.primary_key();
        batch.delete_cf(self.cf(R::CATEGORY.cf_name())?, key);
        if let Some(org) = record.organization_id() {
            let idx = Self::org_index_key(R::CATEGORY, org, key);
            batch.delete_cf(self.cf(CF_ORG_INDEX)?, idx);
        }
        if let Some(controller) = record.controller() {
            let idx = Self::controller_index_key(controller, key);
            batch.delete_cf(self.cf(CF_PUBLIC_KEYS_BY_CONTROLLER)?, idx);
        }
        Ok(())
    }

    /// Stage a write of `record`, dropping index entries left by the
    /// previously stored version.
    fn stage_put<R: CacheRecord>(&self, batch: &mut WriteBatch, record: &R) -> Result<(), CacheError> {
        if let Some(previous) = self.get::<R>(record.primary_key())? {
            self.stage_delete(batch, &previous)?;
        }
        self.stage_put_fresh(batch, record)
    }

    /// Insert or overwrite a single record.
    pub fn put<R: CacheRecord>(&self, mut record: R) -> Result<(), CacheError> {
        record.normalize();
        let mut batch = WriteBatch::default();
        self.stage_put(&mut batch, &record)?;
        self.db.write(batch)?;
        Ok(())
    }

    /// Additive bulk insert, one transaction.
    pub fn put_all<R: CacheRecord>(&self, records: Vec<R>) -> Result<usize, CacheError> {
        let mut batch = WriteBatch::default();
        let count = records.len();
        for mut record in records {
            record.normalize();
            self.stage_put(&mut batch, &record)?;
        }
        self.db.write(batch)?;
        Ok(count)
    }

    pub fn get<R: CacheRecord>(&self, primary_key: &str) -> Result<Option<R>, CacheError> {
        let cf = self.cf(R::CATEGORY.cf_name())?;
        match self.db.get_cf(cf, primary_key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete<R: CacheRecord>(&self, primary_key: &str) -> Result<(), CacheError> {
        if let Some(existing) = self.get::<R>(primary_key)? {
            let mut batch = WriteBatch::default();
            self.stage_delete(&mut batch, &existing)?;
            self.db.write(batch)?;
        }
        Ok(())
    }

    /// Every record in a category.
    pub fn list<R: CacheRecord>(&self) -> Result<Vec<R>, CacheError> {
        let cf = self.cf(R::CATEGORY.cf_name())?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    pub fn list_for_org<R: CacheRecord>(&self, organization_id: &str) -> Result<Vec<R>, CacheError> {
        let prefix = Self::org_index_prefix(R::CATEGORY, organization_id);
        let mut out = Vec::new();
        for idx in self.scan_prefix(CF_ORG_INDEX, prefix.as_bytes())? {
            let primary_key = String::from_utf8_lossy(&idx[prefix.len()..]).into_owned();
            if let Some(record) = self.get::<R>(&primary_key)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Replace every record of this category scoped to `organization_id`
    /// with `records`, atomically. Returns the number of records written.
    pub fn replace_for_org<R: CacheRecord>(
        &self,
        organization_id: &str,
        records: Vec<R>,
    ) -> Result<usize, CacheError> {
        let mut batch = WriteBatch::default();
        let existing = self.list_for_org::<R>(organization_id)?;
        let removed = existing.len();
        for record in &existing {
            self.stage_delete(&mut batch, record)?;
        }
        let count = records.len();
        for mut record in records {
            record.set_organization_id(Some(organization_id.to_string()));
            record.normalize();
            // Index entries of a version owned by another org are dropped
            // here; entries of this org's old version are already staged.
            if let Some(previous) = self.get::<R>(record.primary_key())? {
                if previous.organization_id() != Some(organization_id) {
                    self.stage_delete(&mut batch, &previous)?;
                }
            }
            self.stage_put_fresh(&mut batch, &record)?;
        }
        self.db.write(batch)?;
        tracing::debug!(
            category = R::CATEGORY.cf_name(),
            org = organization_id,
            removed,
            written = count,
            "replaced organization records"
        );
        Ok(count)
    }

    /// Stage a write without consulting the stored version.
    fn stage_put_fresh<R: CacheRecord>(&self, batch: &mut WriteBatch, record: &R) -> Result<(), CacheError> {
        let key = record.primary_key();
        batch.put_cf(
            self.cf(R::CATEGORY.cf_name())?,
            key,
            serde_json::to_vec(record)?,
        );
        if let Some(org) = record.organization_id() {
            batch.put_cf(
                self.cf(CF_ORG_INDEX)?,
                Self::org_index_key(R::CATEGORY, org, key),
                b"",
            );
        }
        if let Some(controller) = record.controller() {
            batch.put_cf(
                self.cf(CF_PUBLIC_KEYS_BY_CONTROLLER)?,
                Self::controller_index_key(controller, key),
                key,
            );
        }
        Ok(())
    }

    /// Cached keys whose controller (key id without fragment) is `controller`.
    pub fn keys_by_controller(&self, controller: &str) -> Result<Vec<CachedPublicKey>, CacheError> {
        let prefix = format!("{}{SEP}", controller);
        let cf = self.cf(CF_PUBLIC_KEYS_BY_CONTROLLER)?;
        let mut out = Vec::new();
        for idx in self.scan_prefix(CF_PUBLIC_KEYS_BY_CONTROLLER, prefix.as_bytes())? {
            if let Some(key_id) = self.db.get_cf(cf, &idx)? {
                if let Some(record) = self.get::<CachedPublicKey>(&String::from_utf8_lossy(&key_id))? {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    pub fn is_revoked(&self, vc_id: &str) -> Result<Option<CachedRevokedVc>, CacheError> {
        self.get::<CachedRevokedVc>(vc_id)
    }

    /// Number of records in a category.
    pub fn count(&self, category: Category) -> Result<usize, CacheError> {
        let cf = self.cf(category.cf_name())?;
        let mut n = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Remove every record scoped to `organization_id`, in all categories.
    pub fn clear_organization(&self, organization_id: &str) -> Result<(), CacheError> {
        self.replace_for_org::<CachedPublicKey>(organization_id, Vec::new())?;
        self.replace_for_org::<CachedContext>(organization_id, Vec::new())?;
        self.replace_for_org::<CachedRevokedVc>(organization_id, Vec::new())?;
        self.replace_for_org::<CachedStatusList>(organization_id, Vec::new())?;
        Ok(())
    }

    /// Remove all records, indexes and sync state.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        let mut names: Vec<&str> = Category::ALL.iter().map(|c| c.cf_name()).collect();
        names.extend([CF_PUBLIC_KEYS_BY_CONTROLLER, CF_ORG_INDEX, CF_SYNC_STATE]);
        let mut batch = WriteBatch::default();
        for name in names {
            let cf = self.cf(name)?;
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                let (key, _) = item?;
                batch.delete_cf(cf, key);
            }
        }
        self.db.write(batch)?;
        tracing::info!("local cache cleared");
        Ok(())
    }

    /// Store sync bookkeeping (metadata, versions, backoff).
    pub fn put_state<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let cf = self.cf(CF_SYNC_STATE)?;
        self.db.put_cf(cf, key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    pub fn get_state<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let cf = self.cf(CF_SYNC_STATE)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete_state(&self, key: &str) -> Result<(), CacheError> {
        let cf = self.cf(CF_SYNC_STATE)?;
        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }
}
