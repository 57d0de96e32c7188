//! The four organization-scoped record kinds held by the cache.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record category. Each maps to its own column family and is replaced
/// independently during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    PublicKeys,
    Contexts,
    RevokedVcs,
    StatusLists,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Self::PublicKeys,
        Self::Contexts,
        Self::RevokedVcs,
        Self::StatusLists,
    ];

    pub fn cf_name(&self) -> &'static str {
        match self {
            Self::PublicKeys => "public_keys",
            Self::Contexts => "contexts",
            Self::RevokedVcs => "revoked_vcs",
            Self::StatusLists => "status_lists",
        }
    }
}

/// A record the store knows how to key, scope and index.
pub trait CacheRecord: Serialize + DeserializeOwned + Send {
    const CATEGORY: Category;

    fn primary_key(&self) -> &str;

    fn organization_id(&self) -> Option<&str>;

    fn set_organization_id(&mut self, organization_id: Option<String>);

    /// Secondary lookup key, stored in the controller index.
    fn controller(&self) -> Option<&str> {
        None
    }

    /// Repair derived fields before the record is written.
    fn normalize(&mut self) {}
}

fn default_true() -> bool {
    true
}

fn default_purpose() -> String {
    "assertion".into()
}

/// Public key material for one verification method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPublicKey {
    #[serde(alias = "keyId")]
    pub key_id: String,
    #[serde(alias = "keyType", default)]
    pub key_type: String,
    #[serde(alias = "publicKeyMultibase", default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(alias = "publicKeyHex", default, skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
    #[serde(alias = "publicKeyJwk", default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Value>,
    #[serde(alias = "publicKeyPem", default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,
    #[serde(default)]
    pub controller: String,
    #[serde(default = "default_purpose")]
    pub purpose: String,
    #[serde(alias = "isActive", default = "default_true")]
    pub is_active: bool,
    #[serde(alias = "organizationId", default)]
    pub organization_id: Option<String>,
    #[serde(alias = "expiresAt", default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(alias = "revokedAt", default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl CachedPublicKey {
    pub fn new(key_id: impl Into<String>, key_type: impl Into<String>) -> Self {
        let key_id = key_id.into();
        Self {
            controller: controller_of(&key_id).to_string(),
            key_id,
            key_type: key_type.into(),
            public_key_multibase: None,
            public_key_hex: None,
            public_key_jwk: None,
            public_key_pem: None,
            purpose: default_purpose(),
            is_active: true,
            organization_id: None,
            expires_at: None,
            revoked_at: None,
        }
    }

    pub fn with_multibase(mut self, value: impl Into<String>) -> Self {
        self.public_key_multibase = Some(value.into());
        self
    }

    pub fn with_hex(mut self, value: impl Into<String>) -> Self {
        self.public_key_hex = Some(value.into());
        self
    }

    pub fn with_jwk(mut self, value: Value) -> Self {
        self.public_key_jwk = Some(value);
        self
    }

    pub fn with_pem(mut self, value: impl Into<String>) -> Self {
        self.public_key_pem = Some(value.into());
        self
    }

    /// Active, not revoked, and not past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.revoked_at.is_none()
            && self.expires_at.map_or(true, |exp| exp > now)
    }

    pub fn has_material(&self) -> bool {
        self.public_key_multibase.is_some()
            || self.public_key_hex.is_some()
            || self.public_key_jwk.is_some()
            || self.public_key_pem.is_some()
    }
}

/// The key id with any `#fragment` removed.
pub fn controller_of(key_id: &str) -> &str {
    key_id.split('#').next().unwrap_or(key_id)
}

impl CacheRecord for CachedPublicKey {
    const CATEGORY: Category = Category::PublicKeys;

    fn primary_key(&self) -> &str {
        &self.key_id
    }

    fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    fn set_organization_id(&mut self, organization_id: Option<String>) {
        self.organization_id = organization_id;
    }

    fn controller(&self) -> Option<&str> {
        Some(&self.controller)
    }

    fn normalize(&mut self) {
        self.controller = controller_of(&self.key_id).to_string();
        if self.purpose.is_empty() {
            self.purpose = default_purpose();
        }
    }
}

/// Where a cached context document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    Prime,
    OrgSync,
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedContext {
    pub url: String,
    pub document: Value,
    #[serde(default = "Utc::now")]
    pub cached_at: DateTime<Utc>,
    pub source: ContextSource,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl CachedContext {
    pub fn new(url: impl Into<String>, document: Value, source: ContextSource) -> Self {
        Self {
            url: url.into(),
            document,
            cached_at: Utc::now(),
            source,
            organization_id: None,
        }
    }
}

impl CacheRecord for CachedContext {
    const CATEGORY: Category = Category::Contexts;

    fn primary_key(&self) -> &str {
        &self.url
    }

    fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    fn set_organization_id(&mut self, organization_id: Option<String>) {
        self.organization_id = organization_id;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRevokedVc {
    #[serde(alias = "vcId")]
    pub vc_id: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(alias = "revokedAt", default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(alias = "organizationId", default)]
    pub organization_id: Option<String>,
}

impl CachedRevokedVc {
    pub fn new(vc_id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            vc_id: vc_id.into(),
            issuer: issuer.into(),
            subject: None,
            reason: None,
            revoked_at: Some(Utc::now()),
            organization_id: None,
        }
    }
}

impl CacheRecord for CachedRevokedVc {
    const CATEGORY: Category = Category::RevokedVcs;

    fn primary_key(&self) -> &str {
        &self.vc_id
    }

    fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    fn set_organization_id(&mut self, organization_id: Option<String>) {
        self.organization_id = organization_id;
    }
}

/// A signed status-list credential, stored whole so its proof can be
/// re-verified on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStatusList {
    #[serde(alias = "statusListId")]
    pub status_list_id: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(alias = "statusPurpose", default)]
    pub status_purpose: Vec<String>,
    #[serde(alias = "fullCredential")]
    pub full_credential: Value,
    #[serde(default = "Utc::now")]
    pub cached_at: DateTime<Utc>,
    #[serde(alias = "organizationId", default)]
    pub organization_id: Option<String>,
}

impl CachedStatusList {
    /// Build from a status-list credential, deriving issuer and purposes.
    pub fn from_credential(status_list_id: impl Into<String>, credential: Value) -> Self {
        let issuer = match credential.get("issuer") {
            Some(Value::String(s)) => s.clone(),
            Some(obj) => obj
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            None => String::new(),
        };
        let status_purpose = match credential.pointer("/credentialSubject/statusPurpose") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            status_list_id: status_list_id.into(),
            issuer,
            status_purpose,
            full_credential: credential,
            cached_at: Utc::now(),
            organization_id: None,
        }
    }
}

impl CacheRecord for CachedStatusList {
    const CATEGORY: Category = Category::StatusLists;

    fn primary_key(&self) -> &str {
        &self.status_list_id
    }

    fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    fn set_organization_id(&mut self, organization_id: Option<String>) {
        self.organization_id = organization_id;
    }
}
