use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use veritas_core::constants::{DID_CONTEXT_V1_URL, ED25519_2020_CONTEXT_URL, SECURITY_CONTEXT_V2_URL};

use crate::key_data::PublicKeyData;

/// A verification method within a DID Document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type", default)]
    pub method_type: String,
    #[serde(default)]
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,
}

/// The subset of a W3C DID Document the resolvers consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
    /// Method references: either an id string or an embedded method.
    #[serde(default)]
    pub assertion_method: Vec<Value>,
    #[serde(default)]
    pub authentication: Vec<Value>,
}

fn references(entries: &[Value], id: &str, doc_id: &str) -> bool {
    entries.iter().any(|entry| {
        let reference = match entry {
            Value::String(s) => s.as_str(),
            other => other.get("id").and_then(Value::as_str).unwrap_or_default(),
        };
        reference == id || absolutize(reference, doc_id) == id
    })
}

/// Resolve a relative `#fragment` reference against the document id.
fn absolutize(reference: &str, doc_id: &str) -> String {
    if reference.starts_with('#') {
        format!("{}{}", doc_id, reference)
    } else {
        reference.to_string()
    }
}

impl DidDocument {
    /// Verification methods, with embedded `assertionMethod` entries
    /// included and relative ids made absolute.
    pub fn methods(&self) -> Vec<VerificationMethod> {
        let embedded = self
            .assertion_method
            .iter()
            .chain(self.authentication.iter())
            .filter(|v| v.is_object())
            .filter_map(|v| serde_json::from_value::<VerificationMethod>(v.clone()).ok());
        self.verification_method
            .iter()
            .cloned()
            .chain(embedded)
            .map(|mut vm| {
                vm.id = absolutize(&vm.id, &self.id);
                if vm.controller.is_empty() {
                    vm.controller = self.id.clone();
                }
                vm
            })
            .collect()
    }

    /// The method with `id`, or for a bare DID the first assertion method.
    pub fn find_method(&self, id: &str) -> Option<VerificationMethod> {
        let methods = self.methods();
        if let Some(vm) = methods.iter().find(|vm| vm.id == id) {
            return Some(vm.clone());
        }
        if !id.contains('#') {
            return methods
                .iter()
                .find(|vm| self.purpose_of(&vm.id) == "assertion")
                .or_else(|| methods.first())
                .cloned();
        }
        None
    }

    pub fn is_authentication_method(&self, method_id: &str) -> bool {
        references(&self.authentication, method_id, &self.id)
    }

    /// `assertion` if the method is listed under `assertionMethod`,
    /// otherwise `authentication`.
    pub fn purpose_of(&self, method_id: &str) -> &'static str {
        if references(&self.assertion_method, method_id, &self.id) {
            "assertion"
        } else {
            "authentication"
        }
    }
}

/// A standalone verification-method document built from cached key
/// material, so proof checks never need to fetch it.
pub fn verification_method_document(key: &PublicKeyData) -> Value {
    let mut doc = json!({
        "@context": [DID_CONTEXT_V1_URL, SECURITY_CONTEXT_V2_URL, ED25519_2020_CONTEXT_URL],
        "id": key.key_id,
        "type": key.key_type,
        "controller": key.controller,
    });
    if let Value::Object(map) = &mut doc {
        if let Some(v) = &key.public_key_multibase {
            map.insert("publicKeyMultibase".into(), json!(v));
        }
        if let Some(v) = &key.public_key_jwk {
            map.insert("publicKeyJwk".into(), v.clone());
        }
        if let Some(v) = &key.public_key_hex {
            map.insert("publicKeyHex".into(), json!(v));
        }
        if let Some(v) = &key.public_key_pem {
            map.insert("publicKeyPem".into(), json!(v));
        }
    }
    doc
}

/// A controller document referencing `keys` for both assertion and
/// authentication.
pub fn controller_document(controller: &str, keys: &[PublicKeyData]) -> Value {
    let ids: Vec<&str> = keys.iter().map(|k| k.key_id.as_str()).collect();
    let methods: Vec<Value> = keys.iter().map(verification_method_document).collect();
    json!({
        "@context": [DID_CONTEXT_V1_URL, SECURITY_CONTEXT_V2_URL, ED25519_2020_CONTEXT_URL],
        "id": controller,
        "verificationMethod": methods,
        "assertionMethod": ids,
        "authentication": ids,
    })
}
