//! Canonical JSON and the verify-data construction shared by every proof
//! suite.
//!
//! Canonical form: object members sorted by key (byte order), arrays in
//! order, no whitespace, strings and numbers rendered the way `serde_json`
//! prints them.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Proof members that carry the signature itself and are excluded from the
/// signed proof options.
const SIGNATURE_FIELDS: [&str; 3] = ["proofValue", "jws", "signatureValue"];

/// Render `value` in canonical form.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::String(_) => {
            let _ = write!(out, "{}", value);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", Value::from(key.as_str()));
                out.push(':');
                write_value(&map[key], out);
            }
            out.push('}');
        }
    }
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// The proof object with its signature members removed.
pub fn proof_options(proof: &Value) -> Value {
    let mut options = proof.clone();
    if let Value::Object(map) = &mut options {
        for field in SIGNATURE_FIELDS {
            map.remove(field);
        }
    }
    options
}

/// The secured document with its `proof` member removed.
pub fn unsecured_document(document: &Value) -> Value {
    let mut doc = document.clone();
    if let Value::Object(map) = &mut doc {
        map.remove("proof");
    }
    doc
}

/// `SHA-256(canonical(proof options)) || SHA-256(canonical(document))`.
pub fn verify_data(document: &Value, proof: &Value) -> Vec<u8> {
    let options = canonicalize(&proof_options(proof));
    let doc = canonicalize(&unsecured_document(document));
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&sha256(options.as_bytes()));
    data.extend_from_slice(&sha256(doc.as_bytes()));
    data
}
