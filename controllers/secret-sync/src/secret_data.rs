//! Building Secret content from a SecretProviderClass `secretObjects` entry
//!
//! Each `data` item maps a mounted file (`objectName`) to a Secret key. For
//! `kubernetes.io/tls` secrets the mounted file usually holds both key and
//! certificate chain in one PEM bundle, so `tls.key` and `tls.crt` receive
//! only their half of it.

use crate::error::ControllerError;
use crds::SecretObject;
use k8s_openapi::ByteString;
use pem::{EncodeConfig, LineEnding, Pem};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Label marking secrets created by this controller
pub const MANAGED_LABEL: &str = "secrets-store.csi.k8s.io/managed";

pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";
const TLS_KEY: &str = "tls.key";
const TLS_CERT: &str = "tls.crt";

/// Check that a `secretObjects` entry has everything needed to build a Secret
pub fn validate(object: &SecretObject) -> Result<(), ControllerError> {
    if object.secret_name.is_empty() {
        return Err(ControllerError::InvalidSecretObject(
            "secretName is empty".to_string(),
        ));
    }
    let invalid = |what: &str| {
        ControllerError::InvalidSecretObject(format!("{}: {what}", object.secret_name))
    };
    if object.type_.is_empty() {
        return Err(invalid("type is empty"));
    }
    if object.data.is_empty() {
        return Err(invalid("data is empty"));
    }
    if let Some(item) = object
        .data
        .iter()
        .find(|item| item.object_name.is_empty() || item.key.is_empty())
    {
        return Err(invalid(&format!(
            "data entry has empty objectName or key (objectName '{}', key '{}')",
            item.object_name, item.key
        )));
    }
    Ok(())
}

/// Labels for a new Secret: the object's own labels plus the managed marker
pub fn secret_labels(object: &SecretObject) -> BTreeMap<String, String> {
    let mut labels = object.labels.clone();
    labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
    labels
}

/// Read the mounted files named by `object.data` into a Secret data map
pub async fn build_secret_data(
    object: &SecretObject,
    files: &BTreeMap<String, PathBuf>,
) -> Result<BTreeMap<String, ByteString>, ControllerError> {
    let mut data = BTreeMap::new();
    for item in &object.data {
        let path = files.get(&item.object_name).ok_or_else(|| {
            ControllerError::SecretData(format!(
                "file matching objectName {} not found in the pod",
                item.object_name
            ))
        })?;
        let content = tokio::fs::read(path).await.map_err(|e| {
            ControllerError::SecretData(format!("failed to read {}: {e}", path.display()))
        })?;
        let value = if object.type_ == TLS_SECRET_TYPE {
            tls_value(&item.key, &content)?
        } else {
            content
        };
        data.insert(item.key.clone(), ByteString(value));
    }
    Ok(data)
}

fn tls_value(key: &str, content: &[u8]) -> Result<Vec<u8>, ControllerError> {
    let select: fn(&str) -> bool = match key {
        TLS_KEY => |tag| tag.ends_with("PRIVATE KEY"),
        TLS_CERT => |tag| tag == "CERTIFICATE",
        _ => return Ok(content.to_vec()),
    };
    let blocks: Vec<Pem> = pem::parse_many(content)
        .map_err(|e| ControllerError::SecretData(format!("{key}: failed to parse PEM: {e}")))?
        .into_iter()
        .filter(|block| select(block.tag()))
        .collect();
    if blocks.is_empty() {
        return Err(ControllerError::SecretData(format!(
            "{key}: no matching PEM block found"
        )));
    }
    let config = EncodeConfig::new().set_line_ending(LineEnding::LF);
    Ok(pem::encode_many_config(&blocks, config).into_bytes())
}
