//! Owner reference merging
//!
//! A Secret can be shared by several pods mounting the same
//! SecretProviderClass, so it can accumulate one owner reference per pod
//! status object. Merging must never duplicate a logical owner and never drop
//! somebody else's reference.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::fmt;
use std::str::FromStr;

/// Which fields decide that two owner references name the same owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerRefMergeKey {
    /// apiVersion, kind and name must all match
    #[default]
    ApiVersionKindName,
    /// API group (version ignored), kind and name must match
    GroupKindName,
    /// UIDs must match
    Uid,
}

impl OwnerRefMergeKey {
    /// Whether `a` and `b` refer to the same logical owner under this key
    pub fn same_owner(self, a: &OwnerReference, b: &OwnerReference) -> bool {
        match self {
            Self::ApiVersionKindName => {
                a.api_version == b.api_version && a.kind == b.kind && a.name == b.name
            }
            Self::GroupKindName => {
                api_group(&a.api_version) == api_group(&b.api_version)
                    && a.kind == b.kind
                    && a.name == b.name
            }
            Self::Uid => a.uid == b.uid,
        }
    }
}

impl FromStr for OwnerRefMergeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apiVersionKindName" => Ok(Self::ApiVersionKindName),
            "groupKindName" => Ok(Self::GroupKindName),
            "uid" => Ok(Self::Uid),
            other => Err(format!(
                "unknown owner reference merge key '{other}' (expected apiVersionKindName, groupKindName or uid)"
            )),
        }
    }
}

impl fmt::Display for OwnerRefMergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ApiVersionKindName => "apiVersionKindName",
            Self::GroupKindName => "groupKindName",
            Self::Uid => "uid",
        })
    }
}

/// Group part of an apiVersion; the core group ("v1") is the empty string
fn api_group(api_version: &str) -> &str {
    api_version.rsplit_once('/').map_or("", |(group, _)| group)
}

/// Merge `candidate` into `existing`.
///
/// Returns `None` when an equivalent owner is already present (no write
/// needed), otherwise the existing list with the candidate appended. Existing
/// entries are kept untouched and in order.
pub fn merge_owner_reference(
    existing: &[OwnerReference],
    candidate: &OwnerReference,
    key: OwnerRefMergeKey,
) -> Option<Vec<OwnerReference>> {
    if existing.iter().any(|owner| key.same_owner(owner, candidate)) {
        return None;
    }
    let mut merged = existing.to_vec();
    merged.push(candidate.clone());
    Some(merged)
}
