use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A schema version marker.
///
/// Serializes as the integer `V` and refuses to deserialize any other
/// value, so file formats can dispatch on their version field.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version<const V: u8>;

impl<const V: u8> Default for Version<V> {
    fn default() -> Self {
        Self
    }
}

impl<const V: u8> Debug for Version<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Version").field("value", &V).finish()
    }
}

#[derive(Debug, Error)]
#[error("Invalid version")]
struct VersionError;

impl<const V: u8> Serialize for Version<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(V)
    }
}

impl<'de, const V: u8> Deserialize<'de> for Version<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        if value == V {
            Ok(Version::<V>)
        } else {
            Err(serde::de::Error::custom(VersionError))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize, Deserialize, Debug)]
    struct Doc {
        #[serde(default)]
        version: Version<1>,
    }

    #[test]
    fn accepts_matching_and_implicit_versions() {
        serde_json::from_value::<Doc>(json!({ "version": 1 })).expect("explicit version");
        serde_json::from_value::<Doc>(json!({})).expect("implicit version");
    }

    #[test]
    fn rejects_other_versions() {
        serde_json::from_value::<Doc>(json!({ "version": 2 })).expect_err("wrong version");
    }
}
