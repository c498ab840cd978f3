use super::CanonicalId;
use serde::Serialize;
use std::fmt;

/// Authoritative identity of a telemetry source, decided at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Identity {
    /// Device known by its hardware address and backed by a registry record.
    Canonical(CanonicalId),
    /// Device only known by the firmware-configured identifier.
    Legacy(String),
}

impl Identity {
    pub fn key(&self) -> &str {
        match self {
            Identity::Canonical(id) => id.as_str(),
            Identity::Legacy(legacy_id) => legacy_id,
        }
    }

    pub fn canonical_id(&self) -> Option<&CanonicalId> {
        match self {
            Identity::Canonical(id) => Some(id),
            Identity::Legacy(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Canonical(id) => write!(f, "canonical:{}", id),
            Identity::Legacy(legacy_id) => write!(f, "legacy:{}", legacy_id),
        }
    }
}
