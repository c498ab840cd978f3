use super::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of hex digits in a 48-bit hardware address.
const HARDWARE_ID_DIGITS: usize = 12;

/// Normalized hardware address in `XX:XX:XX:XX:XX:XX` form.
///
/// The only way to obtain one from untrusted input is [`normalize_hardware_id`],
/// so holding a `CanonicalId` means the value is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        normalize_hardware_id(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps a value read back from a store that only ever persisted canonical ids.
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CanonicalId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_hardware_id(s)
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize_hardware_id(&value)
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize any textual hardware address representation.
///
/// Separators are dropped, the rest is uppercased and must be exactly twelve
/// hex digits. Anything else is rejected as a whole.
pub fn normalize_hardware_id(raw: &str) -> DomainResult<CanonicalId> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_uppercase)
        .collect();

    if digits.chars().count() != HARDWARE_ID_DIGITS
        || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(DomainError::InvalidIdentifier(raw.to_string()));
    }

    let mut canonical = String::with_capacity(HARDWARE_ID_DIGITS + HARDWARE_ID_DIGITS / 2 - 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            canonical.push(':');
        }
        canonical.push(c);
    }

    Ok(CanonicalId(canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_textual_variants() {
        for raw in [
            "aa:bb:cc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "aabbccddeeff",
            "AaBb.CcDd.EeFf",
            "  aa bb cc dd ee ff  ",
        ] {
            let id = normalize_hardware_id(raw).unwrap();
            assert_eq!(id.as_str(), "AA:BB:CC:DD:EE:FF", "input: {raw}");
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_hardware_id("5c:cf:7f:01:02:0a").unwrap();
        let twice = normalize_hardware_id(once.as_str()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.as_str(), "5C:CF:7F:01:02:0A");
    }

    #[test]
    fn test_normalize_rejects_short_input() {
        let result = normalize_hardware_id("AA:BB");
        assert!(matches!(result, Err(DomainError::InvalidIdentifier(raw)) if raw == "AA:BB"));
    }

    #[test]
    fn test_normalize_rejects_non_hex() {
        assert!(matches!(
            normalize_hardware_id("GG:HH:II:JJ:KK:LL"),
            Err(DomainError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_too_long_and_empty() {
        assert!(normalize_hardware_id("AA:BB:CC:DD:EE:FF:00").is_err());
        assert!(normalize_hardware_id("").is_err());
        assert!(normalize_hardware_id(":::::").is_err());
    }

    #[test]
    fn test_normalize_rejects_unicode_letters() {
        assert!(normalize_hardware_id("ÄA:BB:CC:DD:EE:FF").is_err());
    }

    #[test]
    fn test_from_str_and_serde_round_through_normalizer() {
        let parsed: CanonicalId = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(parsed.to_string(), "AA:BB:CC:DD:EE:FF");

        let from_json: CanonicalId = serde_json::from_str("\"aabbccddeeff\"").unwrap();
        assert_eq!(from_json, parsed);
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"AA:BB:CC:DD:EE:FF\""
        );

        assert!(serde_json::from_str::<CanonicalId>("\"nope\"").is_err());
    }
}
