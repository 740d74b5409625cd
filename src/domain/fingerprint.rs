use std::fmt;

use md5::{Digest, Md5};

/// Identity material supplied by a caller for cache-key derivation.
///
/// `primary_id` names the remote content (e.g. a video id), `secondary_id` a
/// specific sub-resource of it (e.g. the id of one encoded audio stream) and
/// `raw_locator` the URL it was fetched from. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIdentity {
    pub primary_id: Option<String>,
    pub secondary_id: Option<String>,
    pub raw_locator: Option<String>,
}

impl ContentIdentity {
    pub fn new(
        primary_id: Option<String>,
        secondary_id: Option<String>,
        raw_locator: Option<String>,
    ) -> Self {
        Self {
            primary_id: non_blank(primary_id),
            secondary_id: non_blank(secondary_id),
            raw_locator: non_blank(raw_locator),
        }
    }

    pub fn from_locator(raw_locator: impl Into<String>) -> Self {
        Self::new(None, None, Some(raw_locator.into()))
    }

    /// True when the present material is not enough to pick a key, so every
    /// such identity would collide on the hash of the empty string.
    pub fn is_degenerate(&self) -> bool {
        self.key_material().is_empty()
    }

    /// The string that gets hashed, chosen from the most stable material available.
    fn key_material(&self) -> String {
        match (&self.primary_id, &self.secondary_id, &self.raw_locator) {
            (Some(primary), Some(secondary), _) => format!("{}_{}", primary, secondary),
            (Some(primary), None, Some(locator)) => format!("{}{}", locator, primary),
            (_, _, Some(locator)) => locator.clone(),
            _ => String::new(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Stable 128-bit content key, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn derive(identity: &ContentIdentity) -> Self {
        let mut hasher = Md5::new();
        hasher.update(identity.key_material().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ContentIdentity> for Fingerprint {
    fn from(identity: &ContentIdentity) -> Self {
        Self::derive(identity)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
