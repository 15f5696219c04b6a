use regex::Regex;
use std::{fmt, sync::LazyLock};

static DEFAULT_KID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)cenc:default_KID\s*=\s*"([^"]+)""#).unwrap());
static BARE_KID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bkid\s*=\s*"([^"]+)""#).unwrap());
static KEY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bkeyId\s*=\s*"([^"]+)""#).unwrap());
static PROTECTION_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<ContentProtection[^>]*value\s*=\s*"([^"]+)""#).unwrap());
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

/// A single way a manifest producer may embed its key id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// `cenc:default_KID="..."` attribute.
    DefaultKid,
    /// Bare `kid="..."` attribute.
    Kid,
    /// `keyId="..."` attribute.
    KeyId,
    /// `value="..."` attribute of a `<ContentProtection>` element.
    ContentProtectionValue,
    /// Any UUID shaped text in the document.
    Uuid,
}

impl Probe {
    /// Probes in the order they are tried. Earlier probes are more authoritative.
    pub const ORDER: [Probe; 5] = [
        Probe::DefaultKid,
        Probe::Kid,
        Probe::KeyId,
        Probe::ContentProtectionValue,
        Probe::Uuid,
    ];

    fn regex(self) -> &'static Regex {
        match self {
            Probe::DefaultKid => &DEFAULT_KID,
            Probe::Kid => &BARE_KID,
            Probe::KeyId => &KEY_ID,
            Probe::ContentProtectionValue => &PROTECTION_VALUE,
            Probe::Uuid => &UUID,
        }
    }

    /// Raw (still hyphenated) match of this probe.
    pub fn find(self, text: &str) -> Option<&str> {
        let caps = self.regex().captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|x| x.as_str())
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Probe::DefaultKid => "cenc:default_KID",
            Probe::Kid => "kid",
            Probe::KeyId => "keyId",
            Probe::ContentProtectionValue => "ContentProtection@value",
            Probe::Uuid => "uuid",
        })
    }
}

/// Key id found inside a manifest, with hyphens removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kid {
    pub value: String,
    pub probe: Probe,
}

impl Kid {
    fn new(raw: &str, probe: Probe) -> Self {
        Self {
            value: raw.replace('-', ""),
            probe,
        }
    }

    /// Returns true when the value is exactly 32 hexadecimal characters.
    pub fn is_canonical(&self) -> bool {
        self.value.len() == 32 && self.value.chars().all(|x| x.is_ascii_hexdigit())
    }
}

impl fmt::Display for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Run every [`Probe`] in priority order and return the first hit.
pub fn find_kid(text: &str) -> Option<Kid> {
    Probe::ORDER
        .iter()
        .find_map(|&probe| probe.find(text).map(|raw| Kid::new(raw, probe)))
}

/// Same as [`find_kid`] but only returns the normalized key id.
pub fn extract_kid(text: &str) -> Option<String> {
    find_kid(text).map(|x| x.value)
}
