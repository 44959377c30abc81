use std::fmt;

use chrono::Utc;

/// Identity of one harvest attempt; doubles as the checkpoint storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            anyhow::bail!("session id must not be empty");
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            anyhow::bail!("session id contains unsupported character {bad:?}: {raw}");
        }
        Ok(Self(raw.to_owned()))
    }

    /// Second-resolution timestamp plus a random suffix, so two sessions
    /// started in the same second still get distinct keys.
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{stamp}-{}", &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
