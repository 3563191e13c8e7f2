//! Channel (distribution track) identifiers.

use serde::{Deserialize, Serialize};

/// A logical distribution track: `stable` is primary, `testing-<name>`
/// tracks are siblings. Serializes as the plain string form used in
/// manifest paths and state keys (`"stable"`, `"testing-live"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Channel {
    /// The primary, always-present channel.
    Stable,
    /// A named testing track, e.g. `testing-live` -> `Testing("live")`.
    Testing(String),
}

impl Channel {
    /// Parse a channel id of the form `stable` or `testing-<name>`.
    pub fn parse(id: &str) -> Result<Self, ChannelParseError> {
        if id == "stable" {
            return Ok(Channel::Stable);
        }
        match id.strip_prefix("testing-") {
            Some(name) if !name.is_empty() => Ok(Channel::Testing(name.to_string())),
            _ => Err(ChannelParseError(id.to_string())),
        }
    }

    /// The directory name this channel corresponds to under the manifest
    /// store root: `stable` -> `stable`, `testing-live` -> `testing/live`.
    pub fn directory_segments(&self) -> (&'static str, Option<&str>) {
        match self {
            Channel::Stable => ("stable", None),
            Channel::Testing(track) => ("testing", Some(track.as_str())),
        }
    }

    /// Track name used for toolchain resolution: for `testing-<name>` this
    /// is `<name>`, for `stable` there is no track override key.
    pub fn track_key(&self) -> &str {
        match self {
            Channel::Stable => "stable",
            Channel::Testing(name) => name.as_str(),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Stable => write!(f, "stable"),
            Channel::Testing(name) => write!(f, "testing-{name}"),
        }
    }
}

impl From<Channel> for String {
    fn from(c: Channel) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for Channel {
    type Error = ChannelParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Channel::parse(&value)
    }
}

/// A channel id that is neither `stable` nor `testing-<name>`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid channel id: {0:?} (expected \"stable\" or \"testing-<name>\")")]
pub struct ChannelParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stable() {
        assert_eq!(Channel::parse("stable").unwrap(), Channel::Stable);
    }

    #[test]
    fn parses_testing_track() {
        assert_eq!(
            Channel::parse("testing-live").unwrap(),
            Channel::Testing("live".to_string())
        );
    }

    #[test]
    fn rejects_bare_testing() {
        assert!(Channel::parse("testing-").is_err());
        assert!(Channel::parse("testing").is_err());
        assert!(Channel::parse("unstable").is_err());
    }

    #[test]
    fn round_trips_through_display() {
        for c in [Channel::Stable, Channel::Testing("live".into())] {
            assert_eq!(Channel::parse(&c.to_string()).unwrap(), c);
        }
    }
}
