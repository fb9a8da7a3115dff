//! Model references (`name[:version]`)

use crate::error::{RunnerError, RunnerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version alias that resolves to the most recently created version
pub const LATEST: &str = "latest";

const MAX_NAME_LEN: usize = 63;

/// Identifier of a saved model: a name plus an optional version.
///
/// A missing version and the literal `latest` are the same thing; both are
/// stored as `None` and resolved by the model store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    name: String,
    version: Option<String>,
}

impl Tag {
    /// Build a tag from its parts, validating both.
    pub fn new(name: impl AsRef<str>, version: Option<&str>) -> RunnerResult<Self> {
        let input = match version {
            Some(v) => format!("{}:{}", name.as_ref(), v),
            None => name.as_ref().to_string(),
        };
        let name = validate_name(&input, name.as_ref())?;
        let version = match version {
            None => None,
            Some(v) if v.eq_ignore_ascii_case(LATEST) => None,
            Some(v) => Some(validate_version(&input, v)?),
        };
        Ok(Self { name, version })
    }

    /// Parse `name` or `name:version`.
    pub fn parse(input: &str) -> RunnerResult<Self> {
        let input = input.trim();
        match input.split_once(':') {
            Some((name, version)) => {
                if version.contains(':') {
                    return Err(invalid(input, "more than one ':' separator"));
                }
                Self::new(name, Some(version))
            }
            None => Self::new(input, None),
        }
    }

    /// Create a tag for a fresh save, with a generated version.
    pub fn with_generated_version(name: impl AsRef<str>) -> RunnerResult<Self> {
        let version = generate_version();
        Self::new(name, Some(&version))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete version, or `None` when the tag means `latest`
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn is_latest(&self) -> bool {
        self.version.is_none()
    }

    /// Same name, pinned to a concrete version
    pub fn pinned(&self, version: &str) -> RunnerResult<Self> {
        Self::new(&self.name, Some(version))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version().unwrap_or(LATEST))
    }
}

impl FromStr for Tag {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = RunnerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Tag {
    type Error = RunnerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

/// Version string of the form `YYYYMMDD_XXXXXX`, e.g. `20210929_153BC4`.
pub fn generate_version() -> String {
    let date = chrono::Utc::now().format("%Y%m%d");
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("{date}_{suffix}")
}

fn invalid(input: &str, reason: &str) -> RunnerError {
    RunnerError::InvalidTag {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn validate_name(input: &str, name: &str) -> RunnerResult<String> {
    if name.is_empty() {
        return Err(invalid(input, "name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(input, "name must be at most 63 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid(input, "name must start with a letter or digit"));
    }
    if let Some(bad) = name.chars().find(|c| !is_tag_char(*c)) {
        return Err(invalid(input, &format!("name contains invalid character {bad:?}")));
    }
    Ok(name.to_ascii_lowercase())
}

fn validate_version(input: &str, version: &str) -> RunnerResult<String> {
    if version.is_empty() {
        return Err(invalid(input, "version must not be empty"));
    }
    if !version.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid(input, "version must start with a letter or digit"));
    }
    if let Some(bad) = version.chars().find(|c| !is_tag_char(*c)) {
        return Err(invalid(
            input,
            &format!("version contains invalid character {bad:?}"),
        ));
    }
    Ok(version.to_string())
}
