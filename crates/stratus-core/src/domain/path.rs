//! Virtual namespace paths
//!
//! A [`VirtualPath`] is the POSIX-like absolute identifier of a row inside an
//! owner's namespace. Validation happens at construction time so that every
//! instance in the system satisfies the path invariants:
//!
//! - starts with `/`
//! - only the root `/` ends with `/`
//! - never contains `//`
//! - non-empty

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::CoreError;

/// Validated absolute path inside an owner's namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VirtualPath(String);

impl VirtualPath {
    /// Parses and validates a path.
    pub fn new(path: impl Into<String>) -> Result<Self, CoreError> {
        let path = path.into();
        if path.is_empty() {
            return Err(CoreError::InvalidArgument("path cannot be empty".to_string()));
        }
        if !path.starts_with('/') {
            return Err(CoreError::InvalidArgument(format!(
                "path must start with /: {path}"
            )));
        }
        if path != "/" && path.ends_with('/') {
            return Err(CoreError::InvalidArgument(format!(
                "path cannot end with / (except root): {path}"
            )));
        }
        if path.contains("//") {
            return Err(CoreError::InvalidArgument(format!(
                "path cannot contain //: {path}"
            )));
        }
        Ok(Self(path))
    }

    /// The namespace root `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Parent directory path; the root is its own parent.
    pub fn parent(&self) -> VirtualPath {
        if self.is_root() {
            return Self::root();
        }
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(idx) => Self(self.0[..idx].to_string()),
        }
    }

    /// Final path segment; empty for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Appends a single segment, validating the result.
    ///
    /// The segment itself may not contain `/`.
    pub fn join(&self, segment: &str) -> Result<VirtualPath, CoreError> {
        if segment.is_empty() || segment.contains('/') {
            return Err(CoreError::InvalidArgument(format!(
                "invalid path segment: {segment:?}"
            )));
        }
        if self.is_root() {
            VirtualPath::new(format!("/{segment}"))
        } else {
            VirtualPath::new(format!("{}/{segment}", self.0))
        }
    }

    /// True when `self` lies strictly inside the directory at `dir`.
    ///
    /// Used to reject moving or copying a directory into its own subtree.
    pub fn is_inside(&self, dir: &VirtualPath) -> bool {
        if dir.is_root() {
            return !self.is_root();
        }
        self.0.starts_with(&format!("{}/", dir.0))
    }

    /// SQL LIKE pattern matching every strict descendant of this directory.
    pub fn descendants_pattern(&self) -> String {
        if self.is_root() {
            "/%".to_string()
        } else {
            format!("{}/%", self.0)
        }
    }

    /// SQL LIKE pattern matching descendants deeper than direct children.
    pub fn grandchildren_pattern(&self) -> String {
        if self.is_root() {
            "/%/%".to_string()
        } else {
            format!("{}/%/%", self.0)
        }
    }
}

impl Display for VirtualPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VirtualPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VirtualPath {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VirtualPath> for String {
    fn from(p: VirtualPath) -> Self {
        p.0
    }
}
