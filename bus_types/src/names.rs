//! Bus names, object paths and member-name grammar

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound the bus imposes on every name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Errors produced when a string does not satisfy the bus naming grammar
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Invalid bus name '{name}': {reason}")]
    InvalidBusName { name: String, reason: &'static str },

    #[error("Invalid object path '{path}': {reason}")]
    InvalidObjectPath { path: String, reason: &'static str },

    #[error("Invalid interface name '{name}': {reason}")]
    InvalidInterfaceName { name: String, reason: &'static str },

    #[error("Invalid member name '{name}': {reason}")]
    InvalidMemberName { name: String, reason: &'static str },

    #[error("Invalid error name '{name}': {reason}")]
    InvalidErrorName { name: String, reason: &'static str },
}

/// Name of a connection on the bus
///
/// Either a well-known name (`org.example.Service`), whose ownership is
/// requested from the daemon, or a unique name (`:1.42`) assigned to a
/// connection when it joins the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BusName(String);

impl BusName {
    /// Validates and wraps a bus name
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        check_bus_name(&name).map_err(|reason| NameError::InvalidBusName {
            name: name.clone(),
            reason,
        })?;
        Ok(Self(name))
    }

    /// Returns true for connection-unique names (`:1.42`)
    pub fn is_unique(&self) -> bool {
        self.0.starts_with(':')
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_bus_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty");
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err("longer than 255 bytes");
    }
    let (unique, body) = match name.strip_prefix(':') {
        Some(rest) => (true, rest),
        None => (false, name),
    };
    let mut elements = 0;
    for element in body.split('.') {
        if element.is_empty() {
            return Err("empty element");
        }
        if !element
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err("element contains characters outside [A-Za-z0-9_-]");
        }
        if !unique && element.as_bytes()[0].is_ascii_digit() {
            return Err("element starts with a digit");
        }
        elements += 1;
    }
    if elements < 2 {
        return Err("needs at least two elements");
    }
    Ok(())
}

impl fmt::Display for BusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BusName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BusName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BusName> for String {
    fn from(name: BusName) -> Self {
        name.0
    }
}

impl AsRef<str> for BusName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Path of an object within a service's namespace
///
/// The root is `/`; every other path is a sequence of non-empty
/// `[A-Za-z0-9_]` segments, each preceded by `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validates and wraps an object path
    pub fn new(path: impl Into<String>) -> Result<Self, NameError> {
        let path = path.into();
        check_object_path(&path).map_err(|reason| NameError::InvalidObjectPath {
            path: path.clone(),
            reason,
        })?;
        Ok(Self(path))
    }

    /// The root path `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns true for `/`
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends one segment to this path
    pub fn join(&self, segment: &str) -> Result<Self, NameError> {
        if self.is_root() {
            Self::new(format!("/{}", segment))
        } else {
            Self::new(format!("{}/{}", self.0, segment))
        }
    }

    /// Returns the first segment below `self` on the way to `descendant`
    ///
    /// `/a` is the parent of `/a/b/c`, whose direct child segment is `b`.
    pub fn child_segment<'a>(&self, descendant: &'a ObjectPath) -> Option<&'a str> {
        let rest = if self.is_root() {
            descendant.0.strip_prefix('/')?
        } else {
            descendant.0.strip_prefix(self.0.as_str())?.strip_prefix('/')?
        };
        rest.split('/').next().filter(|segment| !segment.is_empty())
    }
}

fn check_object_path(path: &str) -> Result<(), &'static str> {
    if path == "/" {
        return Ok(());
    }
    let rest = path.strip_prefix('/').ok_or("must start with '/'")?;
    for segment in rest.split('/') {
        if segment.is_empty() {
            return Err("empty segment or trailing '/'");
        }
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err("segment contains characters outside [A-Za-z0-9_]");
        }
    }
    Ok(())
}

impl Default for ObjectPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectPath {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ObjectPath> for String {
    fn from(path: ObjectPath) -> Self {
        path.0
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_dotted(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty");
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err("longer than 255 bytes");
    }
    let mut elements = 0;
    for element in name.split('.') {
        check_element(element)?;
        elements += 1;
    }
    if elements < 2 {
        return Err("needs at least two elements");
    }
    Ok(())
}

fn check_element(element: &str) -> Result<(), &'static str> {
    if element.is_empty() {
        return Err("empty element");
    }
    if !element
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return Err("contains characters outside [A-Za-z0-9_]");
    }
    if element.as_bytes()[0].is_ascii_digit() {
        return Err("starts with a digit");
    }
    Ok(())
}

/// Checks an interface name such as `org.freedesktop.DBus.Properties`
pub fn validate_interface_name(name: &str) -> Result<(), NameError> {
    check_dotted(name).map_err(|reason| NameError::InvalidInterfaceName {
        name: name.to_string(),
        reason,
    })
}

/// Checks an error name; the grammar is the interface grammar
pub fn validate_error_name(name: &str) -> Result<(), NameError> {
    check_dotted(name).map_err(|reason| NameError::InvalidErrorName {
        name: name.to_string(),
        reason,
    })
}

/// Checks a method or signal name such as `ListNames`
pub fn validate_member_name(name: &str) -> Result<(), NameError> {
    let result = if name.len() > MAX_NAME_LENGTH {
        Err("longer than 255 bytes")
    } else {
        check_element(name)
    };
    result.map_err(|reason| NameError::InvalidMemberName {
        name: name.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_bus_name() {
        let name = BusName::new("org.freedesktop.DBus").unwrap();
        assert!(!name.is_unique());
        assert_eq!(name.as_str(), "org.freedesktop.DBus");
        assert!(BusName::new("very.unlikely.that.this-name.exists").is_ok());
    }

    #[test]
    fn test_unique_bus_name() {
        let name = BusName::new(":1.42").unwrap();
        assert!(name.is_unique());
    }

    #[test]
    fn test_invalid_bus_names() {
        assert!(BusName::new("").is_err());
        assert!(BusName::new("single").is_err());
        assert!(BusName::new("org..example").is_err());
        assert!(BusName::new("org.1example").is_err());
        assert!(BusName::new("org.exa mple").is_err());
        assert!(BusName::new(format!("a.{}", "b".repeat(300))).is_err());
    }

    #[test]
    fn test_object_path_grammar() {
        assert!(ObjectPath::new("/").is_ok());
        assert!(ObjectPath::new("/this/is/unlikely/to/exist/Service").is_ok());
        assert!(ObjectPath::new("").is_err());
        assert!(ObjectPath::new("relative/path").is_err());
        assert!(ObjectPath::new("/trailing/").is_err());
        assert!(ObjectPath::new("//double").is_err());
        assert!(ObjectPath::new("/with-dash").is_err());
    }

    #[test]
    fn test_object_path_join_and_children() {
        let root = ObjectPath::root();
        let child = root.join("org").unwrap();
        assert_eq!(child.as_str(), "/org");
        let leaf = child.join("example").unwrap();
        assert_eq!(leaf.as_str(), "/org/example");

        assert_eq!(root.child_segment(&leaf), Some("org"));
        assert_eq!(child.child_segment(&leaf), Some("example"));
        assert_eq!(leaf.child_segment(&leaf), None);
        let unrelated = ObjectPath::new("/orgx").unwrap();
        assert_eq!(child.child_segment(&unrelated), None);
    }

    #[test]
    fn test_member_and_interface_names() {
        assert!(validate_member_name("ListNames").is_ok());
        assert!(validate_member_name("List.Names").is_err());
        assert!(validate_member_name("9Lives").is_err());
        assert!(validate_interface_name("org.freedesktop.DBus.Properties").is_ok());
        assert!(validate_interface_name("Properties").is_err());
        assert!(validate_error_name("does.not.exist.MyError").is_ok());
        assert!(validate_error_name("does-not.exist").is_err());
    }

    #[test]
    fn test_names_serde_validates() {
        let name: BusName = serde_json::from_str("\"org.example.Service\"").unwrap();
        assert_eq!(name.as_str(), "org.example.Service");
        assert!(serde_json::from_str::<BusName>("\"nodots\"").is_err());
        assert!(serde_json::from_str::<ObjectPath>("\"no/slash\"").is_err());
    }
}
