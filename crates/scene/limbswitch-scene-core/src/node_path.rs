//! NodePath / Plug parsing and namespace scoping.
//!
//! Grammar (host-style, namespaces separated by ':'):
//!   ns:...:node[.attr]
//! - ':' separates namespace segments; the last segment is the node name
//! - a single '.' after the node name selects an attribute (plugs only)
//!   Examples:
//!   "rig1:l_arm_param" -> namespaces=["rig1"], name="l_arm_param"
//!   "rig1:l_arm_param.ikfk_switch" -> Plug { node: "rig1:l_arm_param", attr: "ikfk_switch" }
//!   "l_arm_fk_ctrl" -> namespaces=[], name="l_arm_fk_ctrl"
//!
//! A [`Scope`] carries the namespace of one rig instance. Descriptor names are
//! authored unscoped and resolved through the scope exactly once, when a limb
//! is registered.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    /// Namespace segments preceding the node (may be empty)
    pub namespaces: Vec<String>,
    /// Node name (last ':'-separated segment)
    pub name: String,
}

fn validate_segment(seg: &str, what: &str) -> Result<(), String> {
    if seg.is_empty() {
        return Err(format!("invalid node path: empty {what}"));
    }
    if seg.chars().any(char::is_whitespace) {
        return Err(format!("invalid node path: {what} contains whitespace"));
    }
    if seg.contains('.') {
        return Err(format!("invalid node path: {what} contains '.'"));
    }
    Ok(())
}

impl NodePath {
    pub fn new(namespaces: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            namespaces,
            name: name.into(),
        }
    }

    /// Parse a node path according to the grammar described above.
    pub fn parse(s: &str) -> Result<Self, String> {
        if s.is_empty() {
            return Err("empty node path".to_string());
        }
        let mut parts: Vec<&str> = s.split(':').collect();
        let name = parts.pop().unwrap_or_default();
        validate_segment(name, "node name")?;
        for seg in &parts {
            validate_segment(seg, "namespace segment")?;
        }
        Ok(NodePath {
            namespaces: parts.into_iter().map(str::to_string).collect(),
            name: name.to_string(),
        })
    }

    /// The namespace prefix as the host spells it, e.g. `"rig1:"` (empty when unscoped).
    pub fn namespace_prefix(&self) -> String {
        if self.namespaces.is_empty() {
            String::new()
        } else {
            format!("{}:", self.namespaces.join(":"))
        }
    }

    /// Build a plug on this node.
    pub fn plug(&self, attr: impl Into<String>) -> Plug {
        Plug {
            node: self.clone(),
            attr: attr.into(),
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.namespace_prefix(), self.name)
    }
}

impl FromStr for NodePath {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodePath::parse(s)
    }
}

impl Serialize for NodePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D>(deserializer: D) -> Result<NodePath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NodePath::parse(&s).map_err(de::Error::custom)
    }
}

/// A node attribute, e.g. `rig1:l_arm_param.ikfk_switch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Plug {
    pub node: NodePath,
    pub attr: String,
}

impl Plug {
    pub fn new(node: NodePath, attr: impl Into<String>) -> Self {
        Self {
            node,
            attr: attr.into(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        let (node, attr) = s
            .rsplit_once('.')
            .ok_or_else(|| format!("invalid plug '{s}': missing attribute"))?;
        if attr.is_empty() || attr.chars().any(char::is_whitespace) {
            return Err(format!("invalid plug '{s}': bad attribute name"));
        }
        Ok(Plug {
            node: NodePath::parse(node)?,
            attr: attr.to_string(),
        })
    }
}

impl fmt::Display for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attr)
    }
}

impl FromStr for Plug {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plug::parse(s)
    }
}

impl Serialize for Plug {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Plug {
    fn deserialize<D>(deserializer: D) -> Result<Plug, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Plug::parse(&s).map_err(de::Error::custom)
    }
}

/// Namespace context of one rig instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub namespaces: Vec<String>,
}

impl Scope {
    /// The unscoped (root) namespace.
    pub fn root() -> Self {
        Self::default()
    }

    /// Scope that a node lives in, e.g. the scope of a limb's param node.
    pub fn of(node: &NodePath) -> Self {
        Self {
            namespaces: node.namespaces.clone(),
        }
    }

    /// Parse a prefix like `"rig1:"` or `"rig1:sub"`; empty means root.
    pub fn from_prefix(prefix: &str) -> Result<Self, String> {
        let trimmed = prefix.trim_end_matches(':');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut namespaces = Vec::new();
        for seg in trimmed.split(':') {
            validate_segment(seg, "namespace segment")?;
            namespaces.push(seg.to_string());
        }
        Ok(Self { namespaces })
    }

    /// Resolve an authored (possibly already namespaced) name into this scope.
    pub fn resolve(&self, name: &str) -> Result<NodePath, String> {
        let local = NodePath::parse(name)?;
        let mut namespaces = self.namespaces.clone();
        namespaces.extend(local.namespaces);
        Ok(NodePath::new(namespaces, local.name))
    }
}
