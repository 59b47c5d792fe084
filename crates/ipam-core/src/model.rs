//! Domain types for routing domains and ranges

use serde::{Deserialize, Serialize};
use std::fmt;

/// A set of networks that must not share address space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDomain {
    pub id: i64,
    pub name: String,
    /// External network identifiers (VPC names) whose subnets count as occupied
    pub vpcs: Vec<String>,
}

/// Fields for creating a routing domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoutingDomain {
    pub name: String,
    #[serde(default)]
    pub vpcs: Vec<String>,
}

/// Partial replacement of a routing domain; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDomainUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpcs: Option<Vec<String>>,
}

/// An allocated (or imported) CIDR block in the range forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub routing_domain_id: i64,
    pub name: String,
    /// Normalized `a.b.c.d/len` text
    pub cidr: String,
}

/// Row to insert; the repository assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRange {
    pub parent_id: Option<i64>,
    pub routing_domain_id: i64,
    pub name: String,
    pub cidr: String,
}

impl NewRange {
    pub(crate) fn into_range(self, id: i64) -> Range {
        Range {
            id,
            parent_id: self.parent_id,
            routing_domain_id: self.routing_domain_id,
            name: self.name,
            cidr: self.cidr,
        }
    }
}

/// A subnet discovered in an external inventory. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRange {
    pub name: String,
    /// Network the subnet belongs to
    pub network: String,
    pub cidr: String,
    #[serde(default)]
    pub secondary: Vec<SecondaryRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryRange {
    pub name: String,
    pub cidr: String,
}

impl ExternalRange {
    /// Primary CIDR followed by every secondary CIDR
    pub fn cidrs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.cidr.as_str()).chain(self.secondary.iter().map(|s| s.cidr.as_str()))
    }
}

/// How a caller names a parent range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeRef {
    Id(i64),
    /// Literal CIDR, looked up within the routing domain
    Cidr(String),
}

impl RangeRef {
    /// Numeric text is an id, anything else is treated as a CIDR.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => RangeRef::Id(id),
            Err(_) => RangeRef::Cidr(trimmed.to_string()),
        }
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeRef::Id(id) => write!(f, "{id}"),
            RangeRef::Cidr(cidr) => f.write_str(cidr),
        }
    }
}

/// Which routing domain a request targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DomainRef {
    /// The domain with the lowest id
    #[default]
    Default,
    Id(i64),
}

impl From<Option<i64>> for DomainRef {
    fn from(id: Option<i64>) -> Self {
        id.map_or(DomainRef::Default, DomainRef::Id)
    }
}
