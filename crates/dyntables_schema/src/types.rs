//! Field and identifier types.
//!
//! A client describes a column with a [`FieldSpec`] (raw strings straight
//! from the request body). Validation turns it into a [`FieldDef`], whose
//! type is the closed [`FieldType`] enum. Only `FieldDef`s reach the DDL
//! builder and the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Abstract column type a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

impl FieldType {
    pub const ALL: [FieldType; 3] = [FieldType::String, FieldType::Number, FieldType::Boolean];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Parse a client-supplied type name. Exact, lowercase match only.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Physical column type emitted in DDL.
    ///
    /// `Number` has no dedicated mapping and is stored as `text`; see
    /// [`physical_type_name`].
    pub fn physical_type(&self) -> &'static str {
        match self {
            Self::String => "varchar(255)",
            Self::Number => "text",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compatibility mapping from a raw type name to a physical column type.
///
/// This is the historical lookup table, kept row for row:
/// `string` -> `varchar(255)`, `integer` -> `integer`, `boolean` -> `boolean`,
/// anything else (including `number`) -> `text`.
///
/// The `integer` row is vestigial: validation only admits `string`, `number`
/// and `boolean`, so no validated field can reach it. [`FieldType::physical_type`]
/// agrees with this table on every reachable input.
pub fn physical_type_name(raw: &str) -> &'static str {
    match raw {
        "string" => "varchar(255)",
        "integer" => "integer",
        "boolean" => "boolean",
        _ => "text",
    }
}

/// An unvalidated field as supplied by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

impl FromStr for FieldSpec {
    type Err = String;

    /// Parse the `name:type` shorthand.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, field_type) = s
            .split_once(':')
            .ok_or_else(|| format!("expected NAME:TYPE, got '{}'", s))?;
        Ok(Self::new(name.trim(), field_type.trim()))
    }
}

/// A validated field definition, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

impl From<&FieldDef> for FieldSpec {
    fn from(def: &FieldDef) -> Self {
        FieldSpec::new(def.name.clone(), def.field_type.as_str())
    }
}

/// Catalog record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(i64);

impl TableId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
