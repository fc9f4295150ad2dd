//! Intent schema vocabulary. A schema names an intent, its scope, and the
//! ordered fields the sanitizer extracts from a raw client payload.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Cap applied to `UserString` fields, in characters.
pub const USER_STRING_MAX: usize = 100;

/// Cap applied to `UserText` fields, in characters.
pub const USER_TEXT_MAX: usize = 1_000;

/// Creep body parts the sanitizer accepts; anything else is dropped.
pub const BODY_PARTS: [&str; 8] = [
    "move",
    "work",
    "carry",
    "attack",
    "ranged_attack",
    "tough",
    "heal",
    "claim",
];

/// Closed set of field coercions. Extension manifests name these by their
/// snake_case string form; unknown names invalidate the entry, not the
/// manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Int,
    /// Fixed-point thousandths: the raw number is scaled by 1000 and rounded.
    Price,
    Bool,
    StringArray,
    IntArray,
    BodyPartArray,
    /// String capped at [`USER_STRING_MAX`] characters.
    UserString,
    /// String capped at [`USER_TEXT_MAX`] characters.
    UserText,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Price => "price",
            Self::Bool => "bool",
            Self::StringArray => "string_array",
            Self::IntArray => "int_array",
            Self::BodyPartArray => "body_part_array",
            Self::UserString => "user_string",
            Self::UserText => "user_text",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "string" => Self::String,
            "int" => Self::Int,
            "price" => Self::Price,
            "bool" => Self::Bool,
            "string_array" => Self::StringArray,
            "int_array" => Self::IntArray,
            "body_part_array" => Self::BodyPartArray,
            "user_string" => Self::UserString,
            "user_text" => Self::UserText,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an intent targets one room object or the user's global log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentScope {
    Object,
    Global,
}

impl IntentScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Global => "global",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "object" => Some(Self::Object),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

/// One schema field. Order within [`IntentSchema::fields`] is meaningful:
/// the sanitizer walks fields in this order and emits output keys in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Named intent schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSchema {
    pub name: String,
    pub scope: IntentScope,
    pub fields: Vec<FieldDef>,
}

impl IntentSchema {
    pub fn new(name: impl Into<String>, scope: IntentScope, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            scope,
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_kind_round_trips_through_names() {
        let kinds = [
            FieldKind::String,
            FieldKind::Int,
            FieldKind::Price,
            FieldKind::Bool,
            FieldKind::StringArray,
            FieldKind::IntArray,
            FieldKind::BodyPartArray,
            FieldKind::UserString,
            FieldKind::UserText,
        ];
        for kind in kinds {
            assert_eq!(FieldKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FieldKind::parse("float"), None);
    }

    #[test]
    fn schema_preserves_field_order() {
        let schema = IntentSchema::new(
            "transfer",
            IntentScope::Object,
            vec![
                FieldDef::new("id", FieldKind::String),
                FieldDef::new("resource_type", FieldKind::String),
                FieldDef::new("amount", FieldKind::Int),
            ],
        );
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "resource_type", "amount"]);
    }
}
