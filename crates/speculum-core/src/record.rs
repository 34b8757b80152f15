//! Record introspection and structural keys
//!
//! Tuple-space entries are caller-defined structured values. The mirror
//! groups them by *structural* equality (concrete type plus every matchable
//! field value) rather than the record type's own `PartialEq`, because test
//! record types are allowed to override equality with approximate semantics
//! that would falsely merge distinguishable records into one bucket.
//!
//! Instead of runtime reflection, record types implement [`Record`] and
//! enumerate their matchable fields explicitly. Transient or
//! implementation-only fields are simply not enumerated.

use crate::error::{Result, SpeculumError};
use serde::Serialize;
use std::fmt;

/// A tuple-space entry or match template.
///
/// Implementors enumerate the fields the store matches on, in a stable
/// declared order. A field is either a concrete [`FieldValue`] or
/// [`Field::Wildcard`] (only meaningful when the record is used as a
/// template).
pub trait Record: fmt::Debug + Send + Sync {
    /// Concrete type identity. Two records of different types never share
    /// a structural key, regardless of field values.
    fn type_name(&self) -> &str;

    /// The ordered matchable fields of this record.
    ///
    /// Returns `Err(InvalidRecord)` if the record is malformed (e.g. a
    /// field cannot be represented); callers treat that as a programming
    /// error, not a transient fault.
    fn matchable_fields(&self) -> Result<Vec<(String, Field)>>;
}

/// A single matchable field: concrete, or a wildcard in a template.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Field {
    Wildcard,
    Value(FieldValue),
}

/// Owned field value with structural equality and hashing.
///
/// Composite values carry their own type name and fields and compare by
/// structural content, never by the source type's equality operator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
    Composite {
        type_name: String,
        fields: Vec<(String, FieldValue)>,
    },
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// Structural identity of a written record: concrete type name plus the
/// ordered matchable fields.
///
/// Used only as a shadow-log bucket discriminator. The remote store's own
/// matching decisions are never second-guessed with this key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructuralKey {
    type_name: String,
    fields: Vec<(String, Field)>,
}

impl StructuralKey {
    /// Compute the structural key of a record.
    ///
    /// Pure and deterministic; fails only when the record cannot be
    /// introspected.
    pub fn of(record: &dyn Record) -> Result<Self> {
        Ok(Self {
            type_name: record.type_name().to_string(),
            fields: record.matchable_fields()?,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[(String, Field)] {
        &self.fields
    }
}

impl fmt::Display for StructuralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.type_name)?;
        for (i, (name, field)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match field {
                Field::Wildcard => write!(f, "{}=*", name)?,
                Field::Value(v) => write!(f, "{}={:?}", name, v)?,
            }
        }
        write!(f, "}}")
    }
}

/// Wildcard-aware template match: every non-wildcard template field must be
/// present on the record with an equal concrete value, and type names must
/// agree.
///
/// This is advisory only (event-expectation bookkeeping, test mocks). The
/// remote store performs the authoritative matching.
pub fn template_matches(template: &dyn Record, record: &dyn Record) -> Result<bool> {
    if template.type_name() != record.type_name() {
        return Ok(false);
    }
    let template_fields = template
        .matchable_fields()
        .map_err(|e| SpeculumError::InvalidTemplate(e.to_string()))?;
    let record_fields = record.matchable_fields()?;
    Ok(fields_match_template(&template_fields, &record_fields))
}

/// Core of [`template_matches`] over pre-introspected field lists.
pub fn fields_match_template(
    template_fields: &[(String, Field)],
    record_fields: &[(String, Field)],
) -> bool {
    template_fields.iter().all(|(name, field)| match field {
        Field::Wildcard => true,
        Field::Value(want) => record_fields
            .iter()
            .any(|(n, f)| n == name && matches!(f, Field::Value(have) if have == want)),
    })
}
