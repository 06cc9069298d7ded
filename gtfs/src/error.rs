use std::fmt;

use thiserror::Error;

/// Broad classes of problems. The copier decides whether to tolerate an entity based on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorClass {
    /// Feed-level, found before copying begins
    Structural,
    /// Field-level problems with one entity (or one trip's group of stop times)
    Entity,
    /// A foreign key that doesn't resolve through the entity map
    Reference,
    /// The same natural key was seen twice. Never tolerated.
    Duplicate,
    /// The destination failed. The only class meaning the output may be incomplete.
    Write,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    MissingFile,
    InvalidRow,

    RequiredField,
    InvalidField,
    InvalidParentStation,
    SequenceTooFewStops,
    SequenceMissingTime,
    SequenceTimeDecrease,
    EmptyTrip,
    InterpolationFailed,

    InvalidReference,

    DuplicateId,

    WriteFailed,
    ExtensionFailed,

    // Warnings
    ZeroCoordinates,
    RouteNamesEqual,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        use ErrorKind::*;
        match self {
            MissingFile | InvalidRow => ErrorClass::Structural,
            InvalidReference => ErrorClass::Reference,
            DuplicateId => ErrorClass::Duplicate,
            WriteFailed | ExtensionFailed => ErrorClass::Write,
            _ => ErrorClass::Entity,
        }
    }

    pub fn as_str(self) -> &'static str {
        use ErrorKind::*;
        match self {
            MissingFile => "missing file",
            InvalidRow => "invalid row",
            RequiredField => "required field",
            InvalidField => "invalid field",
            InvalidParentStation => "invalid parent station",
            SequenceTooFewStops => "too few stops",
            SequenceMissingTime => "missing time",
            SequenceTimeDecrease => "time decreases",
            EmptyTrip => "trip has no stop times",
            InterpolationFailed => "interpolation failed",
            InvalidReference => "invalid reference",
            DuplicateId => "duplicate id",
            WriteFailed => "write failed",
            ExtensionFailed => "extension failed",
            ZeroCoordinates => "coordinates are zero",
            RouteNamesEqual => "route short and long names are equal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem with one entity. Errors are created close to the check that found them, then the
/// copier fills in which file and entity they belong to with `in_entity`.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{filename} '{entity_id}': {kind}{}", describe_field(.field, .value, .message))]
pub struct EntityError {
    pub kind: ErrorKind,
    pub filename: String,
    pub entity_id: String,
    pub field: String,
    pub value: String,
    pub message: String,
}

impl EntityError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            filename: String::new(),
            entity_id: String::new(),
            field: String::new(),
            value: String::new(),
            message: String::new(),
        }
    }

    pub fn required(field: &str) -> Self {
        Self::new(ErrorKind::RequiredField).field(field)
    }

    pub fn invalid<V: ToString>(field: &str, value: V) -> Self {
        Self::new(ErrorKind::InvalidField)
            .field(field)
            .value(value)
    }

    pub fn reference(field: &str, value: &str) -> Self {
        Self::new(ErrorKind::InvalidReference)
            .field(field)
            .value(value)
    }

    pub fn field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }

    pub fn value<V: ToString>(mut self, value: V) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = message.into();
        self
    }

    /// Attach the file and entity, unless they were already set more precisely.
    pub fn in_entity(mut self, filename: &str, entity_id: &str) -> Self {
        if self.filename.is_empty() {
            self.filename = filename.to_string();
        }
        if self.entity_id.is_empty() {
            self.entity_id = entity_id.to_string();
        }
        self
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

fn describe_field(field: &str, value: &str, message: &str) -> String {
    let mut out = String::new();
    if !field.is_empty() {
        out.push_str(&format!(" (field {field}"));
        if !value.is_empty() {
            out.push_str(&format!(" = '{value}'"));
        }
        out.push(')');
    }
    if !message.is_empty() {
        out.push_str(&format!(": {message}"));
    }
    out
}
