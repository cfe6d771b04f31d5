//! `Column`: `{ name, type, auto_increment, unique, not_null, default_value }`
//! (spec §3).

use crate::value::{ColumnType, Value};

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub r#type: ColumnType,
    pub auto_increment: bool,
    pub unique: bool,
    pub not_null: bool,
    pub default_value: Value,
}

impl Column {
    pub fn new(name: impl Into<String>, r#type: ColumnType) -> Self {
        Self {
            name: name.into(),
            r#type,
            auto_increment: false,
            unique: false,
            not_null: false,
            default_value: Value::Null,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = value;
        self
    }
}

/// A foreign key constraint: `local_column` must be null or match a value in
/// `referenced_table.referenced_column` (spec §3).
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub local_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}
