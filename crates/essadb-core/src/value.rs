//! The scalar `Value` sum type and its arithmetic/comparison rules (spec §3).

use std::cmp::Ordering;
use std::fmt;

use crate::error::DbError;

/// A calendar date with no time-of-day component, per spec §3 ("y/m/d
/// triple, no clock").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// Days since an arbitrary epoch, used by `DATEDIFF` and for ordering.
    /// Uses the proleptic Gregorian day-count so differences are exact even
    /// across month/year boundaries.
    pub fn to_julian_day(self) -> i64 {
        let (y, m, d) = (self.year as i64, self.month as i64, self.day as i64);
        let a = (14 - m) / 12;
        let y2 = y + 4800 - a;
        let m2 = m + 12 * a - 3;
        d + (153 * m2 + 2) / 5 + 365 * y2 + y2 / 4 - y2 / 100 + y2 / 400 - 32045
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A column's declared scalar type. `Value::Null` has no `ColumnType` of its
/// own; it is the universal inhabitant of every nullable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Float,
    Varchar,
    Bool,
    Time,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Varchar => "varchar",
            ColumnType::Bool => "bool",
            ColumnType::Time => "time",
        };
        write!(f, "{s}")
    }
}

/// A typed scalar: `Null`, `Int` (i32), `Float` (f32), `Varchar`, `Bool`, or
/// `Time` (spec §3).
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Float(f32),
    Varchar(String),
    Bool(bool),
    Time(Date),
}

impl Value {
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Int),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Varchar(_) => Some(ColumnType::Varchar),
            Value::Bool(_) => Some(ColumnType::Bool),
            Value::Time(_) => Some(ColumnType::Time),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `to_bool` rule from spec §4.6: `Null -> false`, `Int 0 -> false`,
    /// else `true`.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(0) => false,
            _ => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Best-effort conversion to `i32`, used by functions that require an
    /// integer argument (e.g. string indices).
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Promotes `self` to the `ColumnType` of `target`, failing with
    /// `No matching operator` style errors the same way arithmetic does.
    /// `Null` promotes to anything.
    pub fn coerce_to(&self, target: ColumnType) -> Result<Value, DbError> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match (self, target) {
            (Value::Int(i), ColumnType::Int) => Ok(Value::Int(*i)),
            (Value::Int(i), ColumnType::Float) => Ok(Value::Float(*i as f32)),
            (Value::Float(f), ColumnType::Float) => Ok(Value::Float(*f)),
            (Value::Float(f), ColumnType::Int) => Ok(Value::Int(*f as i32)),
            (Value::Varchar(s), ColumnType::Varchar) => Ok(Value::Varchar(s.clone())),
            (Value::Bool(b), ColumnType::Bool) => Ok(Value::Bool(*b)),
            (Value::Time(d), ColumnType::Time) => Ok(Value::Time(*d)),
            (Value::Varchar(s), ColumnType::Int) => s
                .trim()
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|_| DbError::InvalidInt(s.clone())),
            (Value::Varchar(s), ColumnType::Float) => s
                .trim()
                .parse::<f32>()
                .map(Value::Float)
                .map_err(|_| DbError::InvalidFloat(s.clone())),
            _ => Err(DbError::NoMatchingOperator {
                op: "=".into(),
                ty: self.column_type().map(|t| t.to_string()).unwrap_or_default(),
            }),
        }
    }

    fn arith(&self, op: &'static str, rhs: &Value, f: impl FnOnce(f64, f64) -> f64) -> Result<Value, DbError> {
        if self.is_null() || rhs.is_null() {
            return Ok(Value::Null);
        }
        if let (Value::Varchar(a), Value::Varchar(b)) = (self, rhs) {
            if op == "+" {
                return Ok(Value::Varchar(format!("{a}{b}")));
            }
            return Err(DbError::no_matching_operator(op, ColumnType::Varchar));
        }
        let left_ty = self
            .column_type()
            .ok_or_else(|| DbError::no_matching_operator(op, ColumnType::Varchar))?;
        let (Some(a), Some(b)) = (self.as_f64(), rhs.as_f64()) else {
            return Err(DbError::no_matching_operator(op, left_ty));
        };
        let result = f(a, b);
        match left_ty {
            ColumnType::Int => Ok(Value::Int(result as i32)),
            _ => Ok(Value::Float(result as f32)),
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value, DbError> {
        self.arith("+", rhs, |a, b| a + b)
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, DbError> {
        self.arith("-", rhs, |a, b| a - b)
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, DbError> {
        self.arith("*", rhs, |a, b| a * b)
    }

    pub fn div(&self, rhs: &Value) -> Result<Value, DbError> {
        self.arith("/", rhs, |a, b| a / b)
    }

    pub fn neg(&self) -> Result<Value, DbError> {
        match self {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(DbError::no_matching_operator(
                "-",
                other.column_type().unwrap_or(ColumnType::Varchar),
            )),
        }
    }

    /// Total order over values: `Null` is smallest, otherwise `other` is
    /// promoted to `self`'s type (same rule as arithmetic, spec §3) via
    /// `coerce_to` before the two are compared, so `int_col = 'garbage'`
    /// fails the same way `'garbage' + 1` would rather than silently
    /// comparing equal (spec §7 `'…' is not a valid int/float`).
    pub fn compare(&self, other: &Value) -> Result<Ordering, DbError> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            _ => {
                let left_ty = self.column_type().expect("checked non-null above");
                let rhs = other.coerce_to(left_ty)?;
                Ok(match (self, &rhs) {
                    (Value::Int(a), Value::Int(b)) => a.cmp(b),
                    (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
                    (Value::Varchar(a), Value::Varchar(b)) => a.cmp(b),
                    (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                    (Value::Time(a), Value::Time(b)) => a.cmp(b),
                    _ => unreachable!("coerce_to guarantees a matching variant"),
                })
            }
        }
    }

    /// Element equality used by Tuple/DISTINCT: `Null == Null`, otherwise
    /// `compare(..) == Equal`; a failed cross-type coercion counts as
    /// unequal rather than propagating, since equality checks here compare
    /// values already drawn from the same column.
    pub fn values_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => matches!(self.compare(other), Ok(Ordering::Equal)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Varchar(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Time(d) => write!(f, "{d}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_smallest() {
        assert_eq!(Value::Null.compare(&Value::Int(-1000)).unwrap(), Ordering::Less);
        assert_eq!(Value::Int(5).compare(&Value::Null).unwrap(), Ordering::Greater);
        assert_eq!(Value::Null.compare(&Value::Null).unwrap(), Ordering::Equal);
    }

    #[test]
    fn cross_type_compare_coerces_to_left_operand_type() {
        assert_eq!(
            Value::Int(5).compare(&Value::Varchar("5".into())).unwrap(),
            Ordering::Equal
        );
        assert!(Value::Int(5).compare(&Value::Varchar("garbage".into())).is_err());
    }

    #[test]
    fn varchar_concat() {
        let a = Value::Varchar("foo".into());
        let b = Value::Varchar("bar".into());
        match a.add(&b).unwrap() {
            Value::Varchar(s) => assert_eq!(s, "foobar"),
            _ => panic!("expected varchar"),
        }
    }

    #[test]
    fn varchar_arithmetic_fails() {
        let a = Value::Varchar("foo".into());
        let b = Value::Varchar("bar".into());
        assert!(a.sub(&b).is_err());
    }

    #[test]
    fn to_bool_rules() {
        assert!(!Value::Null.to_bool());
        assert!(!Value::Int(0).to_bool());
        assert!(Value::Int(1).to_bool());
        assert!(Value::Float(0.0).to_bool());
    }
}
