//! The scalar SQL function registry (spec §4.5.1, §5/§9 "global function
//! registry"). A `std::sync::OnceLock` holds the name -> handler map,
//! populated once on first lookup and never mutated afterwards.

use std::sync::OnceLock;

use essadb_core::{ColumnType, Date, DbError, Value};
use essadb_helpers::IndexMap;

pub type ScalarFn = fn(&[Value]) -> Result<Value, DbError>;

static REGISTRY: OnceLock<IndexMap<&'static str, ScalarFn>> = OnceLock::new();

fn build_registry() -> IndexMap<&'static str, ScalarFn> {
    let mut map = IndexMap::default();
    macro_rules! reg {
        ($name:literal, $f:expr) => {
            map.insert($name, $f as ScalarFn);
        };
    }

    reg!("LEN", len);
    reg!("LENGTH", len);
    reg!("ASCII", ascii);
    reg!("CHAR", char_fn);
    reg!("CHARINDEX", charindex);
    reg!("CONCAT", concat);
    reg!("LOWER", lower);
    reg!("UPPER", upper);
    reg!("LEFT", left);
    reg!("RIGHT", right);
    reg!("SUBSTRING", substring);
    reg!("LTRIM", ltrim);
    reg!("RTRIM", rtrim);
    reg!("TRIM", trim);
    reg!("REPLACE", replace);
    reg!("REPLICATE", replicate);
    reg!("REVERSE", reverse);
    reg!("STUFF", stuff);
    reg!("TRANSLATE", translate);
    reg!("STR", str_fn);

    reg!("ABS", |a| unary_f64(a, f64::abs));
    reg!("ACOS", |a| unary_f64(a, f64::acos));
    reg!("ASIN", |a| unary_f64(a, f64::asin));
    reg!("ATAN", |a| unary_f64(a, f64::atan));
    reg!("ATN2", atn2);
    reg!("CEILING", |a| unary_f64(a, f64::ceil));
    reg!("COS", |a| unary_f64(a, f64::cos));
    reg!("COT", |a| unary_f64(a, |x| 1.0 / x.tan()));
    reg!("DEGREES", |a| unary_f64(a, f64::to_degrees));
    reg!("EXP", |a| unary_f64(a, f64::exp));
    reg!("FLOOR", |a| unary_f64(a, f64::floor));
    reg!("LOG", |a| unary_f64(a, f64::ln));
    reg!("LOG10", |a| unary_f64(a, f64::log10));
    reg!("PI", pi);
    reg!("POWER", power);
    reg!("RAND", rand);
    reg!("ROUND", round);
    reg!("SIGN", sign);
    reg!("SIN", |a| unary_f64(a, f64::sin));
    reg!("SQRT", |a| unary_f64(a, f64::sqrt));
    reg!("SQUARE", |a| unary_f64(a, |x| x * x));
    reg!("TAN", |a| unary_f64(a, f64::tan));

    reg!("IFNULL", ifnull);

    reg!("DATEDIFF", datediff);
    reg!("DAY", day);
    reg!("MONTH", month);
    reg!("YEAR", year);

    map
}

/// Looks up `name` case-insensitively, initializing the registry on first
/// call. Matches the teacher's pattern of a read-only, lazily-built
/// process-wide table (spec §5).
pub fn lookup(name: &str) -> Option<ScalarFn> {
    let registry = REGISTRY.get_or_init(build_registry);
    let upper = name.to_ascii_uppercase();
    registry.get(upper.as_str()).copied()
}

fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&Value::Null)
}

fn require_str(v: &Value) -> Result<Option<&str>, DbError> {
    match v {
        Value::Null => Ok(None),
        Value::Varchar(s) => Ok(Some(s.as_str())),
        other => Err(DbError::no_matching_operator("string function", other.column_type().unwrap_or(ColumnType::Varchar))),
    }
}

fn require_i32(v: &Value) -> Result<Option<i32>, DbError> {
    match v {
        Value::Null => Ok(None),
        other => Ok(other.as_i32()),
    }
}

fn len(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Int(s.chars().count() as i32)),
        None => Ok(Value::Null),
    }
}

fn ascii(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(s.bytes().next().map(|b| Value::Int(b as i32)).unwrap_or(Value::Null)),
        None => Ok(Value::Null),
    }
}

fn char_fn(args: &[Value]) -> Result<Value, DbError> {
    match require_i32(arg(args, 0))? {
        Some(code) => Ok(Value::Varchar((code as u8 as char).to_string())),
        None => Ok(Value::Null),
    }
}

fn charindex(args: &[Value]) -> Result<Value, DbError> {
    let (Some(needle), Some(haystack)) = (require_str(arg(args, 0))?, require_str(arg(args, 1))?) else {
        return Ok(Value::Null);
    };
    let start = require_i32(arg(args, 2))?.unwrap_or(1).max(1) as usize - 1;
    let haystack_chars: Vec<char> = haystack.chars().collect();
    if start > haystack_chars.len() {
        return Ok(Value::Null);
    }
    let tail: String = haystack_chars[start..].iter().collect();
    match tail.find(needle) {
        Some(byte_pos) => {
            let char_pos = tail[..byte_pos].chars().count();
            Ok(Value::Int((start + char_pos + 1) as i32))
        }
        None => Ok(Value::Null),
    }
}

fn concat(args: &[Value]) -> Result<Value, DbError> {
    if args.is_empty() {
        return Err(DbError::Other("CONCAT requires at least one argument".into()));
    }
    let mut out = String::new();
    for a in args {
        if !a.is_null() {
            out.push_str(&a.to_string());
        }
    }
    Ok(Value::Varchar(out))
}

fn lower(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Varchar(s.to_lowercase())),
        None => Ok(Value::Null),
    }
}

fn upper(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Varchar(s.to_uppercase())),
        None => Ok(Value::Null),
    }
}

fn left(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(n)) = (require_str(arg(args, 0))?, require_i32(arg(args, 1))?) else {
        return Ok(Value::Null);
    };
    let n = n.max(0) as usize;
    Ok(Value::Varchar(s.chars().take(n).collect()))
}

fn right(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(n)) = (require_str(arg(args, 0))?, require_i32(arg(args, 1))?) else {
        return Ok(Value::Null);
    };
    let n = n.max(0) as usize;
    let chars: Vec<char> = s.chars().collect();
    let start = chars.len().saturating_sub(n);
    Ok(Value::Varchar(chars[start..].iter().collect()))
}

fn substring(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(start), Some(len)) = (
        require_str(arg(args, 0))?,
        require_i32(arg(args, 1))?,
        require_i32(arg(args, 2))?,
    ) else {
        return Ok(Value::Null);
    };
    let chars: Vec<char> = s.chars().collect();
    let start = (start.max(1) - 1) as usize;
    if start >= chars.len() || len <= 0 {
        return Ok(Value::Varchar(String::new()));
    }
    let end = (start + len as usize).min(chars.len());
    Ok(Value::Varchar(chars[start..end].iter().collect()))
}

fn ltrim(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Varchar(s.trim_start().to_string())),
        None => Ok(Value::Null),
    }
}

fn rtrim(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Varchar(s.trim_end().to_string())),
        None => Ok(Value::Null),
    }
}

fn trim(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Varchar(s.trim().to_string())),
        None => Ok(Value::Null),
    }
}

fn replace(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(from), Some(to)) = (
        require_str(arg(args, 0))?,
        require_str(arg(args, 1))?,
        require_str(arg(args, 2))?,
    ) else {
        return Ok(Value::Null);
    };
    Ok(Value::Varchar(s.replace(from, to)))
}

fn replicate(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(n)) = (require_str(arg(args, 0))?, require_i32(arg(args, 1))?) else {
        return Ok(Value::Null);
    };
    Ok(Value::Varchar(s.repeat(n.max(0) as usize)))
}

fn reverse(args: &[Value]) -> Result<Value, DbError> {
    match require_str(arg(args, 0))? {
        Some(s) => Ok(Value::Varchar(s.chars().rev().collect())),
        None => Ok(Value::Null),
    }
}

fn stuff(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(start), Some(len), Some(rep)) = (
        require_str(arg(args, 0))?,
        require_i32(arg(args, 1))?,
        require_i32(arg(args, 2))?,
        require_str(arg(args, 3))?,
    ) else {
        return Ok(Value::Null);
    };
    let chars: Vec<char> = s.chars().collect();
    let start = (start.max(1) - 1) as usize;
    if start > chars.len() {
        return Ok(Value::Null);
    }
    let end = (start + len.max(0) as usize).min(chars.len());
    let mut out: String = chars[..start].iter().collect();
    out.push_str(rep);
    out.extend(chars[end..].iter());
    Ok(Value::Varchar(out))
}

fn translate(args: &[Value]) -> Result<Value, DbError> {
    let (Some(s), Some(from), Some(to)) = (
        require_str(arg(args, 0))?,
        require_str(arg(args, 1))?,
        require_str(arg(args, 2))?,
    ) else {
        return Ok(Value::Null);
    };
    let from_chars: Vec<char> = from.chars().collect();
    let to_chars: Vec<char> = to.chars().collect();
    let out: String = s
        .chars()
        .map(|c| match from_chars.iter().position(|&f| f == c) {
            Some(i) => to_chars.get(i).copied().unwrap_or(c),
            None => c,
        })
        .collect();
    Ok(Value::Varchar(out))
}

fn str_fn(args: &[Value]) -> Result<Value, DbError> {
    Ok(Value::Varchar(arg(args, 0).to_string()))
}

fn unary_f64(args: &[Value], f: impl FnOnce(f64) -> f64) -> Result<Value, DbError> {
    match arg(args, 0).as_f64() {
        Some(v) => Ok(Value::Float(f(v) as f32)),
        None if arg(args, 0).is_null() => Ok(Value::Null),
        None => Err(DbError::no_matching_operator("numeric function", ColumnType::Varchar)),
    }
}

fn atn2(args: &[Value]) -> Result<Value, DbError> {
    let (Some(a), Some(b)) = (arg(args, 0).as_f64(), arg(args, 1).as_f64()) else {
        return Ok(Value::Null);
    };
    Ok(Value::Float(a.atan2(b) as f32))
}

fn pi(_args: &[Value]) -> Result<Value, DbError> {
    Ok(Value::Float(std::f64::consts::PI as f32))
}

fn power(args: &[Value]) -> Result<Value, DbError> {
    let (Some(a), Some(b)) = (arg(args, 0).as_f64(), arg(args, 1).as_f64()) else {
        return Ok(Value::Null);
    };
    Ok(Value::Float(a.powf(b) as f32))
}

fn rand(args: &[Value]) -> Result<Value, DbError> {
    // Deterministic pseudo-random generator seeded by the optional argument
    // (or a fixed default): a splitmix64 step, matching the engine's
    // single-threaded, no-external-entropy model.
    let seed = require_i32(arg(args, 0))?.unwrap_or(0) as u64;
    let mut x = seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1);
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^= x >> 31;
    Ok(Value::Float((x as f64 / u64::MAX as f64) as f32))
}

fn round(args: &[Value]) -> Result<Value, DbError> {
    let Some(v) = arg(args, 0).as_f64() else {
        return Ok(Value::Null);
    };
    let digits = require_i32(arg(args, 1))?.unwrap_or(0);
    let factor = 10f64.powi(digits);
    Ok(Value::Float(((v * factor).round() / factor) as f32))
}

fn sign(args: &[Value]) -> Result<Value, DbError> {
    match arg(args, 0).as_f64() {
        Some(v) if v > 0.0 => Ok(Value::Int(1)),
        Some(v) if v < 0.0 => Ok(Value::Int(-1)),
        Some(_) => Ok(Value::Int(0)),
        None => Ok(Value::Null),
    }
}

fn ifnull(args: &[Value]) -> Result<Value, DbError> {
    let v = arg(args, 0);
    if v.is_null() {
        Ok(arg(args, 1).clone())
    } else {
        Ok(v.clone())
    }
}

fn as_date(v: &Value) -> Option<Date> {
    match v {
        Value::Time(d) => Some(*d),
        _ => None,
    }
}

fn datediff(args: &[Value]) -> Result<Value, DbError> {
    let (Some(start), Some(end)) = (as_date(arg(args, 0)), as_date(arg(args, 1))) else {
        return Ok(Value::Null);
    };
    Ok(Value::Int((end.to_julian_day() - start.to_julian_day()) as i32))
}

fn day(args: &[Value]) -> Result<Value, DbError> {
    match as_date(arg(args, 0)) {
        Some(d) => Ok(Value::Int(d.day as i32)),
        None => Ok(Value::Null),
    }
}

fn month(args: &[Value]) -> Result<Value, DbError> {
    match as_date(arg(args, 0)) {
        Some(d) => Ok(Value::Int(d.month as i32)),
        None => Ok(Value::Null),
    }
}

fn year(args: &[Value]) -> Result<Value, DbError> {
    match as_date(arg(args, 0)) {
        Some(d) => Ok(Value::Int(d.year as i32)),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup("len").is_some());
        assert!(lookup("LEN").is_some());
        assert!(lookup("Len").is_some());
    }

    #[test]
    fn unknown_function_is_none() {
        assert!(lookup("NOT_A_FUNCTION").is_none());
    }

    #[test]
    fn len_propagates_null() {
        let f = lookup("LEN").unwrap();
        assert!(matches!(f(&[Value::Null]).unwrap(), Value::Null));
    }

    #[test]
    fn concat_requires_an_argument() {
        let f = lookup("CONCAT").unwrap();
        assert!(f(&[]).is_err());
    }

    #[test]
    fn ifnull_substitutes() {
        let f = lookup("IFNULL").unwrap();
        let v = f(&[Value::Null, Value::Int(5)]).unwrap();
        assert!(matches!(v, Value::Int(5)));
    }
}
