//! Line-oriented CSV import/export (spec §4.8, §6). Not RFC 4180: the
//! separator is whichever of `,`/`;` the header line uses, fields may be
//! quoted in `'` or `"`, whitespace around a separator is ignored, and the
//! bare lowercase word `null` denotes SQL `NULL`. Mirrors the original's
//! `db/storage/CSVFile.cpp`, which treats CSV as a thin textual codec
//! rather than its own storage format.

use essadb_core::{Column, ColumnType, DbError, Tuple, Value};

/// A parsed CSV file before type inference: the header names and each row's
/// raw fields, with `None` standing for an explicit `null` token.
pub struct RawCsv {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

fn detect_separator(header_line: &str) -> char {
    if !header_line.contains(',') && header_line.contains(';') {
        ';'
    } else {
        ','
    }
}

/// Splits one line on `sep`, honoring `'`/`"` quoting; a separator inside a
/// quoted span is literal. Whitespace just outside a field is trimmed.
fn split_record(line: &str, sep: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == sep => {
                fields.push(std::mem::take(&mut current).trim().to_string());
            }
            None => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn field_to_value(field: String) -> Option<String> {
    if field.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(field)
    }
}

/// Parses `text` into a header and raw, untyped rows. The header line fixes
/// both the separator and the expected field count for every row after it;
/// a short or long row is a format error (spec §6).
pub fn parse(text: &str) -> Result<RawCsv, DbError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header_line = lines.next().ok_or_else(|| DbError::Other("CSV file is empty".into()))?;
    let sep = detect_separator(header_line);
    let header: Vec<String> = split_record(header_line, sep);

    let mut rows = Vec::new();
    for line in lines {
        let fields = split_record(line, sep);
        if fields.len() != header.len() {
            return Err(DbError::Other(format!(
                "CSV row has {} fields, expected {} to match the header",
                fields.len(),
                header.len()
            )));
        }
        rows.push(fields.into_iter().map(field_to_value).collect());
    }
    Ok(RawCsv { header, rows })
}

/// Per-column type inference for a schema-less `IMPORT` (spec §4.8): a
/// column starts at `Null`, promotes to `Int` on its first integer-shaped
/// value, and promotes (stickily) to `Varchar` on its first value that
/// isn't. A column that is `null` in every row defaults to `Varchar`, the
/// same fallback `infer_result_columns` uses for an all-null projection.
pub fn infer_column_types(header_len: usize, rows: &[Vec<Option<String>>]) -> Vec<ColumnType> {
    let mut inferred: Vec<Option<ColumnType>> = vec![None; header_len];
    for row in rows {
        for (slot, field) in inferred.iter_mut().zip(row.iter()) {
            let Some(text) = field else { continue };
            if *slot == Some(ColumnType::Varchar) {
                continue;
            }
            if text.trim().parse::<i32>().is_ok() {
                if slot.is_none() {
                    *slot = Some(ColumnType::Int);
                }
            } else {
                *slot = Some(ColumnType::Varchar);
            }
        }
    }
    inferred.into_iter().map(|ty| ty.unwrap_or(ColumnType::Varchar)).collect()
}

/// Coerces one raw row into typed values against `types`, reusing
/// `Value::coerce_to`'s string-parsing rules so a schema-hinted `IMPORT`
/// (where `types` comes from the existing table) and a type-inferred one
/// share the same conversion errors.
pub fn coerce_row(fields: Vec<Option<String>>, types: &[ColumnType]) -> Result<Vec<Value>, DbError> {
    fields
        .into_iter()
        .zip(types.iter())
        .map(|(field, ty)| match field {
            None => Ok(Value::Null),
            Some(text) => Value::Varchar(text).coerce_to(*ty),
        })
        .collect()
}

fn needs_quoting(field: &str, sep: char) -> bool {
    field.is_empty()
        || field.contains(sep)
        || field.contains('\'')
        || field.contains('"')
        || field.starts_with(char::is_whitespace)
        || field.ends_with(char::is_whitespace)
}

fn write_field(out: &mut String, value: &Value, sep: char) {
    if value.is_null() {
        out.push_str("null");
        return;
    }
    let text = value.to_string();
    if needs_quoting(&text, sep) {
        out.push('"');
        out.push_str(&text.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(&text);
    }
}

/// Renders `columns`/`rows` as CSV, comma-separated, quoting only the
/// fields that need it. The header line is the column names in schema
/// order, matching the declaration-order walk `Serializer.cpp` uses.
pub fn export<'a>(columns: &[Column], rows: impl Iterator<Item = &'a Tuple>) -> String {
    const SEP: char = ',';
    let mut out = String::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            out.push(SEP);
        }
        out.push_str(&column.name);
    }
    out.push('\n');
    for tuple in rows {
        for (i, value) in tuple.iter().enumerate() {
            if i > 0 {
                out.push(SEP);
            }
            write_field(&mut out, value, SEP);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_header_and_rows() {
        let csv = parse("id,name\n1,Alice\n2,Bob\n").unwrap();
        assert_eq!(csv.header, vec!["id", "name"]);
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(csv.rows[0][1], Some("Alice".to_string()));
    }

    #[test]
    fn detects_semicolon_separator() {
        let csv = parse("id;name\n1;Alice\n").unwrap();
        assert_eq!(csv.header, vec!["id", "name"]);
        assert_eq!(csv.rows[0][0], Some("1".to_string()));
    }

    #[test]
    fn quoted_field_may_contain_the_separator() {
        let csv = parse("id,note\n1,\"a, b\"\n").unwrap();
        assert_eq!(csv.rows[0][1], Some("a, b".to_string()));
    }

    #[test]
    fn lowercase_null_token_becomes_none() {
        let csv = parse("id,name\n1,null\n").unwrap();
        assert_eq!(csv.rows[0][1], None);
    }

    #[test]
    fn mismatched_field_count_is_an_error() {
        assert!(parse("a,b\n1,2,3\n").is_err());
    }

    #[test]
    fn infers_int_then_promotes_to_varchar() {
        let rows = vec![vec![Some("1".to_string())], vec![Some("x".to_string())]];
        assert_eq!(infer_column_types(1, &rows), vec![ColumnType::Varchar]);
    }

    #[test]
    fn infers_int_column() {
        let rows = vec![vec![Some("1".to_string())], vec![Some("2".to_string())]];
        assert_eq!(infer_column_types(1, &rows), vec![ColumnType::Int]);
    }

    #[test]
    fn all_null_column_defaults_to_varchar() {
        let rows = vec![vec![None], vec![None]];
        assert_eq!(infer_column_types(1, &rows), vec![ColumnType::Varchar]);
    }

    #[test]
    fn export_quotes_fields_with_commas_and_writes_null_literally() {
        let columns = vec![Column::new("id", ColumnType::Int), Column::new("note", ColumnType::Varchar)];
        let rows = vec![Tuple::new(vec![Value::Int(1), Value::Varchar("a,b".into())]), Tuple::new(vec![Value::Int(2), Value::Null])];
        let text = export(&columns, rows.iter());
        assert_eq!(text, "id,note\n1,\"a,b\"\n2,null\n");
    }
}
