//! `ResultSet`: the output of a `SELECT`/`SHOW`/`UNION` -- column names plus
//! rows, and the two textual dump forms from spec §6.

use std::fmt::Write as _;

use crate::tuple::Tuple;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub column_names: Vec<String>,
    pub rows: Vec<Tuple>,
}

impl ResultSet {
    pub fn new(column_names: Vec<String>, rows: Vec<Tuple>) -> Self {
        Self { column_names, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn cell_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.column_names.iter().map(|n| n.chars().count()).collect();
        for row in &self.rows {
            for (i, value) in row.iter().enumerate() {
                let len = cell_text(value).chars().count();
                if len > widths[i] {
                    widths[i] = len;
                }
            }
        }
        widths
    }

    /// Plain ASCII table: `| ` separators, right-padded values.
    pub fn dump_plain(&self) -> String {
        let widths = self.cell_widths();
        let mut out = String::new();
        write_plain_row(&mut out, &self.column_names, &widths);
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            write_plain_row(&mut out, &cells, &widths);
        }
        out
    }

    /// "Fancy" Unicode table: `│` separators and a `├─┼─┤` header rule;
    /// nulls render as the literal `null`.
    pub fn dump_fancy(&self) -> String {
        let widths = self.cell_widths();
        let mut out = String::new();
        write_fancy_row(&mut out, &self.column_names, &widths);
        write_fancy_rule(&mut out, &widths);
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            write_fancy_row(&mut out, &cells, &widths);
        }
        out
    }
}

fn cell_text(value: &Value) -> String {
    value.to_string()
}

fn write_plain_row(out: &mut String, cells: &[String], widths: &[usize]) {
    for (cell, width) in cells.iter().zip(widths) {
        let _ = write!(out, "| {cell:<width$} ", width = width);
    }
    out.push_str("|\n");
}

fn write_fancy_row(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('│');
    for (cell, width) in cells.iter().zip(widths) {
        let _ = write!(out, " {cell:<width$} │", width = width);
    }
    out.push('\n');
}

fn write_fancy_rule(out: &mut String, widths: &[usize]) {
    out.push('├');
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push('┼');
        }
        out.push_str(&"─".repeat(width + 2));
    }
    out.push_str("┤\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_dump_pads_columns() {
        let rs = ResultSet::new(
            vec!["id".into(), "name".into()],
            vec![Tuple::new(vec![Value::Int(1), Value::Varchar("alice".into())])],
        );
        let out = rs.dump_plain();
        assert!(out.contains("| id "));
        assert!(out.contains("| 1  "));
    }

    #[test]
    fn fancy_dump_has_header_rule() {
        let rs = ResultSet::new(vec!["id".into()], vec![Tuple::new(vec![Value::Null])]);
        let out = rs.dump_fancy();
        assert!(out.contains("├"));
        assert!(out.contains("null"));
    }
}
