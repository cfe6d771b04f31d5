//! Evaluation frames: the stack-of-frames identifier resolution scheme from
//! spec §4.5/§9. Frames are owned values (no lifetime tied to the AST) so
//! they can be pushed/popped freely around sub-queries and aggregate spans.

use essadb_core::{Column, Tuple};

/// Whether the current frame's row came straight from a table (so plain
/// column names resolve) or is a row of a materialized result set (so
/// projection aliases are tried first), per spec §4.5 resolution rule 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowType {
    FromTable,
    FromResultSet,
}

/// The row currently bound in a frame, plus an optional "source" tuple used
/// as a resolution fallback (e.g. the first raw row of a GROUP BY group,
/// bound when HAVING's frame flips to `FromResultSet`).
#[derive(Debug, Clone, Default)]
pub struct TupleWithSource {
    pub tuple: Tuple,
    pub source: Option<Tuple>,
}

impl TupleWithSource {
    pub fn new(tuple: Tuple) -> Self {
        Self { tuple, source: None }
    }

    pub fn with_source(tuple: Tuple, source: Tuple) -> Self {
        Self {
            tuple,
            source: Some(source),
        }
    }
}

/// One entry of a `FromSchema`: an absolute tuple-value index reachable
/// under `column`, optionally qualified by `table` (a table name or alias).
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub table: Option<String>,
    pub column: String,
    pub index: usize,
}

/// The column/table-alias resolution map built while evaluating a
/// `TableExpression` into a relation (spec §4.5 rule 2/3, §4.6 join
/// index-shift rule). Owned and cheap to clone so it can be stashed in a
/// `Frame` independent of the `TableExpression` it was built from.
#[derive(Debug, Clone, Default)]
pub struct FromSchema {
    entries: Vec<SchemaEntry>,
}

impl FromSchema {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Builds a schema for a single named/aliased table source.
    pub fn from_columns(table_name: Option<&str>, columns: &[Column]) -> Self {
        let entries = columns
            .iter()
            .enumerate()
            .map(|(index, c)| SchemaEntry {
                table: table_name.map(|t| t.to_string()),
                column: c.name.clone(),
                index,
            })
            .collect();
        Self { entries }
    }

    /// Concatenates `left` then `right`, shifting `right`'s indices by
    /// `left`'s width (spec §4.6: "the right side's indices are shifted by
    /// the left's column count").
    pub fn join(mut left: FromSchema, right: FromSchema) -> FromSchema {
        let offset = left.entries.len();
        left.entries.extend(right.entries.into_iter().map(|mut e| {
            e.index += offset;
            e
        }));
        left
    }

    /// Resolves an identifier to an absolute tuple-value index. A qualified
    /// identifier only matches entries whose table/alias equals `qualifier`
    /// (spec §4.5 rule 3); an unqualified one matches the first entry with
    /// that column name (last-write-wins ambiguity is not specified, so the
    /// first match wins, matching the left-biased join lookup order).
    pub fn resolve(&self, name: &str, qualifier: Option<&str>) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| {
                e.column.eq_ignore_ascii_case(name)
                    && match qualifier {
                        Some(q) => e.table.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(q)),
                        None => true,
                    }
            })
            .map(|e| e.index)
    }
}

/// Projection alias -> tuple-value index, used when a frame's row type is
/// `FromResultSet` (spec §4.5 rule 1).
#[derive(Debug, Clone, Default)]
pub struct ProjectionAliases {
    aliases: Vec<(String, usize)>,
}

impl ProjectionAliases {
    pub fn new(aliases: Vec<(String, usize)>) -> Self {
        Self { aliases }
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.aliases
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
            .map(|(_, index)| index)
            .copied()
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub schema: FromSchema,
    pub projection: Option<ProjectionAliases>,
    pub row: TupleWithSource,
    pub row_group: Option<Vec<Tuple>>,
    pub row_type: RowType,
}

impl Frame {
    pub fn new(schema: FromSchema, row_type: RowType) -> Self {
        Self {
            schema,
            projection: None,
            row: TupleWithSource::default(),
            row_group: None,
            row_type,
        }
    }

    pub fn with_projection(mut self, projection: ProjectionAliases) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// A stack of frames threaded through expression evaluation (spec §4.5,
/// §9 "pass the context explicitly rather than relying on thread-local
/// storage"). Frames are pushed on entry to a sub-query/aggregate span and
/// popped on exit, including on error paths, by `push_scoped`.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Runs `f` with `frame` pushed, guaranteeing the pop happens even if
    /// `f` returns an error (spec §5: frames "popped on exit ... including
    /// on all exit paths including error").
    pub fn push_scoped<T>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push(frame);
        let result = f(self);
        self.pop();
        result
    }

    /// Walks frames innermost -> outermost looking for one that resolves
    /// `name` (spec §4.5 rule 2/4).
    pub fn resolve(&self, name: &str, qualifier: Option<&str>) -> Option<(usize, usize)> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            if let Some(index) = frame.schema.resolve(name, qualifier) {
                return Some((depth, index));
            }
        }
        None
    }

    pub fn frame_at(&self, depth: usize) -> &Frame {
        &self.frames[depth]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
