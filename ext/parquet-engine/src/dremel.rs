//! Record shredding and assembly with repetition and definition levels.
//!
//! Shredding turns one logical value per top-level field into a stream of
//! `(value | null, repetition level, definition level)` triples per leaf
//! column. Assembly walks the same schema tree over the leaf streams and
//! rebuilds the nested values, one row at a time.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ParquetError, Result};
use crate::physical::{from_physical, to_stored, PhysicalValue};
use crate::schema::{
    ColumnDescriptor, MapSide, PrimitiveType, Repetition, Schema, SchemaNode, StepKind,
    LIST_GROUP_NAME, MAP_GROUP_NAME,
};
use crate::value::ParquetValue;

/// Level streams and present values of one leaf column
///
/// `values` only holds the non-null occurrences: a triple carries a value
/// exactly when its definition level equals `max_def_level`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShreddedColumn {
    pub max_def_level: i16,
    pub rep_levels: Vec<i16>,
    pub def_levels: Vec<i16>,
    pub values: Vec<PhysicalValue>,
}

impl ShreddedColumn {
    pub fn new(max_def_level: i16) -> Self {
        Self {
            max_def_level,
            ..Default::default()
        }
    }

    /// Number of triples
    pub fn len(&self) -> usize {
        self.def_levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.def_levels.is_empty()
    }

    pub fn push(&mut self, value: Option<PhysicalValue>, rep: i16, def: i16) {
        self.rep_levels.push(rep);
        self.def_levels.push(def);
        if let Some(value) = value {
            self.values.push(value);
        }
    }

    /// Move all triples of `other` to the end of `self`
    pub fn append(&mut self, other: &mut ShreddedColumn) {
        self.rep_levels.append(&mut other.rep_levels);
        self.def_levels.append(&mut other.def_levels);
        self.values.append(&mut other.values);
    }

    /// Number of records, i.e. triples starting at repetition level 0
    pub fn record_count(&self) -> usize {
        self.rep_levels.iter().filter(|r| **r == 0).count()
    }

    /// Iterate the triples in order
    pub fn triples(&self) -> impl Iterator<Item = (Option<&PhysicalValue>, i16, i16)> + '_ {
        let mut values = self.values.iter();
        self.rep_levels
            .iter()
            .zip(&self.def_levels)
            .map(move |(rep, def)| {
                let value = if *def == self.max_def_level {
                    values.next()
                } else {
                    None
                };
                (value, *rep, *def)
            })
    }
}

#[derive(Clone, Copy)]
enum Slot<'v> {
    Value(&'v ParquetValue),
    Entry(&'v ParquetValue, &'v ParquetValue),
}

struct Shredder<'a> {
    column: &'a ColumnDescriptor,
    path: String,
    out: ShreddedColumn,
}

impl<'a> Shredder<'a> {
    fn visit(&mut self, index: usize, value: Option<&ParquetValue>, rep: i16) -> Result<()> {
        let column = self.column;
        let step = &column.steps[index];
        let value = value.filter(|v| !v.is_null());

        match step.repetition {
            Repetition::Required => match value {
                Some(v) => self.present(index, Slot::Value(v), rep),
                None => Err(ParquetError::schema_violation(
                    self.step_path(index),
                    "required value is null or missing",
                )),
            },
            Repetition::Optional => match value {
                Some(v) => self.present(index, Slot::Value(v), rep),
                None => {
                    self.out.push(None, rep, step.def_level - 1);
                    Ok(())
                }
            },
            Repetition::Repeated => {
                let items = match value {
                    Some(v) => self.elements(index, v)?,
                    None => Vec::new(),
                };
                if items.is_empty() {
                    self.out.push(None, rep, step.def_level - 1);
                    return Ok(());
                }
                for (position, item) in items.into_iter().enumerate() {
                    let rep = if position == 0 { rep } else { step.rep_level };
                    self.present(index, item, rep)?;
                }
                Ok(())
            }
        }
    }

    fn elements<'v>(&self, index: usize, value: &'v ParquetValue) -> Result<Vec<Slot<'v>>> {
        match (self.column.steps[index].kind, value) {
            (StepKind::MapEntries(_), ParquetValue::Map(entries)) => {
                Ok(entries.iter().map(|(k, v)| Slot::Entry(k, v)).collect())
            }
            (StepKind::MapEntries(_), other) => Err(self.shape_error(index, "Map", other)),
            (_, ParquetValue::List(items)) => Ok(items.iter().map(Slot::Value).collect()),
            (_, other) => Err(self.shape_error(index, "List", other)),
        }
    }

    fn present(&mut self, index: usize, slot: Slot<'_>, rep: i16) -> Result<()> {
        let column = self.column;
        let step = &column.steps[index];

        match (step.kind, slot) {
            (StepKind::Leaf, Slot::Value(v)) => {
                let physical = to_stored(&self.path, column.primitive_type, column.physical_type, v)?;
                self.out.push(Some(physical), rep, step.def_level);
                Ok(())
            }
            (StepKind::Struct, Slot::Value(v)) => match v {
                ParquetValue::Record(fields) => {
                    let next = &column.steps[index + 1];
                    self.visit(index + 1, fields.get(next.name.as_ref()), rep)
                }
                other => Err(self.shape_error(index, "Record", other)),
            },
            (StepKind::List, Slot::Value(v)) => match v {
                ParquetValue::List(_) => self.visit(index + 1, Some(v), rep),
                other => Err(self.shape_error(index, "List", other)),
            },
            (StepKind::Map, Slot::Value(v)) => match v {
                ParquetValue::Map(_) => self.visit(index + 1, Some(v), rep),
                other => Err(self.shape_error(index, "Map", other)),
            },
            (StepKind::ListElements, Slot::Value(element)) => {
                self.visit(index + 1, Some(element), rep)
            }
            (StepKind::MapEntries(side), Slot::Entry(key, value)) => {
                let child = match side {
                    MapSide::Key => key,
                    MapSide::Value => value,
                };
                self.visit(index + 1, Some(child), rep)
            }
            (kind, _) => Err(ParquetError::internal(format!(
                "unexpected slot for {:?} at '{}'",
                kind,
                self.step_path(index)
            ))),
        }
    }

    fn step_path(&self, index: usize) -> String {
        self.column.steps[..=index]
            .iter()
            .map(|s| s.name.as_ref())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn shape_error(&self, index: usize, expected: &str, found: &ParquetValue) -> ParquetError {
        ParquetError::schema_violation(
            self.step_path(index),
            format!("expected {}, found {}", expected, found.type_name()),
        )
    }
}

/// Shred the value of one top-level field into the triples of `column`.
///
/// Always emits at least one triple.
pub fn shred(column: &ColumnDescriptor, field_value: &ParquetValue) -> Result<ShreddedColumn> {
    let mut shredder = Shredder {
        column,
        path: column.path_string(),
        out: ShreddedColumn::new(column.max_def_level),
    };
    shredder.visit(0, Some(field_value), 0)?;
    Ok(shredder.out)
}

/// Shred a whole row into one triple stream per leaf column.
///
/// Nothing is returned unless every column shreds cleanly, so a rejected row
/// leaves no partial state behind.
pub fn shred_row(columns: &[ColumnDescriptor], row: &[ParquetValue]) -> Result<Vec<ShreddedColumn>> {
    columns
        .iter()
        .map(|column| {
            let value = row.get(column.root_field).ok_or_else(|| {
                ParquetError::schema_violation(
                    column.path_string(),
                    format!("row has no value for field {}", column.root_field),
                )
            })?;
            shred(column, value)
        })
        .collect()
}

#[derive(Debug)]
struct Node {
    name: Arc<str>,
    repetition: Repetition,
    def_level: i16,
    rep_level: i16,
    first_column: usize,
    column_count: usize,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Leaf(PrimitiveType),
    Struct(Vec<Node>),
    List(Box<Node>),
    ListElements(Box<Node>),
    Map(Box<Node>),
    MapEntries(Box<Node>, Box<Node>),
}

fn levels_of(repetition: Repetition, def: i16, rep: i16) -> (i16, i16) {
    let def = if repetition == Repetition::Required {
        def
    } else {
        def + 1
    };
    let rep = if repetition == Repetition::Repeated {
        rep + 1
    } else {
        rep
    };
    (def, rep)
}

fn build_node(schema_node: &SchemaNode, def: i16, rep: i16, next_column: &mut usize) -> Node {
    let repetition = schema_node.repetition();
    let (def, rep) = levels_of(repetition, def, rep);
    let first_column = *next_column;

    let kind = match schema_node {
        SchemaNode::Primitive { primitive_type, .. } => {
            *next_column += 1;
            NodeKind::Leaf(*primitive_type)
        }
        SchemaNode::Struct { fields, .. } => NodeKind::Struct(
            fields
                .iter()
                .map(|f| build_node(f, def, rep, next_column))
                .collect(),
        ),
        SchemaNode::List { item, .. } => {
            let (elem_def, elem_rep) = levels_of(Repetition::Repeated, def, rep);
            let item = build_node(item, elem_def, elem_rep, next_column);
            NodeKind::List(Box::new(Node {
                name: Arc::from(LIST_GROUP_NAME),
                repetition: Repetition::Repeated,
                def_level: elem_def,
                rep_level: elem_rep,
                first_column,
                column_count: *next_column - first_column,
                kind: NodeKind::ListElements(Box::new(item)),
            }))
        }
        SchemaNode::Map { key, value, .. } => {
            let (entry_def, entry_rep) = levels_of(Repetition::Repeated, def, rep);
            let key = build_node(key, entry_def, entry_rep, next_column);
            let value = build_node(value, entry_def, entry_rep, next_column);
            NodeKind::Map(Box::new(Node {
                name: Arc::from(MAP_GROUP_NAME),
                repetition: Repetition::Repeated,
                def_level: entry_def,
                rep_level: entry_rep,
                first_column,
                column_count: *next_column - first_column,
                kind: NodeKind::MapEntries(Box::new(key), Box::new(value)),
            }))
        }
    };

    Node {
        name: Arc::from(schema_node.name()),
        repetition,
        def_level: def,
        rep_level: rep,
        first_column,
        column_count: *next_column - first_column,
        kind,
    }
}

struct ColumnCursor {
    path: String,
    max_def_level: i16,
    rep_levels: Vec<i16>,
    def_levels: Vec<i16>,
    position: usize,
    values: std::vec::IntoIter<PhysicalValue>,
}

impl ColumnCursor {
    fn new(path: String, column: ShreddedColumn) -> Self {
        Self {
            path,
            max_def_level: column.max_def_level,
            rep_levels: column.rep_levels,
            def_levels: column.def_levels,
            position: 0,
            values: column.values.into_iter(),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.position >= self.def_levels.len()
    }

    fn peek(&self) -> Option<(i16, i16)> {
        let rep = *self.rep_levels.get(self.position)?;
        let def = *self.def_levels.get(self.position)?;
        Some((rep, def))
    }

    fn next(&mut self) -> Result<(i16, Option<PhysicalValue>)> {
        let (_, def) = self.peek().ok_or_else(|| {
            ParquetError::malformed(self.path.clone(), "level stream ended inside a record")
        })?;
        self.position += 1;
        if def == self.max_def_level {
            let value = self.values.next().ok_or_else(|| {
                ParquetError::malformed(self.path.clone(), "fewer values than defined levels")
            })?;
            Ok((def, Some(value)))
        } else {
            Ok((def, None))
        }
    }

    fn malformed<S: Into<String>>(&self, message: S) -> ParquetError {
        ParquetError::malformed(self.path.clone(), message)
    }
}

/// Rebuilds rows from the leaf streams of a set of top-level fields.
///
/// Rows are produced lazily; the first malformed level sequence ends the
/// iteration with an error.
pub struct RecordAssembler {
    fields: Vec<Node>,
    cursors: Vec<ColumnCursor>,
    rows_remaining: usize,
    failed: bool,
}

impl RecordAssembler {
    /// Assemble every top-level field of `schema`.
    pub fn new(schema: &Schema, columns: Vec<ShreddedColumn>, num_rows: usize) -> Result<Self> {
        let all: Vec<usize> = (0..schema.fields().len()).collect();
        Self::with_projection(schema, &all, columns, num_rows)
    }

    /// Assemble only the top-level fields at `field_indices`.
    ///
    /// `columns` holds the leaf streams of exactly those fields, in schema order.
    pub fn with_projection(
        schema: &Schema,
        field_indices: &[usize],
        columns: Vec<ShreddedColumn>,
        num_rows: usize,
    ) -> Result<Self> {
        let mut next_column = 0;
        let mut fields = Vec::with_capacity(field_indices.len());
        for index in field_indices {
            let field = schema.fields().get(*index).ok_or_else(|| {
                ParquetError::invalid_argument(format!("no top-level field at index {}", index))
            })?;
            fields.push(build_node(field, 0, 0, &mut next_column));
        }
        if next_column != columns.len() {
            return Err(ParquetError::invalid_argument(format!(
                "projection needs {} leaf columns, got {}",
                next_column,
                columns.len()
            )));
        }

        let descriptors = schema.columns();
        let paths = field_indices.iter().flat_map(|index| {
            descriptors
                .iter()
                .filter(move |c| c.root_field == *index)
                .map(ColumnDescriptor::path_string)
        });
        let cursors = paths
            .zip(columns)
            .map(|(path, column)| ColumnCursor::new(path, column))
            .collect();

        Ok(Self {
            fields,
            cursors,
            rows_remaining: num_rows,
            failed: false,
        })
    }

    /// Assemble the next row, or `None` once every row has been produced.
    pub fn next_record(&mut self) -> Result<Option<Vec<ParquetValue>>> {
        if self.rows_remaining == 0 {
            if let Some(cursor) = self.cursors.iter().find(|c| !c.is_exhausted()) {
                return Err(cursor.malformed("triples left over after the last record"));
            }
            return Ok(None);
        }

        for cursor in &self.cursors {
            match cursor.peek() {
                None => return Err(cursor.malformed("level stream ended before the last record")),
                Some((rep, _)) if rep != 0 => {
                    return Err(cursor.malformed(format!(
                        "record starts with repetition level {}",
                        rep
                    )))
                }
                Some(_) => {}
            }
        }

        let fields = std::mem::take(&mut self.fields);
        let row = fields
            .iter()
            .map(|field| self.read(field))
            .collect::<Result<Vec<_>>>();
        self.fields = fields;

        self.rows_remaining -= 1;
        row.map(Some)
    }

    fn cursor(&self, node: &Node) -> Result<&ColumnCursor> {
        self.cursors.get(node.first_column).ok_or_else(|| missing_column(node))
    }

    fn cursor_mut(&mut self, node: &Node) -> Result<&mut ColumnCursor> {
        self.cursors.get_mut(node.first_column).ok_or_else(|| missing_column(node))
    }

    fn peek_def(&self, node: &Node) -> Result<i16> {
        let cursor = self.cursor(node)?;
        cursor
            .peek()
            .map(|(_, def)| def)
            .ok_or_else(|| cursor.malformed("level stream ended inside a record"))
    }

    fn read(&mut self, node: &Node) -> Result<ParquetValue> {
        match node.repetition {
            Repetition::Required => self.read_present(node),
            Repetition::Optional => {
                if self.peek_def(node)? < node.def_level {
                    self.skip_absent(node)?;
                    Ok(ParquetValue::Null)
                } else {
                    self.read_present(node)
                }
            }
            Repetition::Repeated => match &node.kind {
                NodeKind::MapEntries(key, value) => {
                    let entries =
                        self.read_repeated(node, |this| Ok((this.read(key)?, this.read(value)?)))?;
                    Ok(ParquetValue::Map(entries))
                }
                _ => Ok(ParquetValue::List(
                    self.read_repeated(node, |this| this.read_present(node))?,
                )),
            },
        }
    }

    fn read_repeated<T>(
        &mut self,
        node: &Node,
        mut read_one: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.peek_def(node)? < node.def_level {
            self.skip_absent(node)?;
            return Ok(items);
        }

        loop {
            items.push(read_one(self)?);
            let cursor = self.cursor(node)?;
            match cursor.peek() {
                None => break,
                Some((rep, _)) if rep < node.rep_level => break,
                Some((rep, def)) if rep == node.rep_level => {
                    if def < node.def_level {
                        return Err(cursor.malformed(format!(
                            "empty '{}' continues a repeated group with elements",
                            node.name
                        )));
                    }
                }
                Some((rep, _)) => {
                    return Err(cursor.malformed(format!(
                        "repetition level {} skips past '{}' at level {}",
                        rep, node.name, node.rep_level
                    )))
                }
            }
        }
        Ok(items)
    }

    fn read_present(&mut self, node: &Node) -> Result<ParquetValue> {
        match &node.kind {
            NodeKind::Leaf(primitive) => {
                let cursor = self.cursor_mut(node)?;
                let (def, value) = cursor.next()?;
                match value {
                    Some(value) => from_physical(*primitive, value),
                    None => Err(cursor.malformed(format!(
                        "definition level {} below {} for a present value",
                        def, node.def_level
                    ))),
                }
            }
            NodeKind::Struct(children) => {
                let mut record = IndexMap::with_capacity(children.len());
                for child in children {
                    record.insert(child.name.clone(), self.read(child)?);
                }
                Ok(ParquetValue::Record(record))
            }
            NodeKind::List(elements) | NodeKind::Map(elements) => self.read(elements),
            NodeKind::ListElements(item) => self.read(item),
            NodeKind::MapEntries(_, _) => Err(ParquetError::internal(format!(
                "map entries '{}' read outside of their map",
                node.name
            ))),
        }
    }

    /// Consume the single triple each leaf under `node` holds for an absent value.
    fn skip_absent(&mut self, node: &Node) -> Result<()> {
        let cursors = self
            .cursors
            .get_mut(node.first_column..node.first_column + node.column_count)
            .filter(|cursors| !cursors.is_empty())
            .ok_or_else(|| missing_column(node))?;
        for cursor in cursors {
            let (def, _) = cursor.next()?;
            if def >= node.def_level {
                return Err(cursor.malformed(format!(
                    "definition level {} disagrees with absent '{}'",
                    def, node.name
                )));
            }
        }
        Ok(())
    }
}

fn missing_column(node: &Node) -> ParquetError {
    ParquetError::internal(format!("'{}' has no leaf column to read from", node.name))
}

impl Iterator for RecordAssembler {
    type Item = Result<Vec<ParquetValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Rebuild every row of `schema` from its leaf streams.
pub fn reconstruct(
    schema: &Schema,
    columns: Vec<ShreddedColumn>,
    num_rows: usize,
) -> Result<Vec<Vec<ParquetValue>>> {
    RecordAssembler::new(schema, columns, num_rows)?.collect()
}
