use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{ParquetError, Result};
use crate::physical::PhysicalType;

/// Name of the repeated group inside a LIST-annotated group.
pub const LIST_GROUP_NAME: &str = "list";
/// Name of the repeated group inside a MAP-annotated group.
pub const MAP_GROUP_NAME: &str = "key_value";

/// Core schema representation for Parquet files
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub root: SchemaNode,
    /// Leaves, by column index, whose stored physical type differs from the
    /// default storage of their column type
    stored_types: BTreeMap<usize, PhysicalType>,
}

/// Represents a node in the Parquet schema tree
///
/// A `Struct` or `Primitive` node marked [`Repetition::Repeated`] is a legacy
/// repeated field: its logical value is a list of the node's values.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A struct with named fields
    Struct {
        name: String,
        repetition: Repetition,
        fields: Vec<SchemaNode>,
    },
    /// A list containing items of a single type
    List {
        name: String,
        repetition: Repetition,
        item: Box<SchemaNode>,
    },
    /// A map with key-value pairs
    Map {
        name: String,
        repetition: Repetition,
        key: Box<SchemaNode>,
        value: Box<SchemaNode>,
    },
    /// A primitive/leaf type
    Primitive {
        name: String,
        primitive_type: PrimitiveType,
        repetition: Repetition,
    },
}

/// Column types supported by the engine, each stored atop one physical type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,

    // Byte array types
    String,
    Enum,
    Json,
    Binary,
    Uuid,

    // Date/Time types
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,

    /// Decimal (precision, scale)
    Decimal(u8, i8),

    // Fixed-length byte array
    FixedLenByteArray(i32),
}

/// Represents how values are repeated in Parquet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    /// Field must have exactly one value
    Required,
    /// Field can have 0 or 1 value
    Optional,
    /// Field can have 0 or more values
    Repeated,
}

impl SchemaNode {
    /// Get the name of this schema node
    pub fn name(&self) -> &str {
        match self {
            SchemaNode::Struct { name, .. } => name,
            SchemaNode::List { name, .. } => name,
            SchemaNode::Map { name, .. } => name,
            SchemaNode::Primitive { name, .. } => name,
        }
    }

    pub fn repetition(&self) -> Repetition {
        match self {
            SchemaNode::Struct { repetition, .. } => *repetition,
            SchemaNode::List { repetition, .. } => *repetition,
            SchemaNode::Map { repetition, .. } => *repetition,
            SchemaNode::Primitive { repetition, .. } => *repetition,
        }
    }

    /// Check if this node is nullable
    pub fn is_nullable(&self) -> bool {
        self.repetition() == Repetition::Optional
    }

    /// Number of leaf columns under this node
    pub fn leaf_count(&self) -> usize {
        match self {
            SchemaNode::Struct { fields, .. } => fields.iter().map(SchemaNode::leaf_count).sum(),
            SchemaNode::List { item, .. } => item.leaf_count(),
            SchemaNode::Map { key, value, .. } => key.leaf_count() + value.leaf_count(),
            SchemaNode::Primitive { .. } => 1,
        }
    }

    fn validate(&self, path: &str) -> Result<()> {
        if self.name().is_empty() {
            return Err(ParquetError::schema(format!(
                "empty field name under '{}'",
                path
            )));
        }
        let here = join_path(path, self.name());

        match self {
            SchemaNode::Struct { fields, .. } => {
                if fields.is_empty() {
                    return Err(ParquetError::schema(format!(
                        "struct '{}' must have at least one field",
                        here
                    )));
                }
                let mut seen = HashSet::new();
                for field in fields {
                    if !seen.insert(field.name()) {
                        return Err(ParquetError::schema(format!(
                            "duplicate field '{}' in '{}'",
                            field.name(),
                            here
                        )));
                    }
                    field.validate(&here)?;
                }
            }
            SchemaNode::List {
                repetition, item, ..
            } => {
                if *repetition == Repetition::Repeated {
                    return Err(ParquetError::schema(format!(
                        "list '{}' cannot be repeated",
                        here
                    )));
                }
                if item.repetition() == Repetition::Repeated {
                    return Err(ParquetError::schema(format!(
                        "list element of '{}' cannot be repeated",
                        here
                    )));
                }
                item.validate(&join_path(&here, LIST_GROUP_NAME))?;
            }
            SchemaNode::Map {
                repetition,
                key,
                value,
                ..
            } => {
                if *repetition == Repetition::Repeated {
                    return Err(ParquetError::schema(format!(
                        "map '{}' cannot be repeated",
                        here
                    )));
                }
                if key.repetition() != Repetition::Required {
                    return Err(ParquetError::schema(format!(
                        "map key of '{}' must be required",
                        here
                    )));
                }
                if value.repetition() == Repetition::Repeated {
                    return Err(ParquetError::schema(format!(
                        "map value of '{}' cannot be repeated",
                        here
                    )));
                }
                if key.name() == value.name() {
                    return Err(ParquetError::schema(format!(
                        "map key and value of '{}' share the name '{}'",
                        here,
                        key.name()
                    )));
                }
                let entries = join_path(&here, MAP_GROUP_NAME);
                key.validate(&entries)?;
                value.validate(&entries)?;
            }
            SchemaNode::Primitive { primitive_type, .. } => primitive_type.validate(&here)?,
        }
        Ok(())
    }
}

impl PrimitiveType {
    /// Get the logical type name for display
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Int32 => "Int32",
            PrimitiveType::Int64 => "Int64",
            PrimitiveType::Float32 => "Float32",
            PrimitiveType::Float64 => "Float64",
            PrimitiveType::String => "String",
            PrimitiveType::Enum => "Enum",
            PrimitiveType::Json => "Json",
            PrimitiveType::Binary => "Binary",
            PrimitiveType::Uuid => "Uuid",
            PrimitiveType::Date => "Date",
            PrimitiveType::TimeMillis => "TimeMillis",
            PrimitiveType::TimeMicros => "TimeMicros",
            PrimitiveType::TimestampMillis => "TimestampMillis",
            PrimitiveType::TimestampMicros => "TimestampMicros",
            PrimitiveType::Decimal(_, _) => "Decimal",
            PrimitiveType::FixedLenByteArray(_) => "FixedLenByteArray",
        }
    }

    /// Physical storage type backing this column type
    pub fn physical_type(&self) -> PhysicalType {
        match self {
            PrimitiveType::Boolean => PhysicalType::Boolean,
            PrimitiveType::Int32 | PrimitiveType::Date | PrimitiveType::TimeMillis => {
                PhysicalType::Int32
            }
            PrimitiveType::Int64
            | PrimitiveType::TimeMicros
            | PrimitiveType::TimestampMillis
            | PrimitiveType::TimestampMicros => PhysicalType::Int64,
            PrimitiveType::Float32 => PhysicalType::Float,
            PrimitiveType::Float64 => PhysicalType::Double,
            PrimitiveType::String
            | PrimitiveType::Enum
            | PrimitiveType::Json
            | PrimitiveType::Binary => PhysicalType::ByteArray,
            PrimitiveType::Uuid => PhysicalType::FixedLenByteArray(16),
            PrimitiveType::Decimal(precision, _) => match precision {
                0..=9 => PhysicalType::Int32,
                10..=18 => PhysicalType::Int64,
                p => PhysicalType::FixedLenByteArray(decimal_byte_width(*p)),
            },
            PrimitiveType::FixedLenByteArray(len) => PhysicalType::FixedLenByteArray(*len),
        }
    }

    /// Whether values of this type may be stored as `physical`.
    ///
    /// Decimals accept every storage the format allows for their precision,
    /// other types only their default storage.
    pub fn accepts_storage(&self, physical: PhysicalType) -> bool {
        match (self, physical) {
            (PrimitiveType::Decimal(precision, _), PhysicalType::Int32) => *precision <= 9,
            (PrimitiveType::Decimal(precision, _), PhysicalType::Int64) => *precision <= 18,
            (PrimitiveType::Decimal(precision, _), PhysicalType::FixedLenByteArray(len)) => {
                (decimal_byte_width(*precision)..=16).contains(&len)
            }
            (PrimitiveType::Decimal(_, _), PhysicalType::ByteArray) => true,
            (primitive, physical) => primitive.physical_type() == physical,
        }
    }

    /// Whether min/max use two's complement ordering on the stored bytes
    pub fn is_signed(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::String
                | PrimitiveType::Enum
                | PrimitiveType::Json
                | PrimitiveType::Binary
                | PrimitiveType::Uuid
                | PrimitiveType::FixedLenByteArray(_)
        )
    }

    fn validate(&self, path: &str) -> Result<()> {
        match self {
            PrimitiveType::Decimal(precision, scale) => {
                if *precision == 0 || *precision > 38 {
                    return Err(ParquetError::schema(format!(
                        "decimal precision of '{}' must be within 1..=38, got {}",
                        path, precision
                    )));
                }
                if *scale < 0 || *scale as u8 > *precision {
                    return Err(ParquetError::schema(format!(
                        "decimal scale of '{}' must be within 0..={}, got {}",
                        path, precision, scale
                    )));
                }
            }
            PrimitiveType::FixedLenByteArray(len) if *len <= 0 => {
                return Err(ParquetError::schema(format!(
                    "fixed length of '{}' must be positive, got {}",
                    path, len
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Smallest two's complement byte width able to hold every decimal of `precision` digits.
pub fn decimal_byte_width(precision: u8) -> i32 {
    let max_unscaled = 10u128.pow(precision.min(38) as u32) - 1;
    (1..=16)
        .find(|bytes| max_unscaled < 1u128 << (8 * bytes - 1))
        .unwrap_or(16)
}

/// What a level step contributes to the shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Struct,
    /// The LIST-annotated group
    List,
    /// The repeated group holding list elements
    ListElements,
    /// The MAP-annotated group
    Map,
    /// The repeated group holding map entries, descending into one side
    MapEntries(MapSide),
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSide {
    Key,
    Value,
}

/// One physical schema node on the path from a top-level field to a leaf
#[derive(Debug, Clone, PartialEq)]
pub struct LevelStep {
    pub name: Arc<str>,
    pub kind: StepKind,
    pub repetition: Repetition,
    /// Definition level reached when this node is present
    pub def_level: i16,
    /// Repetition level of this node, counting itself when repeated
    pub rep_level: i16,
}

/// A leaf column together with everything needed to compute its levels
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Physical path, including the synthetic `list` / `key_value` groups
    pub path: Vec<Arc<str>>,
    pub primitive_type: PrimitiveType,
    /// How values are stored, usually `primitive_type.physical_type()`
    pub physical_type: PhysicalType,
    pub max_def_level: i16,
    pub max_rep_level: i16,
    /// Index of the top-level field this leaf belongs to
    pub root_field: usize,
    pub steps: Vec<LevelStep>,
}

impl ColumnDescriptor {
    /// Dotted path of the leaf
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn repetition(&self) -> Repetition {
        self.steps
            .last()
            .map(|s| s.repetition)
            .unwrap_or(Repetition::Required)
    }
}

impl Schema {
    /// Top-level fields of the schema
    pub fn fields(&self) -> &[SchemaNode] {
        match &self.root {
            SchemaNode::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Position of a top-level field by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields().iter().position(|f| f.name() == name)
    }

    /// All leaf columns in depth-first schema order
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        let mut out = Vec::new();
        for (index, field) in self.fields().iter().enumerate() {
            let mut steps = Vec::new();
            collect_columns(field, index, &mut steps, 0, 0, &mut out);
        }
        for (index, physical) in &self.stored_types {
            if let Some(column) = out.get_mut(*index) {
                column.physical_type = *physical;
            }
        }
        out
    }

    /// Record the physical types leaves are actually stored as, in column order.
    ///
    /// Only entries that differ from a leaf's default storage are kept.
    pub(crate) fn with_stored_types(mut self, stored: &[PhysicalType]) -> Result<Self> {
        let columns = self.columns();
        if columns.len() != stored.len() {
            return Err(ParquetError::internal(format!(
                "{} stored types for {} columns",
                stored.len(),
                columns.len()
            )));
        }
        for (index, (column, physical)) in columns.iter().zip(stored).enumerate() {
            if !column.primitive_type.accepts_storage(*physical) {
                return Err(ParquetError::schema(format!(
                    "column '{}' cannot store {} as {:?}",
                    column.path_string(),
                    column.primitive_type.type_name(),
                    physical
                )));
            }
            if column.primitive_type.physical_type() != *physical {
                self.stored_types.insert(index, *physical);
            }
        }
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        match &self.root {
            SchemaNode::Struct {
                repetition: Repetition::Required,
                ..
            } => self.root.validate(""),
            _ => Err(ParquetError::schema(
                "schema root must be a required struct",
            )),
        }
    }
}

fn step(node: &SchemaNode, kind: StepKind, def: i16, rep: i16) -> (LevelStep, i16, i16) {
    step_named(node.name(), node.repetition(), kind, def, rep)
}

fn step_named(
    name: &str,
    repetition: Repetition,
    kind: StepKind,
    def: i16,
    rep: i16,
) -> (LevelStep, i16, i16) {
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
    (
        LevelStep {
            name: Arc::from(name),
            kind,
            repetition,
            def_level: def,
            rep_level: rep,
        },
        def,
        rep,
    )
}

fn collect_columns(
    node: &SchemaNode,
    root_field: usize,
    steps: &mut Vec<LevelStep>,
    def: i16,
    rep: i16,
    out: &mut Vec<ColumnDescriptor>,
) {
    match node {
        SchemaNode::Primitive { primitive_type, .. } => {
            let (leaf, def, rep) = step(node, StepKind::Leaf, def, rep);
            steps.push(leaf);
            out.push(ColumnDescriptor {
                path: steps.iter().map(|s| s.name.clone()).collect(),
                primitive_type: *primitive_type,
                physical_type: primitive_type.physical_type(),
                max_def_level: def,
                max_rep_level: rep,
                root_field,
                steps: steps.clone(),
            });
            steps.pop();
        }
        SchemaNode::Struct { fields, .. } => {
            let (group, def, rep) = step(node, StepKind::Struct, def, rep);
            steps.push(group);
            for field in fields {
                collect_columns(field, root_field, steps, def, rep, out);
            }
            steps.pop();
        }
        SchemaNode::List { item, .. } => {
            let (group, def, rep) = step(node, StepKind::List, def, rep);
            let (elements, def, rep) = step_named(
                LIST_GROUP_NAME,
                Repetition::Repeated,
                StepKind::ListElements,
                def,
                rep,
            );
            steps.push(group);
            steps.push(elements);
            collect_columns(item, root_field, steps, def, rep, out);
            steps.truncate(steps.len() - 2);
        }
        SchemaNode::Map { key, value, .. } => {
            let (group, def, rep) = step(node, StepKind::Map, def, rep);
            steps.push(group);
            for (side, child) in [(MapSide::Key, key), (MapSide::Value, value)] {
                let (entries, def, rep) = step_named(
                    MAP_GROUP_NAME,
                    Repetition::Repeated,
                    StepKind::MapEntries(side),
                    def,
                    rep,
                );
                steps.push(entries);
                collect_columns(child, root_field, steps, def, rep, out);
                steps.pop();
            }
            steps.pop();
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Builder for creating schemas
pub struct SchemaBuilder {
    root: Option<SchemaNode>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(mut self, root: SchemaNode) -> Self {
        self.root = Some(root);
        self
    }

    /// Validate and build the schema
    pub fn build(self) -> Result<Schema> {
        match self.root {
            Some(root) => {
                let schema = Schema {
                    root,
                    stored_types: BTreeMap::new(),
                };
                schema.validate()?;
                Ok(schema)
            }
            None => Err(ParquetError::schema("Schema must have a root node")),
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
