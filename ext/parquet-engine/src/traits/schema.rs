use crate::schema::{ColumnDescriptor, LIST_GROUP_NAME, MAP_GROUP_NAME};
use crate::SchemaNode;

/// Trait for schema introspection
///
/// Paths are dotted and use the stored layout, so a list item is addressed
/// as `tags.list.<item>` and a map key as `attrs.key_value.<key>`. Leaf paths
/// match [`ColumnDescriptor::path_string`].
pub trait SchemaInspector {
    /// Get the total number of nodes, the root included
    fn field_count(&self) -> usize;

    /// Get field by path (e.g., "address.city")
    fn get_field_by_path(&self, path: &str) -> Option<&SchemaNode>;

    /// Check if schema contains a specific field
    fn has_field(&self, name: &str) -> bool;

    /// Get all field paths in the schema, depth first
    fn all_field_paths(&self) -> Vec<String>;

    /// Leaf column stored at `path`
    fn column_by_path(&self, path: &str) -> Option<ColumnDescriptor>;
}

impl SchemaInspector for crate::Schema {
    fn field_count(&self) -> usize {
        count_fields(&self.root)
    }

    fn get_field_by_path(&self, path: &str) -> Option<&SchemaNode> {
        let parts: Vec<&str> = path.split('.').collect();
        let (first, rest) = parts.split_first()?;
        let field = self.fields().iter().find(|f| f.name() == *first)?;
        get_field_by_path_parts(field, rest)
    }

    fn has_field(&self, name: &str) -> bool {
        self.get_field_by_path(name).is_some()
    }

    fn all_field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for field in self.fields() {
            collect_field_paths(field, field.name().to_string(), &mut paths);
        }
        paths
    }

    fn column_by_path(&self, path: &str) -> Option<ColumnDescriptor> {
        self.columns().into_iter().find(|c| c.path_string() == path)
    }
}

fn count_fields(node: &SchemaNode) -> usize {
    match node {
        SchemaNode::Struct { fields, .. } => 1 + fields.iter().map(count_fields).sum::<usize>(),
        SchemaNode::List { item, .. } => 1 + count_fields(item),
        SchemaNode::Map { key, value, .. } => 1 + count_fields(key) + count_fields(value),
        SchemaNode::Primitive { .. } => 1,
    }
}

fn get_field_by_path_parts<'a>(node: &'a SchemaNode, parts: &[&str]) -> Option<&'a SchemaNode> {
    let Some((first, rest)) = parts.split_first() else {
        return Some(node);
    };

    match node {
        SchemaNode::Struct { fields, .. } => fields
            .iter()
            .find(|f| f.name() == *first)
            .and_then(|f| get_field_by_path_parts(f, rest)),
        SchemaNode::List { item, .. } if *first == LIST_GROUP_NAME => match rest.split_first() {
            Some((name, rest)) if *name == item.name() => get_field_by_path_parts(item, rest),
            _ => None,
        },
        SchemaNode::Map { key, value, .. } if *first == MAP_GROUP_NAME => {
            match rest.split_first() {
                Some((name, rest)) if *name == key.name() => get_field_by_path_parts(key, rest),
                Some((name, rest)) if *name == value.name() => {
                    get_field_by_path_parts(value, rest)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn collect_field_paths(node: &SchemaNode, current_path: String, paths: &mut Vec<String>) {
    paths.push(current_path.clone());

    match node {
        SchemaNode::Struct { fields, .. } => {
            for field in fields {
                collect_field_paths(field, format!("{}.{}", current_path, field.name()), paths);
            }
        }
        SchemaNode::List { item, .. } => {
            let path = format!("{}.{}.{}", current_path, LIST_GROUP_NAME, item.name());
            collect_field_paths(item, path, paths);
        }
        SchemaNode::Map { key, value, .. } => {
            for child in [key, value] {
                let path = format!("{}.{}.{}", current_path, MAP_GROUP_NAME, child.name());
                collect_field_paths(child, path, paths);
            }
        }
        SchemaNode::Primitive { .. } => {}
    }
}
