use super::node::{Node, NodeKind, Pair};
use crate::schema::{FieldDefinition, FieldKind};
use std::cmp::Ordering;

const SORT_KEYS: [&str; 4] = ["id", "name", "slug", "key"];

/// Canonical key order for a type's records, derived from its field declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldOrder {
    pub fields: Vec<OrderedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderedField {
    pub name: String,
    pub repeated: bool,
    /// Order of an object field's properties.
    pub nested: Option<FieldOrder>,
}

impl FieldOrder {
    /// `None` when there are no fields to order by.
    pub fn from_fields(fields: &[FieldDefinition]) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let fields = fields
            .iter()
            .map(|field| OrderedField {
                name: field.name.clone(),
                repeated: field.repeated,
                nested: match field.kind {
                    FieldKind::Object => FieldOrder::from_fields(&field.properties),
                    _ => None,
                },
            })
            .collect();
        Some(FieldOrder { fields })
    }

    fn declares(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Sort the elements of every `items` sequence in the tree by their natural key.
pub(crate) fn sort_items(node: &mut Node) {
    match &mut node.kind {
        NodeKind::Mapping(pairs) => {
            for pair in pairs.iter_mut() {
                let is_items = pair
                    .key
                    .scalar_value()
                    .is_some_and(|k| k.eq_ignore_ascii_case("items"));
                if is_items {
                    sort_sequence(&mut pair.value);
                } else {
                    sort_items(&mut pair.value);
                }
            }
        }
        NodeKind::Sequence(items) => items.iter_mut().for_each(sort_items),
        NodeKind::Scalar { .. } => {}
    }
}

fn sort_sequence(node: &mut Node) {
    let NodeKind::Sequence(items) = &mut node.kind else {
        sort_items(node);
        return;
    };
    items.iter_mut().for_each(sort_items);

    let keys: Vec<Option<(String, bool)>> = items.iter().map(sort_key).collect();
    if items.len() < 2 || keys.iter().all(Option::is_none) {
        return;
    }

    let mut keyed: Vec<(Option<String>, Node)> = keys
        .into_iter()
        .zip(std::mem::take(items))
        .map(|(key, item)| (key.filter(|(_, priority)| *priority).map(|(k, _)| k), item))
        .collect();
    keyed.sort_by(|(a_key, a), (b_key, b)| match (a_key, b_key) {
        (Some(x), Some(y)) => x.cmp(y).then(a.line.cmp(&b.line)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    *items = keyed.into_iter().map(|(_, item)| item).collect();
}

/// Case-folded sort key of a sequence element, and whether it came from one
/// of the well-known identifying keys.
fn sort_key(node: &Node) -> Option<(String, bool)> {
    let NodeKind::Mapping(pairs) = &node.kind else {
        return None;
    };
    let scalar = |pair: &Pair| {
        pair.value
            .scalar_value()
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
    };

    for name in SORT_KEYS {
        let found = pairs
            .iter()
            .filter(|p| p.key.scalar_value().is_some_and(|k| k.eq_ignore_ascii_case(name)))
            .find_map(scalar);
        if let Some(key) = found {
            return Some((key, true));
        }
    }
    pairs.iter().find_map(scalar).map(|key| (key, false))
}

/// Reorder record keys to follow the declared field order.
///
/// A document with a top-level `items` sequence has each element reordered;
/// otherwise the root mapping is the record and keeps `type` first.
pub(crate) fn apply_field_order(root: &mut Node, order: &FieldOrder) {
    let NodeKind::Mapping(pairs) = &mut root.kind else {
        return;
    };
    if let Some(items) = pairs.iter_mut().find(|p| p.key_is("items")) {
        if let NodeKind::Sequence(elements) = &mut items.value.kind {
            for element in elements.iter_mut() {
                reorder(element, order, false);
            }
            return;
        }
    }
    reorder(root, order, true);
}

fn reorder(node: &mut Node, order: &FieldOrder, pin_type: bool) {
    let NodeKind::Mapping(pairs) = &mut node.kind else {
        return;
    };
    let mut remaining: Vec<Option<Pair>> = std::mem::take(pairs).into_iter().map(Some).collect();
    let mut take = |name: &str| {
        remaining
            .iter_mut()
            .find(|slot| matches!(slot, Some(pair) if pair.key_is(name)))
            .and_then(Option::take)
    };

    let mut ordered = Vec::new();
    if pin_type && !order.declares("type") {
        ordered.extend(take("type"));
    }
    for field in &order.fields {
        let Some(mut pair) = take(&field.name) else {
            continue;
        };
        if let Some(nested) = &field.nested {
            match &mut pair.value.kind {
                NodeKind::Sequence(elements) if field.repeated => {
                    for element in elements.iter_mut() {
                        reorder(element, nested, false);
                    }
                }
                _ => reorder(&mut pair.value, nested, false),
            }
        }
        ordered.push(pair);
    }
    ordered.extend(remaining.into_iter().flatten());
    *pairs = ordered;
}
