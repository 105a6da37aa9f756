use std::collections::BTreeMap;

use crate::model::FieldPath;
use crate::value::FieldValue;

type Fields = BTreeMap<String, FieldValue>;

/// Merges `incoming` into `current`, restricted by `mask`.
///
/// An empty mask replaces every incoming key wholesale. Otherwise a key named
/// by the mask is replaced, and an unnamed map-valued key is merged one level
/// down with the mask entries beneath it. Mask entries with no counterpart in
/// `incoming` delete the addressed field.
pub fn update_fields(current: &Fields, incoming: &Fields, mask: &[FieldPath]) -> Fields {
    let mut merged = merge(current, incoming, mask);
    for path in mask {
        if !contains_path(incoming, path.segments()) {
            remove_path(&mut merged, path.segments());
        }
    }
    merged
}

fn merge(current: &Fields, incoming: &Fields, mask: &[FieldPath]) -> Fields {
    let mut merged = current.clone();
    for (key, value) in incoming {
        if is_updatable(mask, key) {
            merged.insert(key.clone(), value.clone());
            continue;
        }
        let Some(incoming_map) = value.as_map() else {
            continue;
        };
        let current_map = match merged.get(key) {
            None => Fields::new(),
            Some(existing) => match existing.as_map() {
                Some(map) => map.fields().clone(),
                None => continue,
            },
        };
        let nested = nested_mask(mask, key);
        merged.insert(
            key.clone(),
            FieldValue::from_map(merge(&current_map, incoming_map.fields(), &nested)),
        );
    }
    merged
}

fn is_updatable(mask: &[FieldPath], key: &str) -> bool {
    mask.is_empty()
        || mask
            .iter()
            .any(|path| path.len() == 1 && path.first_segment() == key)
}

fn nested_mask(mask: &[FieldPath], key: &str) -> Vec<FieldPath> {
    mask.iter()
        .filter(|path| path.first_segment() == key)
        .filter_map(FieldPath::pop_first)
        .collect()
}

fn contains_path(fields: &Fields, segments: &[String]) -> bool {
    match segments {
        [] => false,
        [leaf] => fields.contains_key(leaf),
        [head, rest @ ..] => fields
            .get(head)
            .and_then(FieldValue::as_map)
            .map(|map| contains_path(map.fields(), rest))
            .unwrap_or(false),
    }
}

fn remove_path(fields: &mut Fields, segments: &[String]) {
    match segments {
        [] => {}
        [leaf] => {
            fields.remove(leaf);
        }
        [head, rest @ ..] => {
            let Some(map) = fields.get(head).and_then(FieldValue::as_map) else {
                return;
            };
            let mut nested = map.fields().clone();
            remove_path(&mut nested, rest);
            fields.insert(head.clone(), FieldValue::from_map(nested));
        }
    }
}
