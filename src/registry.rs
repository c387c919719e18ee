use std::collections::HashMap;

/// Entities that carry a server-issued, immutable id.
pub(crate) trait Identified {
    fn id(&self) -> &str;
}

/// Drain `items` into a map keyed by id so a refresh can pull out the
/// existing entity for each incoming payload. Whatever is left in the map
/// afterwards is no longer present server-side and gets dropped.
///
/// On duplicate ids the first item wins.
pub(crate) fn index_by_id<T: Identified>(items: Vec<T>) -> HashMap<String, T> {
    let mut index = HashMap::with_capacity(items.len());
    for item in items {
        index.entry(item.id().to_string()).or_insert(item);
    }
    index
}
