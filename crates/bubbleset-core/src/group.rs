//! Partitioning a frame's records into groups, and turning group keys
//! into identifiers that are safe to use as render tags.

use std::collections::HashMap;

/// Key used for every record when no group-key function is supplied.
pub const DEFAULT_GROUP_KEY: &str = "default";

/// Records of one frame that share a group key, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    /// The group key as produced by the caller's key function.
    pub key: String,
    /// Members in the order they appeared in the frame.
    pub members: Vec<T>,
}

/// Partition `items` by `key`.
///
/// Groups come out in order of first appearance and every group is
/// non-empty. Member order within a group follows input order.
pub fn group_by_key<T, I, K>(items: I, mut key: K) -> Vec<Group<T>>
where
    I: IntoIterator<Item = T>,
    K: FnMut(&T) -> String,
{
    let mut groups: Vec<Group<T>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let k = key(&item);
        if let Some(&i) = index.get(&k) {
            groups[i].members.push(item);
        } else {
            index.insert(k.clone(), groups.len());
            groups.push(Group {
                key: k,
                members: vec![item],
            });
        }
    }

    groups
}

/// Make `key` usable as a render tag / CSS class suffix.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`. Distinct keys
/// can collide after sanitization (`"a b"` and `"a.b"`); callers that
/// care must detect that themselves.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
