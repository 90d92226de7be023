//! Derives one level of the virtual folder tree from the flat key namespace.
//!
//! There are no directory entities in the store: a folder is whatever prefix
//! the keys imply, kept alive when empty only by its `<folder>/.keep` marker.

use super::path_utils::normalize;
use super::store::ObjectInfo;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const EMPTY_MARKER: &str = ".keep";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub full_path: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    pub child_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Listing {
    pub folders: Vec<FolderEntry>,
    pub files: Vec<FileEntry>,
}

/// Builds the listing for `folder_path` from a flat enumeration.
///
/// Every key under the folder lands in exactly one bucket: directly
/// contained objects become files, deeper objects are aggregated into the
/// folder named by their next path segment. Markers never surface as files.
///
/// A folder entry's own direct `.keep` does not count toward its
/// child_count, but markers of folders nested deeper do. That asymmetry is
/// a known counting approximation and is pinned by tests; do not "fix" it.
///
/// Entries come out in encounter order of the input, which the store
/// produces lexicographically, so output is deterministic without a re-sort.
pub fn list_level(objects: &[ObjectInfo], folder_path: &str) -> Listing {
    let folder = normalize(folder_path);
    let prefix = if folder.is_empty() {
        String::new()
    } else {
        format!("{folder}/")
    };

    let mut listing = Listing::default();
    let mut folder_index: HashMap<String, usize> = HashMap::new();

    for obj in objects {
        let key = normalize(&obj.key);
        if key.is_empty() {
            continue;
        }
        // Only descendants of the queried folder contribute.
        let rel = if prefix.is_empty() {
            key.as_str()
        } else {
            match key.strip_prefix(prefix.as_str()) {
                Some(rest) if !rest.is_empty() => rest,
                _ => continue,
            }
        };

        match rel.split_once('/') {
            Some((segment, rest)) => {
                let idx = *folder_index.entry(segment.to_string()).or_insert_with(|| {
                    let path = if folder.is_empty() {
                        segment.to_string()
                    } else {
                        format!("{folder}/{segment}")
                    };
                    listing.folders.push(FolderEntry {
                        name: segment.to_string(),
                        path,
                        child_count: 0,
                    });
                    listing.folders.len() - 1
                });
                // The subfolder's own marker keeps it visible but is not a
                // child; anything deeper (markers included) counts.
                if rest != EMPTY_MARKER {
                    listing.folders[idx].child_count += 1;
                }
            }
            None => {
                if rel == EMPTY_MARKER {
                    continue;
                }
                listing.files.push(FileEntry {
                    name: rel.to_string(),
                    full_path: key.clone(),
                    size_bytes: obj.size_bytes,
                    created_at: obj.created_at,
                });
            }
        }
    }

    listing
}
