//! Shared key building for storage backends.
//!
//! Key format: `/`-separated segments relative to the bucket root, no leading `/`,
//! no `..` segments. Prefixes may or may not carry a trailing `/`.

use skystore_core::constants::{KEY_SEPARATOR, PLACEHOLDER_FILE};

/// Join a prefix and a relative name into a key.
///
/// `join_key("vggt_results/run1/", "depth_map.npy")` and
/// `join_key("vggt_results/run1", "depth_map.npy")` both yield
/// `vggt_results/run1/depth_map.npy`. An empty prefix yields the name unchanged.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches(KEY_SEPARATOR);
    let name = name.trim_start_matches(KEY_SEPARATOR);
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, name)
    }
}

/// Key of the empty object that marks `prefix` as present in listings.
pub fn placeholder_key(prefix: &str) -> String {
    join_key(prefix, PLACEHOLDER_FILE)
}

/// Whether a key is safe to map onto a filesystem path.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with(KEY_SEPARATOR)
        && !key.contains('\\')
        && key
            .split(KEY_SEPARATOR)
            .all(|segment| segment != ".." && segment != ".")
}
