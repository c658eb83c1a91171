//! Constants shared across the workstreams.

/// Path separator used in object keys.
pub const KEY_SEPARATOR: char = '/';

/// Default bucket used by the SkyStore deployment.
pub const DEFAULT_BUCKET: &str = "skystore";

/// Storage prefix under which uploaded-but-unprocessed files appear, one
/// sub-directory per owning user.
pub const DEFAULT_DROPBOX_PREFIX: &str = "dropbox/";

/// Suffix of the placeholder files that keep otherwise empty prefixes alive.
pub const PLACEHOLDER_SUFFIX: &str = "/.keep";

/// Placeholder file name written by the bucket bootstrap.
pub const PLACEHOLDER_FILE: &str = ".keep";

/// Reserved sub-paths holding files that were already handled.
pub const RESERVED_SEGMENTS: [&str; 2] = ["/_failed/", "/_skipped/"];

/// Asset API endpoint registering an object that already exists in storage.
pub const CREATE_FROM_EXISTING_PATH: &str = "/assets/create-from-existing";

/// MIME type used when the file extension is unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Prefixes created by the bucket bootstrap.
pub const BOOTSTRAP_PREFIXES: [&str; 3] = ["test_images", "vggt_results", "dropbox"];
