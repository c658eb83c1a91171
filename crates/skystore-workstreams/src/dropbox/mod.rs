//! Dropbox scan: list the files users dropped under `dropbox/{user_id}/`, register each
//! one as an asset, and report a summary.

pub mod lister;
pub mod orchestrator;
pub mod registrar;

pub use lister::{is_candidate_key, Listing, ObjectLister};
pub use orchestrator::DropboxScanner;
pub use registrar::{AssetRegistrar, AssetRegistry};
