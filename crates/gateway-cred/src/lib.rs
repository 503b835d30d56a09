//! File-backed Credential Store (C1)
//!
//! One JSON blob per drive under `{data_dir}/credentials/{drive_id}.json`,
//! written atomically (write-to-temp, then rename) rather than an
//! OS-keyring — design note §4.1 calls for a deterministic per-drive blob path,
//! which a keyring cannot give callers (no stable file to point a backup
//! at).

pub mod store;

pub use store::FileCredentialStore;
