//! wakegate-access — who may connect to the managed backend.
//!
//! The [`AllowList`] is checked before the lifecycle controller sees a
//! connection attempt, so unknown players never cause a reachability probe
//! or an instance start. Entries are persisted in the same JSON array format
//! a vanilla server uses for `whitelist.json`.

pub mod allowlist;
pub mod error;

pub use allowlist::{AllowEntry, AllowList, normalize_uuid};
pub use error::{AccessError, AccessResult};
