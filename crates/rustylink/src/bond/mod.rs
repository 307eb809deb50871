//! Bond registry
//!
//! The transport owns the persisted list of bonded peers. This module reads
//! that list, answers membership questions against it, and asks the
//! transport to clear it. Nothing is cached: bonding data changes behind our
//! back whenever a pending flash write lands.

mod registry;

pub use self::registry::BondRegistry;
