//! AuthStore Resolver
//!
//! Runtime store resolution for the four OAuth entity kinds:
//! - [`ServiceRegistry`]: type-keyed container the callers and backends
//!   register collaborators on
//! - [`StoreTypeCache`]: process-wide memo of requested-entity-type to
//!   concrete-store-type decisions
//! - [`StoreResolver`]: picks a directly registered store when one
//!   exists, otherwise derives a backend store specialized for the
//!   requested entity type

pub mod cache;
pub mod registry;
pub mod resolver;

pub use cache::{ResolvedStoreType, StoreFactory, StoreTypeCache, StoreTypeInfo};
pub use registry::{Lookup, ServiceRegistry};
pub use resolver::{StoreBackend, StoreResolver};
