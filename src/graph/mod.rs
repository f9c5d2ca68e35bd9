//! Resolved entity graph and the merger that builds it.

pub mod merge;
pub mod resolved;

pub use merge::{interpolate_env, Merger};
pub use resolved::{
    EntityRef, ResolvedAction, ResolvedBinding, ResolvedGraph, ResolvedPackage, ResolvedRule,
    ResolvedSequence, ResolvedTrigger, DEFAULT_NAMESPACE,
};
