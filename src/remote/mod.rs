//! Platform REST client and wire payloads.

pub mod client;
pub mod types;

pub use client::{HttpRemoteClient, RemoteClient};
pub use types::{
    key_values, web_annotations, BindingTarget, Collection, EntityAddress, EntityPayload,
    FeedLifecycle, KeyValue, RemoteAction, RemoteApi, RemoteExec, RemoteLimits, RemotePackage,
    RemoteRule, RemoteTrigger,
};
