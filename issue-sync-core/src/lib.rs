#![doc = "issue-sync-core: core logic library for issue-sync."]

//! This crate holds the data model, normalization, change detection and the sync
//! pipeline. Network clients for the upstream tracker and the search index live in
//! the `issue-sync` binary crate and plug in through [`contract`].
//!
//! # Usage
//! Build a [`config::SyncConfig`], pick a [`strategy::RunStrategy`] and call
//! [`synchronise::synchronise`].

pub mod change_set;
pub mod config;
pub mod contract;
pub mod equality;
pub mod error;
pub mod normalize;
pub mod raw;
pub mod record;
pub mod snapshot;
pub mod strategy;
pub mod synchronise;
