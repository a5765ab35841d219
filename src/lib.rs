// src/lib.rs

//! Depot preparation pipeline
//!
//! Turns a registration script (standalone or inside a zip bundle) into the
//! artifacts an external depot downloader needs: a depot key list, one
//! manifest file per depot, and an application-state descriptor.
//!
//! - `script`: restricted script grammar, app id + key extraction
//! - `bundle`: zip bundle / plain script / stdin input loading
//! - `catalog`: remote catalog metadata and content server resolution
//! - `fetch`: token-gated manifest downloads with retry
//! - `reconcile`: bundled vs catalog manifest reconciliation
//! - `output`: artifact writers and client-config merge
//! - `downloader`: external downloader invocation

pub mod bundle;
pub mod catalog;
pub mod cli;
pub mod depot;
pub mod downloader;
mod error;
pub mod fetch;
pub mod output;
pub mod reconcile;
pub mod script;
pub mod vdf;

pub use error::{Error, Result};
