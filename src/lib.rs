// Copyright 2026 DCMR Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! DCMR harvest library — crawl, download, and normalize the DC zoning
//! code document corpus.
//!
//! This library crate exposes the core modules for integration testing.

pub mod browser;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod errors;
pub mod extract;
pub mod geo;
pub mod naming;
pub mod rename;
pub mod sink;
