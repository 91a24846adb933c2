// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod error;
mod schema;
mod loader;

pub use error::ConfigError;
pub use schema::*;
pub use loader::{bundled, load, ConfigResolver, FileConfigResolver, MapConfigResolver};
