// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Shared logic for all frontends
//
// This crate provides:
// - PathResolver and the containment checks for relative paths
// - Enumeration of files, directory trees and mixed selections into TransferSets
// - The TransferClient seam and the Sender glue around it
// - Receive-side helpers for writing entries below a destination
// - AppSettings, settings loading and TransferError
//
// The wire protocol itself lives in an external transfer client.

pub mod client;
pub mod entry;
pub mod enumerate;
pub mod path;
pub mod receive;
pub mod settings;
pub mod types;

// Re-export commonly used items
pub use client::{SendHandle, Sender, TransferClient};
pub use entry::{FileContent, FileMode, OpenContent, TransferEntry, TransferSet};
pub use enumerate::{enumerate_directory, enumerate_file, enumerate_items, Selection};
pub use path::PathResolver;
pub use settings::{default_settings_path, load_settings};
pub use types::{AppSettings, SendOptions, TransferError};
