// SPDX-License-Identifier: AGPL-3.0
// Hop Transfer Core - Transfer client seam
//
// The wire protocol (rendezvous, code exchange, encryption) lives in an
// external client. This module defines what that client must accept and
// the glue that turns a selection into a send.

use crate::entry::{TransferEntry, TransferSet};
use crate::enumerate::{enumerate_directory, enumerate_file, enumerate_items, Selection};
use crate::types::{SendOptions, TransferError};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

/// Result of a started send: the code to share with the peer and a
/// one-time signal that fires when the transfer finishes or fails.
#[derive(Debug)]
pub struct SendHandle {
    pub code: String,
    result: oneshot::Receiver<Result<(), TransferError>>,
}

impl SendHandle {
    pub fn new(
        code: impl Into<String>,
        result: oneshot::Receiver<Result<(), TransferError>>,
    ) -> Self {
        Self {
            code: code.into(),
            result,
        }
    }

    /// Create a handle together with the sender half the client completes.
    pub fn channel(
        code: impl Into<String>,
    ) -> (Self, oneshot::Sender<Result<(), TransferError>>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(code, rx), tx)
    }

    /// Wait for the transfer to finish. A client that drops its half
    /// without reporting is treated as cancelled.
    pub async fn wait(self) -> Result<(), TransferError> {
        self.result.await.map_err(|_| TransferError::Cancelled)?
    }
}

/// The external protocol client.
///
/// Implementations call `TransferEntry::open` for each entry only when its
/// bytes are about to go on the wire, one entry at a time, in order.
pub trait TransferClient {
    fn send_file(
        &self,
        name: &str,
        entry: TransferEntry,
        options: &SendOptions,
    ) -> Result<SendHandle, TransferError>;

    fn send_directory(
        &self,
        name: &str,
        entries: Vec<TransferEntry>,
        options: &SendOptions,
    ) -> Result<SendHandle, TransferError>;

    fn send_text(&self, text: &str, options: &SendOptions) -> Result<SendHandle, TransferError>;
}

/// Prepares selections and hands them to a transfer client
pub struct Sender<C> {
    client: C,
    options: SendOptions,
}

impl<C: TransferClient> Sender<C> {
    pub fn new(client: C, options: SendOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn options(&self) -> &SendOptions {
        &self.options
    }

    /// Send one file under its base name
    pub fn send_file(&self, path: &Path) -> Result<SendHandle, TransferError> {
        let set = enumerate_file(path)?;
        let (name, mut entries) = set.into_parts();
        let entry = entries.pop().ok_or_else(|| {
            TransferError::InvalidSelection(format!("{} produced no entry", path.display()))
        })?;

        tracing::info!("Sending file {}", name);
        self.client.send_file(&name, entry, &self.options)
    }

    /// Send a directory tree under the directory's name
    pub fn send_directory(&self, path: &Path) -> Result<SendHandle, TransferError> {
        let set = enumerate_directory(path)?;
        self.send_set(set)
    }

    /// Send several files and directories that share a parent directory
    pub fn send_items(&self, paths: &[PathBuf]) -> Result<SendHandle, TransferError> {
        let set = enumerate_items(paths)?;
        self.send_set(set)
    }

    pub fn send_selection(&self, selection: &Selection) -> Result<SendHandle, TransferError> {
        match selection {
            Selection::File(path) => self.send_file(path),
            Selection::Directory(path) => self.send_directory(path),
            Selection::Items(paths) => self.send_items(paths),
        }
    }

    pub fn send_text(&self, text: &str) -> Result<SendHandle, TransferError> {
        tracing::info!("Sending text ({} bytes)", text.len());
        self.client.send_text(text, &self.options)
    }

    fn send_set(&self, set: TransferSet) -> Result<SendHandle, TransferError> {
        let (name, entries) = set.into_parts();
        tracing::info!("Sending {} with {} files", name, entries.len());
        self.client.send_directory(&name, entries, &self.options)
    }
}
