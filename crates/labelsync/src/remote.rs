// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! The seam between the local adapter and the remote dataset service.
//!
//! [`LocalDataset`](crate::LocalDataset) only ever talks to the service
//! through these two traits. [`Client`](crate::Client) implements both over
//! HTTP; tests substitute a recording fake.

use std::path::PathBuf;

use tokio::sync::mpsc::Sender;

use crate::{
    DatasetIdentifier, Error, ImportReport, Progress, PushReport, RemoteDataset, format::ParseFn,
};

/// Entry point of a dataset service: turns an API key into a session.
#[allow(async_fn_in_trait)]
pub trait DatasetService {
    type Session: RemoteSession;

    /// Authenticates with `api_key`.
    ///
    /// Fails with [`Error::EmptyApiKey`] for an empty key and
    /// [`Error::Unauthorized`] when the service rejects it.
    async fn authenticate(&self, api_key: &str) -> Result<Self::Session, Error>;
}

/// Operations available to an authenticated session.
#[allow(async_fn_in_trait)]
pub trait RemoteSession {
    /// Team the API key belongs to.
    fn default_team(&self) -> &str;

    /// Creates a dataset named `name` in the default team.
    ///
    /// A name already taken by the team fails with
    /// `Error::StatusError(422, _)`.
    async fn create_dataset(&self, name: &str) -> Result<RemoteDataset, Error>;

    /// Fetches an existing dataset by `{team}/{dataset}` identifier.
    async fn get_remote_dataset(
        &self,
        identifier: &DatasetIdentifier,
    ) -> Result<RemoteDataset, Error>;

    /// Uploads image files into `dataset` under the remote folder `path`.
    async fn push(
        &self,
        dataset: &RemoteDataset,
        images: &[PathBuf],
        path: &str,
    ) -> Result<PushReport, Error>;

    /// Imports annotation files into `dataset`.
    ///
    /// Each file is read with `parser`. With `append` set, annotations
    /// already on an item are kept; otherwise they are replaced.
    async fn import_annotations(
        &self,
        dataset: &RemoteDataset,
        parser: ParseFn,
        files: &[PathBuf],
        append: bool,
        progress: Option<Sender<Progress>>,
    ) -> Result<ImportReport, Error>;
}
