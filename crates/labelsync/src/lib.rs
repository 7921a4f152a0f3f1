// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # labelsync
//!
//! Uploads a local dataset, a directory of images plus a directory of
//! per-image annotation files, to a remote annotation service.
//!
//! ## Features
//!
//! - **Local datasets**: [`LocalDataset`] pairs an images directory with an
//!   annotations directory and tags the upload with a [`Split`]
//! - **Uploads**: bulk, explicit file lists, or a sample of the first N
//!   annotation files together with their images
//! - **Create-or-reuse**: the remote dataset is created on first upload and
//!   reused when the name is already taken
//! - **Format parsers**: the [`Parser`] trait converts foreign formats into
//!   the [normalized format](format); [`coco::CocoParser`] handles COCO
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use labelsync::{Client, Error, LocalDataset};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let local = LocalDataset::new("data/images", "data/annotations", "cats", Some("/val"))?;
//!     let report = local.upload(&Client::new()?, "my-api-key").await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Remote seam
//!
//! [`LocalDataset`] talks to the service only through [`DatasetService`]
//! and [`RemoteSession`]. [`Client`] implements both over HTTP.

mod api;
mod client;
mod dataset;
mod error;
mod importer;
mod local;
mod remote;
mod retry;
mod settings;
mod storage;

pub mod coco;
pub mod format;

pub use crate::{
    api::{AnnotationClassID, DatasetID, DatasetIdentifier, ItemID, slugify},
    client::{Client, Progress},
    dataset::{AnnotationClass, DatasetItem, ImportReport, PushReport, RemoteDataset},
    error::Error,
    format::ImageAnnotationFile,
    local::{LocalDataset, Parser, Split, UploadOptions},
    remote::{DatasetService, RemoteSession},
    retry::{RetryScope, classify_url},
    settings::{DEFAULT_SERVER, Settings},
    storage::{FileKeyStorage, KeyStorage, MemoryKeyStorage},
};

#[cfg(test)]
mod tests {
    #[ctor::ctor]
    fn init() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .is_test(true)
            .init();
    }
}
