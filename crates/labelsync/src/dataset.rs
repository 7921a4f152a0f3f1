// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use std::fmt::Display;

use crate::{
    DatasetIdentifier,
    api::{AnnotationClassID, DatasetID, ItemID},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dataset as stored by the remote service.
///
/// Handles are produced by [`RemoteSession::create_dataset`] or
/// [`RemoteSession::get_remote_dataset`] and passed back to the session for
/// pushes and imports.
///
/// [`RemoteSession::create_dataset`]: crate::RemoteSession::create_dataset
/// [`RemoteSession::get_remote_dataset`]: crate::RemoteSession::get_remote_dataset
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RemoteDataset {
    id: DatasetID,
    name: String,
    slug: String,
    #[serde(default)]
    team_slug: String,
    #[serde(default)]
    num_images: u64,
    #[serde(default)]
    inserted_at: Option<DateTime<Utc>>,
}

impl Display for RemoteDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.name)
    }
}

impl RemoteDataset {
    pub fn new(id: DatasetID, team: &str, name: &str) -> Self {
        RemoteDataset {
            id,
            name: name.to_owned(),
            slug: crate::slugify(name),
            team_slug: team.to_owned(),
            num_images: 0,
            inserted_at: None,
        }
    }

    pub fn id(&self) -> DatasetID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn team_slug(&self) -> &str {
        &self.team_slug
    }

    pub fn num_images(&self) -> u64 {
        self.num_images
    }

    pub fn inserted_at(&self) -> Option<&DateTime<Utc>> {
        self.inserted_at.as_ref()
    }

    /// Returns the `{team}/{slug}` identifier of this dataset.
    pub fn identifier(&self) -> DatasetIdentifier {
        DatasetIdentifier::new(&self.team_slug, &self.slug)
    }

    /// True if this dataset is the one named by `identifier`.
    ///
    /// Teams must match exactly, dataset names are compared by slug. An empty
    /// team on the dataset side matches any team since some listings omit it.
    pub fn matches(&self, identifier: &DatasetIdentifier) -> bool {
        let team_matches = self.team_slug.is_empty() || self.team_slug == identifier.team();
        team_matches && self.slug == identifier.dataset_slug()
    }
}

/// An image stored in a remote dataset.
#[derive(Deserialize, Clone, Debug)]
pub struct DatasetItem {
    id: ItemID,
    filename: String,
    #[serde(default)]
    path: String,
}

impl DatasetItem {
    pub fn id(&self) -> ItemID {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A team-level annotation class.
///
/// Imports reference classes by ID, so every `(name, type)` pair used in an
/// annotation file must exist on the team before its annotations are posted.
#[derive(Deserialize, Clone, Debug)]
pub struct AnnotationClass {
    id: AnnotationClassID,
    name: String,
    #[serde(default)]
    annotation_types: Vec<String>,
}

impl AnnotationClass {
    pub fn id(&self) -> AnnotationClassID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation_types(&self) -> &[String] {
        &self.annotation_types
    }

    pub fn supports(&self, name: &str, kind: &str) -> bool {
        self.name == name && self.annotation_types.iter().any(|t| t == kind)
    }
}

/// Outcome of an annotation import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Files whose annotations were posted.
    pub imported: usize,
    /// Files skipped because their image is not in the dataset.
    pub skipped: usize,
    /// Total annotations posted.
    pub annotations: usize,
    /// Annotation classes created on the team during the import.
    pub classes_created: usize,
}

impl Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "imported {} files ({} annotations), skipped {}, created {} classes",
            self.imported, self.annotations, self.skipped, self.classes_created
        )
    }
}

/// Outcome of an image push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Images uploaded and confirmed.
    pub uploaded: usize,
    /// Images the server refused to register, with its reason.
    pub blocked: Vec<(String, String)>,
}
