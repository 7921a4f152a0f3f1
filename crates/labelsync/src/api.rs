// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Unique identifier for a remote dataset.
///
/// # Examples
///
/// ```rust
/// use labelsync::DatasetID;
///
/// let id = DatasetID::from(42);
/// assert_eq!(id.to_string(), "42");
///
/// let id: DatasetID = "42".try_into().unwrap();
/// assert_eq!(id.value(), 42);
/// ```
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatasetID(u64);

impl Display for DatasetID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DatasetID {
    fn from(id: u64) -> Self {
        DatasetID(id)
    }
}

impl From<DatasetID> for u64 {
    fn from(val: DatasetID) -> Self {
        val.0
    }
}

impl DatasetID {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<&str> for DatasetID {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Ok(DatasetID(s.trim().parse()?))
    }
}

/// Unique identifier for an item (image) stored in a remote dataset.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemID(u64);

impl Display for ItemID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemID {
    fn from(id: u64) -> Self {
        ItemID(id)
    }
}

impl ItemID {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for a team-level annotation class.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnnotationClassID(u64);

impl Display for AnnotationClassID {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AnnotationClassID {
    fn from(id: u64) -> Self {
        AnnotationClassID(id)
    }
}

impl AnnotationClassID {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Converts a dataset name to the slug the server derives from it.
///
/// Lowercases, trims and collapses every run of non-alphanumeric characters
/// to a single `-`.
///
/// ```rust
/// use labelsync::slugify;
///
/// assert_eq!(slugify("  My Cats_2024 "), "my-cats-2024");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Composite `{team}/{dataset}` identifier used to look up a remote dataset.
///
/// The dataset part is kept exactly as configured; lookups compare slugs.
///
/// ```rust
/// use labelsync::DatasetIdentifier;
///
/// let id = DatasetIdentifier::new("v7", "My Cats");
/// assert_eq!(id.to_string(), "v7/My Cats");
/// assert_eq!(id.dataset_slug(), "my-cats");
///
/// let parsed: DatasetIdentifier = "v7/My Cats".parse().unwrap();
/// assert_eq!(parsed, id);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DatasetIdentifier {
    team: String,
    dataset: String,
}

impl DatasetIdentifier {
    pub fn new(team: &str, dataset: &str) -> Self {
        DatasetIdentifier {
            team: team.to_owned(),
            dataset: dataset.to_owned(),
        }
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn dataset_slug(&self) -> String {
        slugify(&self.dataset)
    }
}

impl Display for DatasetIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}/{}", self.team, self.dataset)
    }
}

impl FromStr for DatasetIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((team, dataset)) if !team.is_empty() && !dataset.is_empty() => {
                Ok(DatasetIdentifier::new(team, dataset))
            }
            _ => Err(Error::InvalidArgument(format!(
                "dataset identifier '{}' should look like 'team/dataset'",
                s
            ))),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub(crate) struct Team {
    pub(crate) slug: String,
}

#[derive(Deserialize, Clone, Debug)]
pub(crate) struct TokenInfo {
    pub(crate) selected_team: Team,
}

#[derive(Serialize, Debug)]
pub(crate) struct CreateDatasetParams<'a> {
    pub(crate) name: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct DatasetRef {
    pub(crate) id: DatasetID,
}

#[derive(Serialize, Debug)]
pub(crate) struct CreateClassParams<'a> {
    pub(crate) name: &'a str,
    pub(crate) annotation_types: Vec<&'a str>,
    pub(crate) datasets: Vec<DatasetRef>,
    pub(crate) team_slug: &'a str,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ClassListResult {
    pub(crate) annotation_classes: Vec<crate::AnnotationClass>,
}

#[derive(Serialize, Debug)]
pub(crate) struct ImportAnnotation {
    pub(crate) annotation_class_id: AnnotationClassID,
    pub(crate) data: serde_json::Value,
}

#[derive(Serialize, Debug)]
pub(crate) struct ImportParams {
    pub(crate) annotations: Vec<ImportAnnotation>,
    pub(crate) overwrite: String,
}

#[derive(Serialize, Debug)]
pub(crate) struct RegisterItem<'a> {
    #[serde(rename = "type")]
    pub(crate) kind: &'a str,
    pub(crate) filename: String,
    pub(crate) path: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct RegisterParams<'a> {
    pub(crate) items: Vec<RegisterItem<'a>>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RegisteredItem {
    pub(crate) dataset_item_id: ItemID,
    pub(crate) filename: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct BlockedItem {
    pub(crate) filename: String,
    #[serde(default)]
    pub(crate) reason: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RegisterResult {
    #[serde(default)]
    pub(crate) items: Vec<RegisteredItem>,
    #[serde(default)]
    pub(crate) blocked_items: Vec<BlockedItem>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ItemListResult {
    #[serde(default)]
    pub(crate) items: Vec<crate::DatasetItem>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SignUploadResult {
    pub(crate) upload_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("cats"), "cats");
        assert_eq!(slugify("Cats And Dogs"), "cats-and-dogs");
        assert_eq!(slugify("--weird__name--"), "weird-name");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_identifier_parse() {
        let id: DatasetIdentifier = "team/dataset".parse().unwrap();
        assert_eq!(id.team(), "team");
        assert_eq!(id.dataset(), "dataset");
        assert!("no-slash".parse::<DatasetIdentifier>().is_err());
        assert!("/dataset".parse::<DatasetIdentifier>().is_err());
        assert!("team/".parse::<DatasetIdentifier>().is_err());
    }

    #[test]
    fn test_dataset_id() {
        let id: DatasetID = " 17 ".try_into().unwrap();
        assert_eq!(id, DatasetID::from(17));
        assert_eq!(u64::from(id), 17);
        assert!(DatasetID::try_from("ds-x").is_err());
    }
}
