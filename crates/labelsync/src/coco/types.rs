// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! COCO instance JSON structures.
//!
//! Only the fields needed for detection and instance segmentation are kept;
//! anything else in the source file is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level COCO dataset, e.g. `instances_train2017.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    #[serde(default)]
    pub images: Vec<CocoImage>,
    #[serde(default)]
    pub annotations: Vec<CocoAnnotation>,
    #[serde(default)]
    pub categories: Vec<CocoCategory>,
}

/// Image entry. Width and height may be zero in hand-made files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: u64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Filename relative to the images folder.
    pub file_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// One object instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    /// `[x, y, width, height]` in pixels, top-left origin.
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<CocoSegmentation>,
}

/// Polygon rings `[[x1, y1, x2, y2, ...], ...]` or run-length encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CocoSegmentation {
    Polygon(Vec<Vec<f64>>),
    Rle(CocoRle),
}

/// Run-length encoded mask; `counts` is either a list or a compressed string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoRle {
    pub counts: serde_json::Value,
    /// `[height, width]`
    pub size: [u32; 2],
}

/// Lookup tables over a [`CocoDataset`].
#[derive(Debug, Clone, Default)]
pub struct CocoIndex {
    /// `category_id` -> name
    pub labels: HashMap<u32, String>,
    /// `image_id` -> annotations, in file order
    pub annotations_by_image: HashMap<u64, Vec<CocoAnnotation>>,
}

impl CocoIndex {
    pub fn from_dataset(dataset: &CocoDataset) -> Self {
        let labels = dataset
            .categories
            .iter()
            .map(|c| (c.id, c.name.clone()))
            .collect();

        let mut annotations_by_image: HashMap<u64, Vec<CocoAnnotation>> = HashMap::new();
        for ann in &dataset.annotations {
            annotations_by_image
                .entry(ann.image_id)
                .or_default()
                .push(ann.clone());
        }

        Self {
            labels,
            annotations_by_image,
        }
    }

    pub fn label_name(&self, category_id: u32) -> Option<&str> {
        self.labels.get(&category_id).map(String::as_str)
    }

    pub fn annotations_for_image(&self, image_id: u64) -> &[CocoAnnotation] {
        self.annotations_by_image
            .get(&image_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
