// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! # COCO format support
//!
//! Converts COCO instance annotations into normalized annotation files that
//! [`LocalDataset`](crate::LocalDataset) can upload.
//!
//! Bounding boxes become `bounding_box` annotations and polygon
//! segmentations become one `polygon` per ring. RLE masks are not converted.
//!
//! ```rust,no_run
//! use labelsync::coco::read_json;
//! use std::path::Path;
//!
//! let dataset = read_json(Path::new("annotations/instances_val2017.json"))?;
//! println!("Found {} images and {} annotations",
//!          dataset.images.len(), dataset.annotations.len());
//! # Ok::<(), labelsync::Error>(())
//! ```

mod parser;
mod reader;
mod types;

pub use parser::{CocoParser, CocoSample};
pub use reader::{read_annotations_zip, read_any, read_coco_directory, read_json};
pub use types::{
    CocoAnnotation, CocoCategory, CocoDataset, CocoImage, CocoIndex, CocoRle, CocoSegmentation,
};
