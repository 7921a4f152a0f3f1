// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! COCO readers for JSON files, directories of JSON files, and ZIP archives.

use super::types::*;
use crate::Error;
use log::debug;
use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

/// Reads a single COCO JSON file.
pub fn read_json(path: &Path) -> Result<CocoDataset, Error> {
    let reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
    serde_json::from_reader(reader).map_err(|source| Error::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and merges every annotation JSON inside a ZIP archive.
///
/// Entries named `*.json` are read; when any of them contains `instances`
/// in its name only those are used, so caption or keypoint files shipped
/// alongside do not pollute the result.
pub fn read_annotations_zip(path: &Path) -> Result<CocoDataset, Error> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;

    let names = archive
        .file_names()
        .filter(|name| name.ends_with(".json"))
        .map(str::to_owned)
        .collect::<Vec<_>>();
    let instances_only = names.iter().any(|name| name.contains("instances"));

    let mut merged = CocoDataset::default();
    for name in names {
        if instances_only && !name.contains("instances") {
            continue;
        }

        let mut contents = String::new();
        archive.by_name(&name)?.read_to_string(&mut contents)?;
        let dataset: CocoDataset =
            serde_json::from_str(&contents).map_err(|source| Error::JsonParse {
                path: path.join(&name),
                source,
            })?;
        debug!("{}: {} images", name, dataset.images.len());
        merge_datasets(&mut merged, dataset);
    }

    Ok(merged)
}

/// Reads and merges every `*.json` file directly inside `dir`, in name
/// order.
pub fn read_coco_directory(dir: &Path) -> Result<CocoDataset, Error> {
    let mut merged = CocoDataset::default();

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            merge_datasets(&mut merged, read_json(entry.path())?);
        }
    }

    Ok(merged)
}

/// Reads `path` as a directory, ZIP archive, or JSON file.
pub fn read_any(path: &Path) -> Result<CocoDataset, Error> {
    if path.is_dir() {
        read_coco_directory(path)
    } else if path.extension().is_some_and(|ext| ext == "zip") {
        read_annotations_zip(path)
    } else {
        read_json(path)
    }
}

/// Merges `source` into `target`. Images and categories are deduplicated by
/// id, annotations are appended.
fn merge_datasets(target: &mut CocoDataset, source: CocoDataset) {
    let existing: HashSet<_> = target.images.iter().map(|i| i.id).collect();
    target
        .images
        .extend(source.images.into_iter().filter(|i| !existing.contains(&i.id)));

    let existing: HashSet<_> = target.categories.iter().map(|c| c.id).collect();
    target.categories.extend(
        source
            .categories
            .into_iter()
            .filter(|c| !existing.contains(&c.id)),
    );

    target.annotations.extend(source.annotations);
}
