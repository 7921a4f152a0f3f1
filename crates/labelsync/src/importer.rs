// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    AnnotationClass, Client, Error, ImageAnnotationFile, ImportReport, Progress, RemoteDataset,
    api::{ImportAnnotation, ImportParams},
    format::ParseFn,
};
use itertools::Itertools as _;
use log::{debug, info, warn};
use std::{collections::HashMap, path::PathBuf};
use tokio::sync::mpsc::Sender;

impl Client {
    /// Imports normalized annotation files into `dataset`.
    ///
    /// All files are parsed before anything is sent, so a malformed file
    /// aborts the import without side effects. Missing annotation classes
    /// are then created on the team, and each file is posted to the item
    /// whose filename matches its image. Files whose image is not in the
    /// dataset are skipped with a warning.
    pub async fn import_files(
        &self,
        dataset: &RemoteDataset,
        parser: ParseFn,
        files: &[PathBuf],
        append: bool,
        progress: Option<Sender<Progress>>,
    ) -> Result<ImportReport, Error> {
        let mut report = ImportReport::default();
        if files.is_empty() {
            return Ok(report);
        }

        let parsed = files
            .iter()
            .map(|path| parser(path).map(|file| (path, file)))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Parsed {} annotation files", parsed.len());

        let mut classes = self.annotation_classes().await?;
        for (name, kind) in required_classes(parsed.iter().map(|(_, file)| file)) {
            if !classes.iter().any(|c| c.supports(name, kind)) {
                let class = self.create_annotation_class(dataset, name, kind).await?;
                classes.push(class);
                report.classes_created += 1;
            }
        }

        let filenames = parsed
            .iter()
            .map(|(_, file)| file.image.remote_filename().to_owned())
            .unique()
            .collect::<Vec<_>>();
        let items = self.dataset_items(dataset, &filenames).await?;
        let items = items
            .iter()
            .map(|item| (item.filename(), item.id()))
            .collect::<HashMap<_, _>>();

        let total = parsed.len();
        for (index, (path, file)) in parsed.iter().enumerate() {
            let filename = file.image.remote_filename();
            match items.get(filename) {
                Some(&item) => {
                    let annotations = import_annotations(file, &classes)?;
                    let count = annotations.len();
                    let params = ImportParams {
                        annotations,
                        overwrite: (!append).to_string(),
                    };
                    self.import_item(item, &params).await?;
                    report.imported += 1;
                    report.annotations += count;
                }
                None => {
                    warn!(
                        "{}: no image named {} in {}, skipping",
                        path.display(),
                        filename,
                        dataset.name()
                    );
                    report.skipped += 1;
                }
            }

            if let Some(progress) = &progress {
                progress
                    .send(Progress {
                        current: index + 1,
                        total,
                    })
                    .await?;
            }
        }

        info!("{}: {}", dataset.name(), report);
        Ok(report)
    }
}

/// Distinct `(name, type)` pairs used by `files`, in first-seen order.
fn required_classes<'a>(
    files: impl Iterator<Item = &'a ImageAnnotationFile>,
) -> Vec<(&'a str, &'static str)> {
    files
        .flat_map(|file| file.annotations.iter())
        .map(|annotation| (annotation.name.as_str(), annotation.shape.kind()))
        .unique()
        .collect()
}

fn import_annotations(
    file: &ImageAnnotationFile,
    classes: &[AnnotationClass],
) -> Result<Vec<ImportAnnotation>, Error> {
    file.annotations
        .iter()
        .map(|annotation| {
            let class = classes
                .iter()
                .find(|c| c.supports(&annotation.name, annotation.shape.kind()))
                .ok_or_else(|| Error::MissingLabel(annotation.name.clone()))?;
            Ok(ImportAnnotation {
                annotation_class_id: class.id(),
                data: annotation.data()?,
            })
        })
        .collect()
}
