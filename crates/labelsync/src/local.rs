// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Local images/annotations directory pair and its upload operations.

use std::{
    fmt::Display,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, error, info};
use serde::Deserialize;
use tokio::sync::mpsc::Sender;
use walkdir::WalkDir;

use crate::{
    DatasetIdentifier, Error, ImportReport, Progress,
    format::{self, ImageAnnotationFile},
    remote::{DatasetService, RemoteSession},
};

/// Dataset split an upload is tagged with.
///
/// Only `/train`, `/test` and `/val` are accepted; the tag is used as the
/// remote folder when images are pushed.
///
/// ```rust
/// use labelsync::Split;
///
/// let split: Split = "/val".parse().unwrap();
/// assert_eq!(split, Split::Val);
/// assert_eq!(split.as_str(), "/val");
/// assert!("/holdout".parse::<Split>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Split {
    #[default]
    Train,
    Test,
    Val,
}

impl Split {
    pub const ALLOWED: [&'static str; 3] = ["/train", "/test", "/val"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "/train",
            Split::Test => "/test",
            Split::Val => "/val",
        }
    }
}

impl Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "/train" => Ok(Split::Train),
            "/test" => Ok(Split::Test),
            "/val" => Ok(Split::Val),
            other => Err(Error::InvalidArgument(format!(
                "path '{}' should be one of {:?}",
                other,
                Split::ALLOWED
            ))),
        }
    }
}

impl TryFrom<&str> for Split {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Knobs for the upload operations.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Push the image files before importing annotations. Off by default:
    /// images are expected to be in the remote dataset already.
    pub push_images: bool,
    /// Receives import progress, one update per annotation file.
    pub progress: Option<Sender<Progress>>,
}

/// A pair of local directories holding images and normalized annotation
/// files for one remote dataset.
///
/// # Examples
///
/// ```rust,no_run
/// use labelsync::{Client, LocalDataset};
///
/// # async fn example() -> Result<(), labelsync::Error> {
/// let local = LocalDataset::new("data/images", "data/annotations", "cats", Some("/val"))?;
/// let client = Client::new()?;
/// let report = local.upload_sample(&client, "my-api-key", 10).await?;
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalDataset {
    images_dir: PathBuf,
    annotation_dir: PathBuf,
    dataset_name: String,
    split: Split,
    options: UploadOptions,
}

/// The only part of an annotation body the sample upload needs.
#[derive(Deserialize)]
struct SampleHeader {
    image: SampleImage,
}

#[derive(Deserialize)]
struct SampleImage {
    original_filename: String,
}

fn entries(dir: &Path) -> impl Iterator<Item = Result<PathBuf, Error>> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .map(|entry| entry.map(|e| e.into_path()).map_err(Error::from))
}

fn is_json(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".json"))
}

/// Reads `image.original_filename` from an annotation file.
///
/// The handle lives only inside this function, so it is closed on every
/// return path including a parse failure.
fn read_original_filename(path: &Path) -> Result<String, Error> {
    let reader = BufReader::new(File::open(path)?);
    let header: SampleHeader =
        serde_json::from_reader(reader).map_err(|source| Error::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(header.image.original_filename)
}

fn resolve_image(images_dir: &Path, original_filename: &str) -> PathBuf {
    images_dir.join(original_filename)
}

impl LocalDataset {
    /// Creates the adapter, creating both directories (and parents) if
    /// missing.
    ///
    /// `split` defaults to `/train`; any value outside [`Split::ALLOWED`]
    /// fails with [`Error::InvalidArgument`] before touching the filesystem.
    pub fn new(
        images_dir: impl Into<PathBuf>,
        annotation_dir: impl Into<PathBuf>,
        dataset_name: &str,
        split: Option<&str>,
    ) -> Result<Self, Error> {
        let split = match split {
            Some(split) => split.parse()?,
            None => Split::default(),
        };

        let images_dir = images_dir.into();
        let annotation_dir = annotation_dir.into();
        std::fs::create_dir_all(&images_dir)?;
        std::fs::create_dir_all(&annotation_dir)?;

        debug!(
            "Local dataset '{}' images={:?} annotations={:?} split={}",
            dataset_name, images_dir, annotation_dir, split
        );

        Ok(LocalDataset {
            images_dir,
            annotation_dir,
            dataset_name: dataset_name.to_owned(),
            split,
            options: UploadOptions::default(),
        })
    }

    pub fn with_options(self, options: UploadOptions) -> Self {
        LocalDataset { options, ..self }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn annotation_dir(&self) -> &Path {
        &self.annotation_dir
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn split(&self) -> Split {
        self.split
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Every entry of the images directory, in directory order.
    pub fn image_files(&self) -> Result<Vec<PathBuf>, Error> {
        entries(&self.images_dir).collect()
    }

    /// Every `*.json` entry of the annotation directory, in directory order.
    pub fn annotation_files(&self) -> Result<Vec<PathBuf>, Error> {
        self.json_entries().collect()
    }

    fn json_entries(&self) -> impl Iterator<Item = Result<PathBuf, Error>> {
        entries(&self.annotation_dir).filter(|entry| match entry {
            Ok(path) => is_json(path),
            Err(_) => true,
        })
    }

    /// Path an annotation file expects its image at.
    pub fn image_path(&self, annotation: &ImageAnnotationFile) -> PathBuf {
        resolve_image(&self.images_dir, &annotation.image.original_filename)
    }

    /// Selects the first `n_samples` annotation files and the image path each
    /// one names.
    ///
    /// Returns `(images, annotations)` with matching indices.
    pub fn sample_pairs(&self, n_samples: usize) -> Result<(Vec<PathBuf>, Vec<PathBuf>), Error> {
        let annotations = self
            .json_entries()
            .take(n_samples)
            .collect::<Result<Vec<_>, _>>()?;

        let images = annotations
            .iter()
            .map(|path| {
                let original_filename = read_original_filename(path)?;
                Ok(resolve_image(&self.images_dir, &original_filename))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok((images, annotations))
    }

    /// Uploads everything found on disk.
    pub async fn upload<S: DatasetService>(
        &self,
        service: &S,
        api_key: &str,
    ) -> Result<ImportReport, Error> {
        let images = self.image_files()?;
        let annotations = self.annotation_files()?;
        info!(
            "Found {} images and {} annotation files",
            images.len(),
            annotations.len()
        );

        self.upload_from_files(service, api_key, &images, &annotations)
            .await
    }

    /// Uploads the given files into the remote dataset, creating it if needed.
    ///
    /// A dataset name already taken by the team (HTTP 422) falls back to the
    /// existing dataset; any other create failure is returned.
    pub async fn upload_from_files<S: DatasetService>(
        &self,
        service: &S,
        api_key: &str,
        images: &[PathBuf],
        annotations: &[PathBuf],
    ) -> Result<ImportReport, Error> {
        let session = service.authenticate(api_key).await?;
        let identifier = DatasetIdentifier::new(session.default_team(), &self.dataset_name);

        let dataset = match session.create_dataset(&self.dataset_name).await {
            Ok(dataset) => {
                info!("Created dataset {}", identifier);
                dataset
            }
            Err(err) if err.is_conflict() => {
                debug!("Dataset {} already exists: {}", identifier, err);
                let dataset = session.get_remote_dataset(&identifier).await?;
                match dataset.inserted_at() {
                    Some(at) => info!(
                        "Reusing dataset {} created {}",
                        identifier,
                        at.format("%Y-%m-%d %H:%M UTC")
                    ),
                    None => info!("Reusing dataset {}", identifier),
                }
                dataset
            }
            Err(err) => {
                error!("Failed to create dataset {}: {}", identifier, err);
                return Err(err);
            }
        };

        if self.options.push_images {
            let report = session
                .push(&dataset, images, self.split.as_str())
                .await?;
            info!(
                "Pushed {} images to {} ({} blocked)",
                report.uploaded,
                identifier,
                report.blocked.len()
            );
        } else if !images.is_empty() {
            debug!("Image push disabled, skipping {} images", images.len());
        }

        let report = session
            .import_annotations(
                &dataset,
                format::parse_file,
                annotations,
                true,
                self.options.progress.clone(),
            )
            .await?;
        info!("{}: {}", identifier, report);

        Ok(report)
    }

    /// Uploads the first `n_samples` annotation files and their images.
    ///
    /// Files are taken in directory order, this is not a random sample.
    pub async fn upload_sample<S: DatasetService>(
        &self,
        service: &S,
        api_key: &str,
        n_samples: usize,
    ) -> Result<ImportReport, Error> {
        let (images, annotations) = self.sample_pairs(n_samples)?;
        self.upload_from_files(service, api_key, &images, &annotations)
            .await
    }
}

/// A converter from some source annotation format into normalized files.
///
/// Implementors own a [`LocalDataset`] and write their output into its
/// annotation directory, so the result can be uploaded right away.
pub trait Parser {
    /// One source record, e.g. an image with its annotations.
    type Record;

    fn local(&self) -> &LocalDataset;

    /// Converts one source record.
    fn parse_annotation(&self, record: &Self::Record) -> Result<ImageAnnotationFile, Error>;

    /// Converts every record found under `root`, returning the number of
    /// annotation files written.
    fn parse(&self, root: &Path) -> Result<usize, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_annotation(dir: &Path, name: &str, image: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(
            &path,
            serde_json::json!({"image": {"original_filename": image}, "annotations": []})
                .to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_split_rejects_unknown() {
        let dir = TempDir::new().unwrap();
        for split in ["/holdout", "train", "/TRAIN", "", "/train/"] {
            let result = LocalDataset::new(
                dir.path().join("images"),
                dir.path().join("annotations"),
                "cats",
                Some(split),
            );
            assert!(
                matches!(result, Err(Error::InvalidArgument(_))),
                "split {:?} should be rejected",
                split
            );
        }
        assert!(!dir.path().join("images").exists());
    }

    #[test]
    fn test_allowed_splits_create_directories() {
        for split in Split::ALLOWED {
            let dir = TempDir::new().unwrap();
            let images = dir.path().join("a").join("images");
            let annotations = dir.path().join("b").join("annotations");

            let local = LocalDataset::new(&images, &annotations, "cats", Some(split)).unwrap();
            assert_eq!(local.split().as_str(), split);
            assert!(images.is_dir());
            assert!(annotations.is_dir());

            // Existing directories are fine.
            LocalDataset::new(&images, &annotations, "cats", Some(split)).unwrap();
        }
    }

    #[test]
    fn test_default_split() {
        let dir = TempDir::new().unwrap();
        let local =
            LocalDataset::new(dir.path().join("i"), dir.path().join("a"), "cats", None).unwrap();
        assert_eq!(local.split(), Split::Train);
    }

    #[test]
    fn test_file_listing() {
        let dir = TempDir::new().unwrap();
        let local =
            LocalDataset::new(dir.path().join("i"), dir.path().join("a"), "cats", None).unwrap();

        std::fs::write(local.images_dir().join("cat.jpg"), b"x").unwrap();
        std::fs::write(local.images_dir().join("notes.txt"), b"x").unwrap();
        write_annotation(local.annotation_dir(), "cat.json", "cat.jpg");
        std::fs::write(local.annotation_dir().join("readme.md"), b"x").unwrap();

        let mut images = local.image_files().unwrap();
        images.sort();
        assert_eq!(
            images,
            vec![
                local.images_dir().join("cat.jpg"),
                local.images_dir().join("notes.txt")
            ]
        );
        assert_eq!(
            local.annotation_files().unwrap(),
            vec![local.annotation_dir().join("cat.json")]
        );
    }

    #[test]
    fn test_resolve_image() {
        assert_eq!(
            resolve_image(Path::new("/data/images"), "cat.jpg"),
            PathBuf::from("/data/images/cat.jpg")
        );
    }

    #[test]
    fn test_sample_image_path() {
        let dir = TempDir::new().unwrap();
        let local =
            LocalDataset::new(dir.path().join("i"), dir.path().join("a"), "cats", None).unwrap();

        let annotation = write_annotation(local.annotation_dir(), "cat.json", "cat.jpg");
        let (images, annotations) = local.sample_pairs(10).unwrap();
        assert_eq!(images, vec![local.images_dir().join("cat.jpg")]);
        assert_eq!(annotations, vec![annotation]);

        let parsed = format::parse_file(&annotations[0]).unwrap();
        assert_eq!(local.image_path(&parsed), images[0]);
    }

    #[test]
    fn test_sample_more_than_available() {
        let dir = TempDir::new().unwrap();
        let local =
            LocalDataset::new(dir.path().join("i"), dir.path().join("a"), "cats", None).unwrap();
        write_annotation(local.annotation_dir(), "a.json", "a.jpg");
        write_annotation(local.annotation_dir(), "b.json", "b.jpg");

        let (images, annotations) = local.sample_pairs(50).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(annotations.len(), 2);
        for (image, annotation) in images.iter().zip(&annotations) {
            assert_eq!(image.file_stem(), annotation.file_stem());
        }

        let (images, annotations) = local.sample_pairs(0).unwrap();
        assert!(images.is_empty() && annotations.is_empty());
    }

    #[cfg(target_os = "linux")]
    fn open_handles_to(path: &Path) -> usize {
        let target = path.canonicalize().unwrap();
        std::fs::read_dir("/proc/self/fd")
            .unwrap()
            .filter_map(|fd| fd.ok())
            .filter_map(|fd| std::fs::read_link(fd.path()).ok())
            .filter(|link| *link == target)
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_malformed_sample_releases_handle() {
        let dir = TempDir::new().unwrap();
        let local =
            LocalDataset::new(dir.path().join("i"), dir.path().join("a"), "cats", None).unwrap();
        let broken = local.annotation_dir().join("broken.json");
        std::fs::write(&broken, "{\"image\": {\"original_filename\": ").unwrap();

        let result = local.sample_pairs(5);
        assert!(matches!(result, Err(Error::JsonParse { ref path, .. }) if *path == broken));
        assert_eq!(open_handles_to(&broken), 0);

        let result = read_original_filename(&broken);
        assert!(result.is_err());
        assert_eq!(open_handles_to(&broken), 0);
    }
}
