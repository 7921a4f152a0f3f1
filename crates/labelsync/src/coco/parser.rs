// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use super::{
    reader::read_any,
    types::{CocoAnnotation, CocoImage, CocoIndex, CocoSegmentation},
};
use crate::{
    Error, LocalDataset, Parser,
    format::{Annotation, ImageAnnotationFile, ImageInfo, Point, write_file},
};
use log::{debug, info, warn};
use std::{collections::HashSet, path::Path, rc::Rc};

/// A COCO image with its annotations and the category names they refer to.
#[derive(Debug, Clone)]
pub struct CocoSample {
    pub image: CocoImage,
    pub annotations: Vec<CocoAnnotation>,
    pub index: Rc<CocoIndex>,
}

/// Converts COCO instance annotations into normalized annotation files.
///
/// ```rust,no_run
/// use labelsync::{LocalDataset, Parser, coco::CocoParser};
/// use std::path::Path;
///
/// # fn main() -> Result<(), labelsync::Error> {
/// let local = LocalDataset::new("images", "annotations", "cats", None)?;
/// let written = CocoParser::new(local).parse(Path::new("instances_train.json"))?;
/// println!("wrote {} annotation files", written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CocoParser {
    local: LocalDataset,
}

impl CocoParser {
    pub fn new(local: LocalDataset) -> Self {
        Self { local }
    }

    pub fn into_local(self) -> LocalDataset {
        self.local
    }

    /// Image size from the file in the images directory, when the COCO
    /// entry leaves it at zero.
    fn image_size(&self, image: &CocoImage) -> (u32, u32) {
        if image.width > 0 && image.height > 0 {
            return (image.width, image.height);
        }

        let path = self.local.images_dir().join(&image.file_name);
        match imagesize::size(&path) {
            Ok(size) => (size.width as u32, size.height as u32),
            Err(err) => {
                warn!("{:?}: unable to read image size: {}", path, err);
                (image.width, image.height)
            }
        }
    }
}

impl Parser for CocoParser {
    type Record = CocoSample;

    fn local(&self) -> &LocalDataset {
        &self.local
    }

    fn parse_annotation(&self, record: &CocoSample) -> Result<ImageAnnotationFile, Error> {
        let (width, height) = self.image_size(&record.image);
        let mut image = ImageInfo::new(&record.image.file_name, width, height);
        image.path = Some(self.local.split().as_str().to_owned());

        let mut annotations = Vec::new();
        for ann in &record.annotations {
            let name = record.index.label_name(ann.category_id).ok_or_else(|| {
                Error::MissingLabel(format!(
                    "category {} of annotation {}",
                    ann.category_id, ann.id
                ))
            })?;
            annotations.extend(convert_annotation(name, ann));
        }

        for annotation in &annotations {
            annotation.validate()?;
        }

        Ok(ImageAnnotationFile { image, annotations })
    }

    fn parse(&self, root: &Path) -> Result<usize, Error> {
        let dataset = read_any(root)?;
        let index = Rc::new(CocoIndex::from_dataset(&dataset));
        info!(
            "{:?}: {} images, {} annotations, {} categories",
            root,
            dataset.images.len(),
            dataset.annotations.len(),
            dataset.categories.len()
        );

        let mut written = 0;
        let mut outputs = HashSet::new();
        for image in dataset.images {
            if image.file_name.trim().is_empty() {
                return Err(Error::InvalidAnnotation(format!(
                    "image {} has no file name",
                    image.id
                )));
            }
            let name = output_name(&image.file_name);
            if !outputs.insert(name.clone()) {
                return Err(Error::InvalidAnnotation(format!(
                    "image {} ({}) maps to {} which is already used by another image",
                    image.id, image.file_name, name
                )));
            }

            let sample = CocoSample {
                annotations: index.annotations_for_image(image.id).to_vec(),
                index: Rc::clone(&index),
                image,
            };
            let file = self.parse_annotation(&sample)?;

            let output = self.local.annotation_dir().join(&name);
            write_file(&output, &file)?;
            debug!("{:?}: {} annotations", output, file.annotations.len());
            written += 1;
        }

        Ok(written)
    }
}

/// Annotation filename for a COCO `file_name`: the full relative name with
/// path separators flattened and `.json` appended, so `val/x.jpg` becomes
/// `val_x.jpg.json` and never collides with `x.png.json`.
fn output_name(file_name: &str) -> String {
    let flat = file_name
        .trim_start_matches(['/', '\\'])
        .replace(['/', '\\'], "_");
    format!("{}.json", flat)
}

/// Normalized annotations for one COCO instance: a bounding box when present
/// and one polygon per segmentation ring.
fn convert_annotation(name: &str, ann: &CocoAnnotation) -> Vec<Annotation> {
    let mut out = Vec::new();

    if let Some([x, y, w, h]) = ann.bbox {
        out.push(Annotation::bounding_box(name, x, y, w, h));
    }

    match &ann.segmentation {
        Some(CocoSegmentation::Polygon(rings)) => {
            for ring in rings {
                let path = ring
                    .chunks_exact(2)
                    .map(|xy| Point { x: xy[0], y: xy[1] })
                    .collect::<Vec<_>>();
                if path.len() < 3 {
                    debug!("annotation {}: dropping ring with {} points", ann.id, path.len());
                    continue;
                }
                out.push(Annotation::polygon(name, path));
            }
        }
        Some(CocoSegmentation::Rle(_)) => {
            debug!("annotation {}: RLE segmentation not converted", ann.id);
        }
        None => {}
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Shape, parse_file};
    use tempfile::TempDir;

    fn local(dir: &TempDir) -> LocalDataset {
        LocalDataset::new(
            dir.path().join("images"),
            dir.path().join("annotations"),
            "cats",
            Some("/val"),
        )
        .unwrap()
    }

    #[test]
    fn test_convert_annotation() {
        let ann: CocoAnnotation = serde_json::from_value(serde_json::json!({
            "id": 1, "image_id": 1, "category_id": 1,
            "bbox": [1.0, 2.0, 3.0, 4.0],
            "segmentation": [[0, 0, 4, 0, 4, 4, 0, 4], [1, 1, 2, 2]]
        }))
        .unwrap();

        let out = convert_annotation("cat", &ann);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Annotation::bounding_box("cat", 1.0, 2.0, 3.0, 4.0));
        assert!(matches!(&out[1].shape, Shape::Polygon { path } if path.len() == 4));
    }

    #[test]
    fn test_parse_writes_one_file_per_image() {
        let dir = TempDir::new().unwrap();
        let parser = CocoParser::new(local(&dir));

        let coco = dir.path().join("instances.json");
        std::fs::write(
            &coco,
            serde_json::json!({
                "images": [
                    {"id": 1, "width": 640, "height": 480, "file_name": "cat.jpg"},
                    {"id": 2, "width": 320, "height": 240, "file_name": "empty.png"}
                ],
                "categories": [{"id": 7, "name": "cat"}],
                "annotations": [
                    {"id": 1, "image_id": 1, "category_id": 7, "bbox": [10, 20, 30, 40]}
                ]
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(parser.parse(&coco).unwrap(), 2);

        let local = parser.into_local();
        let cat = parse_file(&local.annotation_dir().join("cat.jpg.json")).unwrap();
        assert_eq!(cat.image.original_filename, "cat.jpg");
        assert_eq!((cat.image.width, cat.image.height), (640, 480));
        assert_eq!(cat.image.path.as_deref(), Some("/val"));
        assert_eq!(
            cat.annotations,
            vec![Annotation::bounding_box("cat", 10.0, 20.0, 30.0, 40.0)]
        );

        let empty = parse_file(&local.annotation_dir().join("empty.png.json")).unwrap();
        assert!(empty.annotations.is_empty());
        assert_eq!(local.annotation_files().unwrap().len(), 2);
    }

    fn write_images(path: &Path, file_names: &[&str]) {
        let images = file_names
            .iter()
            .enumerate()
            .map(|(i, name)| serde_json::json!({"id": i + 1, "width": 8, "height": 8, "file_name": name}))
            .collect::<Vec<_>>();
        std::fs::write(
            path,
            serde_json::json!({"images": images, "categories": [], "annotations": []}).to_string(),
        )
        .unwrap();
    }

    #[test]
    fn test_same_stem_images_keep_separate_files() {
        let dir = TempDir::new().unwrap();
        let parser = CocoParser::new(local(&dir));

        let coco = dir.path().join("instances.json");
        write_images(&coco, &["x.jpg", "x.png", "val/x.jpg"]);

        assert_eq!(parser.parse(&coco).unwrap(), 3);

        let local = parser.into_local();
        let mut files = local
            .annotation_files()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        files.sort();
        assert_eq!(files, vec!["val_x.jpg.json", "x.jpg.json", "x.png.json"]);

        let nested = parse_file(&local.annotation_dir().join("val_x.jpg.json")).unwrap();
        assert_eq!(nested.image.original_filename, "val/x.jpg");
    }

    #[test]
    fn test_colliding_output_names() {
        let dir = TempDir::new().unwrap();
        let parser = CocoParser::new(local(&dir));

        let coco = dir.path().join("instances.json");
        write_images(&coco, &["a/b.jpg", "a_b.jpg"]);

        assert!(matches!(
            parser.parse(&coco),
            Err(Error::InvalidAnnotation(msg)) if msg.contains("a_b.jpg.json")
        ));
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("cat.jpg"), "cat.jpg.json");
        assert_eq!(output_name("train/x.jpg"), "train_x.jpg.json");
        assert_eq!(output_name("/abs\\x.png"), "abs_x.png.json");
    }

    #[test]
    fn test_unknown_category() {
        let dir = TempDir::new().unwrap();
        let parser = CocoParser::new(local(&dir));

        let coco = dir.path().join("instances.json");
        std::fs::write(
            &coco,
            r#"{"images": [{"id": 1, "width": 1, "height": 1, "file_name": "a.jpg"}],
                "categories": [],
                "annotations": [{"id": 1, "image_id": 1, "category_id": 9, "bbox": [0, 0, 1, 1]}]}"#,
        )
        .unwrap();

        assert!(matches!(parser.parse(&coco), Err(Error::MissingLabel(_))));
    }

    #[test]
    fn test_image_size_from_file() {
        let dir = TempDir::new().unwrap();
        let parser = CocoParser::new(local(&dir));

        // 3x2 PNG header, enough for imagesize
        let png: [u8; 24] = [
            0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13, b'I', b'H', b'D', b'R',
            0, 0, 0, 3, 0, 0, 0, 2,
        ];
        std::fs::write(parser.local().images_dir().join("tiny.png"), png).unwrap();

        let image = CocoImage {
            id: 1,
            file_name: "tiny.png".to_string(),
            ..Default::default()
        };
        assert_eq!(parser.image_size(&image), (3, 2));

        let missing = CocoImage {
            id: 2,
            file_name: "missing.png".to_string(),
            ..Default::default()
        };
        assert_eq!(parser.image_size(&missing), (0, 0));
    }
}
