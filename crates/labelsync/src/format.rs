// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Normalized annotation file format.
//!
//! Every format parser converts its source records into this representation,
//! one JSON file per image, and the importer reads these files back when
//! posting annotations to the remote service.
//!
//! ```json
//! {
//!   "image": {
//!     "width": 640,
//!     "height": 480,
//!     "original_filename": "cat.jpg",
//!     "filename": "cat.jpg"
//!   },
//!   "annotations": [
//!     { "name": "cat", "bounding_box": { "x": 10, "y": 20, "w": 100, "h": 80 } },
//!     { "name": "cat", "polygon": { "path": [{ "x": 0, "y": 0 }, { "x": 5, "y": 0 }, { "x": 5, "y": 5 }] } },
//!     { "name": "nose", "keypoint": { "x": 42, "y": 17 } },
//!     { "name": "blurry", "tag": {} }
//!   ]
//! }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use labelsync::format::parse_file;
//! use std::path::Path;
//!
//! let file = parse_file(Path::new("annotations/cat.json"))?;
//! println!("{} has {} annotations", file.image.original_filename, file.annotations.len());
//! # Ok::<(), labelsync::Error>(())
//! ```

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Signature of a format parser handed to the importer.
pub type ParseFn = fn(&Path) -> Result<ImageAnnotationFile, Error>;

/// One image together with all of its annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotationFile {
    pub image: ImageInfo,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// Image metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    /// Filename of the image as found on disk, relative to the images directory.
    pub original_filename: String,
    /// Filename of the image in the remote dataset, when it differs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Remote folder the image lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ImageInfo {
    pub fn new(original_filename: &str, width: u32, height: u32) -> Self {
        ImageInfo {
            width,
            height,
            original_filename: original_filename.to_owned(),
            filename: None,
            path: None,
        }
    }

    /// Filename used to match this image against remote dataset items.
    pub fn remote_filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.original_filename)
    }
}

/// A single annotation: the class name plus one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    #[serde(flatten)]
    pub shape: Shape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Annotation geometry, serialized as a single key naming the shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    BoundingBox(BoundingBox),
    Polygon { path: Vec<Point> },
    Keypoint(Point),
    Tag {},
}

impl Shape {
    /// Annotation type name used by the remote service.
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::BoundingBox(_) => "bounding_box",
            Shape::Polygon { .. } => "polygon",
            Shape::Keypoint(_) => "keypoint",
            Shape::Tag {} => "tag",
        }
    }
}

impl Annotation {
    pub fn bounding_box(name: &str, x: f64, y: f64, w: f64, h: f64) -> Self {
        Annotation {
            name: name.to_owned(),
            shape: Shape::BoundingBox(BoundingBox { x, y, w, h }),
        }
    }

    pub fn polygon(name: &str, path: Vec<Point>) -> Self {
        Annotation {
            name: name.to_owned(),
            shape: Shape::Polygon { path },
        }
    }

    pub fn tag(name: &str) -> Self {
        Annotation {
            name: name.to_owned(),
            shape: Shape::Tag {},
        }
    }

    /// Checks the invariants the remote service enforces on import.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidAnnotation(
                "annotation name is empty".to_string(),
            ));
        }

        match &self.shape {
            Shape::BoundingBox(b) if b.w < 0.0 || b.h < 0.0 => Err(Error::InvalidAnnotation(
                format!("'{}' has a negative box size {}x{}", self.name, b.w, b.h),
            )),
            Shape::Polygon { path } if path.len() < 3 => Err(Error::InvalidAnnotation(format!(
                "'{}' polygon has {} points, at least 3 required",
                self.name,
                path.len()
            ))),
            _ => Ok(()),
        }
    }

    /// JSON payload of the shape, as posted to the import endpoint.
    pub(crate) fn data(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::to_value(&self.shape)?)
    }
}

/// Keys that name an annotation shape.
const SHAPE_KEYS: [&str; 4] = ["bounding_box", "polygon", "keypoint", "tag"];

/// Reads and validates a normalized annotation file.
///
/// The file handle is released before this function returns, whether or not
/// parsing succeeded. Annotations must carry exactly one shape key.
pub fn parse_file(path: &Path) -> Result<ImageAnnotationFile, Error> {
    let json_error = |source| Error::JsonParse {
        path: path.to_path_buf(),
        source,
    };

    let value: serde_json::Value = {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(json_error)?
    };
    check_shape_keys(&value)
        .map_err(|msg| Error::InvalidAnnotation(format!("{}: {}", path.display(), msg)))?;
    let file: ImageAnnotationFile = serde_json::from_value(value).map_err(json_error)?;

    if file.image.original_filename.is_empty() {
        return Err(Error::InvalidAnnotation(format!(
            "{}: image.original_filename is empty",
            path.display()
        )));
    }

    for annotation in &file.annotations {
        annotation.validate().map_err(|e| match e {
            Error::InvalidAnnotation(msg) => {
                Error::InvalidAnnotation(format!("{}: {}", path.display(), msg))
            }
            e => e,
        })?;
    }

    Ok(file)
}

/// Rejects annotation records holding more than one shape, which would
/// otherwise deserialize as whichever shape comes first.
fn check_shape_keys(value: &serde_json::Value) -> Result<(), String> {
    let Some(annotations) = value.get("annotations").and_then(|a| a.as_array()) else {
        return Ok(());
    };

    for (index, annotation) in annotations.iter().enumerate() {
        let Some(record) = annotation.as_object() else {
            continue;
        };
        let shapes = SHAPE_KEYS
            .iter()
            .filter(|key| record.contains_key(**key))
            .collect::<Vec<_>>();
        if shapes.len() > 1 {
            let name = record.get("name").and_then(|n| n.as_str()).unwrap_or("");
            return Err(format!(
                "annotation {} '{}' has several shapes {:?}, expected exactly one",
                index, name, shapes
            ));
        }
    }

    Ok(())
}

/// Writes a normalized annotation file, replacing any existing file.
pub fn write_file(path: &Path, file: &ImageAnnotationFile) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, file)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ImageAnnotationFile {
        ImageAnnotationFile {
            image: ImageInfo::new("cat.jpg", 640, 480),
            annotations: vec![
                Annotation::bounding_box("cat", 10.0, 20.0, 100.0, 80.0),
                Annotation::polygon(
                    "cat",
                    vec![
                        Point { x: 0.0, y: 0.0 },
                        Point { x: 5.0, y: 0.0 },
                        Point { x: 5.0, y: 5.0 },
                    ],
                ),
                Annotation::tag("blurry"),
            ],
        }
    }

    #[test]
    fn test_shape_serialization() {
        let value = serde_json::to_value(Annotation::bounding_box("cat", 1.0, 2.0, 3.0, 4.0))
            .unwrap();
        assert_eq!(value["name"], "cat");
        assert_eq!(value["bounding_box"]["w"], 3.0);

        let value = serde_json::to_value(Annotation::tag("blurry")).unwrap();
        assert_eq!(value, serde_json::json!({"name": "blurry", "tag": {}}));
    }

    #[test]
    fn test_parse_minimal_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cat.json");
        std::fs::write(
            &path,
            r#"{"image": {"original_filename": "cat.jpg"},
                "annotations": [{"name": "cat", "keypoint": {"x": 1, "y": 2}}]}"#,
        )
        .unwrap();

        let file = parse_file(&path).unwrap();
        assert_eq!(file.image.original_filename, "cat.jpg");
        assert_eq!(file.image.remote_filename(), "cat.jpg");
        assert_eq!(file.annotations[0].shape.kind(), "keypoint");
    }

    #[test]
    fn test_write_then_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cat.json");
        write_file(&path, &sample()).unwrap();
        assert_eq!(parse_file(&path).unwrap(), sample());
    }

    #[test]
    fn test_parse_rejects_invalid() {
        let dir = TempDir::new().unwrap();

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"image\": ").unwrap();
        assert!(matches!(parse_file(&path), Err(Error::JsonParse { .. })));

        let path = dir.path().join("polygon.json");
        std::fs::write(
            &path,
            r#"{"image": {"original_filename": "a.jpg"},
                "annotations": [{"name": "a", "polygon": {"path": [{"x": 0, "y": 0}]}}]}"#,
        )
        .unwrap();
        assert!(matches!(parse_file(&path), Err(Error::InvalidAnnotation(_))));

        let path = dir.path().join("two_shapes.json");
        std::fs::write(
            &path,
            r#"{"image": {"original_filename": "a.jpg"},
                "annotations": [{
                    "bounding_box": {"x": 0, "y": 0, "w": 5, "h": 5},
                    "name": "cat",
                    "polygon": {"path": [{"x": 0, "y": 0}, {"x": 5, "y": 0}, {"x": 5, "y": 5}]}
                }]}"#,
        )
        .unwrap();
        match parse_file(&path) {
            Err(Error::InvalidAnnotation(msg)) => {
                assert!(msg.contains("two_shapes.json"));
                assert!(msg.contains("polygon"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let path = dir.path().join("unnamed.json");
        std::fs::write(
            &path,
            r#"{"image": {"original_filename": ""}, "annotations": []}"#,
        )
        .unwrap();
        assert!(matches!(parse_file(&path), Err(Error::InvalidAnnotation(_))));
    }
}
