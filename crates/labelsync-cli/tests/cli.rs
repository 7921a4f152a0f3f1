// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn labelsync() -> Command {
    let mut cmd = Command::cargo_bin("labelsync").unwrap();
    cmd.env_remove("LABELSYNC_API_KEY")
        .env_remove("LABELSYNC_SERVER");
    cmd
}

#[test]
fn test_help() -> Result<(), Box<dyn std::error::Error>> {
    labelsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload-sample"))
        .stdout(predicate::str::contains("upload-files"))
        .stdout(predicate::str::contains("convert"));
    Ok(())
}

#[test]
fn test_version() -> Result<(), Box<dyn std::error::Error>> {
    labelsync()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn test_upload_rejects_unknown_split() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    labelsync()
        .args(["upload", "--dataset", "cats", "--split", "/holdout", "--images"])
        .arg(dir.path().join("images"))
        .arg("--annotations")
        .arg(dir.path().join("annotations"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("/holdout"));

    // Rejected before any directory is created
    assert!(!dir.path().join("images").exists());
    Ok(())
}

#[test]
fn test_upload_files_requires_annotation() -> Result<(), Box<dyn std::error::Error>> {
    labelsync()
        .args(["upload-files", "--dataset", "cats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--annotation"));
    Ok(())
}

#[test]
fn test_convert_coco() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let input = dir.path().join("instances.json");
    std::fs::write(
        &input,
        serde_json::json!({
            "images": [{"id": 1, "width": 64, "height": 48, "file_name": "dog.jpg"}],
            "categories": [{"id": 2, "name": "dog"}],
            "annotations": [{
                "id": 5, "image_id": 1, "category_id": 2,
                "bbox": [1, 2, 3, 4],
                "segmentation": [[0, 0, 8, 0, 8, 8]]
            }]
        })
        .to_string(),
    )?;
    let annotations = dir.path().join("annotations");

    labelsync()
        .args(["convert", "coco"])
        .arg(&input)
        .arg("--images")
        .arg(dir.path().join("images"))
        .arg("--annotations")
        .arg(&annotations)
        .args(["--dataset", "dogs", "--split", "/test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 annotation files"));

    let output: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(annotations.join("dog.jpg.json"))?)?;
    assert_eq!(output["image"]["original_filename"], "dog.jpg");
    assert_eq!(output["image"]["path"], "/test");
    assert_eq!(output["annotations"][0]["name"], "dog");
    assert_eq!(output["annotations"][0]["bounding_box"]["w"], 3.0);
    assert_eq!(output["annotations"][1]["polygon"]["path"][2]["y"], 8.0);
    Ok(())
}

#[test]
fn test_convert_coco_missing_input() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    labelsync()
        .args(["convert", "coco"])
        .arg(dir.path().join("absent.json"))
        .arg("--images")
        .arg(dir.path().join("images"))
        .arg("--annotations")
        .arg(dir.path().join("annotations"))
        .args(["--dataset", "dogs"])
        .assert()
        .failure();
    Ok(())
}
