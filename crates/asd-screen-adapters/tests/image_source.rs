//! Integration tests for loading uploads from disk.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use asd_screen_adapters::FsImageSource;
use asd_screen_core::ImageSource;
use image::{Rgb, RgbImage};

fn write_image(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([200, 150, 120]))
        .save(path)
        .expect("fixture saves");
}

#[test]
fn test_loads_each_raster_format() {
    let dir = tempfile::tempdir().unwrap();
    for ext in ["jpg", "png", "bmp", "tiff", "webp"] {
        write_image(&dir.path().join(format!("face.{ext}")), 12, 8);
    }

    let source = FsImageSource::new(vec![dir.path().to_path_buf()], false);
    let images: Vec<_> = source.images().collect();
    assert_eq!(images.len(), 5);
    for result in images {
        let info = result.expect("fixture loads");
        assert_eq!((info.width, info.height), (12, 8));
    }
}

#[test]
fn test_directory_order_is_sorted() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["c.png", "a.png", "b.png"] {
        write_image(&dir.path().join(name), 4, 4);
    }

    let source = FsImageSource::new(vec![dir.path().to_path_buf()], false);
    let names: Vec<String> = source
        .files()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["a.png", "b.png", "c.png"]);
}

#[test]
fn test_recursive_flag() {
    let dir = tempfile::tempdir().unwrap();
    write_image(&dir.path().join("top.png"), 4, 4);
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    write_image(&dir.path().join("nested").join("inner.png"), 4, 4);

    let flat = FsImageSource::new(vec![dir.path().to_path_buf()], false);
    let deep = FsImageSource::new(vec![dir.path().to_path_buf()], true);
    assert_eq!(flat.count_hint(), Some(1));
    assert_eq!(deep.count_hint(), Some(2));
}

#[test]
fn test_corrupt_file_is_an_item_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.jpg"), b"not a jpeg").unwrap();
    write_image(&dir.path().join("ok.png"), 4, 4);

    let source = FsImageSource::new(vec![dir.path().to_path_buf()], false);
    let results: Vec<_> = source.images().collect();
    assert_eq!(results.len(), 2);
    let err = results[0].as_ref().unwrap_err();
    assert!(format!("{err:#}").contains("broken.jpg"));
    assert!(results[1].is_ok());
}

#[test]
fn test_unsupported_and_missing_paths_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"hello").unwrap();

    let source = FsImageSource::new(vec![notes, dir.path().join("missing.png")], false);
    assert_eq!(source.count_hint(), Some(0));
}
