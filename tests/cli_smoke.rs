use std::path::PathBuf;

use image::{Rgb, RgbImage};

fn exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_collage-press"))
}

#[test]
fn cli_encode_writes_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.png");
    let out_path = dir.path().join("out.png");
    RgbImage::from_fn(48, 32, |x, y| Rgb([(x * 5) as u8, (y * 7) as u8, 128]))
        .save(&in_path)
        .unwrap();

    let output = std::process::Command::new(exe())
        .args(["encode", "--in"])
        .arg(&in_path)
        .arg("--out")
        .arg(&out_path)
        .args(["--min-kib", "1", "--max-kib", "64", "--target-kib", "8"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    assert!(dir.path().join("out.jpg").is_file());
    assert!(!out_path.exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("out.jpg"), "{stdout}");
}

#[test]
fn cli_batch_on_missing_root_fails() {
    let dir = tempfile::tempdir().unwrap();
    let bg = dir.path().join("bg.png");
    RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]))
        .save(&bg)
        .unwrap();

    let status = std::process::Command::new(exe())
        .args(["batch", "--root"])
        .arg(dir.path().join("nope"))
        .arg("--background")
        .arg(&bg)
        .status()
        .unwrap();

    assert!(!status.success());
}

#[test]
fn cli_rejects_inverted_window() {
    let dir = tempfile::tempdir().unwrap();
    let in_path = dir.path().join("in.png");
    RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]))
        .save(&in_path)
        .unwrap();

    let status = std::process::Command::new(exe())
        .args(["encode", "--in"])
        .arg(&in_path)
        .arg("--out")
        .arg(dir.path().join("o.jpg"))
        .args(["--min-kib", "300", "--max-kib", "200"])
        .status()
        .unwrap();

    assert!(!status.success());
    assert!(!dir.path().join("o.jpg").exists());
}

#[test]
fn cli_batch_with_avatar_layout_and_overlay() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("jobs");
    let work = root.join("couple");
    std::fs::create_dir_all(&work).unwrap();
    RgbImage::from_pixel(40, 30, Rgb([180, 40, 40]))
        .save(work.join("p.png"))
        .unwrap();

    let bg = dir.path().join("bg.png");
    RgbImage::from_pixel(64, 64, Rgb([250, 250, 250]))
        .save(&bg)
        .unwrap();
    let frame = dir.path().join("frame.png");
    image::RgbaImage::from_fn(8, 8, |_, y| {
        if y == 0 {
            image::Rgba([0, 0, 255, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    })
    .save(&frame)
    .unwrap();

    let output = std::process::Command::new(exe())
        .args(["batch", "--avatar", "--root"])
        .arg(&root)
        .arg("--background")
        .arg(&bg)
        .arg("--overlay")
        .arg(&frame)
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let out = image::open(root.join("couple_result").join("p.jpg")).unwrap();
    assert_eq!((out.width(), out.height()), (64, 64));
}
