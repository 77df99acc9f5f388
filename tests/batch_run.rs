use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use collage_press::{BatchConfig, SearchPhase, run_batch};

fn save_photo(path: &Path, w: u32, h: u32, color: [u8; 3]) {
    RgbImage::from_pixel(w, h, Rgb(color)).save(path).unwrap();
}

fn template() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 90, Rgb([240, 230, 210])))
}

#[test]
fn batch_writes_results_and_skips_finished_directories() {
    let root = tempfile::tempdir().unwrap();
    let fresh = root.path().join("fresh");
    let done = root.path().join("done");
    std::fs::create_dir(&fresh).unwrap();
    std::fs::create_dir(&done).unwrap();
    std::fs::create_dir(root.path().join("done_result")).unwrap();

    save_photo(&fresh.join("a.png"), 40, 30, [20, 90, 160]);
    save_photo(&fresh.join("b.jpg"), 30, 40, [160, 90, 20]);
    std::fs::write(fresh.join("c.webp"), b"garbage").unwrap();
    save_photo(&done.join("x.png"), 10, 10, [0, 0, 0]);

    let report = run_batch(root.path(), &template(), &BatchConfig::default()).unwrap();

    assert_eq!(report.directories, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed_items, 1);
    assert_eq!(report.failed_directories, 0);
    assert_eq!(report.written.len(), 2);

    // tiny canvases can't reach 200 KiB, so every write is an undershoot
    assert_eq!(report.fallback_count(), 2);
    assert!(
        report
            .written
            .iter()
            .all(|o| o.phase == SearchPhase::Undershoot)
    );

    for name in ["a.jpg", "b.jpg"] {
        let out = image::open(root.path().join("fresh_result").join(name)).unwrap();
        assert_eq!((out.width(), out.height()), (120, 90));
    }
    assert!(!root.path().join("done_result").join("x.jpg").exists());
}

#[test]
fn solid_colour_replaces_template() {
    let root = tempfile::tempdir().unwrap();
    let work = root.path().join("set");
    std::fs::create_dir(&work).unwrap();
    save_photo(&work.join("p.png"), 20, 20, [255, 255, 255]);

    let cfg = BatchConfig {
        background_color: Some("#00ff00".to_owned()),
        ..BatchConfig::default()
    };
    let report = run_batch(root.path(), &template(), &cfg).unwrap();
    assert!(report.is_clean());

    let out = image::open(root.path().join("set_result").join("p.jpg"))
        .unwrap()
        .to_rgb8();
    let corner = out.get_pixel(1, 1).0;
    assert!(corner[1] > 230 && corner[0] < 40 && corner[2] < 40, "{corner:?}");
}

#[test]
fn invalid_config_aborts_before_touching_disk() {
    let root = tempfile::tempdir().unwrap();
    let work = root.path().join("set");
    std::fs::create_dir(&work).unwrap();
    save_photo(&work.join("p.png"), 8, 8, [1, 2, 3]);

    let cfg = BatchConfig {
        photo_width_ratio: 2.0,
        ..BatchConfig::default()
    };
    assert!(run_batch(root.path(), &template(), &cfg).is_err());
    assert!(!root.path().join("set_result").exists());
}
