use std::path::PathBuf;
use std::time::Duration;

use rgb_mosaic::config::{Configuration, GlyphTint, SourceKind};

#[test]
fn empty_document_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.source.kind, SourceKind::TestPattern);
    assert_eq!(cfg.source.resolution(), (320, 180));
    assert_eq!(cfg.display.surface_size(), (1920, 1080));
    assert!((cfg.viewport.cell_size - 24.0).abs() < f32::EPSILON);
    assert_eq!(cfg.render.glyph_tint, GlyphTint::PureChannel);
    assert_eq!(cfg.pipeline.idle_retry, Duration::from_millis(16));
    assert_eq!(cfg.pipeline.frame_rate_interval, Duration::from_secs(1));
    assert_eq!(cfg.pipeline.max_frames, None);
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
source:
  kind: still-image
  width: 64
  path: "/frames/still.png"
filter:
  contrast: 1.5
  brightness: 0.75
viewport:
  cell-size: 36
  min-cell-size: 24
  max-cell-size: 72
  minimap-width: 200
display:
  width: 640
  height: 360
  surface-scale: 1.5
render:
  glyph-tint: channel-intensity
  background: [10, 10, 10, 255]
pipeline:
  idle-retry: 40ms
  frame-rate-interval: 2s
  max-frames: 100
snapshot:
  path: "/tmp/mosaic.png"
  every: 5
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.source.kind, SourceKind::StillImage);
    assert_eq!(cfg.source.path, Some(PathBuf::from("/frames/still.png")));
    assert_eq!(cfg.source.resolution(), (64, 36));
    assert!((cfg.filter.contrast - 1.5).abs() < f32::EPSILON);
    assert!((cfg.viewport.minimap_width - 200.0).abs() < f32::EPSILON);
    assert_eq!(cfg.display.surface_size(), (960, 540));
    assert_eq!(cfg.render.glyph_tint, GlyphTint::ChannelIntensity);
    assert_eq!(cfg.render.background, [10, 10, 10, 255]);
    assert_eq!(cfg.pipeline.idle_retry, Duration::from_millis(40));
    assert_eq!(cfg.pipeline.max_frames, Some(100));
    assert_eq!(cfg.snapshot.every, 5);
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "source:\n  noise: 12\n  seed: 9\n").unwrap();

    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.source.noise, 12);
    assert_eq!(cfg.source.seed, Some(9));
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = "viewport:\n  zoom: 2\n";
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn missing_file_reports_path() {
    let err = Configuration::from_yaml_file("/nonexistent/rgb-mosaic.yaml").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/rgb-mosaic.yaml"));
}

#[test]
fn validation_rejects_out_of_range_values() {
    let cases = [
        "filter:\n  contrast: 2.5\n",
        "filter:\n  brightness: -0.1\n",
        "viewport:\n  cell-size: 12\n",
        "viewport:\n  min-cell-size: 0\n  cell-size: 24\n",
        "viewport:\n  minimap-width: 0\n",
        "display:\n  width: 0\n",
        "display:\n  surface-scale: 0\n",
        "pipeline:\n  idle-retry: 0s\n",
        "snapshot:\n  every: 0\n",
        "source:\n  kind: still-image\n",
        "source:\n  width: 0\n",
    ];
    for yaml in cases {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted invalid config: {yaml}");
    }
}
