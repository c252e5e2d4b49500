use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use media_slideshow::catalog::PlaybackOrder;
use media_slideshow::config::{Configuration, DEFAULT_IMAGE_SINK, MAX_DELAY};
use tempfile::tempdir;

#[test]
fn defaults_match_the_cli_defaults() {
    let cfg = Configuration::default().validated().unwrap();
    assert_eq!(cfg.image_interval, Duration::from_secs(5));
    assert_eq!(cfg.cursor_hide_delay, Duration::from_secs(2));
    assert_eq!(cfg.focus_nudge, Duration::from_millis(100));
    assert_eq!(cfg.image_sink, DEFAULT_IMAGE_SINK);
    assert_eq!(cfg.listed_files, 20);
    assert!(!cfg.recursive);
    assert_eq!(cfg.playback_order(), PlaybackOrder::Sequential);
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
media-directory: "/media/photos"
image-interval: 8s
recursive: true
shuffle: true
shuffle-seed: 42
cursor-hide-delay: 1500ms
image-sink: nv3dsink
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.media_directory, Some(PathBuf::from("/media/photos")));
    assert_eq!(cfg.image_interval, Duration::from_secs(8));
    assert_eq!(cfg.cursor_hide_delay, Duration::from_millis(1500));
    assert_eq!(cfg.image_sink, "nv3dsink");
    assert!(cfg.scan_options().recursive);
    assert_eq!(
        cfg.playback_order(),
        PlaybackOrder::Shuffled { seed: Some(42) }
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
media-directory: "/m"
transition: fade
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn zero_interval_is_invalid() {
    let yaml = "image-interval: 0s\n";
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("image-interval"));
}

#[test]
fn blank_image_sink_is_invalid() {
    let yaml = "image-sink: '   '\n";
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn loads_from_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("slideshow.yaml");
    fs::write(&path, "media-directory: /srv/media\nimage-interval: 2m\n").unwrap();

    let cfg = Configuration::from_yaml_file(&path).unwrap().validated().unwrap();
    assert_eq!(cfg.media_directory, Some(PathBuf::from("/srv/media")));
    assert_eq!(cfg.image_interval, Duration::from_secs(120));
}

#[test]
fn missing_file_reports_the_path() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("absent.yaml");
    let err = Configuration::from_yaml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}

#[test]
fn oversized_delays_are_invalid() {
    let cfg = Configuration {
        image_interval: Duration::from_secs(u64::MAX),
        ..Configuration::default()
    };
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("image-interval"));

    let yaml = "focus-nudge: 30days\n";
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().unwrap_err().to_string().contains("focus-nudge"));

    let cfg = Configuration {
        image_interval: MAX_DELAY,
        ..Configuration::default()
    };
    assert!(cfg.validated().is_ok());
}
