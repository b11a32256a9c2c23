use std::time::Duration;

use anyhow::Result;
use improv_scene::Config;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.service.http.port, 8787);
    assert_eq!(cfg.credential.url, "http://localhost:8000/api/token");
    assert_eq!(cfg.realtime.voice, "alloy");
    assert_eq!(cfg.audio.sample_rate, 24000);
    assert_eq!(cfg.audio.block_size, 4096);

    let session = cfg.session_config();
    assert_eq!(session.connect_timeout, Duration::from_secs(15));
    assert_eq!(session.session_update.turn_detection.prefix_padding_ms, 300);
    assert_eq!(session.session_update.turn_detection.silence_duration_ms, 500);
}

#[test]
fn test_missing_file_uses_defaults() -> Result<()> {
    let cfg = Config::load("/nonexistent/improv-scene")?;
    assert_eq!(cfg.realtime.model, Config::default().realtime.model);
    Ok(())
}

#[test]
fn test_load_from_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("scene.toml");
    std::fs::write(
        &path,
        r#"
[credential]
url = "https://improv.example.com/api/token"

[realtime]
voice = "verse"
vad_threshold = 0.7

[audio]
block_size = 2048
echo_cancellation = false

[session]
connect_timeout_secs = 5
"#,
    )?;

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.credential.url, "https://improv.example.com/api/token");
    // Unset keys keep their defaults
    assert_eq!(cfg.credential.timeout_secs, 10);

    let update = cfg.realtime.session_update();
    assert_eq!(update.voice, "verse");
    assert!((update.turn_detection.threshold - 0.7).abs() < 1e-6);

    let constraints = cfg.capture_constraints();
    assert_eq!(constraints.block_size, 2048);
    assert!(!constraints.echo_cancellation);
    assert!(constraints.noise_suppression);

    assert_eq!(cfg.session_config().connect_timeout, Duration::from_secs(5));
    Ok(())
}
