use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_karmaboard")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "karmaboard.exe"
            } else {
                "karmaboard"
            });
            p
        })
}

#[test]
fn cli_rejects_unparseable_range() {
    let out = std::process::Command::new(exe())
        .args(["pics", "last tuesday"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("RFC 3339"), "{stderr}");
}

#[test]
fn cli_reports_resume_index_when_source_is_down() {
    let dir = PathBuf::from("target").join("cli_smoke_outage");
    std::fs::create_dir_all(&dir).unwrap();

    let allow_path = dir.join("trusted_providers.txt");
    std::fs::write(&allow_path, "https://i.redd.it/\n").unwrap();

    let cfg_path = dir.join("run.json");
    let cfg = serde_json::json!({
        "output_dir": dir.join("out"),
        "log_dir": dir.join("logs"),
        "retry_backoff_secs": 0,
        "start_index": 17,
        "source": { "base_url": "http://127.0.0.1:9", "timeout_secs": 2 }
    });
    std::fs::write(&cfg_path, serde_json::to_vec_pretty(&cfg).unwrap()).unwrap();

    let out = std::process::Command::new(exe())
        .args(["pics,aww", "1500000000", "1500003600", "--config"])
        .arg(&cfg_path)
        .arg("--allow-list")
        .arg(&allow_path)
        .output()
        .unwrap();

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--start-index 17"), "{stderr}");
    assert!(dir.join("out").is_dir());
}
