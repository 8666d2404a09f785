use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer().with_target(true))
            .with(filter)
            .init();
    });
}

/// Lay out a toolchain root with an `info.json` and its include directory.
#[allow(dead_code)]
pub fn write_release(
    versions_root: &Path,
    dir_name: &str,
    major: u32,
    minor: u32,
    patch: u32,
) -> PathBuf {
    let root = versions_root.join(dir_name);
    fs::create_dir_all(root.join("include/c++/v1")).unwrap();
    fs::create_dir_all(root.join("lib")).unwrap();
    let info = serde_json::json!({
        "name": format!("{major}.{minor}.{patch}"),
        "path": "",
        "identifier": {"kind": "version", "major": major, "minor": minor, "patchlevel": patch},
        "is_installed": false,
        "install_flags": null,
        "include_paths": ["include/c++/v1"],
        "library_paths": ["lib"],
        "libraries": ["lib/libc++.so.1", "lib/libc++abi.so.1"],
    });
    fs::write(root.join("info.json"), serde_json::to_string_pretty(&info).unwrap()).unwrap();
    root
}
