#![allow(dead_code)]

use lcxx_bench::{BenchContext, DatapointStore};
use lcxx_common::VersionRegistry;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;
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

/// Stands in for both clang++ and clang-query.
///
/// Every call is appended to `calls`. The nth call reports a total of n ms,
/// a user time of n/2 ms and n*100 KB peak memory. If `fail_on` exists, any
/// call whose arguments contain its text exits 1.
const FAKE_TOOL: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$*" >> "$dir/calls"
n=$(wc -l < "$dir/calls" | tr -d ' ')
if [ -f "$dir/fail_on" ] && echo "$*" | grep -qF -e "$(cat "$dir/fail_on")"; then
  echo "error: simulated failure" >&2
  exit 1
fi
prev=""
out=""
report=""
query=""
preprocess=""
for arg in "$@"; do
  case "$arg" in
    -fproc-stat-report=*) report="${arg#-fproc-stat-report=}" ;;
    -E) preprocess=1 ;;
  esac
  [ "$prev" = "-o" ] && out="$arg"
  [ "$prev" = "-f" ] && query=1
  prev="$arg"
done
if [ -n "$query" ]; then
  printf 'Match #1:\n\n3 matches.\n'
  exit 0
fi
if [ -n "$preprocess" ]; then
  printf '# 1 "input.cpp"\nnamespace std {\n  int v;\n}\n\n# 2 "input.cpp" 2\nint main() {\n}\n'
  exit 0
fi
if [ -n "$report" ]; then
  echo "clang,\"/dev/null\",$((n * 1000)),$((n * 500)),$((n * 100))" > "$report"
fi
if [ -n "$out" ] && [ "$out" != "/dev/null" ]; then
  head -c 1234 /dev/zero > "$out"
fi
exit 0
"#;

/// What the fake tool prints for `-E`.
pub const PREPROCESSED: &str =
    "# 1 \"input.cpp\"\nnamespace std {\n  int v;\n}\n\n# 2 \"input.cpp\" 2\nint main() {\n}\n";

/// A scratch world: two probed libc++ installs, a fake toolchain, a store.
pub struct Bench {
    pub tmp: TempDir,
    pub ctx: Arc<BenchContext>,
    pub store: DatapointStore,
}

impl Bench {
    pub fn new(runs_per_repeat: u32, repeat_count: u32) -> Self {
        init_test_logging();
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let versions = root.join("versions");
        for dir in ["v15.0.0", "v16.0.0"] {
            fs::create_dir_all(versions.join(dir).join("include/c++/v1")).unwrap();
        }

        let inputs = root.join("inputs");
        fs::create_dir_all(inputs.join("include")).unwrap();
        fs::create_dir_all(inputs.join("instantiation")).unwrap();

        let tool = write_fake_tool(&root.join("bin"));

        let ctx = Arc::new(BenchContext {
            registry: Arc::new(VersionRegistry::new(&versions)),
            cxx: tool.display().to_string(),
            clang_query: tool.display().to_string(),
            inputs_root: inputs,
            scratch_root: root.join("scratch"),
            runs_per_repeat,
            repeat_count,
        });
        let store = DatapointStore::open(root.join("db/bench.db")).unwrap();
        Self { tmp, ctx, store }
    }

    fn bin_dir(&self) -> PathBuf {
        self.tmp.path().join("bin")
    }

    /// Number of times the fake tool has been invoked.
    pub fn calls(&self) -> usize {
        fs::read_to_string(self.bin_dir().join("calls"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Make every invocation containing `needle` fail.
    pub fn fail_on(&self, needle: &str) {
        fs::write(self.bin_dir().join("fail_on"), needle).unwrap();
    }
}

fn write_fake_tool(dir: &Path) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join("fake-clang");
    fs::write(&path, FAKE_TOOL).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
