//! Shared test utilities for the sitepress test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_project();
//! let ctx = load_context(tmp.path(), Mode::Test, false);
//! build_site(&ctx, &ScriptEvaluator, &MockOptimizer::new(&[]), None).unwrap();
//! assert!(read_output(tmp.path(), "test/index.html").contains("Welcome"));
//! ```

use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::CONFIG_FILENAME;
use crate::context::{BuildContext, Mode};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/project/` to a temp directory and return it.
///
/// Every copied file is backdated by an hour so outputs written by a build
/// are strictly newer than their sources, whatever the filesystem's
/// timestamp resolution.
pub fn setup_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();

    let past = SystemTime::now() - Duration::from_secs(3600);
    for entry in WalkDir::new(tmp.path()) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            set_mtime(entry.path(), past);
        }
    }
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Helpers
// =========================================================================

/// Load the build context for a fixture project with its own `config.json`.
pub fn load_context(root: &Path, mode: Mode, force: bool) -> BuildContext {
    BuildContext::load(root, Path::new(CONFIG_FILENAME), mode, force).unwrap()
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

/// Read a built file, relative to the project root.
pub fn read_output(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel))
        .unwrap_or_else(|e| panic!("reading {rel}: {e}"))
}
