//! Shared test infrastructure for binary tests.
//!
//! Builds a throwaway installs root holding a fake runtime (its `python` just
//! runs `sh`) and a fake archive builder whose output extracts the payload to
//! a fresh directory and runs the startup script there.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const RUNTIME_VERSION: &str = "3.12.7";

const FAKE_PYTHON: &str = "#!/bin/sh\nexec /bin/sh \"$@\"\n";

const FAKE_MAKESELF: &str = r##"#!/bin/sh
set -e
payload="$2.payload"
rm -rf "$payload"
cp -R "$1" "$payload"
printf '%s\n' "$@" > "$2.args"
cat > "$2" <<EOF
#!/bin/sh
dest=\$(mktemp -d)
cp -R "$payload/." "\$dest"
cd "\$dest"
sh "$4"
EOF
chmod +x "$2"
"##;

/// Scratch space with a fake runtime and archive builder installed.
pub struct Harness {
    pub root: TempDir,
}

impl Harness {
    pub fn setup() -> Self {
        let root = TempDir::new().expect("create harness dir");
        let bin = root
            .path()
            .join("installs")
            .join(RUNTIME_VERSION)
            .join("python")
            .join("bin");
        fs::create_dir_all(&bin).expect("create runtime bin");
        write_executable(&bin.join("python3"), FAKE_PYTHON);
        std::os::unix::fs::symlink("python3", bin.join("python")).expect("link python");
        write_executable(&root.path().join("makeself.sh"), FAKE_MAKESELF);
        fs::create_dir_all(root.path().join("out")).expect("create out dir");
        Self { root }
    }

    pub fn installs_root(&self) -> PathBuf {
        self.root.path().join("installs")
    }

    pub fn makeself(&self) -> PathBuf {
        self.root.path().join("makeself.sh")
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.root.path().join("out").join(name)
    }

    /// Create a source tree under the harness from `(relative path, content)` pairs.
    pub fn source_tree(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.root.path().join("sources").join(name);
        fs::create_dir_all(&dir).expect("create source dir");
        for (rel, content) in files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, content).expect("write source file");
        }
        dir
    }

    /// Run the `packaged` binary with the harness collaborators configured.
    pub fn packaged(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_packaged"))
            .args(args)
            .env("PACKAGED_PYTHON_INSTALLS", self.installs_root())
            .env("PACKAGED_MAKESELF", self.makeself())
            .env_remove("PACKAGED_FETCH_COMMAND")
            .output()
            .expect("run packaged")
    }
}

/// Run a produced archive the way a non-interactive user would.
pub fn run_archive(path: &Path) -> String {
    let output = Command::new(path)
        .arg("--nox11")
        .output()
        .expect("run archive");
    assert!(
        output.status.success(),
        "archive failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn assert_no_packaging_artifacts(source: &Path) {
    assert!(
        !source.join(".packaged_python").exists(),
        "staging dir left in {}",
        source.display()
    );
    assert!(
        !source.join("_packaged_startup.sh").exists(),
        "startup script left in {}",
        source.display()
    );
}

fn write_executable(path: &Path, content: &str) {
    fs::write(path, content).expect("write executable");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
}
