//! Stamps the binary with the source revision and build time.
//!
//! Sets `CLAB_GIT_REV`, `CLAB_BUILT_AT` and `CLAB_PROFILE` for `env!`.

use std::env;
use std::process::Command;

/// Short revision, with `-dirty` when the work tree has local edits.
/// Outside a git checkout (e.g. a packaged source tarball) this is `"untracked"`.
fn source_revision() -> String {
    let git = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_owned())
    };

    match git(&["rev-parse", "--short=10", "HEAD"]) {
        Some(rev) if !rev.is_empty() => {
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .map_or(false, |changes| !changes.is_empty());
            if dirty {
                format!("{rev}-dirty")
            } else {
                rev
            }
        }
        _ => "untracked".to_owned(),
    }
}

fn main() {
    let stamps = [
        ("CLAB_GIT_REV", source_revision()),
        ("CLAB_BUILT_AT", chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string()),
        ("CLAB_PROFILE", env::var("PROFILE").unwrap_or_else(|_| "custom".to_owned())),
    ];
    for (key, value) in stamps {
        println!("cargo:rustc-env={key}={value}");
    }
}
