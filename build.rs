// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=FRAME_ANNOTATOR_VERSION");

    // Packagers can pin the version string explicitly
    let version = if let Ok(v) = std::env::var("FRAME_ANNOTATOR_VERSION") {
        v
    } else {
        get_git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    // "v0.1.0" at a tag, "v0.1.0-5-gabcdef1" after it
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    let version = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => {
            // Outside a git checkout fall back to the crate version
            return std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".into());
        }
    };

    let version = version.strip_prefix('v').unwrap_or(&version);

    // "0.1.0-5-gabcdef1" becomes "0.1.0-dirty-abcdef1"
    if version.contains('-') {
        let parts: Vec<&str> = version.rsplitn(3, '-').collect();
        if parts.len() >= 3 {
            let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
            format!("{}-dirty-{}", parts[2], hash)
        } else {
            version.to_string()
        }
    } else {
        version.to_string()
    }
}
