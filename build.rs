// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=FIELD_CAPTURE_VERSION");

    // Packagers may pin the version string
    let version = std::env::var("FIELD_CAPTURE_VERSION").unwrap_or_else(|_| version_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Package version, suffixed with the short commit hash when building from git
fn version_string() -> String {
    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    match short_commit() {
        Some(hash) => format!("{}-{}", package, hash),
        None => package,
    }
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
