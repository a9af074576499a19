// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Packaged builds may pin the version explicitly
    let version = if let Ok(v) = std::env::var("MULTIVIEW_DEPTH_VERSION") {
        v
    } else {
        describe_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn describe_version() -> String {
    let crate_version = env!("CARGO_PKG_VERSION");

    // "v0.1.0" at a tag, "v0.1.0-5-gabcdef1" past it
    let described = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string());

    match described {
        Some(tag) if tag.starts_with('v') => {
            let tag = tag.trim_start_matches('v');
            let parts: Vec<&str> = tag.rsplitn(3, '-').collect();
            if parts.len() >= 3 {
                let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
                format!("{}-dirty-{}", parts[2], hash)
            } else {
                tag.to_string()
            }
        }
        Some(hash) => format!("{}-{}", crate_version, hash),
        None => crate_version.to_string(),
    }
}
