//! Build script for the screenchat CLI
//!
//! Records where and when the binary was built so `screenchat version` can
//! report it alongside the package metadata generated by `built`.

use std::env;

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    println!("cargo:rerun-if-env-changed=SCREENCHAT_GIT_COMMIT");
    let commit = env::var("SCREENCHAT_GIT_COMMIT")
        .or_else(|_| env::var("GIT_COMMIT_HASH"))
        .unwrap_or_else(|_| "unknown".to_string());
    let commit = commit.trim();
    let short = commit.get(..12).unwrap_or(commit);
    println!("cargo:rustc-env=SCREENCHAT_GIT_COMMIT={}", short);

    println!(
        "cargo:rustc-env=SCREENCHAT_BUILD_HOST={}",
        env::var("HOST").unwrap_or_else(|_| "unknown".to_string())
    );
    println!(
        "cargo:rustc-env=SCREENCHAT_BUILD_TIME={}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
}
