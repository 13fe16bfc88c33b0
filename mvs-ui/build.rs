//! Stamps the mvs-ui binary with its build identity
//!
//! `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` end up in the startup
//! log line. Source tarballs without a git checkout can set
//! `MVS_BUILD_REVISION`; `SOURCE_DATE_EPOCH` pins the timestamp for
//! reproducible builds.

use chrono::{DateTime, SecondsFormat, Utc};
use std::env;
use std::process::Command;

const REVISION_ENV: &str = "MVS_BUILD_REVISION";
const EPOCH_ENV: &str = "SOURCE_DATE_EPOCH";

fn main() {
    println!("cargo:rerun-if-env-changed={}", REVISION_ENV);
    println!("cargo:rerun-if-env-changed={}", EPOCH_ENV);
    if let Some(head) = git(&["rev-parse", "--git-path", "HEAD"]) {
        println!("cargo:rerun-if-changed={}", head);
    }

    println!("cargo:rustc-env=GIT_HASH={}", revision());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", timestamp());
    println!(
        "cargo:rustc-env=BUILD_PROFILE={}",
        env::var("PROFILE").unwrap_or_else(|_| "unknown".into())
    );
}

/// Trimmed stdout of a successful git command
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Abbreviated commit, `+` suffixed when the tree has local changes
fn revision() -> String {
    env::var(REVISION_ENV)
        .ok()
        .filter(|rev| !rev.trim().is_empty())
        .or_else(|| git(&["describe", "--always", "--abbrev=8", "--dirty=+"]))
        .unwrap_or_else(|| "unknown".into())
}

/// UTC build time, RFC 3339 to the second
fn timestamp() -> String {
    let pinned = env::var(EPOCH_ENV)
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    pinned
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}
