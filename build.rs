use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let git = git_short_hash().unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=REPLAYBUS_GIT_COMMIT={git}");

    let build_time = chrono::Utc::now().to_rfc3339();
    println!("cargo:rustc-env=REPLAYBUS_BUILD_TIME={build_time}");
    println!("cargo:rerun-if-changed=build.rs");
}
