use std::process::Command;

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    // Version suffix: short commit, "-dirty" with local changes, "unknown" outside a checkout
    let hash = git_output(&["rev-parse", "--short", "HEAD"]).filter(|h| !h.is_empty());
    let dirty = git_output(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|s| !s.is_empty());

    let version = match hash {
        Some(h) if dirty => format!("{h}-dirty"),
        Some(h) => h,
        None => "unknown".to_string(),
    };

    println!("cargo:rustc-env=GIT_HASH={version}");
    for watched in ["../../.git/HEAD", "../../.git/index", "../../.git/refs/heads/"] {
        println!("cargo:rerun-if-changed={watched}");
    }
}
