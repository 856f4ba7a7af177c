use std::process::Command;

/// `git describe` output, empty outside of a checkout.
fn describe() -> String {
    Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn main() {
    let desc = describe();
    let (desc, dirty) = match desc.strip_suffix("-dirty") {
        Some(clean) => (clean.to_string(), true),
        None => (desc, false),
    };
    println!("cargo:rustc-env=GIT_DESC={desc}");
    println!("cargo:rustc-env=GIT_DIRTY={dirty}");
}
