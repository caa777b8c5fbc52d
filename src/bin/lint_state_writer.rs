//! Greps the source tree for the literal `UPDATE tasks SET status` and
//! fails if it appears anywhere outside `src/store/state_writer.rs`.
//! Run as `cargo run --bin lint_state_writer` (or wire into CI); models the
//! single-writer discipline as a build-time check without a real
//! static-analysis dependency.

use std::path::Path;

const NEEDLE: &str = "UPDATE tasks SET status";
const ALLOWED_FILE: &str = "src/store/state_writer.rs";

fn walk(dir: &Path, violations: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk(&path, violations)?;
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        let rel = path.strip_prefix(".").unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if rel == ALLOWED_FILE {
            continue;
        }
        let contents = std::fs::read_to_string(&path)?;
        if contents.contains(NEEDLE) {
            violations.push(rel);
        }
    }
    Ok(())
}

fn main() {
    let mut violations = Vec::new();
    if let Err(e) = walk(Path::new("src"), &mut violations) {
        eprintln!("lint_state_writer: failed to walk src/: {e}");
        std::process::exit(1);
    }

    if violations.is_empty() {
        println!("lint_state_writer: ok, single-writer discipline holds");
    } else {
        eprintln!("lint_state_writer: found task status mutation outside {ALLOWED_FILE}:");
        for v in &violations {
            eprintln!("  {v}");
        }
        std::process::exit(1);
    }
}
