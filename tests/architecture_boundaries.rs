use std::fs;
use std::path::{Path, PathBuf};

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

fn offenders(needle: &str, allowed_prefixes: &[&str]) -> Vec<String> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&repo_root.join("src"), &mut files);

    let mut found = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        if allowed_prefixes.iter().any(|p| rel.starts_with(p)) {
            continue;
        }
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            if line.contains(needle) {
                found.push(format!("{}:{}", rel, idx + 1));
            }
        }
    }
    found
}

#[test]
fn sql_is_confined_to_persistence() {
    let found = offenders("sqlx::query", &["src/persistence/"]);
    assert!(found.is_empty(), "SQL outside persistence: {:?}", found);
}

#[test]
fn http_is_confined_to_the_analyst() {
    let found = offenders("reqwest::Client", &["src/advisors/analyst.rs"]);
    assert!(found.is_empty(), "HTTP client outside analyst: {:?}", found);
    let found = offenders("use reqwest::", &["src/advisors/analyst.rs"]);
    assert!(found.is_empty(), "reqwest imported outside analyst: {:?}", found);
}

#[test]
fn decision_layer_is_pure() {
    for needle in [".await", "tokio::", "reqwest", "sqlx"] {
        let found: Vec<String> = offenders(needle, &[])
            .into_iter()
            .filter(|hit| hit.starts_with("src/decision/"))
            .collect();
        assert!(found.is_empty(), "{needle} in decision layer: {:?}", found);
    }
}
