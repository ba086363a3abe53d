use std::fs;
use std::path::Path;

use tattle_core::{ChangeTracker, TrackerConfig};
use tattle_value::{Path as PropertyPath, Value};

pub fn load_config_or_exit(path: Option<&Path>) -> TrackerConfig {
    let Some(path) = path else {
        return TrackerConfig::default();
    };
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read config at {}: {e}", path.display());
        std::process::exit(1);
    });
    TrackerConfig::from_toml_str(&text).unwrap_or_else(|e| {
        eprintln!("error: invalid config at {}: {e}", path.display());
        std::process::exit(1);
    })
}

pub fn read_json_or_exit(path: &Path, label: &str) -> serde_json::Value {
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {label} at {}: {e}", path.display());
        std::process::exit(1);
    });
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        eprintln!("error: failed to parse {label} JSON at {}: {e}", path.display());
        std::process::exit(1);
    })
}

/// Register the base document, replay the optional edit script, and
/// run one evaluation pass.
pub fn tracker_with_document_or_exit(
    base: &Path,
    edits: Option<&Path>,
    as_added: bool,
    config: Option<&Path>,
) -> (ChangeTracker, Value) {
    let config = load_config_or_exit(config);
    let document = read_json_or_exit(base, "base document");
    let root = Value::from_json(&document);

    let mut tracker = ChangeTracker::with_config(config);
    if let Err(e) = tracker.register(&root, as_added) {
        eprintln!("error: cannot track {}: {e}", base.display());
        std::process::exit(1);
    }

    if let Some(edits_path) = edits {
        let script = read_json_or_exit(edits_path, "edit script");
        apply_edits_or_exit(&root, &script);
    }
    tracker.evaluate();
    (tracker, root)
}

/// Edit scripts are JSON arrays of steps addressed by property paths:
/// `{ "path": "a.b[2]", "set": <json> }`, `{ "path": "a.b", "remove":
/// true }`, or `{ "path": "a.list", "push": <json> }`.
fn apply_edits_or_exit(root: &Value, script: &serde_json::Value) {
    let Some(steps) = script.as_array() else {
        eprintln!("error: edit script must be a JSON array");
        std::process::exit(1);
    };
    for step in steps {
        let Some(text) = step["path"].as_str() else {
            eprintln!("error: edit step is missing a `path`: {step}");
            std::process::exit(1);
        };
        let path = PropertyPath::parse(text).unwrap_or_else(|e| {
            eprintln!("error: bad path `{text}`: {e}");
            std::process::exit(1);
        });
        let outcome = if let Some(new_value) = step.get("set") {
            path.assign(root, Value::from_json(new_value))
        } else if step.get("remove").and_then(serde_json::Value::as_bool) == Some(true) {
            path.remove(root).map(|_| ())
        } else if let Some(pushed) = step.get("push") {
            path.resolve(root).map(|target| match target.as_array() {
                Some(arr) => arr.push(Value::from_json(pushed)),
                None => {
                    eprintln!("error: `{text}` is not an array, cannot push");
                    std::process::exit(1);
                }
            })
        } else {
            eprintln!("error: edit step for `{text}` has no set/remove/push");
            std::process::exit(1);
        };
        if let Err(e) = outcome {
            eprintln!("error: cannot apply edit at `{text}`: {e}");
            std::process::exit(1);
        }
    }
}
