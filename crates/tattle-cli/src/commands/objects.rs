use std::path::PathBuf;

use serde_json::json;
use tattle_value::{Snapshot, Value};

use crate::support::tracker_with_document_or_exit;

pub fn run(
    base: PathBuf,
    edits: Option<PathBuf>,
    type_name: Option<String>,
    config: Option<PathBuf>,
    json_output: bool,
) {
    let (tracker, _root) =
        tracker_with_document_or_exit(&base, edits.as_deref(), false, config.as_deref());
    let views: Vec<_> = tracker
        .records()
        .into_iter()
        .filter(|view| type_name.as_deref().is_none_or(|t| view.type_name == t))
        .collect();

    if json_output {
        let payload: Vec<serde_json::Value> = views
            .iter()
            .map(|view| {
                json!({
                    "id": view.id,
                    "status": view.status.as_str(),
                    "type": view.type_name,
                    "key": view.key,
                    "value": Snapshot::capture(&Value::Object(view.object.clone())),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).expect("json serialization")
        );
        return;
    }

    println!("tattle objects {}", base.display());
    for view in &views {
        match &view.key {
            Some(key) => println!(
                "  #{} {} {} key={}",
                view.id, view.status, view.type_name, key
            ),
            None => println!("  #{} {} {}", view.id, view.status, view.type_name),
        }
    }
    println!("  Total: {}", views.len());
}
