use std::path::PathBuf;

use crate::support::tracker_with_document_or_exit;

pub fn run(
    base: PathBuf,
    edits: Option<PathBuf>,
    as_added: bool,
    config: Option<PathBuf>,
    json_output: bool,
) {
    let (tracker, _root) =
        tracker_with_document_or_exit(&base, edits.as_deref(), as_added, config.as_deref());
    let pending = tracker.pending_changes();

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&pending).expect("json serialization")
        );
        return;
    }

    println!("tattle report {}", base.display());
    println!("  Tracked objects: {}", tracker.len());
    println!(
        "  Pending: {} added, {} modified, {} deleted",
        pending.added.len(),
        pending.modified.len(),
        pending.deleted.len(),
    );
    for record in &pending.added {
        println!("  + {} #{}", record.type_name, record.id);
    }
    for record in &pending.modified {
        println!("  ~ {} #{}", record.type_name, record.id);
        for change in &record.changeset {
            println!(
                "      {}: {} -> {}",
                change.property, change.old_value, change.new_value
            );
        }
    }
    for record in &pending.deleted {
        println!("  - {} #{}", record.type_name, record.id);
    }
}
