//! Union/missing computation and source selection.

use std::collections::HashMap;

use crate::index::Index;
use crate::models::Task;

/// `server_name -> sorted list of checksums absent from that server`.
pub type MissingMap = HashMap<String, Vec<String>>;

/// Computes the missing set per server and the task list.
///
/// `declared_order` is the server declaration order from configuration;
/// source selection for each checksum picks the first server in that
/// order whose index already holds it. A checksum with no holder at all
/// is dropped and reported as an error string.
pub fn reconcile(
    index: &Index,
    declared_order: &[String],
) -> (MissingMap, Vec<Task>, Vec<String>) {
    let union = index.union_sorted();
    let mut missing: MissingMap = declared_order
        .iter()
        .map(|s| (s.clone(), Vec::new()))
        .collect();
    let mut tasks = Vec::new();
    let mut errors = Vec::new();

    for checksum in &union {
        let source = declared_order
            .iter()
            .find(|server| index.contains(server, checksum));

        let Some(source) = source else {
            errors.push(format!("No source available for checksum {checksum}"));
            continue;
        };

        for target in declared_order {
            if index.contains(target, checksum) {
                continue;
            }
            missing
                .entry(target.clone())
                .or_default()
                .push(checksum.clone());
            tasks.push(Task::new(checksum.clone(), source.clone(), target.clone()));
        }
    }

    (missing, tasks, errors)
}
