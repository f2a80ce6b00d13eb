//! Build order resolution.
//!
//! Kahn's algorithm over a sorted ready-set, so unchanged definitions always
//! produce the same order.

use std::collections::{BTreeMap, BTreeSet};

use super::DependencyGraph;
use crate::error::{Error, Result};

/// Order images so that each one follows everything it requires.
///
/// Required images that are not keys of `graph` (external or undiscovered
/// bases) are part of the order too.
pub fn build_order(graph: &DependencyGraph) -> Result<Vec<String>> {
    // node -> number of unresolved requirements
    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    // requirement -> images waiting on it
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (image, requires) in graph {
        pending.entry(image.as_str()).or_insert(0);
        for req in requires {
            pending.entry(req.as_str()).or_insert(0);
            *pending.get_mut(image.as_str()).expect("inserted above") += 1;
            dependents.entry(req.as_str()).or_default().push(image.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(next) = ready.pop_first() {
        order.push(next.to_string());
        for dependent in dependents.get(next).into_iter().flatten() {
            let count = pending.get_mut(dependent).expect("every dependent is pending");
            *count -= 1;
            if *count == 0 {
                ready.insert(*dependent);
            }
        }
    }

    if order.len() < pending.len() {
        let ordered: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        return Err(Error::Cycle {
            cycle: find_cycle(graph, &ordered),
        });
    }

    Ok(order)
}

/// Walk requirements from the first unordered image until a node repeats.
fn find_cycle(graph: &DependencyGraph, ordered: &BTreeSet<&str>) -> Vec<String> {
    let unresolved = |name: &str| !ordered.contains(name) && graph.contains_key(name);

    let Some(start) = graph.keys().find(|k| unresolved(k.as_str())) else {
        return Vec::new();
    };

    // Every unresolved node has at least one unresolved requirement, so the
    // walk cannot dead-end.
    let mut path: Vec<&str> = vec![start.as_str()];
    loop {
        let current = *path.last().expect("path is never empty");
        let Some(next) = graph[current].iter().find(|r| unresolved(r.as_str())) else {
            return path.iter().map(|s| s.to_string()).collect();
        };
        if let Some(pos) = path.iter().position(|p| *p == next.as_str()) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(next.clone());
            return cycle;
        }
        path.push(next.as_str());
    }
}
