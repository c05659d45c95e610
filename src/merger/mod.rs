//! Merging of per-page fragments into one document
//!
//! Fragments are processed in source URL order, so the merged document does
//! not depend on the order in which extraction jobs finished.

mod repair;

pub use repair::repair_document;

use crate::openapi::{
    ApiFragment, ApiInfo, OpenApiDocument, OperationKey, OperationSpec, Parameter,
    ProvenanceRecord, ResponseSpec, Schema, SchemaConflict,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Result of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub document: OpenApiDocument,
    /// Operations flagged for manual review
    pub conflicts: Vec<OperationKey>,
    /// Repairs applied after assembly
    pub repairs: Vec<String>,
}

/// One fragment's version of an operation
struct Contribution {
    source: String,
    confidence: f64,
    operation: OperationSpec,
}

pub struct SpecMerger {
    info: ApiInfo,
}

impl SpecMerger {
    pub fn new(info: ApiInfo) -> Self {
        Self { info }
    }

    /// Combines fragments into one document
    ///
    /// Components are deduplicated first and references rewritten, then the
    /// operations sharing a (path, method) key are folded together, then the
    /// result is repaired.
    pub fn merge(&self, mut fragments: Vec<ApiFragment>) -> MergeOutcome {
        fragments.sort_by(|a, b| a.source_url.cmp(&b.source_url));

        let mut document = OpenApiDocument::new(self.info.clone());
        let mut groups: BTreeMap<OperationKey, Vec<Contribution>> = BTreeMap::new();

        for fragment in fragments {
            let renames = register_components(&mut document.components, &fragment.components);

            for server in &fragment.servers {
                if !document.servers.contains(server) {
                    document.servers.push(server.clone());
                }
            }

            for (key, mut operation) in fragment.paths {
                for schema in operation.schemas_mut() {
                    schema.rename_refs(&renames);
                }
                groups.entry(key).or_default().push(Contribution {
                    source: fragment.source_url.clone(),
                    confidence: fragment.confidence,
                    operation,
                });
            }
        }

        let mut conflicts = Vec::new();
        for (key, mut contributions) in groups {
            // Stable: equal confidence keeps source URL order
            contributions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            let (operation, provenance) = merge_operation(&key, contributions);
            if provenance.requires_manual_review {
                conflicts.push(key.clone());
            }
            document.provenance.insert(key.clone(), provenance);
            document.paths.insert(key, operation);
        }

        let repairs = repair_document(&mut document);

        info!(
            "Merged {} operation(s), {} component(s), {} conflict(s), {} repair(s)",
            document.operation_count(),
            document.components.len(),
            conflicts.len(),
            repairs.len()
        );

        MergeOutcome {
            document,
            conflicts,
            repairs,
        }
    }
}

/// Adds a fragment's components to the document's set
///
/// Components are registered in dependency order so a component's own
/// references are rewritten before it is compared. A schema that agrees with
/// an existing one (equal, or only filling its unknowns) shares its name;
/// otherwise it takes the next free numeric suffix. Returns the fragment-local
/// to document-level name map.
fn register_components(
    target: &mut BTreeMap<String, Schema>,
    incoming: &BTreeMap<String, Schema>,
) -> HashMap<String, String> {
    let mut renames = HashMap::new();
    let mut remaining: Vec<(&String, &Schema)> = incoming.iter().collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|(name, schema)| {
            let mut refs = BTreeSet::new();
            schema.collect_refs(&mut refs);
            refs.iter().all(|r| {
                r == *name || renames.contains_key(r) || !incoming.contains_key(r)
            })
        });

        if ready.is_empty() {
            register_cycle(target, blocked, &mut renames);
            break;
        }

        for (name, schema) in ready {
            let mut schema = schema.clone();
            schema.rename_refs(&renames);
            let registered = register_refined(target, name, schema);
            if registered != *name {
                debug!("Component {} registered as {}", name, registered);
            }
            renames.insert(name.clone(), registered);
        }
        remaining = blocked;
    }

    renames
}

/// Registers components that reference each other in a cycle
///
/// Names are assigned before any reference is rewritten. A member whose
/// rewritten schema no longer agrees with the component at its assigned name
/// moves to a fresh name, and the whole cycle is rewritten again.
fn register_cycle(
    target: &mut BTreeMap<String, Schema>,
    members: Vec<(&String, &Schema)>,
    renames: &mut HashMap<String, String>,
) {
    let mut assigned: HashMap<String, String> = HashMap::new();
    for (name, schema) in &members {
        let mut schema = (*schema).clone();
        schema.rename_refs(renames);
        let taken: BTreeSet<String> = assigned.values().cloned().collect();
        assigned.insert((*name).clone(), available_name(target, name, &schema, &taken));
    }

    loop {
        let mut all = renames.clone();
        all.extend(assigned.clone());
        let rewritten: Vec<(String, Schema)> = members
            .iter()
            .map(|(name, schema)| {
                let mut schema = (*schema).clone();
                schema.rename_refs(&all);
                ((*name).clone(), schema)
            })
            .collect();

        let mut moved = false;
        for (name, schema) in &rewritten {
            let slot = &assigned[name];
            let agrees = target
                .get(slot)
                .map_or(true, |existing| existing.reconcile(schema).is_ok());
            if !agrees {
                let taken: BTreeSet<String> = assigned.values().cloned().collect();
                let fresh = fresh_name(target, name, &taken);
                assigned.insert(name.clone(), fresh);
                moved = true;
            }
        }
        if moved {
            continue;
        }

        for (name, schema) in rewritten {
            let slot = assigned[&name].clone();
            let refined = match target.get(&slot) {
                Some(existing) => existing.reconcile(&schema).unwrap_or(schema),
                None => schema,
            };
            target.insert(slot.clone(), refined);
            if slot != name {
                debug!("Component {} registered as {}", name, slot);
            }
        }
        renames.extend(assigned);
        return;
    }
}

fn suffixed(base: &str, n: u32) -> String {
    if n == 1 {
        base.to_string()
    } else {
        format!("{}{}", base, n)
    }
}

/// The name `register_refined` would pick, skipping names in `taken`
fn available_name(
    target: &BTreeMap<String, Schema>,
    base: &str,
    schema: &Schema,
    taken: &BTreeSet<String>,
) -> String {
    let mut n = 1;
    loop {
        let candidate = suffixed(base, n);
        let usable = !taken.contains(&candidate)
            && target
                .get(&candidate)
                .map_or(true, |existing| existing.reconcile(schema).is_ok());
        if usable {
            return candidate;
        }
        n += 1;
    }
}

/// First suffixed name not used in the document or in `taken`
fn fresh_name(target: &BTreeMap<String, Schema>, base: &str, taken: &BTreeSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = suffixed(base, n);
        if !target.contains_key(&candidate) && !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn register_refined(target: &mut BTreeMap<String, Schema>, base: &str, schema: Schema) -> String {
    let mut n = 1;
    loop {
        let candidate = suffixed(base, n);
        match target.get(&candidate).map(|existing| existing.reconcile(&schema)) {
            Some(Ok(refined)) => {
                target.insert(candidate.clone(), refined);
                return candidate;
            }
            Some(Err(SchemaConflict)) => n += 1,
            None => {
                target.insert(candidate.clone(), schema);
                return candidate;
            }
        }
    }
}

/// Folds every contribution for one key into a single operation
///
/// Contributions arrive highest confidence first. Each later one is applied
/// only if it agrees with what is already merged. A disagreement is dropped,
/// and flagged when the contribution is as confident as a source it
/// contradicts.
fn merge_operation(
    key: &OperationKey,
    contributions: Vec<Contribution>,
) -> (OperationSpec, ProvenanceRecord) {
    let mut sources: Vec<String> = contributions.iter().map(|c| c.source.clone()).collect();
    sources.sort();
    sources.dedup();

    let mut iter = contributions.into_iter();
    let Some(winner) = iter.next() else {
        return (OperationSpec::default(), ProvenanceRecord::default());
    };

    let mut descriptions = Vec::new();
    push_description(&mut descriptions, &winner);
    let mut merged = winner.operation.clone();
    let mut absorbed = vec![winner];
    let mut requires_manual_review = false;

    for contribution in iter {
        match absorb(&merged, &contribution.operation) {
            Ok(refined) => {
                merged = refined;
                push_description(&mut descriptions, &contribution);
                absorbed.push(contribution);
            }
            Err(SchemaConflict) => match equal_rival(&absorbed, &contribution) {
                Some(rival) => {
                    warn!(
                        "{}: {} conflicts with {} at equal confidence, flagged for review",
                        key, contribution.source, rival.source
                    );
                    requires_manual_review = true;
                    push_description(&mut descriptions, &contribution);
                }
                None => {
                    debug!(
                        "{}: dropped conflicting version from lower-confidence {}",
                        key, contribution.source
                    );
                }
            },
        }
    }

    descriptions.sort();
    merged.description = combine_descriptions(descriptions);

    (
        merged,
        ProvenanceRecord {
            sources,
            requires_manual_review,
        },
    )
}

/// Finds an absorbed contribution the rejected one contradicts at equal confidence
///
/// The contradicted sources are those that conflict with it pairwise. When
/// none does, the conflict comes from their combination and every absorbed
/// source counts.
fn equal_rival<'a>(absorbed: &'a [Contribution], rejected: &Contribution) -> Option<&'a Contribution> {
    let pairwise: Vec<&Contribution> = absorbed
        .iter()
        .filter(|a| absorb(&a.operation, &rejected.operation).is_err())
        .collect();
    let contradicted = if pairwise.is_empty() {
        absorbed.iter().collect()
    } else {
        pairwise
    };
    contradicted
        .into_iter()
        .find(|a| a.confidence.total_cmp(&rejected.confidence).is_eq())
}

fn push_description(descriptions: &mut Vec<(String, String)>, contribution: &Contribution) {
    if let Some(text) = &contribution.operation.description {
        descriptions.push((contribution.source.clone(), text.clone()));
    }
}

/// One description is kept as-is; several are each annotated with their source
fn combine_descriptions(descriptions: Vec<(String, String)>) -> Option<String> {
    let mut distinct: Vec<(String, String)> = Vec::new();
    for (source, text) in descriptions {
        if !distinct.iter().any(|(_, t)| *t == text) {
            distinct.push((source, text));
        }
    }

    match distinct.len() {
        0 => None,
        1 => distinct.pop().map(|(_, text)| text),
        _ => Some(
            distinct
                .iter()
                .map(|(source, text)| format!("[{}] {}", source, text))
                .collect::<Vec<_>>()
                .join("\n\n"),
        ),
    }
}

/// Merges `other` into a copy of `base`, failing on any contradiction
fn absorb(base: &OperationSpec, other: &OperationSpec) -> Result<OperationSpec, SchemaConflict> {
    let mut merged = base.clone();

    if merged.summary.is_none() {
        merged.summary = other.summary.clone();
    }

    for param in &other.parameters {
        match merged.parameters.iter_mut().find(|p| p.same_slot(param)) {
            Some(existing) => *existing = merge_parameter(existing, param)?,
            None => merged.parameters.push(param.clone()),
        }
    }

    merged.request_body = match (&merged.request_body, &other.request_body) {
        (Some(a), Some(b)) => Some(a.reconcile(b)?),
        (a, b) => a.clone().or_else(|| b.clone()),
    };

    for (status, response) in &other.responses {
        let combined = match merged.responses.get(status) {
            Some(existing) => merge_response(existing, response)?,
            None => response.clone(),
        };
        merged.responses.insert(status.clone(), combined);
    }

    for example in &other.examples {
        if !merged.examples.contains(example) {
            merged.examples.push(example.clone());
        }
    }

    Ok(merged)
}

fn merge_parameter(a: &Parameter, b: &Parameter) -> Result<Parameter, SchemaConflict> {
    let required = match (a.required.is_known(), b.required.is_known()) {
        (true, true) if a.required != b.required => return Err(SchemaConflict),
        (false, _) => b.required,
        _ => a.required,
    };
    Ok(Parameter {
        name: a.name.clone(),
        location: a.location,
        required,
        schema: a.schema.reconcile(&b.schema)?,
        description: a.description.clone().or_else(|| b.description.clone()),
    })
}

fn merge_response(a: &ResponseSpec, b: &ResponseSpec) -> Result<ResponseSpec, SchemaConflict> {
    let schema = match (&a.schema, &b.schema) {
        (Some(x), Some(y)) => Some(x.reconcile(y)?),
        (x, y) => x.clone().or_else(|| y.clone()),
    };
    Ok(ResponseSpec {
        description: a.description.clone().or_else(|| b.description.clone()),
        schema,
    })
}
