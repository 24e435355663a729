//! Structural plugin contract checks over component exports.
//!
//! A component is never checked against a nominal type. Anything that
//! exports callable `activate` and `deactivate` functions is a plugin,
//! whichever toolchain or copy of the guest bindings produced it.

use wasmtime::component::Component;
use wasmtime::component::types::{ComponentInstance, ComponentItem};

use crate::WasmEngine;

/// Export that starts a plugin.
pub const ACTIVATE: &str = "activate";

/// Export that stops a plugin.
pub const DEACTIVATE: &str = "deactivate";

/// Where a plugin candidate was found in a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Top-level `activate` and `deactivate`.
    Primary,
    /// An exported instance carrying `activate` and `deactivate`.
    Named(String),
    /// Top-level `activate` without `deactivate` (definition-style plugins).
    Definition,
}

/// A set of exports that satisfies the plugin contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    source: CandidateSource,
}

impl Candidate {
    /// Returns where the candidate was found.
    #[must_use]
    pub fn source(&self) -> &CandidateSource {
        &self.source
    }

    /// Returns the name of the exported instance holding the candidate, if
    /// it is not at the top level.
    #[must_use]
    pub fn export_name(&self) -> Option<&str> {
        match &self.source {
            CandidateSource::Named(name) => Some(name),
            CandidateSource::Primary | CandidateSource::Definition => None,
        }
    }

    /// Returns true if the candidate exports `deactivate`.
    #[must_use]
    pub fn has_deactivate(&self) -> bool {
        !matches!(self.source, CandidateSource::Definition)
    }
}

/// Finds every plugin candidate exported by a component.
///
/// Order: the primary export first, then named instance exports in export
/// order, then a definition-style primary export. A primary export and a
/// definition-style export are mutually exclusive.
pub fn discover_candidates(engine: &WasmEngine, component: &Component) -> Vec<Candidate> {
    let engine = engine.inner();
    let ty = component.component_type();

    let mut top_activate = false;
    let mut top_deactivate = false;
    let mut named = Vec::new();

    for (name, item) in ty.exports(engine) {
        match item {
            ComponentItem::ComponentFunc(_) if name == ACTIVATE => top_activate = true,
            ComponentItem::ComponentFunc(_) if name == DEACTIVATE => top_deactivate = true,
            ComponentItem::ComponentInstance(instance) => {
                if exports_func(engine, &instance, ACTIVATE)
                    && exports_func(engine, &instance, DEACTIVATE)
                {
                    named.push(name.to_string());
                } else {
                    tracing::trace!(export = name, "instance export is not a plugin");
                }
            }
            _ => {}
        }
    }

    let mut candidates = Vec::with_capacity(named.len() + 1);

    if top_activate && top_deactivate {
        candidates.push(Candidate {
            source: CandidateSource::Primary,
        });
    }

    candidates.extend(named.into_iter().map(|name| Candidate {
        source: CandidateSource::Named(name),
    }));

    if top_activate && !top_deactivate {
        candidates.push(Candidate {
            source: CandidateSource::Definition,
        });
    }

    tracing::debug!(count = candidates.len(), "discovered plugin candidates");

    candidates
}

fn exports_func(engine: &wasmtime::Engine, instance: &ComponentInstance, name: &str) -> bool {
    instance
        .exports(engine)
        .any(|(export, item)| export == name && matches!(item, ComponentItem::ComponentFunc(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(wat: &str) -> Vec<Candidate> {
        let engine = WasmEngine::new().unwrap();
        let component = engine.load_component_from_bytes(wat.as_bytes()).unwrap();
        discover_candidates(&engine, &component)
    }

    #[test]
    fn test_empty_component_has_no_candidates() {
        assert!(candidates("(component)").is_empty());
    }

    #[test]
    fn test_primary_export() {
        let found = candidates(
            r#"(component
                (core module $m
                    (func (export "activate"))
                    (func (export "deactivate")))
                (core instance $i (instantiate $m))
                (func (export "activate") (canon lift (core func $i "activate")))
                (func (export "deactivate") (canon lift (core func $i "deactivate")))
            )"#,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source(), &CandidateSource::Primary);
        assert!(found[0].export_name().is_none());
        assert!(found[0].has_deactivate());
    }

    #[test]
    fn test_activate_only_is_definition() {
        let found = candidates(
            r#"(component
                (core module $m (func (export "activate")))
                (core instance $i (instantiate $m))
                (func (export "activate") (canon lift (core func $i "activate")))
            )"#,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].source(), &CandidateSource::Definition);
        assert!(!found[0].has_deactivate());
    }

    #[test]
    fn test_deactivate_only_is_not_a_plugin() {
        let found = candidates(
            r#"(component
                (core module $m (func (export "deactivate")))
                (core instance $i (instantiate $m))
                (func (export "deactivate") (canon lift (core func $i "deactivate")))
            )"#,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_named_instances_follow_primary() {
        let found = candidates(
            r#"(component
                (core module $m
                    (func (export "activate"))
                    (func (export "deactivate")))
                (core instance $i (instantiate $m))
                (func $a (canon lift (core func $i "activate")))
                (func $d (canon lift (core func $i "deactivate")))
                (instance $extra (export "activate" (func $a)) (export "deactivate" (func $d)))
                (instance $partial (export "activate" (func $a)))
                (export "activate" (func $a))
                (export "deactivate" (func $d))
                (export "extra" (instance $extra))
                (export "partial" (instance $partial))
            )"#,
        );
        assert_eq!(
            found.iter().map(Candidate::source).cloned().collect::<Vec<_>>(),
            vec![
                CandidateSource::Primary,
                CandidateSource::Named("extra".to_string())
            ]
        );
        assert_eq!(found[1].export_name(), Some("extra"));
    }
}
