//! Instantiation engine
//!
//! Depth-first driver over the component graph. Every concrete
//! configuration in the registry is a traversal root; each generic
//! reference encountered along the way is replaced by a freshly named
//! concrete copy, and copies that are themselves configurations are pushed
//! onto the path so their own references are expanded before the walk
//! retreats. The edges of the graph are only discovered as nodes are
//! visited, so cycle detection rides on per-record "on path" flags rather
//! than on any precomputed topology.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use crate::hir::{
    Hir, HirComponent, HirComponentKind, HirComponentRef, HirConfigurationBody,
    InstantiationOrigin,
};
use crate::instantiation::error::{CycleError, InconsistencyError, Result};
use crate::instantiation::registry::ComponentRegistry;
use crate::instantiation::rewrite;
use crate::instantiation::specialize::{self, InstantiatedCopy, SubstitutionBinding};
use crate::mangle::NameMangler;

/// Deterministically ordered, duplicate-free set of components produced by
/// one instantiation run.
#[derive(Debug, Default)]
pub struct ProducedComponents {
    components: BTreeMap<String, HirComponent>,
}

impl ProducedComponents {
    /// Number of produced components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Whether a component with the given name was produced.
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Look up a produced component by name.
    pub fn get(&self, name: &str) -> Option<&HirComponent> {
        self.components.get(name)
    }

    /// Iterate produced components in name order.
    pub fn iter(&self) -> impl Iterator<Item = &HirComponent> {
        self.components.values()
    }

    /// Iterate produced names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}

/// One entry of the explicit DFS path stack: a configuration currently
/// being expanded and a cursor into its ordered reference list.
#[derive(Debug)]
struct PathFrame {
    /// Configuration whose reference list is being scanned; a produced
    /// copy for every frame except roots
    component: String,
    /// Registry record released when this frame is popped: the generic
    /// template for instantiated frames, the root itself otherwise
    record: String,
    /// Whether an instantiation-chain entry is popped with this frame
    from_instantiation: bool,
    /// Index of the next reference to inspect
    cursor: usize,
}

/// Builder for an instantiation engine.
#[derive(Debug, Default)]
pub struct InstantiationEngineBuilder {
    components: Vec<HirComponent>,
    reserved_names: Vec<String>,
}

impl InstantiationEngineBuilder {
    /// Add one component to take part in the instantiation process.
    pub fn add_component(mut self, component: HirComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Add several components.
    pub fn add_components<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = HirComponent>,
    {
        self.components.extend(components);
        self
    }

    /// Add every component of a program.
    pub fn add_program(mut self, program: Hir) -> Self {
        self.components.extend(program.components);
        self
    }

    /// Reserve additional names in the collision universe, for names used
    /// elsewhere in the program that no added component declares.
    pub fn reserve_names<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.reserved_names.extend(names);
        self
    }

    /// Validate the inputs and construct the engine.
    pub fn build(self) -> Result<InstantiationEngine> {
        let mut seen = HashSet::new();
        for component in &self.components {
            if !seen.insert(component.name.clone()) {
                return Err(InconsistencyError::DuplicateComponent(component.name.clone()).into());
            }
        }

        let mut universe = name_universe(&self.components);
        universe.extend(self.reserved_names);

        let (opaque, registered): (Vec<_>, Vec<_>) = self
            .components
            .into_iter()
            .partition(|c| matches!(c.kind, HirComponentKind::Binary));

        Ok(InstantiationEngine {
            registry: ComponentRegistry::new(registered),
            opaque,
            mangler: NameMangler::new(universe),
            path: Vec::new(),
            chain: Vec::new(),
            accumulator: BTreeMap::new(),
            result: None,
        })
    }
}

/// Every name in use anywhere in the program: component names plus all
/// instance-unique identifiers their bodies declare. Seeds the mangler so
/// fresh names never collide.
fn name_universe(components: &[HirComponent]) -> Vec<String> {
    let mut names = Vec::new();
    for component in components {
        names.push(component.name.clone());
        for declaration in component.declarations() {
            names.push(declaration.unique_name.clone());
            match &declaration.def {
                crate::hir::HirDeclDef::Struct { members } => {
                    names.extend(members.iter().map(|m| m.unique_name.clone()));
                }
                crate::hir::HirDeclDef::Function { locals, .. } => {
                    names.extend(locals.iter().map(|l| l.unique_name.clone()));
                }
                _ => {}
            }
        }
    }
    names
}

/// Turns a component graph with generic references into one containing
/// only concrete components.
#[derive(Debug)]
pub struct InstantiationEngine {
    /// Lookup for all non-binary components; reference sites inside the
    /// registered components are rewritten in place
    registry: ComponentRegistry,
    /// Binary components, passed through to the output untouched
    opaque: Vec<HirComponent>,
    /// Fresh-name allocator, seeded with the whole-program name universe
    mangler: NameMangler,
    /// Explicit DFS path stack
    path: Vec<PathFrame>,
    /// Instantiation decisions leading to the current point
    chain: Vec<InstantiationOrigin>,
    /// Copies produced so far in the current run
    accumulator: BTreeMap<String, HirComponent>,
    /// Memoized result of a successful run
    result: Option<ProducedComponents>,
}

impl InstantiationEngine {
    /// Get a builder that will create an instantiation engine.
    pub fn builder() -> InstantiationEngineBuilder {
        InstantiationEngineBuilder::default()
    }

    /// The component registry, exposing the (possibly rewritten) original
    /// components.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Look up a component by name, original or produced.
    pub fn component(&self, name: &str) -> Option<&HirComponent> {
        if let Some(record) = self.registry.lookup(name) {
            return Some(&record.component);
        }
        self.result
            .as_ref()
            .and_then(|r| r.get(name))
            .or_else(|| self.accumulator.get(name))
    }

    /// Instantiate every generic component reachable from a concrete
    /// configuration. Reference sites in the traversed configurations are
    /// rewritten in place to target the produced copies.
    ///
    /// The result is computed once; repeated calls return the cached set.
    pub fn instantiate(&mut self) -> Result<&ProducedComponents> {
        if self.result.is_none() {
            let produced = self.run()?;
            self.result = Some(produced);
        }
        Ok(self
            .result
            .as_ref()
            .expect("instantiation result was just stored"))
    }

    /// Consume the engine, yielding the original components (reference
    /// sites rewritten), the binary components, and the produced copies.
    /// Downstream stages need not distinguish the three.
    pub fn into_components(mut self) -> Vec<HirComponent> {
        let mut components: Vec<HirComponent> = self.registry.into_components().collect();
        components.extend(self.opaque);
        if let Some(result) = self.result.take() {
            components.extend(result.components.into_values());
        }
        components
    }

    fn run(&mut self) -> Result<ProducedComponents> {
        self.accumulator.clear();
        self.path.clear();
        self.chain.clear();
        self.registry.reset_path_flags();

        let roots: HashSet<String> = self.registry.root_names().into_iter().collect();
        let names: Vec<String> = self
            .registry
            .iter()
            .map(|r| r.component.name.clone())
            .collect();

        for name in names {
            if roots.contains(&name) {
                self.expand_from(&name)?;
            } else {
                debug!("skipping component '{}'", name);
            }
        }

        Ok(ProducedComponents {
            components: std::mem::take(&mut self.accumulator),
        })
    }

    /// Expand every generic reference transitively reachable from one
    /// concrete root configuration.
    fn expand_from(&mut self, root: &str) -> Result<()> {
        debug!("starting instantiation of components for '{}'", root);

        self.path.push(PathFrame {
            component: root.to_string(),
            record: root.to_string(),
            from_instantiation: false,
            cursor: 0,
        });

        while let Some(top) = self.path.last() {
            let component_name = top.component.clone();
            let cursor = top.cursor;

            let next = self
                .component(&component_name)
                .and_then(HirComponent::configuration)
                .and_then(|body| body.refs.get(cursor))
                .cloned();

            match next {
                None => self.pop_frame(),
                Some(reference) => {
                    if let Some(top) = self.path.last_mut() {
                        top.cursor += 1;
                    }
                    if reference.is_generic {
                        self.perform_instantiation(&component_name, cursor, &reference)?;
                    } else {
                        trace!("skipping component reference '{}'", reference.local_name());
                    }
                }
            }
        }

        debug!("instantiation of components for '{}' successfully ended", root);
        Ok(())
    }

    /// Exhausted frame: release its record, pop the matching chain entry.
    fn pop_frame(&mut self) {
        if let Some(frame) = self.path.pop() {
            if let Some(record) = self.registry.lookup_mut(&frame.record) {
                record.on_path = false;
            }
            if frame.from_instantiation {
                self.chain.pop();
            }
            self.log_path();
        }
    }

    /// One instantiation step: copy the generic target, accumulate the
    /// copy, descend into it if it is a configuration, and rewrite the
    /// consumed reference.
    fn perform_instantiation(
        &mut self,
        host: &str,
        ref_index: usize,
        reference: &HirComponentRef,
    ) -> Result<()> {
        let record = self
            .registry
            .lookup(&reference.target)
            .ok_or_else(|| InconsistencyError::UnknownComponent(reference.target.clone()))?;
        if !record.component.is_generic {
            return Err(InconsistencyError::NotGeneric(reference.target.clone()).into());
        }
        if record.on_path() {
            return Err(CycleError {
                path: self.path_names(),
                offender: reference.target.clone(),
            }
            .into());
        }

        self.chain.push(InstantiationOrigin {
            component: reference.target.clone(),
            alias: reference.local_name().to_string(),
        });
        self.log_instantiation(reference);

        let binding =
            SubstitutionBinding::for_reference(&record.component, &reference.target, &reference.arguments)?;
        let InstantiatedCopy {
            component: copy,
            plan,
            pending_generics,
        } = specialize::instantiate_once(&record.component, &binding, &self.chain, &mut self.mangler);

        let copy_name = copy.name.clone();
        let is_configuration = copy.is_configuration();

        if self.accumulator.insert(copy_name.clone(), copy).is_some() {
            // The mangler contract guarantees fresh names; a collision is
            // a defect, not a user error.
            return Err(InconsistencyError::NameCollision(copy_name).into());
        }

        if is_configuration {
            if let Some(target) = self.registry.lookup_mut(&reference.target) {
                target.on_path = true;
            }
            self.path.push(PathFrame {
                component: copy_name.clone(),
                record: reference.target.clone(),
                from_instantiation: true,
                cursor: 0,
            });
            self.log_path();
        } else {
            // A module pushes no frame, so no later pop releases the entry.
            self.chain.pop();
            if !pending_generics.is_empty() {
                trace!(
                    "module copy '{}' reported pending references: {:?}",
                    copy_name,
                    pending_generics
                );
            }
        }

        if let Some(body) = self.configuration_body_mut(host) {
            rewrite::rewrite_reference_site(body, ref_index, &copy_name, &plan);
        }

        Ok(())
    }

    fn configuration_body_mut(&mut self, name: &str) -> Option<&mut HirConfigurationBody> {
        if self.registry.lookup(name).is_some() {
            self.registry
                .lookup_mut(name)
                .and_then(|r| r.component.configuration_mut())
        } else {
            self.accumulator
                .get_mut(name)
                .and_then(HirComponent::configuration_mut)
        }
    }

    /// Component names on the active expansion path, outermost first.
    fn path_names(&self) -> Vec<String> {
        self.path.iter().map(|f| f.record.clone()).collect()
    }

    fn log_instantiation(&self, reference: &HirComponentRef) {
        let local_name = reference.local_name();
        if local_name != reference.target {
            debug!(
                "instantiating component '{}' aliased as '{}'",
                reference.target, local_name
            );
        } else {
            debug!("instantiating component '{}'", reference.target);
        }
    }

    fn log_path(&self) {
        if self.path.is_empty() {
            debug!("current path: <empty>");
        } else {
            let rendered: Vec<&str> = self.path.iter().map(|f| f.record.as_str()).collect();
            debug!("current path: {}", rendered.join(" -> "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::HirModuleBody;

    fn module(name: &str) -> HirComponent {
        HirComponent {
            name: name.to_string(),
            is_generic: false,
            generics: vec![],
            kind: HirComponentKind::Module(HirModuleBody {
                declarations: vec![],
            }),
            provenance: None,
        }
    }

    #[test]
    fn test_builder_rejects_duplicate_names() {
        let result = InstantiationEngine::builder()
            .add_component(module("MainM"))
            .add_component(module("MainM"))
            .build();

        assert!(matches!(
            result,
            Err(crate::instantiation::InstantiateError::Inconsistency(
                InconsistencyError::DuplicateComponent(name)
            )) if name == "MainM"
        ));
    }

    #[test]
    fn test_program_without_configurations_produces_nothing() {
        let mut engine = InstantiationEngine::builder()
            .add_component(module("MainM"))
            .build()
            .expect("engine builds");

        let produced = engine.instantiate().expect("instantiation succeeds");
        assert!(produced.is_empty());
    }

    #[test]
    fn test_reserved_names_steer_the_mangler() {
        let engine = InstantiationEngine::builder()
            .add_component(module("MainM"))
            .reserve_names(vec!["MainM__0".to_string()])
            .build()
            .expect("engine builds");

        // Both the component name and the reserved name are taken.
        assert!(!engine.mangler.is_used("MainM__1"));
        assert!(engine.mangler.is_used("MainM__0"));
        assert!(engine.mangler.is_used("MainM"));
    }
}
