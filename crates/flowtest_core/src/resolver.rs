//! Controller-service dependency ordering.
//!
//! Services reference each other (a record reader referencing a schema
//! registry, say). A service can only be enabled once everything it
//! references is enabled, and must be disabled before them. The graph is
//! built once from the platform's referencing-component listing and
//! linearised with a post-order depth-first walk.

use crate::error::Result;
use crate::platform::{ControllerService, FlowPlatform, ReferencingComponent};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Service-name dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Service names in discovery order (the DFS seed order).
    nodes: Vec<String>,
    /// service -> services it references
    dependencies: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Builds the graph from a recursive controller-service listing.
    ///
    /// A service S listed among R's referencing components with a
    /// service-to-service reference type depends on R. Nested referencing
    /// components are followed while the chain stays service-to-service.
    pub fn from_services(services: &[ControllerService]) -> Self {
        let mut graph = Self::default();
        for service in services {
            graph.add_node(&service.name);
            graph.add_referencing(&service.name, &service.referencing_components);
        }
        graph
    }

    fn add_node(&mut self, name: &str) {
        if !self.dependencies.contains_key(name) {
            self.nodes.push(name.to_string());
            self.dependencies.insert(name.to_string(), Vec::new());
        }
    }

    fn add_edge(&mut self, dependent: &str, dependency: &str) {
        self.add_node(dependent);
        self.add_node(dependency);
        if let Some(deps) = self.dependencies.get_mut(dependent) {
            if !deps.iter().any(|d| d == dependency) {
                deps.push(dependency.to_string());
            }
        }
    }

    fn add_referencing(&mut self, referenced: &str, referencing: &[ReferencingComponent]) {
        for component in referencing {
            // Processors and reporting tasks consume services but are not enabled here
            if !component.reference_type.is_service() {
                continue;
            }
            self.add_edge(&component.name, referenced);
            self.add_referencing(&component.name, &component.referencing_components);
        }
    }

    /// Number of distinct service names.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no services were discovered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Services `name` references directly.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.dependencies
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Linearises the graph so every service follows the services it references.
    ///
    /// Each name appears exactly once. A reference cycle is broken at the edge
    /// that closes it.
    pub fn enable_order(&self) -> ServiceOrder {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut done = HashSet::new();
        let mut on_stack = HashSet::new();

        for seed in &self.nodes {
            self.visit(seed, &mut done, &mut on_stack, &mut order);
        }

        ServiceOrder(order)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        done: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) {
        if done.contains(name) {
            return;
        }
        on_stack.insert(name);

        for dependency in self.dependencies_of(name) {
            if on_stack.contains(dependency.as_str()) {
                warn!(
                    service = name,
                    dependency = dependency.as_str(),
                    "Controller service reference cycle, ignoring back edge"
                );
                continue;
            }
            self.visit(dependency, done, on_stack, order);
        }

        on_stack.remove(name);
        done.insert(name);
        order.push(name.to_string());
    }
}

/// Service names in enable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOrder(Vec<String>);

impl ServiceOrder {
    /// Names in enable order.
    pub fn enable(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Names in disable order, the exact reverse of [`enable`](Self::enable).
    pub fn disable(&self) -> impl Iterator<Item = &str> {
        self.0.iter().rev().map(String::as_str)
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there is nothing to enable.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names as a slice, in enable order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Resolves the enable order for every service below `group_id`.
pub fn resolve_order(platform: &dyn FlowPlatform, group_id: &str) -> Result<ServiceOrder> {
    let services = platform.list_controller_services(group_id, true)?;
    let graph = DependencyGraph::from_services(&services);
    let order = graph.enable_order();
    debug!(group = group_id, services = order.len(), order = ?order.as_slice(), "Resolved service order");
    Ok(order)
}

/// Enables every service in `order`, forward.
///
/// Returns the number of service instances enabled.
pub fn enable_services(platform: &dyn FlowPlatform, group_id: &str, order: &ServiceOrder) -> usize {
    apply(platform, group_id, order.enable(), true)
}

/// Disables every service in `order`, in reverse.
///
/// Returns the number of service instances disabled.
pub fn disable_services(platform: &dyn FlowPlatform, group_id: &str, order: &ServiceOrder) -> usize {
    apply(platform, group_id, order.disable(), false)
}

/// Applies the action to every live instance carrying each name.
///
/// Names are not unique across nested groups, so one name can map to
/// several instances. Lookup and scheduling failures are logged and skipped.
fn apply<'a>(
    platform: &dyn FlowPlatform,
    group_id: &str,
    names: impl Iterator<Item = &'a str>,
    enabled: bool,
) -> usize {
    let action = if enabled { "Enabling" } else { "Disabling" };
    let mut applied = 0;

    for name in names {
        let instances: Vec<ControllerService> = match platform.list_controller_services(group_id, true)
        {
            Ok(all) => all.into_iter().filter(|s| s.name == name).collect(),
            Err(e) => {
                warn!(service = name, error = %e, "Failed to look up controller service, skipping");
                continue;
            }
        };

        if instances.is_empty() {
            warn!(service = name, "Controller service not found, skipping");
            continue;
        }

        for instance in &instances {
            info!(service = name, id = instance.id.as_str(), "{} controller service", action);
            match platform.set_controller_service_enabled(instance, enabled) {
                Ok(()) => applied += 1,
                Err(e) => warn!(service = name, id = instance.id.as_str(), error = %e, "{} controller service failed", action),
            }
        }
    }

    applied
}
