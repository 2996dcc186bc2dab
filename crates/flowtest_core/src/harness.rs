//! Harness graph construction and teardown.
//!
//! For every test case the template's nodes are created (or updated in
//! place) inside the sandbox group, chained together through the deployed
//! flow's boundary ports, and started. Teardown stops and disconnects them
//! but leaves the nodes in place for the next test case to update.

use crate::assertion::AssertionReport;
use crate::error::{FlowTestError, Result};
use crate::lifecycle::SandboxContext;
use crate::platform::{Component, Connection, FlowPlatform, ProcessorSpec};
use crate::template::{Bindings, HarnessRole, HarnessTemplate, Placeholder};
use crate::types::AttributeMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Processor type that caches attribute state across property updates.
pub const UPDATE_ATTRIBUTE_TYPE: &str = "org.apache.nifi.processors.attributes.UpdateAttribute";

/// Per-test-case values fed into the template.
#[derive(Debug, Clone, Default)]
pub struct HarnessInputs {
    /// Input content injected by the content injector.
    pub input_content: String,
    /// Expected output content.
    pub expected_output_content: String,
    /// Attributes set by the attribute mapper.
    pub input_attributes: AttributeMap,
    /// Synthesized assertion expressions.
    pub report: Option<AssertionReport>,
    /// Roles not built for this test case.
    pub skip: BTreeSet<HarnessRole>,
}

/// Live harness nodes for one test case.
#[derive(Debug, Clone, Default)]
pub struct HarnessGraph {
    /// Harness-created nodes by role.
    pub nodes: BTreeMap<HarnessRole, Component>,
    /// Connections created while wiring.
    pub connections: Vec<Connection>,
}

impl HarnessGraph {
    /// Harness-created nodes in chain order.
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &Component> {
        HarnessRole::CHAIN
            .into_iter()
            .filter_map(move |role| self.nodes.get(&role))
    }

    /// Returns true if nothing was created.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pairs consecutive present entries of `order`, skipping pairs whose
/// source is `no_outgoing`.
///
/// With order `[A, B, C]` and `B` absent the result is `[(A, C)]`.
pub fn linear_chain<T: Copy + PartialEq>(
    order: &[T],
    is_present: impl Fn(T) -> bool,
    no_outgoing: Option<T>,
) -> Vec<(T, T)> {
    let present: Vec<T> = order.iter().copied().filter(|t| is_present(*t)).collect();
    present
        .windows(2)
        .filter(|pair| Some(pair[0]) != no_outgoing)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

/// Harness links for the roles present in a test case.
///
/// The input port never gets an outgoing harness link: data crosses from
/// the input port to the output port inside the deployed flow.
pub fn chain_links(present: &BTreeSet<HarnessRole>) -> Vec<(HarnessRole, HarnessRole)> {
    linear_chain(
        &HarnessRole::CHAIN,
        |role| present.contains(&role),
        Some(HarnessRole::InputPort),
    )
}

/// Builds and tears down harness graphs from a template.
pub struct HarnessBuilder<'a> {
    platform: &'a dyn FlowPlatform,
    template: &'a HarnessTemplate,
    test_api_port: u16,
}

impl<'a> HarnessBuilder<'a> {
    /// Creates a builder.
    pub fn new(platform: &'a dyn FlowPlatform, template: &'a HarnessTemplate, test_api_port: u16) -> Self {
        Self {
            platform,
            template,
            test_api_port,
        }
    }

    fn bindings(&self, ctx: &SandboxContext<'_>, inputs: &HarnessInputs) -> Bindings {
        let report = inputs
            .report
            .clone()
            .unwrap_or_else(|| AssertionReport::from_expected(&AttributeMap::new()));

        Bindings::new()
            .with(Placeholder::TestApiPort, self.test_api_port)
            .with(Placeholder::ContextMapId, ctx.context_map.id.clone())
            .with(Placeholder::InputContent, inputs.input_content.clone())
            .with(
                Placeholder::ExpectedOutputContent,
                inputs.expected_output_content.clone(),
            )
            .with(Placeholder::InputAttributes, inputs.input_attributes.to_json())
            .with(Placeholder::AttributesMatchExpression, report.flow_attributes_match)
            .with(Placeholder::ContentMatchExpression, report.flow_content_match)
            .with(
                Placeholder::FlowFileAttributes,
                report.flow_file_attributes.to_json(),
            )
    }

    /// Creates or updates every non-skipped node, wires the chain and starts
    /// everything, deployed group last.
    ///
    /// Nodes are recorded in `graph` as soon as they exist so a failed build
    /// can still be torn down.
    pub fn build(
        &self,
        ctx: &SandboxContext<'_>,
        inputs: &HarnessInputs,
        graph: &mut HarnessGraph,
    ) -> Result<()> {
        let bindings = self.bindings(ctx, inputs);

        for node in self.template.nodes() {
            if inputs.skip.contains(&node.role) {
                debug!(node = node.role.as_str(), "Skipping harness node");
                continue;
            }
            let spec = node.render(&bindings)?;
            let component = self.upsert(ctx.sandbox.id.as_str(), &spec)?;
            graph.nodes.insert(node.role, component);
        }

        let mut present: BTreeSet<HarnessRole> = graph.nodes.keys().copied().collect();
        present.insert(HarnessRole::InputPort);
        present.insert(HarnessRole::OutputPort);

        for (from, to) in chain_links(&present) {
            let source = self.endpoint(ctx, graph, from)?;
            let destination = self.endpoint(ctx, graph, to)?;
            debug!(from = from.as_str(), to = to.as_str(), "Connecting harness nodes");
            let connection = self
                .platform
                .create_connection(&ctx.sandbox.id, source, destination)?;
            graph.connections.push(connection);
        }

        for node in graph.ordered_nodes() {
            self.platform.set_component_running(node, true)?;
        }
        self.platform
            .set_process_group_running(&ctx.deployed.id, true)?;

        info!(
            nodes = graph.nodes.len(),
            connections = graph.connections.len(),
            "Harness started"
        );
        Ok(())
    }

    fn endpoint<'g>(
        &self,
        ctx: &'g SandboxContext<'_>,
        graph: &'g HarnessGraph,
        role: HarnessRole,
    ) -> Result<&'g Component> {
        match role {
            HarnessRole::InputPort => Ok(ctx.input_port),
            HarnessRole::OutputPort => Ok(ctx.output_port),
            other => graph.nodes.get(&other).ok_or_else(|| {
                FlowTestError::Template(format!("harness node '{}' was not built", other))
            }),
        }
    }

    /// Creates the node, or updates an existing node of the same name.
    ///
    /// An existing UpdateAttribute node keeps stale attribute state across
    /// updates, so it is deleted and recreated instead.
    fn upsert(&self, group_id: &str, spec: &ProcessorSpec) -> Result<Component> {
        match self.platform.find_processor(group_id, &spec.name)? {
            None => {
                debug!(node = spec.name.as_str(), "Creating harness node");
                self.platform.create_processor(group_id, spec)
            }
            Some(existing) if is_update_attribute(&existing, spec) => {
                debug!(node = spec.name.as_str(), "Recreating harness node");
                self.platform.delete_processor(&existing)?;
                self.platform.create_processor(group_id, spec)
            }
            Some(existing) => {
                debug!(node = spec.name.as_str(), "Updating harness node");
                self.platform.update_processor(&existing, &spec.properties())
            }
        }
    }

    /// Stops the harness and the deployed group, then deletes every
    /// connection attached to a harness node.
    ///
    /// Every step is attempted; the first failure is returned.
    pub fn teardown(&self, ctx: &SandboxContext<'_>, graph: &HarnessGraph) -> Result<()> {
        let mut first_error: Option<FlowTestError> = None;
        let mut record = |result: Result<()>, step: &str| {
            if let Err(e) = result {
                warn!(step = step, error = %e, "Harness teardown step failed");
                first_error.get_or_insert(e);
            }
        };

        for node in graph.ordered_nodes() {
            record(self.platform.set_component_running(node, false), "stop node");
        }
        record(
            self.platform.set_process_group_running(&ctx.deployed.id, false),
            "stop deployed group",
        );

        for node in graph.ordered_nodes() {
            match self.platform.list_connections(node) {
                Ok(connections) => {
                    for connection in &connections {
                        record(self.platform.delete_connection(connection), "delete connection");
                    }
                }
                Err(e) => record(Err(e), "list connections"),
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn is_update_attribute(existing: &Component, spec: &ProcessorSpec) -> bool {
    existing.component_type == UPDATE_ATTRIBUTE_TYPE
        || spec.processor_type == UPDATE_ATTRIBUTE_TYPE
        || spec.processor_type == "UpdateAttribute"
}

/// Attributes the harness sets on the injected flow file.
///
/// Expected output content travels as the `test.expected` attribute.
pub fn input_attributes(case_attributes: &AttributeMap, expected_output: &str) -> AttributeMap {
    let mut attributes = case_attributes.clone();
    if !expected_output.is_empty() {
        attributes.insert(
            crate::assertion::EXPECTED_CONTENT_ATTRIBUTE,
            expected_output,
        );
    }
    attributes
}
