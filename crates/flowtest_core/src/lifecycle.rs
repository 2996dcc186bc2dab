//! Flow sandbox lifecycle.
//!
//! One [`FlowLifecycle`] per flow batch. Setup walks the state machine
//!
//! ```text
//! Uninitialized -> SandboxCreated -> ServicesEnabled -> PortsResolved -> Ready
//! ```
//!
//! and teardown walks `ServicesDisabled -> SandboxDeleted -> Done` from
//! whatever state setup reached.

use crate::error::{FlowTestError, Result};
use crate::overrides::{apply_overrides, SensitiveOverride};
use crate::platform::{Component, ControllerService, FlowPlatform, PortKind, Position, ProcessGroup};
use crate::resolver::{self, ServiceOrder};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Service type shared by the request and response handler nodes.
pub const CONTEXT_MAP_TYPE: &str = "org.apache.nifi.http.StandardHttpContextMap";

/// Name of the sandbox's context map service.
pub const CONTEXT_MAP_NAME: &str = "testing map";

/// Where the flow under test is placed inside the sandbox.
pub const DEPLOY_POSITION: Position = Position::new(500.0, 1000.0);

/// Sandbox groups are placed randomly in `0..CANVAS_SPREAD` on both axes.
const CANVAS_SPREAD: u32 = 4000;

/// Lifecycle state of a flow sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing exists on the platform yet.
    Uninitialized,
    /// Sandbox group and context map exist; the flow is deployed.
    SandboxCreated,
    /// Every service below the sandbox is enabled.
    ServicesEnabled,
    /// Boundary ports exist and run.
    PortsResolved,
    /// Test cases can run.
    Ready,
    /// Services are disabled.
    ServicesDisabled,
    /// The sandbox group is gone.
    SandboxDeleted,
    /// Teardown finished.
    Done,
}

impl LifecycleState {
    fn is_valid_transition(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Uninitialized, SandboxCreated)
                | (SandboxCreated, ServicesEnabled)
                | (ServicesEnabled, PortsResolved)
                | (PortsResolved, Ready)
                | (
                    Uninitialized | SandboxCreated | ServicesEnabled | PortsResolved | Ready,
                    ServicesDisabled
                )
                | (ServicesDisabled, SandboxDeleted)
                | (SandboxDeleted, Done)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How the flow under test ended up in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Deployment {
    /// The registry version as deployed.
    Full,
    /// The aggregate flow was replaced by a copy of one of its children.
    Substituted {
        /// Name of the child group under test.
        child: String,
    },
    /// Substitution failed; the full aggregate flow is tested instead.
    Degraded {
        /// Why substitution failed.
        reason: String,
    },
}

impl Deployment {
    /// Returns true for a degraded deployment.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Settings the lifecycle needs from the run configuration.
#[derive(Debug, Clone, Default)]
pub struct LifecycleOptions {
    /// Flow name -> registry version.
    pub versions: BTreeMap<String, u32>,
    /// Flow whose full deployment is replaced by a child copy.
    pub aggregate_flow: String,
    /// Child group tested instead of the aggregate flow.
    pub aggregate_child: String,
    /// Sensitive-property overrides for the deployed flow.
    pub overrides: Vec<SensitiveOverride>,
    /// Delete every parameter context on the platform at teardown.
    pub purge_parameter_contexts: bool,
}

/// Borrowed view of a ready sandbox, passed down to test-case execution.
#[derive(Debug, Clone, Copy)]
pub struct SandboxContext<'a> {
    /// Flow under test.
    pub flow_name: &'a str,
    /// Sandbox group holding the harness.
    pub sandbox: &'a ProcessGroup,
    /// Context map shared by the request and response handlers.
    pub context_map: &'a ControllerService,
    /// Group holding the flow under test.
    pub deployed: &'a ProcessGroup,
    /// Input port of the deployed group.
    pub input_port: &'a Component,
    /// Output port of the deployed group.
    pub output_port: &'a Component,
    /// Enabled services in enable order.
    pub services: &'a ServiceOrder,
}

/// Sandbox owner for one flow batch.
pub struct FlowLifecycle<'a> {
    platform: &'a dyn FlowPlatform,
    options: &'a LifecycleOptions,
    flow_name: String,
    state: LifecycleState,
    sandbox: Option<ProcessGroup>,
    context_map: Option<ControllerService>,
    deployed: Option<ProcessGroup>,
    deployment: Option<Deployment>,
    services: ServiceOrder,
    input_port: Option<Component>,
    output_port: Option<Component>,
    setup_duration: Duration,
    teardown_duration: Duration,
}

impl<'a> FlowLifecycle<'a> {
    /// Creates an uninitialized lifecycle for `flow_name`.
    pub fn new(platform: &'a dyn FlowPlatform, options: &'a LifecycleOptions, flow_name: &str) -> Self {
        Self {
            platform,
            options,
            flow_name: flow_name.to_string(),
            state: LifecycleState::Uninitialized,
            sandbox: None,
            context_map: None,
            deployed: None,
            deployment: None,
            services: ServiceOrder::default(),
            input_port: None,
            output_port: None,
            setup_duration: Duration::ZERO,
            teardown_duration: Duration::ZERO,
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Name of the sandbox group for this flow.
    pub fn sandbox_name(&self) -> String {
        format!("{}-test-pg", self.flow_name)
    }

    /// How the flow was deployed, once it was.
    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    /// Wall-clock time spent in setup.
    pub fn setup_duration(&self) -> Duration {
        self.setup_duration
    }

    /// Wall-clock time spent in teardown.
    pub fn teardown_duration(&self) -> Duration {
        self.teardown_duration
    }

    fn set_state(&mut self, to: LifecycleState) -> Result<()> {
        if !self.state.is_valid_transition(to) {
            return Err(FlowTestError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Brings the sandbox to `Ready`.
    ///
    /// On error the lifecycle stays in the last state reached and
    /// [`teardown`](Self::teardown) cleans up from there.
    pub fn setup(&mut self) -> Result<()> {
        let start = Instant::now();
        info!(flow = self.flow_name.as_str(), "Setting up flow sandbox");
        let result = self.run_setup();
        self.setup_duration = start.elapsed();
        if let Err(e) = &result {
            error!(flow = self.flow_name.as_str(), state = %self.state, error = %e, "Flow setup failed");
        }
        result
    }

    fn run_setup(&mut self) -> Result<()> {
        let platform = self.platform;

        // Uninitialized -> SandboxCreated
        let version = *self
            .options
            .versions
            .get(&self.flow_name)
            .ok_or_else(|| FlowTestError::FlowVersionNotMapped {
                flow: self.flow_name.clone(),
            })?;
        let flow = platform.resolve_flow(&self.flow_name, version)?;
        info!(flow = self.flow_name.as_str(), version, "Resolved flow version");

        let root = platform.root_group()?;
        let sandbox = platform.create_process_group(&root.id, &self.sandbox_name(), random_position())?;
        self.sandbox = Some(sandbox.clone());

        let context_map =
            platform.create_controller_service(&sandbox.id, CONTEXT_MAP_TYPE, CONTEXT_MAP_NAME)?;
        self.context_map = Some(context_map.clone());
        platform.set_controller_service_enabled(&context_map, true)?;

        let deployed = platform.deploy_flow(&sandbox.id, &flow, DEPLOY_POSITION)?;
        self.deployed = Some(deployed.clone());
        self.deployment = Some(Deployment::Full);

        if self.flow_name == self.options.aggregate_flow {
            self.substitute_aggregate(&sandbox, deployed);
        }
        self.set_state(LifecycleState::SandboxCreated)?;

        // -> ServicesEnabled
        self.services = resolver::resolve_order(platform, &sandbox.id)?;
        let enabled = resolver::enable_services(platform, &sandbox.id, &self.services);
        info!(flow = self.flow_name.as_str(), enabled, "Enabled controller services");
        self.set_state(LifecycleState::ServicesEnabled)?;

        // -> PortsResolved
        let deployed = self
            .deployed
            .clone()
            .ok_or_else(|| FlowTestError::platform("deploy flow", "no deployed group"))?;
        let input = self.resolve_port(&deployed, PortKind::Input)?;
        self.input_port = Some(input);
        let output = self.resolve_port(&deployed, PortKind::Output)?;
        self.output_port = Some(output);
        apply_overrides(platform, &deployed.id, &self.options.overrides)?;
        self.set_state(LifecycleState::PortsResolved)?;

        self.set_state(LifecycleState::Ready)
    }

    /// Replaces the deployed aggregate flow with a template copy of its child.
    ///
    /// Failure leaves the full deployment in place, marked degraded.
    fn substitute_aggregate(&mut self, sandbox: &ProcessGroup, full: ProcessGroup) {
        let child_name = self.options.aggregate_child.clone();
        match self.copy_child(sandbox, &full, &child_name) {
            Ok(copy) => {
                info!(flow = self.flow_name.as_str(), child = child_name.as_str(), "Testing child group instead of aggregate flow");
                self.deployed = Some(copy);
                self.deployment = Some(Deployment::Substituted { child: child_name });
            }
            Err(e) => {
                warn!(
                    flow = self.flow_name.as_str(),
                    child = child_name.as_str(),
                    error = %e,
                    "Aggregate flow substitution failed, testing the full deployment (degraded)"
                );
                self.deployment = Some(Deployment::Degraded {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn copy_child(
        &self,
        sandbox: &ProcessGroup,
        full: &ProcessGroup,
        child_name: &str,
    ) -> Result<ProcessGroup> {
        let platform = self.platform;
        let child = platform
            .find_process_group(child_name)?
            .ok_or_else(|| FlowTestError::NotFound {
                kind: "process group",
                name: child_name.to_string(),
            })?;

        let template_name = child_name.to_lowercase();
        let template_id =
            platform.create_template(&child, &template_name, &format!("{} template", template_name))?;
        let copy = platform.instantiate_template(&sandbox.id, &template_id, DEPLOY_POSITION);
        let cleanup = platform.delete_template(&template_id);
        let copy = copy?;

        // On failure only the full deployment may remain in the sandbox
        if let Err(e) = cleanup.and_then(|()| platform.delete_process_group(full)) {
            if let Err(discard) = platform.delete_process_group(&copy) {
                warn!(
                    flow = self.flow_name.as_str(),
                    group = copy.name.as_str(),
                    error = %discard,
                    "Failed to discard child copy"
                );
            }
            return Err(e);
        }
        Ok(copy)
    }

    /// Uses the group's existing port or creates one, and starts it.
    fn resolve_port(&self, deployed: &ProcessGroup, kind: PortKind) -> Result<Component> {
        let mut ports = self.platform.list_ports(&deployed.id, kind)?;
        let port = match ports.pop() {
            Some(port) => port,
            None => {
                let name = match kind {
                    PortKind::Input => format!("input-port-to-{}", self.flow_name),
                    PortKind::Output => format!("output-port-from-{}", self.flow_name),
                };
                info!(flow = self.flow_name.as_str(), port = name.as_str(), "Creating boundary port");
                self.platform
                    .create_port(&deployed.id, kind, &name, random_position())?
            }
        };
        self.platform.set_component_running(&port, true)?;
        Ok(port)
    }

    /// The ready sandbox.
    pub fn context(&self) -> Result<SandboxContext<'_>> {
        let not_ready = || FlowTestError::InvalidStateTransition {
            from: self.state.to_string(),
            to: LifecycleState::Ready.to_string(),
        };
        if self.state != LifecycleState::Ready {
            return Err(not_ready());
        }
        Ok(SandboxContext {
            flow_name: &self.flow_name,
            sandbox: self.sandbox.as_ref().ok_or_else(not_ready)?,
            context_map: self.context_map.as_ref().ok_or_else(not_ready)?,
            deployed: self.deployed.as_ref().ok_or_else(not_ready)?,
            input_port: self.input_port.as_ref().ok_or_else(not_ready)?,
            output_port: self.output_port.as_ref().ok_or_else(not_ready)?,
            services: &self.services,
        })
    }

    /// Disables services, deletes the sandbox and purges parameter contexts.
    ///
    /// Works from any state setup reached. Service failures are logged and
    /// skipped; group and parameter-context failures are returned.
    pub fn teardown(&mut self) -> Result<()> {
        let start = Instant::now();
        info!(flow = self.flow_name.as_str(), state = %self.state, "Tearing down flow sandbox");
        let result = self.run_teardown();
        self.teardown_duration = start.elapsed();
        result
    }

    fn run_teardown(&mut self) -> Result<()> {
        let platform = self.platform;
        self.set_state(LifecycleState::ServicesDisabled)?;

        if let Some(sandbox) = self.sandbox.clone() {
            if !self.services.is_empty() {
                let disabled = resolver::disable_services(platform, &sandbox.id, &self.services);
                info!(flow = self.flow_name.as_str(), disabled, "Disabled controller services");
            } else if let Some(context_map) = &self.context_map {
                if let Err(e) = platform.set_controller_service_enabled(context_map, false) {
                    warn!(error = %e, "Failed to disable context map");
                }
            }

            platform.delete_process_group(&sandbox)?;
            info!(flow = self.flow_name.as_str(), group = sandbox.name.as_str(), "Deleted sandbox group");
        }
        self.set_state(LifecycleState::SandboxDeleted)?;

        // Contexts are only created by a deployment
        if self.sandbox.is_some() && self.options.purge_parameter_contexts {
            let contexts = platform.list_parameter_contexts()?;
            if !contexts.is_empty() {
                warn!(
                    count = contexts.len(),
                    "Deleting every parameter context on the platform"
                );
            }
            for context in &contexts {
                platform.delete_parameter_context(context)?;
            }
        }

        self.sandbox = None;
        self.context_map = None;
        self.deployed = None;
        self.input_port = None;
        self.output_port = None;
        self.set_state(LifecycleState::Done)
    }
}

fn random_position() -> Position {
    let mut rng = rand::thread_rng();
    Position::new(
        f64::from(rng.gen_range(0..CANVAS_SPREAD)),
        f64::from(rng.gen_range(0..CANVAS_SPREAD)),
    )
}
