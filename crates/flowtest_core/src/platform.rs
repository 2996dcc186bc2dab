//! Narrow interface to the remote dataflow platform.
//!
//! Everything the orchestration engine needs from NiFi and NiFi Registry goes
//! through [`FlowPlatform`]. The production implementation is
//! [`NifiClient`](crate::NifiClient); tests substitute an in-memory fake.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl Position {
    /// Creates a position.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A process group (container) on the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroup {
    /// Platform identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Enclosing group, `None` for the root.
    pub parent_id: Option<String>,
}

/// Kind of a connectable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A processor.
    Processor,
    /// A process group input port.
    InputPort,
    /// A process group output port.
    OutputPort,
}

impl ComponentKind {
    /// Name of the kind in connection source/destination descriptors.
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Processor => "PROCESSOR",
            Self::InputPort => "INPUT_PORT",
            Self::OutputPort => "OUTPUT_PORT",
        }
    }
}

/// Direction of a boundary port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// Data enters the group through it.
    Input,
    /// Data leaves the group through it.
    Output,
}

impl PortKind {
    /// The connectable kind of a port in this direction.
    pub fn component_kind(self) -> ComponentKind {
        match self {
            Self::Input => ComponentKind::InputPort,
            Self::Output => ComponentKind::OutputPort,
        }
    }
}

/// A connectable component: processor or port.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Platform identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Group the component lives in.
    pub group_id: String,
    /// Processor or port.
    pub kind: ComponentKind,
    /// Fully qualified processor type (empty for ports).
    pub component_type: String,
    /// Relationships a processor can route to (empty for ports).
    pub relationships: Vec<String>,
    /// Current configuration properties (processors only).
    pub properties: Map<String, Value>,
}

/// What a controller-service reference points back from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceType {
    /// Another controller service references this one.
    ControllerService,
    /// A processor references this service.
    Processor,
    /// A reporting task references this service.
    ReportingTask,
    /// Any other referencing component kind.
    Other(String),
}

impl ReferenceType {
    /// Parses the platform's reference type string.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ControllerService" => Self::ControllerService,
            "Processor" => Self::Processor,
            "ReportingTask" => Self::ReportingTask,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true for service-to-service references.
    pub fn is_service(&self) -> bool {
        matches!(self, Self::ControllerService)
    }
}

/// A component that references a controller service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencingComponent {
    /// Platform identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of the referencing component.
    pub reference_type: ReferenceType,
    /// Components referencing this one in turn (services only).
    pub referencing_components: Vec<ReferencingComponent>,
}

/// A controller (shared) service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerService {
    /// Platform identifier.
    pub id: String,
    /// Display name; names are not unique across groups.
    pub name: String,
    /// Fully qualified service type.
    pub service_type: String,
    /// Group the service is scoped to.
    pub group_id: String,
    /// Components holding a reference to this service.
    pub referencing_components: Vec<ReferencingComponent>,
}

/// A connection between two components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Platform identifier.
    pub id: String,
    /// Group holding the connection.
    pub group_id: String,
    /// Source component id.
    pub source_id: String,
    /// Destination component id.
    pub destination_id: String,
}

/// A parameter context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterContext {
    /// Platform identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A deployable flow version resolved from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowVersion {
    /// Registry client id on the platform.
    pub registry_id: String,
    /// Bucket id in the registry.
    pub bucket_id: String,
    /// Flow id in the bucket.
    pub flow_id: String,
    /// Flow name.
    pub flow_name: String,
    /// Version number.
    pub version: u32,
}

/// Everything needed to create a processor.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorSpec {
    /// Display name, also the lookup key for later updates.
    pub name: String,
    /// Processor type, fully qualified or simple name.
    pub processor_type: String,
    /// Canvas position.
    pub position: Position,
    /// Processor configuration object (`properties`, scheduling, ...).
    pub config: Value,
}

impl ProcessorSpec {
    /// The `properties` object of the configuration, if any.
    pub fn properties(&self) -> Map<String, Value> {
        self.config
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

/// Canvas, controller-service and registry operations the engine relies on.
///
/// All calls are blocking. Implementations report failures as
/// [`FlowTestError::Platform`](crate::FlowTestError::Platform) or
/// [`FlowTestError::NotFound`](crate::FlowTestError::NotFound).
pub trait FlowPlatform {
    /// The root process group.
    fn root_group(&self) -> Result<ProcessGroup>;

    /// Finds a process group anywhere on the canvas by exact name.
    fn find_process_group(&self, name: &str) -> Result<Option<ProcessGroup>>;

    /// Creates an empty process group.
    fn create_process_group(
        &self,
        parent_id: &str,
        name: &str,
        position: Position,
    ) -> Result<ProcessGroup>;

    /// Deletes a process group with everything inside it, stopping and
    /// emptying queues first.
    fn delete_process_group(&self, group: &ProcessGroup) -> Result<()>;

    /// Starts or stops every component inside a process group.
    fn set_process_group_running(&self, group_id: &str, running: bool) -> Result<()>;

    /// Resolves a flow name and version in the configured bucket.
    fn resolve_flow(&self, flow_name: &str, version: u32) -> Result<FlowVersion>;

    /// Deploys a flow version as a new child group.
    fn deploy_flow(
        &self,
        parent_id: &str,
        flow: &FlowVersion,
        position: Position,
    ) -> Result<ProcessGroup>;

    /// Exports a process group as a template, returning the template id.
    fn create_template(&self, group: &ProcessGroup, name: &str, description: &str)
        -> Result<String>;

    /// Instantiates a template into a group, returning the created child group.
    fn instantiate_template(
        &self,
        parent_id: &str,
        template_id: &str,
        position: Position,
    ) -> Result<ProcessGroup>;

    /// Deletes a template.
    fn delete_template(&self, template_id: &str) -> Result<()>;

    /// Creates a controller service scoped to a group.
    fn create_controller_service(
        &self,
        group_id: &str,
        service_type: &str,
        name: &str,
    ) -> Result<ControllerService>;

    /// Lists controller services of a group, optionally including descendants.
    fn list_controller_services(
        &self,
        group_id: &str,
        recursive: bool,
    ) -> Result<Vec<ControllerService>>;

    /// Enables or disables a controller service.
    fn set_controller_service_enabled(
        &self,
        service: &ControllerService,
        enabled: bool,
    ) -> Result<()>;

    /// Lists boundary ports of a group.
    fn list_ports(&self, group_id: &str, kind: PortKind) -> Result<Vec<Component>>;

    /// Creates a boundary port.
    fn create_port(
        &self,
        group_id: &str,
        kind: PortKind,
        name: &str,
        position: Position,
    ) -> Result<Component>;

    /// Finds a processor directly inside a group by exact name.
    fn find_processor(&self, group_id: &str, name: &str) -> Result<Option<Component>>;

    /// Creates a processor.
    fn create_processor(&self, group_id: &str, spec: &ProcessorSpec) -> Result<Component>;

    /// Replaces a processor's configuration properties.
    fn update_processor(
        &self,
        processor: &Component,
        properties: &Map<String, Value>,
    ) -> Result<Component>;

    /// Deletes a processor.
    fn delete_processor(&self, processor: &Component) -> Result<()>;

    /// Lists processors below a group that declare sensitive properties.
    fn list_sensitive_processors(&self, group_id: &str) -> Result<Vec<Component>>;

    /// Starts or stops a processor or port.
    fn set_component_running(&self, component: &Component, running: bool) -> Result<()>;

    /// Connects two components inside `group_id`, selecting every relationship
    /// of a processor source.
    fn create_connection(
        &self,
        group_id: &str,
        source: &Component,
        destination: &Component,
    ) -> Result<Connection>;

    /// Lists connections whose source or destination is `component`.
    fn list_connections(&self, component: &Component) -> Result<Vec<Connection>>;

    /// Deletes a connection, dropping queued data.
    fn delete_connection(&self, connection: &Connection) -> Result<()>;

    /// Lists every parameter context on the platform.
    fn list_parameter_contexts(&self) -> Result<Vec<ParameterContext>>;

    /// Deletes a parameter context.
    fn delete_parameter_context(&self, context: &ParameterContext) -> Result<()>;
}
