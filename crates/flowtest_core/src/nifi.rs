//! [`FlowPlatform`] over the NiFi REST API.
//!
//! Every mutating call carries a revision `{clientId, version}`; the client id
//! is a v4 UUID generated once per client. Revisions are read fresh before
//! each update so concurrent edits on the canvas surface as platform errors
//! instead of silent overwrites.

use crate::config::{NifiConfig, RegistryConfig};
use crate::error::{FlowTestError, Result};
use crate::platform::{
    Component, ComponentKind, Connection, ControllerService, FlowPlatform, FlowVersion,
    ParameterContext, PortKind, Position, ProcessGroup, ProcessorSpec, ReferenceType,
    ReferencingComponent,
};
use serde_json::{json, Map, Value};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Polls of an asynchronous drop request before giving up.
const DROP_POLL_ATTEMPTS: usize = 50;
const DROP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Attempts at deleting a group whose services are still disabling.
const DELETE_ATTEMPTS: usize = 10;
const DELETE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Blocking NiFi REST client.
pub struct NifiClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
    client_id: String,
    registry: RegistryConfig,
}

impl NifiClient {
    /// Connects to the API at `nifi.url`, logging in when credentials are set.
    pub fn new(nifi: &NifiConfig, registry: &RegistryConfig) -> Result<Self> {
        let agent = if nifi.verify_tls {
            ureq::Agent::new_with_defaults()
        } else {
            warn!(url = nifi.url.as_str(), "TLS certificate verification disabled");
            let config = ureq::Agent::config_builder()
                .tls_config(
                    ureq::tls::TlsConfig::builder()
                        .disable_verification(true)
                        .build(),
                )
                .build();
            ureq::Agent::new_with_config(config)
        };

        let mut client = Self {
            agent,
            base_url: nifi.url.trim_end_matches('/').to_string(),
            token: None,
            client_id: Uuid::new_v4().to_string(),
            registry: registry.clone(),
        };

        if let (Some(username), Some(password)) = (&nifi.username, &nifi.password) {
            client.token = Some(client.login(username, password)?);
            info!(url = client.base_url.as_str(), username = username.as_str(), "Logged in to NiFi");
        }
        Ok(client)
    }

    /// Client id sent with every revision.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn login(&self, username: &str, password: &str) -> Result<String> {
        let url = self.url("/access/token");
        self.agent
            .post(&url)
            .send_form([("username", username), ("password", password)])
            .map_err(|e| FlowTestError::platform("login", e))?
            .into_body()
            .read_to_string()
            .map_err(|e| FlowTestError::platform("login", e))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    fn get(&self, operation: &str, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path);
        debug!(operation, url = url.as_str(), "GET");
        let mut request = self.authorize(self.agent.get(&url));
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        request
            .call()
            .map_err(|e| FlowTestError::platform(operation, e))?
            .into_body()
            .read_json::<Value>()
            .map_err(|e| FlowTestError::platform(operation, e))
    }

    fn post(&self, operation: &str, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        debug!(operation, url = url.as_str(), "POST");
        self.authorize(self.agent.post(&url))
            .send_json(body)
            .map_err(|e| FlowTestError::platform(operation, e))?
            .into_body()
            .read_json::<Value>()
            .map_err(|e| FlowTestError::platform(operation, e))
    }

    fn put(&self, operation: &str, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        debug!(operation, url = url.as_str(), "PUT");
        self.authorize(self.agent.put(&url))
            .send_json(body)
            .map_err(|e| FlowTestError::platform(operation, e))?
            .into_body()
            .read_json::<Value>()
            .map_err(|e| FlowTestError::platform(operation, e))
    }

    fn delete(&self, operation: &str, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path);
        debug!(operation, url = url.as_str(), "DELETE");
        let mut request = self.authorize(self.agent.delete(&url));
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        request
            .call()
            .map_err(|e| FlowTestError::platform(operation, e))?
            .into_body()
            .read_json::<Value>()
            .map_err(|e| FlowTestError::platform(operation, e))
    }

    /// Deletes the entity at `path` using its current revision.
    fn delete_entity(&self, operation: &str, path: &str) -> Result<()> {
        let entity = self.get(operation, path, &[])?;
        let version = revision_version(&entity).to_string();
        self.delete(
            operation,
            path,
            &[("version", version.as_str()), ("clientId", self.client_id.as_str())],
        )?;
        Ok(())
    }

    fn revision(&self, entity: &Value) -> Value {
        json!({ "clientId": self.client_id, "version": revision_version(entity) })
    }

    fn new_revision(&self) -> Value {
        json!({ "clientId": self.client_id, "version": 0 })
    }

    /// Posts a drop request and waits for it to finish.
    fn drop_queued(&self, operation: &str, path: &str) -> Result<()> {
        let created = self.post(operation, path, &json!({}))?;
        let request_id = str_at(&created, "/dropRequest/id")?;
        let request_path = format!("{}/{}", path, request_id);

        for _ in 0..DROP_POLL_ATTEMPTS {
            let status = self.get(operation, &request_path, &[])?;
            if status
                .pointer("/dropRequest/finished")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                break;
            }
            thread::sleep(DROP_POLL_INTERVAL);
        }
        self.delete(operation, &request_path, &[])?;
        Ok(())
    }

    fn registry_client_id(&self) -> Result<String> {
        let registries = self.get("list registry clients", "/flow/registries", &[])?;
        if let Some(id) = registries
            .get("registries")
            .and_then(Value::as_array)
            .and_then(|all| all.first())
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
        {
            return Ok(id.to_string());
        }

        info!(
            name = self.registry.client_name.as_str(),
            url = self.registry.url.as_str(),
            "Registering registry client"
        );
        let body = json!({
            "revision": self.new_revision(),
            "component": { "name": self.registry.client_name, "uri": self.registry.url },
        });
        let created = self.post("create registry client", "/controller/registry-clients", &body)?;
        str_at(&created, "/id")
    }

    fn resolve_processor_type(&self, processor_type: &str) -> Result<(String, Option<Value>)> {
        let types = self.get("list processor types", "/flow/processor-types", &[])?;
        let found = types
            .get("processorTypes")
            .and_then(Value::as_array)
            .and_then(|all| find_processor_type(all, processor_type));
        match found {
            Some(entry) => Ok((
                entry
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or(processor_type)
                    .to_string(),
                entry.get("bundle").cloned(),
            )),
            None => Err(FlowTestError::NotFound {
                kind: "processor type",
                name: processor_type.to_string(),
            }),
        }
    }

    fn component_path(kind: ComponentKind) -> &'static str {
        match kind {
            ComponentKind::Processor => "processors",
            ComponentKind::InputPort => "input-ports",
            ComponentKind::OutputPort => "output-ports",
        }
    }

    fn group_connections(&self, group_id: &str) -> Result<Vec<Connection>> {
        let listing = self.get(
            "list connections",
            &format!("/process-groups/{}/connections", group_id),
            &[],
        )?;
        entities(&listing, "connections")
            .iter()
            .map(parse_connection)
            .collect()
    }
}

impl FlowPlatform for NifiClient {
    fn root_group(&self) -> Result<ProcessGroup> {
        let flow = self.get("root group", "/flow/process-groups/root", &[])?;
        let id = str_at(&flow, "/processGroupFlow/id")?;
        let entity = self.get("root group", &format!("/process-groups/{}", id), &[])?;
        parse_process_group(&entity)
    }

    fn find_process_group(&self, name: &str) -> Result<Option<ProcessGroup>> {
        let results = self.get("search process groups", "/flow/search-results", &[("q", name)])?;
        let hit = results
            .pointer("/searchResultsDTO/processGroupResults")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|r| r.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|r| r.get("id").and_then(Value::as_str));

        match hit {
            Some(id) => {
                let entity =
                    self.get("get process group", &format!("/process-groups/{}", id), &[])?;
                parse_process_group(&entity).map(Some)
            }
            None => Ok(None),
        }
    }

    fn create_process_group(
        &self,
        parent_id: &str,
        name: &str,
        position: Position,
    ) -> Result<ProcessGroup> {
        let body = json!({
            "revision": self.new_revision(),
            "component": { "name": name, "position": position },
        });
        let created = self.post(
            "create process group",
            &format!("/process-groups/{}/process-groups", parent_id),
            &body,
        )?;
        parse_process_group(&created)
    }

    fn delete_process_group(&self, group: &ProcessGroup) -> Result<()> {
        self.set_process_group_running(&group.id, false)?;
        self.put(
            "disable group services",
            &format!("/flow/process-groups/{}/controller-services", group.id),
            &json!({ "id": group.id, "state": "DISABLED" }),
        )?;
        self.drop_queued(
            "empty group queues",
            &format!("/process-groups/{}/empty-all-connections-requests", group.id),
        )?;

        let path = format!("/process-groups/{}", group.id);
        let mut attempt = 1;
        loop {
            match self.delete_entity("delete process group", &path) {
                Ok(()) => break,
                Err(e) if attempt < DELETE_ATTEMPTS => {
                    debug!(group = group.name.as_str(), attempt, error = %e, "Retrying group delete");
                    attempt += 1;
                    thread::sleep(DELETE_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
        info!(group = group.name.as_str(), "Deleted process group");
        Ok(())
    }

    fn set_process_group_running(&self, group_id: &str, running: bool) -> Result<()> {
        let state = if running { "RUNNING" } else { "STOPPED" };
        self.put(
            "schedule process group",
            &format!("/flow/process-groups/{}", group_id),
            &json!({ "id": group_id, "state": state }),
        )?;
        Ok(())
    }

    fn resolve_flow(&self, flow_name: &str, version: u32) -> Result<FlowVersion> {
        let registry_id = self.registry_client_id()?;

        let buckets = self.get(
            "list buckets",
            &format!("/flow/registries/{}/buckets", registry_id),
            &[],
        )?;
        let bucket_id = entities(&buckets, "buckets")
            .iter()
            .find(|b| b.pointer("/bucket/name").and_then(Value::as_str) == Some(self.registry.bucket.as_str()))
            .and_then(|b| b.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| FlowTestError::NotFound {
                kind: "bucket",
                name: self.registry.bucket.clone(),
            })?;

        let flows = self.get(
            "list flows",
            &format!("/flow/registries/{}/buckets/{}/flows", registry_id, bucket_id),
            &[],
        )?;
        let flow_id = entities(&flows, "versionedFlows")
            .iter()
            .find(|f| f.pointer("/versionedFlow/flowName").and_then(Value::as_str) == Some(flow_name))
            .and_then(|f| f.pointer("/versionedFlow/flowId").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| FlowTestError::NotFound {
                kind: "flow",
                name: flow_name.to_string(),
            })?;

        let versions = self.get(
            "list flow versions",
            &format!(
                "/flow/registries/{}/buckets/{}/flows/{}/versions",
                registry_id, bucket_id, flow_id
            ),
            &[],
        )?;
        let known = entities(&versions, "versionedFlowSnapshotMetadataSet")
            .iter()
            .filter_map(|v| {
                v.pointer("/versionedFlowSnapshotMetadata/version")
                    .and_then(Value::as_u64)
            })
            .any(|v| v == u64::from(version));
        if !known {
            return Err(FlowTestError::NotFound {
                kind: "flow version",
                name: format!("{} v{}", flow_name, version),
            });
        }

        Ok(FlowVersion {
            registry_id,
            bucket_id,
            flow_id,
            flow_name: flow_name.to_string(),
            version,
        })
    }

    fn deploy_flow(
        &self,
        parent_id: &str,
        flow: &FlowVersion,
        position: Position,
    ) -> Result<ProcessGroup> {
        let body = json!({
            "revision": self.new_revision(),
            "component": {
                "position": position,
                "versionControlInformation": {
                    "registryId": flow.registry_id,
                    "bucketId": flow.bucket_id,
                    "flowId": flow.flow_id,
                    "version": flow.version,
                },
            },
        });
        let deployed = self.post(
            "deploy flow",
            &format!("/process-groups/{}/process-groups", parent_id),
            &body,
        )?;
        let group = parse_process_group(&deployed)?;
        info!(flow = flow.flow_name.as_str(), version = flow.version, group = group.id.as_str(), "Deployed flow version");
        Ok(group)
    }

    fn create_template(&self, group: &ProcessGroup, name: &str, description: &str) -> Result<String> {
        let parent_id = group.parent_id.as_deref().ok_or_else(|| {
            FlowTestError::platform("create template", "cannot template the root group")
        })?;
        let entity = self.get("create template", &format!("/process-groups/{}", group.id), &[])?;

        let mut groups = Map::new();
        groups.insert(group.id.clone(), self.revision(&entity));
        let snippet = self.post(
            "create snippet",
            "/snippets",
            &json!({ "snippet": { "parentGroupId": parent_id, "processGroups": groups } }),
        )?;
        let snippet_id = str_at(&snippet, "/snippet/id")?;

        let template = self.post(
            "create template",
            &format!("/process-groups/{}/templates", parent_id),
            &json!({ "name": name, "description": description, "snippetId": snippet_id }),
        )?;
        str_at(&template, "/template/id")
    }

    fn instantiate_template(
        &self,
        parent_id: &str,
        template_id: &str,
        position: Position,
    ) -> Result<ProcessGroup> {
        let flow = self.post(
            "instantiate template",
            &format!("/process-groups/{}/template-instance", parent_id),
            &json!({ "templateId": template_id, "originX": position.x, "originY": position.y }),
        )?;
        let group = flow
            .pointer("/flow/processGroups")
            .and_then(Value::as_array)
            .and_then(|groups| groups.first())
            .ok_or(FlowTestError::MissingResponseField("flow.processGroups"))?;
        parse_process_group(group)
    }

    fn delete_template(&self, template_id: &str) -> Result<()> {
        self.delete("delete template", &format!("/templates/{}", template_id), &[])?;
        Ok(())
    }

    fn create_controller_service(
        &self,
        group_id: &str,
        service_type: &str,
        name: &str,
    ) -> Result<ControllerService> {
        let body = json!({
            "revision": self.new_revision(),
            "component": { "type": service_type, "name": name },
        });
        let created = self.post(
            "create controller service",
            &format!("/process-groups/{}/controller-services", group_id),
            &body,
        )?;
        parse_controller_service(&created)
    }

    fn list_controller_services(
        &self,
        group_id: &str,
        recursive: bool,
    ) -> Result<Vec<ControllerService>> {
        let listing = self.get(
            "list controller services",
            &format!("/flow/process-groups/{}/controller-services", group_id),
            &[
                ("includeAncestorGroups", "false"),
                ("includeDescendantGroups", if recursive { "true" } else { "false" }),
            ],
        )?;
        entities(&listing, "controllerServices")
            .iter()
            .map(parse_controller_service)
            .collect()
    }

    fn set_controller_service_enabled(
        &self,
        service: &ControllerService,
        enabled: bool,
    ) -> Result<()> {
        let operation = if enabled { "enable controller service" } else { "disable controller service" };
        let entity = self.get(operation, &format!("/controller-services/{}", service.id), &[])?;
        self.put(
            operation,
            &format!("/controller-services/{}/run-status", service.id),
            &json!({
                "revision": self.revision(&entity),
                "state": if enabled { "ENABLED" } else { "DISABLED" },
            }),
        )?;
        debug!(service = service.name.as_str(), enabled, "Changed controller service state");
        Ok(())
    }

    fn list_ports(&self, group_id: &str, kind: PortKind) -> Result<Vec<Component>> {
        let component_kind = kind.component_kind();
        let path = Self::component_path(component_kind);
        let listing = self.get("list ports", &format!("/process-groups/{}/{}", group_id, path), &[])?;
        let key = match kind {
            PortKind::Input => "inputPorts",
            PortKind::Output => "outputPorts",
        };
        entities(&listing, key)
            .iter()
            .map(|e| parse_component(e, component_kind))
            .collect()
    }

    fn create_port(
        &self,
        group_id: &str,
        kind: PortKind,
        name: &str,
        position: Position,
    ) -> Result<Component> {
        let component_kind = kind.component_kind();
        let body = json!({
            "revision": self.new_revision(),
            "component": { "name": name, "position": position },
        });
        let created = self.post(
            "create port",
            &format!("/process-groups/{}/{}", group_id, Self::component_path(component_kind)),
            &body,
        )?;
        parse_component(&created, component_kind)
    }

    fn find_processor(&self, group_id: &str, name: &str) -> Result<Option<Component>> {
        let listing = self.get(
            "list processors",
            &format!("/process-groups/{}/processors", group_id),
            &[],
        )?;
        entities(&listing, "processors")
            .iter()
            .find(|p| p.pointer("/component/name").and_then(Value::as_str) == Some(name))
            .map(|p| parse_component(p, ComponentKind::Processor))
            .transpose()
    }

    fn create_processor(&self, group_id: &str, spec: &ProcessorSpec) -> Result<Component> {
        let (processor_type, bundle) = self.resolve_processor_type(&spec.processor_type)?;
        let mut component = json!({
            "type": processor_type,
            "name": spec.name,
            "position": spec.position,
            "config": spec.config,
        });
        if let (Some(bundle), Some(object)) = (bundle, component.as_object_mut()) {
            object.insert("bundle".to_string(), bundle);
        }

        let created = self.post(
            "create processor",
            &format!("/process-groups/{}/processors", group_id),
            &json!({ "revision": self.new_revision(), "component": component }),
        )?;
        parse_component(&created, ComponentKind::Processor)
    }

    fn update_processor(
        &self,
        processor: &Component,
        properties: &Map<String, Value>,
    ) -> Result<Component> {
        let path = format!("/processors/{}", processor.id);
        let entity = self.get("update processor", &path, &[])?;
        let updated = self.put(
            "update processor",
            &path,
            &json!({
                "revision": self.revision(&entity),
                "component": { "id": processor.id, "config": { "properties": properties } },
            }),
        )?;
        parse_component(&updated, ComponentKind::Processor)
    }

    fn delete_processor(&self, processor: &Component) -> Result<()> {
        self.delete_entity("delete processor", &format!("/processors/{}", processor.id))
    }

    fn list_sensitive_processors(&self, group_id: &str) -> Result<Vec<Component>> {
        let listing = self.get(
            "list processors",
            &format!("/process-groups/{}/processors", group_id),
            &[("includeDescendantGroups", "true")],
        )?;
        entities(&listing, "processors")
            .iter()
            .filter(|p| has_sensitive_descriptor(p))
            .map(|p| parse_component(p, ComponentKind::Processor))
            .collect()
    }

    fn set_component_running(&self, component: &Component, running: bool) -> Result<()> {
        let path = format!("/{}/{}", Self::component_path(component.kind), component.id);
        let entity = self.get("schedule component", &path, &[])?;
        self.put(
            "schedule component",
            &format!("{}/run-status", path),
            &json!({
                "revision": self.revision(&entity),
                "state": if running { "RUNNING" } else { "STOPPED" },
            }),
        )?;
        debug!(node = component.name.as_str(), running, "Changed component run state");
        Ok(())
    }

    fn create_connection(
        &self,
        group_id: &str,
        source: &Component,
        destination: &Component,
    ) -> Result<Connection> {
        let body = json!({
            "revision": self.new_revision(),
            "component": {
                "source": connectable(source),
                "destination": connectable(destination),
                "selectedRelationships": source.relationships,
            },
        });
        let created = self.post(
            "create connection",
            &format!("/process-groups/{}/connections", group_id),
            &body,
        )?;
        parse_connection(&created)
    }

    fn list_connections(&self, component: &Component) -> Result<Vec<Connection>> {
        let mut connections = self.group_connections(&component.group_id)?;

        // Port connections live in the enclosing group
        if component.kind != ComponentKind::Processor {
            let group = self.get(
                "list connections",
                &format!("/process-groups/{}", component.group_id),
                &[],
            )?;
            if let Some(parent_id) = group.pointer("/component/parentGroupId").and_then(Value::as_str) {
                connections.extend(self.group_connections(parent_id)?);
            }
        }

        connections.retain(|c| c.source_id == component.id || c.destination_id == component.id);
        Ok(connections)
    }

    fn delete_connection(&self, connection: &Connection) -> Result<()> {
        self.drop_queued(
            "drop connection queue",
            &format!("/flowfile-queues/{}/drop-requests", connection.id),
        )?;
        self.delete_entity("delete connection", &format!("/connections/{}", connection.id))
    }

    fn list_parameter_contexts(&self) -> Result<Vec<ParameterContext>> {
        let listing = self.get("list parameter contexts", "/flow/parameter-contexts", &[])?;
        entities(&listing, "parameterContexts")
            .iter()
            .map(|e| -> Result<ParameterContext> {
                Ok(ParameterContext {
                    id: str_at(e, "/id")?,
                    name: e
                        .pointer("/component/name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect()
    }

    fn delete_parameter_context(&self, context: &ParameterContext) -> Result<()> {
        self.delete_entity(
            "delete parameter context",
            &format!("/parameter-contexts/{}", context.id),
        )
    }
}

fn revision_version(entity: &Value) -> u64 {
    entity
        .pointer("/revision/version")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn str_at(value: &Value, pointer: &'static str) -> Result<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(FlowTestError::MissingResponseField(pointer))
}

fn entities<'v>(listing: &'v Value, key: &str) -> &'v [Value] {
    listing
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn connectable(component: &Component) -> Value {
    json!({
        "id": component.id,
        "groupId": component.group_id,
        "type": component.kind.api_name(),
    })
}

/// Matches a fully qualified type exactly, or a simple name by suffix.
fn find_processor_type<'v>(types: &'v [Value], wanted: &str) -> Option<&'v Value> {
    let qualified = |t: &str| t == wanted;
    let simple = |t: &str| t.rsplit('.').next() == Some(wanted);
    types
        .iter()
        .find(|e| e.get("type").and_then(Value::as_str).is_some_and(qualified))
        .or_else(|| {
            types
                .iter()
                .find(|e| e.get("type").and_then(Value::as_str).is_some_and(simple))
        })
}

fn has_sensitive_descriptor(entity: &Value) -> bool {
    entity
        .pointer("/component/config/descriptors")
        .and_then(Value::as_object)
        .is_some_and(|descriptors| {
            descriptors
                .values()
                .any(|d| d.get("sensitive").and_then(Value::as_bool).unwrap_or(false))
        })
}

fn parse_process_group(entity: &Value) -> Result<ProcessGroup> {
    Ok(ProcessGroup {
        id: str_at(entity, "/id")?,
        name: str_at(entity, "/component/name")?,
        parent_id: entity
            .pointer("/component/parentGroupId")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_component(entity: &Value, kind: ComponentKind) -> Result<Component> {
    let relationships = entity
        .pointer("/component/relationships")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    Ok(Component {
        id: str_at(entity, "/id")?,
        name: str_at(entity, "/component/name")?,
        group_id: str_at(entity, "/component/parentGroupId")?,
        kind,
        component_type: entity
            .pointer("/component/type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        relationships,
        properties: entity
            .pointer("/component/config/properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

fn parse_controller_service(entity: &Value) -> Result<ControllerService> {
    Ok(ControllerService {
        id: str_at(entity, "/id")?,
        name: str_at(entity, "/component/name")?,
        service_type: entity
            .pointer("/component/type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        group_id: entity
            .pointer("/component/parentGroupId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        referencing_components: parse_references(entity.pointer("/component/referencingComponents")),
    })
}

fn parse_references(references: Option<&Value>) -> Vec<ReferencingComponent> {
    references
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|reference| {
            let component = reference.get("component")?;
            let id = component
                .get("id")
                .or_else(|| reference.get("id"))
                .and_then(Value::as_str)?;
            Some(ReferencingComponent {
                id: id.to_string(),
                name: component
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                reference_type: ReferenceType::parse(
                    component
                        .get("referenceType")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                ),
                referencing_components: parse_references(component.get("referencingComponents")),
            })
        })
        .collect()
}

fn parse_connection(entity: &Value) -> Result<Connection> {
    Ok(Connection {
        id: str_at(entity, "/id")?,
        group_id: entity
            .pointer("/component/parentGroupId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        source_id: entity
            .get("sourceId")
            .or_else(|| entity.pointer("/component/source/id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(FlowTestError::MissingResponseField("sourceId"))?,
        destination_id: entity
            .get("destinationId")
            .or_else(|| entity.pointer("/component/destination/id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(FlowTestError::MissingResponseField("destinationId"))?,
    })
}
