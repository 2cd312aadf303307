//! In-process engine serving `builtin:` connections.
//!
//! `LocalEngine` keeps every object in memory and validates properties
//! against a small definition catalog. It backs the demo binary and the
//! test-suite, and doubles as a reference for what the session layer
//! expects from a real engine.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::engine::{
    ConnectionId, ConnectionService, ProxyDefinition, ProxyGroup, ProxyHandle, ProxyService,
    RenderService,
};
use crate::error::{EngineError, EngineResult};
use crate::properties::{Properties, PropertySpec, PropertyType, PropertyValue};

/// URL served by the local engine
pub const BUILTIN_URL: &str = "builtin:";

/// Call counters, mostly for tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocalEngineStats {
    pub establish_calls: usize,
    pub disconnect_calls: usize,
    pub renders: usize,
    pub interactions: usize,
}

struct ProxyRecord {
    handle: ProxyHandle,
    name: String,
    properties: Properties,
    /// Camera owned by a view
    camera: Option<u64>,
}

#[derive(Default)]
struct ConnectionState {
    proxies: IndexMap<u64, ProxyRecord>,
    /// (source id, view id) -> representation id
    representations: HashMap<(u64, u64), u64>,
    /// Per-label counters for generated registration names
    name_counters: HashMap<String, usize>,
}

/// In-memory engine
pub struct LocalEngine {
    connections: HashMap<ConnectionId, ConnectionState>,
    catalog: Vec<ProxyDefinition>,
    next_connection: u64,
    next_proxy: u64,
    refuse_reason: Option<String>,
    stats: LocalEngineStats,
}

impl LocalEngine {
    /// Create an engine with the built-in definition catalog.
    pub fn new() -> Self {
        Self::with_catalog(builtin_catalog())
    }

    /// Create an engine with a custom catalog (for testing)
    pub fn with_catalog(catalog: Vec<ProxyDefinition>) -> Self {
        Self {
            connections: HashMap::new(),
            catalog,
            next_connection: 1,
            next_proxy: 1,
            refuse_reason: None,
            stats: LocalEngineStats::default(),
        }
    }

    /// Make subsequent `establish` calls fail
    pub fn refuse_connections(&mut self, reason: impl Into<String>) {
        self.refuse_reason = Some(reason.into());
    }

    pub fn accept_connections(&mut self) {
        self.refuse_reason = None;
    }

    /// Register an extra definition, as a loaded plugin would
    pub fn add_definition(&mut self, definition: ProxyDefinition) {
        self.catalog.push(definition);
    }

    pub fn stats(&self) -> LocalEngineStats {
        self.stats
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn definition(&self, group: ProxyGroup, xml_name: &str) -> EngineResult<&ProxyDefinition> {
        self.catalog
            .iter()
            .find(|d| d.group == group && d.xml_name == xml_name)
            .ok_or_else(|| EngineError::UnknownDefinition {
                group,
                name: xml_name.to_string(),
            })
    }

    fn state(&self, connection: ConnectionId) -> EngineResult<&ConnectionState> {
        self.connections
            .get(&connection)
            .ok_or(EngineError::UnknownConnection(connection))
    }

    fn state_mut(&mut self, connection: ConnectionId) -> EngineResult<&mut ConnectionState> {
        self.connections
            .get_mut(&connection)
            .ok_or(EngineError::UnknownConnection(connection))
    }

    fn record(&self, handle: &ProxyHandle) -> EngineResult<&ProxyRecord> {
        self.state(handle.connection)?
            .proxies
            .get(&handle.id)
            .ok_or(EngineError::ProxyNotFound(handle.id))
    }

    fn validate(
        &self,
        connection: ConnectionId,
        definition: &ProxyDefinition,
        properties: &Properties,
    ) -> EngineResult<()> {
        for (name, value) in properties.iter() {
            let spec = definition
                .property(name)
                .ok_or_else(|| EngineError::UnknownProperty {
                    definition: definition.xml_name.clone(),
                    property: name.clone(),
                })?;
            if !spec.property_type.is_compatible_with(value) {
                return Err(EngineError::InvalidProperty {
                    property: name.clone(),
                    reason: format!(
                        "expected {}, got {}",
                        spec.property_type.type_name(),
                        value.type_name()
                    ),
                });
            }
            if let PropertyValue::Proxy(target) = value {
                if target.connection != connection || !self.exists(target) {
                    return Err(EngineError::InvalidProperty {
                        property: name.clone(),
                        reason: format!("{} is not an object of {}", target, connection),
                    });
                }
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        connection: ConnectionId,
        definition: &ProxyDefinition,
        mut properties: Properties,
    ) -> EngineResult<ProxyHandle> {
        properties.fill_defaults(&definition.properties);

        let id = self.next_proxy;
        self.next_proxy += 1;
        let handle = ProxyHandle {
            id,
            connection,
            group: definition.group,
            xml_name: definition.xml_name.clone(),
        };

        let base: String = definition.label.split_whitespace().collect();
        let state = self.state_mut(connection)?;
        let counter = state.name_counters.entry(base.clone()).or_insert(0);
        *counter += 1;
        let name = format!("{}{}", base, counter);

        state.proxies.insert(
            id,
            ProxyRecord {
                handle: handle.clone(),
                name,
                properties,
                camera: None,
            },
        );
        Ok(handle)
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionService for LocalEngine {
    fn establish(&mut self, url: &str) -> EngineResult<ConnectionId> {
        self.stats.establish_calls += 1;

        if let Some(reason) = &self.refuse_reason {
            return Err(EngineError::ConnectionFailed {
                url: url.to_string(),
                message: reason.clone(),
            });
        }
        if url != BUILTIN_URL {
            return Err(EngineError::ConnectionFailed {
                url: url.to_string(),
                message: format!("local engine only serves '{}'", BUILTIN_URL),
            });
        }

        let id = ConnectionId::new(self.next_connection);
        self.next_connection += 1;
        self.connections.insert(id, ConnectionState::default());
        Ok(id)
    }

    fn disconnect(&mut self, connection: ConnectionId) -> EngineResult<()> {
        self.stats.disconnect_calls += 1;
        self.connections
            .remove(&connection)
            .map(|_| ())
            .ok_or(EngineError::UnknownConnection(connection))
    }

    fn is_alive(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }
}

impl ProxyService for LocalEngine {
    fn create(
        &mut self,
        connection: ConnectionId,
        group: ProxyGroup,
        xml_name: &str,
        properties: &Properties,
    ) -> EngineResult<ProxyHandle> {
        self.state(connection)?;
        let definition = self.definition(group, xml_name)?.clone();
        self.validate(connection, &definition, properties)?;

        let handle = self.insert(connection, &definition, properties.clone())?;

        if group == ProxyGroup::Views {
            let camera_definition = self.definition(ProxyGroup::Cameras, "Camera")?.clone();
            let camera = self.insert(connection, &camera_definition, Properties::new())?;
            if let Some(record) = self.state_mut(connection)?.proxies.get_mut(&handle.id) {
                record.camera = Some(camera.id);
            }
        }

        Ok(handle)
    }

    fn delete(&mut self, handle: &ProxyHandle) -> EngineResult<()> {
        let state = self.state_mut(handle.connection)?;
        let record = state
            .proxies
            .shift_remove(&handle.id)
            .ok_or(EngineError::ProxyNotFound(handle.id))?;

        if let Some(camera) = record.camera {
            state.proxies.shift_remove(&camera);
        }

        let orphaned: Vec<u64> = state
            .representations
            .iter()
            .filter(|((source, view), _)| *source == handle.id || *view == handle.id)
            .map(|(_, repr)| *repr)
            .collect();
        state
            .representations
            .retain(|(source, view), _| *source != handle.id && *view != handle.id);
        for repr in orphaned {
            state.proxies.shift_remove(&repr);
        }
        Ok(())
    }

    fn exists(&self, handle: &ProxyHandle) -> bool {
        self.record(handle).is_ok()
    }

    fn registration_name(&self, handle: &ProxyHandle) -> EngineResult<String> {
        Ok(self.record(handle)?.name.clone())
    }

    fn rename(&mut self, handle: &ProxyHandle, name: &str) -> EngineResult<()> {
        if name.chars().any(char::is_control) {
            return Err(EngineError::InvalidProperty {
                property: "registrationName".to_string(),
                reason: "name contains control characters".to_string(),
            });
        }
        let record = self
            .state_mut(handle.connection)?
            .proxies
            .get_mut(&handle.id)
            .ok_or(EngineError::ProxyNotFound(handle.id))?;
        record.name = name.to_string();
        Ok(())
    }

    fn find(&self, connection: ConnectionId, group: ProxyGroup, name: &str) -> Option<ProxyHandle> {
        self.connections.get(&connection).and_then(|state| {
            state
                .proxies
                .values()
                .find(|r| r.handle.group == group && r.name == name)
                .map(|r| r.handle.clone())
        })
    }

    fn list(&self, connection: ConnectionId, group: ProxyGroup) -> Vec<ProxyHandle> {
        self.connections
            .get(&connection)
            .map(|state| {
                state
                    .proxies
                    .values()
                    .filter(|r| r.handle.group == group)
                    .map(|r| r.handle.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn properties(&self, handle: &ProxyHandle) -> EngineResult<Properties> {
        Ok(self.record(handle)?.properties.clone())
    }

    fn set_properties(&mut self, handle: &ProxyHandle, properties: &Properties) -> EngineResult<()> {
        self.record(handle)?;
        let definition = self.definition(handle.group, &handle.xml_name)?.clone();
        self.validate(handle.connection, &definition, properties)?;

        let record = self
            .state_mut(handle.connection)?
            .proxies
            .get_mut(&handle.id)
            .ok_or(EngineError::ProxyNotFound(handle.id))?;
        for (name, value) in properties.iter() {
            record.properties.set(name.clone(), value.clone());
        }
        Ok(())
    }

    fn camera_for_view(&self, view: &ProxyHandle) -> EngineResult<ProxyHandle> {
        if view.group != ProxyGroup::Views {
            return Err(EngineError::WrongGroup {
                expected: ProxyGroup::Views,
                found: view.group,
            });
        }
        let record = self.record(view)?;
        let camera = record.camera.ok_or(EngineError::ProxyNotFound(view.id))?;
        self.state(view.connection)?
            .proxies
            .get(&camera)
            .map(|r| r.handle.clone())
            .ok_or(EngineError::ProxyNotFound(camera))
    }

    fn definitions(&self, connection: ConnectionId, group: ProxyGroup) -> Vec<ProxyDefinition> {
        if !self.is_alive(connection) {
            return Vec::new();
        }
        self.catalog
            .iter()
            .filter(|d| d.group == group)
            .cloned()
            .collect()
    }
}

impl RenderService for LocalEngine {
    fn render(&mut self, view: &ProxyHandle) -> EngineResult<()> {
        if view.group != ProxyGroup::Views {
            return Err(EngineError::WrongGroup {
                expected: ProxyGroup::Views,
                found: view.group,
            });
        }
        self.record(view)?;
        self.stats.renders += 1;
        Ok(())
    }

    fn interact(&mut self, view: &ProxyHandle) -> EngineResult<()> {
        self.render(view)?;
        self.stats.interactions += 1;
        Ok(())
    }

    fn representation(
        &self,
        source: &ProxyHandle,
        view: &ProxyHandle,
    ) -> EngineResult<Option<ProxyHandle>> {
        self.record(source)?;
        self.record(view)?;
        let state = self.state(source.connection)?;
        Ok(state
            .representations
            .get(&(source.id, view.id))
            .and_then(|id| state.proxies.get(id))
            .map(|r| r.handle.clone()))
    }

    fn set_visibility(
        &mut self,
        source: &ProxyHandle,
        view: &ProxyHandle,
        visible: bool,
    ) -> EngineResult<ProxyHandle> {
        if source.connection != view.connection {
            return Err(EngineError::Render(format!(
                "{} and {} live on different connections",
                source, view
            )));
        }
        self.record(source)?;
        self.record(view)?;

        let existing = self
            .state(source.connection)?
            .representations
            .get(&(source.id, view.id))
            .copied();

        let repr_id = match existing {
            Some(id) => id,
            None => {
                let definition = self
                    .definition(ProxyGroup::Representations, "GeometryRepresentation")?
                    .clone();
                let props = Properties::new().with("Input", source.clone());
                let repr = self.insert(source.connection, &definition, props)?;
                self.state_mut(source.connection)?
                    .representations
                    .insert((source.id, view.id), repr.id);
                repr.id
            }
        };

        let record = self
            .state_mut(source.connection)?
            .proxies
            .get_mut(&repr_id)
            .ok_or(EngineError::ProxyNotFound(repr_id))?;
        record.properties.set("Visibility", visible);
        Ok(record.handle.clone())
    }
}

/// Definitions known to every local connection
pub fn builtin_catalog() -> Vec<ProxyDefinition> {
    let vec3 = PropertyType::Vec { len: 3 };
    vec![
        ProxyDefinition::new(ProxyGroup::Sources, "SphereSource", "Sphere")
            .with_property(PropertySpec::new("Radius", PropertyType::Float, 0.5))
            .with_property(PropertySpec::new("Center", vec3.clone(), vec![0.0, 0.0, 0.0]))
            .with_property(PropertySpec::new("ThetaResolution", PropertyType::Int, 8i64))
            .with_property(PropertySpec::new("PhiResolution", PropertyType::Int, 8i64)),
        ProxyDefinition::new(ProxyGroup::Sources, "ConeSource", "Cone")
            .with_property(PropertySpec::new("Height", PropertyType::Float, 1.0))
            .with_property(PropertySpec::new("Radius", PropertyType::Float, 0.5))
            .with_property(PropertySpec::new("Resolution", PropertyType::Int, 6i64)),
        ProxyDefinition::new(ProxyGroup::Sources, "RTAnalyticSource", "Wavelet")
            .with_property(PropertySpec::new("Maximum", PropertyType::Float, 255.0)),
        ProxyDefinition::new(ProxyGroup::Sources, "ShrinkFilter", "Shrink")
            .with_property(PropertySpec::proxy("Input"))
            .with_property(PropertySpec::new("ShrinkFactor", PropertyType::Float, 0.5)),
        ProxyDefinition::new(ProxyGroup::Sources, "ClipClosedSurface", "Clip Closed Surface")
            .with_property(PropertySpec::proxy("Input"))
            .with_property(PropertySpec::new("Normal", vec3.clone(), vec![1.0, 0.0, 0.0])),
        ProxyDefinition::new(ProxyGroup::Sources, "ArbitrarySourceGlyph", "3D Glyphs")
            .with_property(PropertySpec::proxy("Input")),
        ProxyDefinition::new(ProxyGroup::Views, "RenderView", "Render View")
            .with_property(PropertySpec::new("ViewSize", PropertyType::Vec { len: 2 }, vec![400.0, 400.0]))
            .with_property(PropertySpec::new("Background", vec3.clone(), vec![0.32, 0.34, 0.43])),
        ProxyDefinition::new(ProxyGroup::Views, "XYChartView", "Line Chart View")
            .with_property(PropertySpec::new("ChartTitle", PropertyType::String, "")),
        ProxyDefinition::new(ProxyGroup::Cameras, "Camera", "Camera")
            .with_property(PropertySpec::new("Position", vec3.clone(), vec![0.0, 0.0, 1.0]))
            .with_property(PropertySpec::new("FocalPoint", vec3.clone(), vec![0.0, 0.0, 0.0]))
            .with_property(PropertySpec::new("ViewUp", vec3, vec![0.0, 1.0, 0.0])),
        ProxyDefinition::new(
            ProxyGroup::Representations,
            "GeometryRepresentation",
            "Representation",
        )
        .with_property(PropertySpec::proxy("Input"))
        .with_property(PropertySpec::new("Visibility", PropertyType::Bool, true))
        .with_property(PropertySpec::new(
            "Representation",
            PropertyType::Choice {
                options: vec![
                    "Surface".to_string(),
                    "Wireframe".to_string(),
                    "Points".to_string(),
                ],
            },
            "Surface",
        )),
        ProxyDefinition::new(ProxyGroup::LookupTables, "PVLookupTable", "Lookup Table")
            .with_property(PropertySpec::new("RGBPoints", PropertyType::Vec { len: 8 }, vec![
                0.0, 0.23, 0.30, 0.75, 1.0, 0.71, 0.02, 0.15,
            ])),
        ProxyDefinition::new(ProxyGroup::Layouts, "ViewLayout", "Layout"),
    ]
}
