//! Engine collaborator interfaces.
//!
//! Everything that actually manipulates server-side objects lives behind
//! these traits: connection transport, the proxy object model, and
//! rendering. The session layer only stores handles and decides which
//! handle a convenience call should target.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::properties::{Properties, PropertySpec};

/// Opaque identifier of an engine connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}

/// Registration group of a proxy in the engine's object model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyGroup {
    Sources,
    Views,
    Cameras,
    Representations,
    LookupTables,
    Layouts,
}

impl ProxyGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyGroup::Sources => "sources",
            ProxyGroup::Views => "views",
            ProxyGroup::Cameras => "cameras",
            ProxyGroup::Representations => "representations",
            ProxyGroup::LookupTables => "lookup_tables",
            ProxyGroup::Layouts => "layouts",
        }
    }
}

impl fmt::Display for ProxyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an object owned by the engine
///
/// A handle stays valid only as long as its owning connection is alive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyHandle {
    /// Engine-wide object id
    pub id: u64,

    /// Connection the object lives on
    pub connection: ConnectionId,

    /// Registration group
    pub group: ProxyGroup,

    /// Definition the object was created from (e.g. "SphereSource")
    pub xml_name: String,
}

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.xml_name, self.id, self.connection)
    }
}

/// A creatable definition exposed by the engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProxyDefinition {
    pub group: ProxyGroup,

    /// Name used to create the object
    pub xml_name: String,

    /// Human-readable label; convenience constructors are named after it
    pub label: String,

    /// Declared properties with their defaults
    pub properties: Vec<PropertySpec>,
}

impl ProxyDefinition {
    pub fn new(group: ProxyGroup, xml_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            group,
            xml_name: xml_name.into(),
            label: label.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|spec| spec.name == name)
    }

    /// Filters declare an `Input` property; readers and sources do not
    pub fn takes_input(&self) -> bool {
        self.property("Input").is_some()
    }
}

/// Connection/session transport
pub trait ConnectionService {
    /// Establish a connection. May block on network I/O.
    fn establish(&mut self, url: &str) -> EngineResult<ConnectionId>;

    /// Tear a connection down, destroying every object it owns.
    fn disconnect(&mut self, connection: ConnectionId) -> EngineResult<()>;

    fn is_alive(&self, connection: ConnectionId) -> bool;
}

/// The engine's proxy object model
pub trait ProxyService {
    /// Create an object and apply `properties` to it. Properties are
    /// validated against the definition's schema by the engine.
    fn create(
        &mut self,
        connection: ConnectionId,
        group: ProxyGroup,
        xml_name: &str,
        properties: &Properties,
    ) -> EngineResult<ProxyHandle>;

    fn delete(&mut self, handle: &ProxyHandle) -> EngineResult<()>;

    fn exists(&self, handle: &ProxyHandle) -> bool;

    fn registration_name(&self, handle: &ProxyHandle) -> EngineResult<String>;

    fn rename(&mut self, handle: &ProxyHandle, name: &str) -> EngineResult<()>;

    fn find(&self, connection: ConnectionId, group: ProxyGroup, name: &str) -> Option<ProxyHandle>;

    /// Objects of a group in creation order
    fn list(&self, connection: ConnectionId, group: ProxyGroup) -> Vec<ProxyHandle>;

    fn properties(&self, handle: &ProxyHandle) -> EngineResult<Properties>;

    /// Change properties of an existing object. Validated like `create`;
    /// nothing is applied when any value is rejected.
    fn set_properties(&mut self, handle: &ProxyHandle, properties: &Properties) -> EngineResult<()>;

    /// The camera owned by a view
    fn camera_for_view(&self, view: &ProxyHandle) -> EngineResult<ProxyHandle>;

    /// Definitions creatable in a group on a connection
    fn definitions(&self, connection: ConnectionId, group: ProxyGroup) -> Vec<ProxyDefinition>;
}

/// Rendering and interaction
pub trait RenderService {
    fn render(&mut self, view: &ProxyHandle) -> EngineResult<()>;

    /// Blocks until the user ends the interaction.
    fn interact(&mut self, view: &ProxyHandle) -> EngineResult<()>;

    /// Representation of `source` in `view`, if one was created
    fn representation(
        &self,
        source: &ProxyHandle,
        view: &ProxyHandle,
    ) -> EngineResult<Option<ProxyHandle>>;

    /// Show or hide `source` in `view`, returning its representation.
    fn set_visibility(
        &mut self,
        source: &ProxyHandle,
        view: &ProxyHandle,
        visible: bool,
    ) -> EngineResult<ProxyHandle>;
}

/// Everything a session needs from the engine
pub trait Engine: ConnectionService + ProxyService + RenderService {}

impl<T: ConnectionService + ProxyService + RenderService> Engine for T {}
