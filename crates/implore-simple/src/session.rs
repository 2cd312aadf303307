//! Session context
//!
//! A [`SessionContext`] owns everything a scripting session needs:
//! - The engine handle
//! - The active-object slots (connection, view, source, camera)
//! - The exported symbol set
//! - Plugin namespaces and generated proxy constructors
//!
//! Nothing here is process-global: two contexts in one process are fully
//! independent, and tests simply build a fresh one.

use indexmap::IndexMap;

use crate::active::{ActiveKind, ActiveObject, ActiveObjects};
use crate::builtins;
use crate::config::SessionConfig;
use crate::engine::{ConnectionId, Engine, ProxyDefinition, ProxyGroup, ProxyHandle};
use crate::error::{CallError, EngineError, SimpleError, SimpleResult};
use crate::exports::{make_identifier, ExportSet, ExtendReport, BUILTIN_EXPORTS};
use crate::namespace::{Namespace, NamespaceRegistry, Registration, SweepReport};
use crate::properties::{Args, Properties, PropertyValue};

/// Keyword consumed by the session to name a new object
pub const REGISTRATION_NAME: &str = "registrationName";

/// Outcome of extending the session's namespace
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtensionReport {
    /// Names merged into the export set
    pub exports: ExtendReport,

    /// Namespaces scanned, names rebound or refused, and scan failures
    pub sweep: SweepReport,
}

/// What `initialize` did
#[derive(Debug, Clone, PartialEq)]
pub enum StartupOutcome {
    /// Satellite process: nothing to do
    Satellite,

    /// No connection was active, so one was established
    Connected(ConnectionId),

    /// A host already owned the connection; only the namespace was extended
    Extended(ExtensionReport),
}

/// A scripting session over an engine
pub struct SessionContext<E: Engine> {
    id: String,
    created_at: String,
    engine: E,
    config: SessionConfig,
    active: ActiveObjects,
    exports: ExportSet,
    namespaces: NamespaceRegistry,
    constructors: IndexMap<String, ProxyDefinition>,
}

impl<E: Engine> SessionContext<E> {
    /// Create a session with no active connection
    pub fn new(engine: E, config: SessionConfig) -> Self {
        let mut namespaces = NamespaceRegistry::new();
        for name in BUILTIN_EXPORTS {
            namespaces.reserve(name, "the session builtins");
        }

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            engine,
            config,
            active: ActiveObjects::new(),
            exports: ExportSet::builtin(),
            namespaces,
            constructors: IndexMap::new(),
        }
    }

    /// Create a session inside a host that already owns `connection`.
    ///
    /// The host stays responsible for the connection's lifecycle;
    /// [`initialize`](Self::initialize) will only extend the namespace.
    pub fn embedded(engine: E, config: SessionConfig, connection: ConnectionId) -> SimpleResult<Self> {
        let mut session = Self::new(engine, config);
        session.set_active_connection(connection)?;
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Direct engine access, for hosts that drive the engine themselves
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    pub fn active_objects(&self) -> &ActiveObjects {
        &self.active
    }

    pub fn exports(&self) -> &ExportSet {
        &self.exports
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    // ------------------------------------------------------------------
    // Startup and connections
    // ------------------------------------------------------------------

    /// Bring the session up.
    ///
    /// Without an active connection a new one is established and nothing
    /// else happens in this pass. With one (embedded in a host) no
    /// connection is made and the namespace extension step runs instead.
    pub fn initialize(&mut self) -> SimpleResult<StartupOutcome> {
        if self.config.satellite {
            tracing::debug!("Satellite session {}: skipping startup", self.id);
            return Ok(StartupOutcome::Satellite);
        }

        match self.active_connection()? {
            None => self.connect().map(StartupOutcome::Connected),
            Some(connection) => {
                tracing::debug!("Connection {} owned by host; extending namespace", connection);
                Ok(StartupOutcome::Extended(self.extend_namespace(&[])))
            }
        }
    }

    /// Establish a connection using the configured URL and make it active.
    ///
    /// Only one connection is active per session: a live active connection
    /// is torn down first.
    pub fn connect(&mut self) -> SimpleResult<ConnectionId> {
        if let Some(previous) = self.active.peek(ActiveKind::Connection) {
            let previous = previous.connection();
            if self.engine.is_alive(previous) {
                tracing::info!("Closing connection {} before reconnecting", previous);
                self.engine.disconnect(previous)?;
            }
            self.active.forget_connection(previous);
        }

        let url = self.config.connection_url.clone();
        let connection = self.engine.establish(&url)?;
        self.active
            .set(ActiveKind::Connection, connection.into(), &self.engine)?;
        tracing::info!("Connected to '{}' as {}", url, connection);
        Ok(connection)
    }

    /// Tear down the active connection and clear every slot it owned
    pub fn disconnect(&mut self) -> SimpleResult<()> {
        let connection = self
            .active
            .peek(ActiveKind::Connection)
            .map(|c| c.connection())
            .ok_or(SimpleError::NoActiveConnection)?;

        if self.engine.is_alive(connection) {
            self.engine.disconnect(connection)?;
        }
        self.active.forget_connection(connection);
        tracing::info!("Disconnected {}", connection);
        Ok(())
    }

    /// Disconnect (when connected) and connect again. Exports are kept.
    pub fn reset_session(&mut self) -> SimpleResult<ConnectionId> {
        if self.active.peek(ActiveKind::Connection).is_some() {
            self.disconnect()?;
        }
        self.connect()
    }

    // ------------------------------------------------------------------
    // Active objects
    // ------------------------------------------------------------------

    /// Active object of a kind; `None` when unset
    pub fn get_active(&self, kind: ActiveKind) -> SimpleResult<Option<ActiveObject>> {
        self.active.get(kind, &self.engine)
    }

    pub fn active_connection(&self) -> SimpleResult<Option<ConnectionId>> {
        Ok(self
            .get_active(ActiveKind::Connection)?
            .and_then(|o| o.as_connection()))
    }

    pub fn active_view(&self) -> SimpleResult<Option<ProxyHandle>> {
        Ok(self
            .get_active(ActiveKind::View)?
            .and_then(ActiveObject::into_proxy))
    }

    pub fn active_source(&self) -> SimpleResult<Option<ProxyHandle>> {
        Ok(self
            .get_active(ActiveKind::Source)?
            .and_then(ActiveObject::into_proxy))
    }

    pub fn active_camera(&self) -> SimpleResult<Option<ProxyHandle>> {
        Ok(self
            .get_active(ActiveKind::Camera)?
            .and_then(ActiveObject::into_proxy))
    }

    /// Replace the active object of a kind
    pub fn set_active(&mut self, kind: ActiveKind, object: impl Into<ActiveObject>) -> SimpleResult<()> {
        self.active.set(kind, object.into(), &self.engine)
    }

    pub fn set_active_connection(&mut self, connection: ConnectionId) -> SimpleResult<()> {
        self.set_active(ActiveKind::Connection, connection)
    }

    /// Make `view` active. The active camera is left as it was; use
    /// [`camera_for_view`](Self::camera_for_view) to follow the view.
    pub fn set_active_view(&mut self, view: ProxyHandle) -> SimpleResult<()> {
        self.set_active(ActiveKind::View, view)
    }

    pub fn set_active_source(&mut self, source: ProxyHandle) -> SimpleResult<()> {
        self.set_active(ActiveKind::Source, source)
    }

    pub fn set_active_camera(&mut self, camera: ProxyHandle) -> SimpleResult<()> {
        self.set_active(ActiveKind::Camera, camera)
    }

    pub fn clear_active(&mut self, kind: ActiveKind) -> Option<ActiveObject> {
        self.active.clear(kind)
    }

    /// The camera that belongs to `view`
    pub fn camera_for_view(&self, view: &ProxyHandle) -> SimpleResult<ProxyHandle> {
        Ok(self.engine.camera_for_view(view)?)
    }

    /// Active view, creating one if needed.
    ///
    /// **Mutates the session:** when no view is active, a view of
    /// `config.default_view` is created on the active connection and made
    /// active. Set `config.auto_create_view = false` to get
    /// [`SimpleError::NoActive`] instead. Use [`active_view`](Self::active_view)
    /// for a side-effect-free lookup.
    pub fn get_active_view_or_create(&mut self) -> SimpleResult<ProxyHandle> {
        if let Some(view) = self.active_view()? {
            return Ok(view);
        }
        if !self.config.auto_create_view {
            return Err(SimpleError::NoActive {
                kind: ActiveKind::View,
            });
        }
        let xml_name = self.config.default_view.clone();
        tracing::debug!("No active view; creating a default '{}'", xml_name);
        self.create_view(&xml_name, Properties::new())
    }

    fn require_connection(&self) -> SimpleResult<ConnectionId> {
        self.active_connection()?
            .ok_or(SimpleError::NoActiveConnection)
    }

    // ------------------------------------------------------------------
    // Proxies
    // ------------------------------------------------------------------

    /// Create an object on the active connection and apply `properties`.
    ///
    /// A `registrationName` keyword names the new object; it must be a
    /// non-empty string. New views and sources become active.
    pub fn create(
        &mut self,
        group: ProxyGroup,
        xml_name: &str,
        mut properties: Properties,
    ) -> SimpleResult<ProxyHandle> {
        let connection = self.require_connection()?;
        let registration_name = match properties.remove(REGISTRATION_NAME) {
            None => None,
            Some(PropertyValue::String(name)) if !name.trim().is_empty() => Some(name),
            Some(PropertyValue::String(_)) => {
                return Err(EngineError::InvalidProperty {
                    property: REGISTRATION_NAME.to_string(),
                    reason: "name is empty".to_string(),
                }
                .into());
            }
            Some(other) => {
                tracing::debug!("{} given a {}", REGISTRATION_NAME, other.type_name());
                return Err(SimpleError::Call {
                    name: "create".to_string(),
                    source: CallError::TypeMismatch {
                        name: REGISTRATION_NAME.to_string(),
                        expected: "string".to_string(),
                    },
                });
            }
        };

        let handle = self
            .engine
            .create(connection, group, xml_name, &properties)?;
        if let Some(name) = registration_name {
            if let Err(err) = self.engine.rename(&handle, &name) {
                if let Err(cleanup) = self.engine.delete(&handle) {
                    tracing::warn!("Could not remove unnamed {}: {}", handle, cleanup);
                }
                return Err(err.into());
            }
        }

        match group {
            ProxyGroup::Views => self.set_active_view(handle.clone())?,
            ProxyGroup::Sources => self.set_active_source(handle.clone())?,
            _ => {}
        }
        Ok(handle)
    }

    pub fn create_source(&mut self, xml_name: &str, properties: Properties) -> SimpleResult<ProxyHandle> {
        self.create(ProxyGroup::Sources, xml_name, properties)
    }

    pub fn create_view(&mut self, xml_name: &str, properties: Properties) -> SimpleResult<ProxyHandle> {
        self.create(ProxyGroup::Views, xml_name, properties)
    }

    /// Delete an object; active slots pointing at it are cleared
    pub fn delete(&mut self, handle: &ProxyHandle) -> SimpleResult<()> {
        self.engine.delete(handle)?;
        self.active.forget_proxy(handle);

        // Deleting a view also deletes its camera
        if let Some(camera) = self.active.peek(ActiveKind::Camera).and_then(ActiveObject::into_proxy) {
            if !self.engine.exists(&camera) {
                self.active.clear(ActiveKind::Camera);
            }
        }
        Ok(())
    }

    pub fn rename(&mut self, handle: &ProxyHandle, name: &str) -> SimpleResult<()> {
        Ok(self.engine.rename(handle, name)?)
    }

    pub fn registration_name(&self, handle: &ProxyHandle) -> SimpleResult<String> {
        Ok(self.engine.registration_name(handle)?)
    }

    pub fn find_source(&self, name: &str) -> SimpleResult<Option<ProxyHandle>> {
        let connection = self.require_connection()?;
        Ok(self.engine.find(connection, ProxyGroup::Sources, name))
    }

    pub fn find_view(&self, name: &str) -> SimpleResult<Option<ProxyHandle>> {
        let connection = self.require_connection()?;
        Ok(self.engine.find(connection, ProxyGroup::Views, name))
    }

    /// Find a view by name, creating a `xml_name` view with that name if absent
    pub fn find_view_or_create(&mut self, name: &str, xml_name: &str) -> SimpleResult<ProxyHandle> {
        if let Some(view) = self.find_view(name)? {
            return Ok(view);
        }
        let properties = Properties::new().with(REGISTRATION_NAME, name);
        self.create_view(xml_name, properties)
    }

    pub fn sources(&self) -> SimpleResult<Vec<ProxyHandle>> {
        let connection = self.require_connection()?;
        Ok(self.engine.list(connection, ProxyGroup::Sources))
    }

    pub fn views(&self) -> SimpleResult<Vec<ProxyHandle>> {
        let connection = self.require_connection()?;
        Ok(self.engine.list(connection, ProxyGroup::Views))
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Change properties of an object, defaulting to the active source.
    /// Values are validated against the definition's schema.
    pub fn set_properties(
        &mut self,
        proxy: Option<&ProxyHandle>,
        properties: &Properties,
    ) -> SimpleResult<ProxyHandle> {
        let proxy = self.source_or_active(proxy)?;
        self.engine.set_properties(&proxy, properties)?;
        Ok(proxy)
    }

    /// Current value of a property, defaulting to the active source
    pub fn get_property(&self, proxy: Option<&ProxyHandle>, name: &str) -> SimpleResult<PropertyValue> {
        let proxy = self.source_or_active(proxy)?;
        self.engine
            .properties(&proxy)?
            .get(name)
            .cloned()
            .ok_or_else(|| {
                EngineError::UnknownProperty {
                    definition: proxy.xml_name.clone(),
                    property: name.to_string(),
                }
                .into()
            })
    }

    /// Restore a property to its definition default, defaulting to the
    /// active source. Returns the restored value.
    pub fn reset_property(&mut self, proxy: Option<&ProxyHandle>, name: &str) -> SimpleResult<PropertyValue> {
        let proxy = self.source_or_active(proxy)?;
        let default = self
            .engine
            .definitions(proxy.connection, proxy.group)
            .into_iter()
            .find(|d| d.xml_name == proxy.xml_name)
            .and_then(|d| d.property(name).map(|spec| spec.default_value.clone()))
            .ok_or_else(|| EngineError::UnknownProperty {
                definition: proxy.xml_name.clone(),
                property: name.to_string(),
            })?;

        self.engine
            .set_properties(&proxy, &Properties::new().with(name, default.clone()))?;
        Ok(default)
    }

    /// Representation of a source in a view.
    ///
    /// Defaults: the active source and the active view, which is created if
    /// needed. A source never shown in the view gets a hidden
    /// representation.
    pub fn get_representation(
        &mut self,
        source: Option<&ProxyHandle>,
        view: Option<&ProxyHandle>,
    ) -> SimpleResult<ProxyHandle> {
        let source = self.source_or_active(source)?;
        let view = self.view_or_active_or_create(view)?;
        match self.engine.representation(&source, &view)? {
            Some(representation) => Ok(representation),
            None => Ok(self.engine.set_visibility(&source, &view, false)?),
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Show a source in a view. Defaults: the active source and the active
    /// view, which is created if needed.
    pub fn show(
        &mut self,
        source: Option<&ProxyHandle>,
        view: Option<&ProxyHandle>,
    ) -> SimpleResult<ProxyHandle> {
        let source = self.source_or_active(source)?;
        let view = self.view_or_active_or_create(view)?;
        Ok(self.engine.set_visibility(&source, &view, true)?)
    }

    /// Hide a source in a view. Defaults: the active source and view.
    pub fn hide(
        &mut self,
        source: Option<&ProxyHandle>,
        view: Option<&ProxyHandle>,
    ) -> SimpleResult<ProxyHandle> {
        let source = self.source_or_active(source)?;
        let view = match view {
            Some(view) => view.clone(),
            None => self.active_view()?.ok_or(SimpleError::NoActive {
                kind: ActiveKind::View,
            })?,
        };
        Ok(self.engine.set_visibility(&source, &view, false)?)
    }

    /// Render a view, defaulting to the active view (created if needed)
    pub fn render(&mut self, view: Option<&ProxyHandle>) -> SimpleResult<ProxyHandle> {
        let view = self.view_or_active_or_create(view)?;
        self.engine.render(&view)?;
        Ok(view)
    }

    /// Render every view on the active connection; returns how many
    pub fn render_all_views(&mut self) -> SimpleResult<usize> {
        let views = self.views()?;
        for view in &views {
            self.engine.render(view)?;
        }
        Ok(views.len())
    }

    /// Hand control to the user until they end the interaction
    pub fn interact(&mut self, view: Option<&ProxyHandle>) -> SimpleResult<ProxyHandle> {
        let view = self.view_or_active_or_create(view)?;
        self.engine.interact(&view)?;
        Ok(view)
    }

    fn source_or_active(&self, source: Option<&ProxyHandle>) -> SimpleResult<ProxyHandle> {
        match source {
            Some(source) => Ok(source.clone()),
            None => self.active_source()?.ok_or(SimpleError::NoActive {
                kind: ActiveKind::Source,
            }),
        }
    }

    fn view_or_active_or_create(&mut self, view: Option<&ProxyHandle>) -> SimpleResult<ProxyHandle> {
        match view {
            Some(view) => Ok(view.clone()),
            None => self.get_active_view_or_create(),
        }
    }

    // ------------------------------------------------------------------
    // Namespace extension
    // ------------------------------------------------------------------

    /// Merge names into the export set (idempotent set union)
    pub fn extend_exports<I, S>(&mut self, names: I) -> ExtendReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exports.extend(names)
    }

    /// Scan a namespace and record its callables. Names are returned, not
    /// exported; see [`load_plugin`](Self::load_plugin) for both.
    pub fn register_namespace(&mut self, namespace: &dyn Namespace) -> SimpleResult<Registration> {
        self.namespaces
            .register_namespace(namespace)
            .map_err(|source| SimpleError::Registration {
                namespace: namespace.name().to_string(),
                source,
            })
    }

    /// Register a namespace and export its names
    pub fn load_plugin(&mut self, namespace: &dyn Namespace) -> SimpleResult<ExtensionReport> {
        let registration = self.register_namespace(namespace)?;
        tracing::info!(
            "Loaded plugin namespace '{}' ({} names)",
            namespace.name(),
            registration.names.len()
        );

        let exports = self.exports.extend(&registration.names);
        let mut sweep = SweepReport::default();
        sweep.absorb(registration);
        Ok(ExtensionReport { exports, sweep })
    }

    /// Pull every known contribution into the export set.
    ///
    /// The session's own namespace goes first: constructors for the
    /// definitions of the active connection and callables registered
    /// earlier. Then each of `namespaces` is scanned. A namespace that
    /// cannot be scanned is listed in `sweep.failed` and the sweep
    /// continues; names merged before a failure stay merged.
    pub fn extend_namespace(&mut self, namespaces: &[&dyn Namespace]) -> ExtensionReport {
        let mut report = ExtensionReport::default();

        let constructors = self.refresh_constructors(&mut report.sweep);
        report.exports.absorb(self.exports.extend(constructors));
        report
            .exports
            .absorb(self.exports.extend(self.namespaces.names()));

        let scanned = self.namespaces.register_namespaces(namespaces);
        report.exports.absorb(self.exports.extend(&scanned.names));
        report.sweep.merge(scanned);
        report
    }

    /// Rebuild constructors from the active connection's definitions.
    ///
    /// Constructor names are reserved: a plugin callable registered under
    /// the same name is dropped and reported in `sweep.rejected`.
    fn refresh_constructors(&mut self, sweep: &mut SweepReport) -> Vec<String> {
        let connection = match self.active_connection() {
            Ok(Some(connection)) => connection,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::debug!("No constructors: {}", err);
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        for group in [ProxyGroup::Sources, ProxyGroup::Views] {
            for definition in self.engine.definitions(connection, group) {
                let Some(name) = make_identifier(&definition.label) else {
                    tracing::debug!(
                        "Definition '{}' has no usable constructor name",
                        definition.label
                    );
                    continue;
                };
                if BUILTIN_EXPORTS.contains(&name.as_str()) {
                    tracing::warn!(
                        "Definition '{}' would shadow the builtin '{}'",
                        definition.xml_name,
                        name
                    );
                    continue;
                }

                let owner = format!("the constructor for '{}'", definition.xml_name);
                if let Some(evicted) = self.namespaces.reserve(&name, owner) {
                    tracing::warn!(
                        "Constructor '{}' replaces the callable from '{}'",
                        name,
                        evicted
                    );
                    sweep
                        .rejected
                        .push((name.clone(), format!("replaced by the constructor for '{}'", definition.xml_name)));
                }
                self.constructors.insert(name.clone(), definition);
                names.push(name);
            }
        }
        names
    }

    /// Definition behind a constructor name
    pub fn constructor(&self, name: &str) -> Option<&ProxyDefinition> {
        self.constructors.get(name)
    }

    /// Call an exported function by name with scripting-style arguments.
    ///
    /// Every exported name has a single provider: a proxy constructor, a
    /// plugin callable, or a builtin. Builtin and constructor names are
    /// reserved, so plugins can never shadow them.
    pub fn invoke(&mut self, name: &str, args: &Args) -> SimpleResult<PropertyValue> {
        if !self.exports.contains(name) {
            return Err(SimpleError::UnknownFunction(name.to_string()));
        }

        if let Some(definition) = self.constructors.get(name).cloned() {
            return self.construct(&definition, args).map(PropertyValue::Proxy);
        }

        if let Some(callable) = self.namespaces.get(name) {
            return callable.invoke(args).map_err(|source| SimpleError::Call {
                name: name.to_string(),
                source,
            });
        }

        builtins::dispatch(self, name, args)
    }

    /// Run a generated constructor: keywords become properties, and filters
    /// take the first positional proxy (or the active source) as `Input`.
    fn construct(&mut self, definition: &ProxyDefinition, args: &Args) -> SimpleResult<ProxyHandle> {
        let mut properties = args.keywords.clone();
        if definition.takes_input() && !properties.contains("Input") {
            let input = match args.positional(0).and_then(PropertyValue::as_proxy) {
                Some(input) => Some(input),
                None => self.active_source()?,
            };
            if let Some(input) = input {
                properties.set("Input", input);
            }
        }
        self.create(definition.group, &definition.xml_name, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ConnectionService, ProxyService};
    use crate::local::LocalEngine;

    fn session() -> SessionContext<LocalEngine> {
        SessionContext::new(LocalEngine::new(), SessionConfig::default())
    }

    #[test]
    fn test_session_creation() {
        let session = session();
        assert!(!session.id().is_empty());
        assert!(session.active_objects().is_empty());
        assert!(session.exports().contains("get_active_view"));
    }

    #[test]
    fn test_connect_replaces_previous_connection() {
        let mut session = session();
        let first = session.connect().unwrap();
        let second = session.connect().unwrap();

        assert_ne!(first, second);
        assert!(!session.engine().is_alive(first));
        assert_eq!(session.active_connection().unwrap(), Some(second));
        assert_eq!(session.engine().connection_count(), 1);
    }

    #[test]
    fn test_disconnect_without_connection() {
        let mut session = session();
        assert!(matches!(
            session.disconnect(),
            Err(SimpleError::NoActiveConnection)
        ));
    }

    #[test]
    fn test_disconnect_clears_owned_slots() {
        let mut session = session();
        session.connect().unwrap();
        session.create_source("ConeSource", Properties::new()).unwrap();
        session.get_active_view_or_create().unwrap();

        session.disconnect().unwrap();
        assert!(session.active_objects().is_empty());
    }

    #[test]
    fn test_create_source_becomes_active() {
        let mut session = session();
        session.connect().unwrap();
        let sphere = session
            .create_source("SphereSource", Properties::new().with("Radius", 1.5))
            .unwrap();

        assert_eq!(session.active_source().unwrap(), Some(sphere.clone()));
        assert_eq!(
            session.engine().properties(&sphere).unwrap().get_float("Radius"),
            Some(1.5)
        );
    }

    #[test]
    fn test_registration_name_keyword() {
        let mut session = session();
        session.connect().unwrap();
        let props = Properties::new().with(REGISTRATION_NAME, "Ball");
        let sphere = session.create_source("SphereSource", props).unwrap();

        assert_eq!(session.registration_name(&sphere).unwrap(), "Ball");
        assert_eq!(session.find_source("Ball").unwrap(), Some(sphere));
    }

    #[test]
    fn test_delete_clears_active_source() {
        let mut session = session();
        session.connect().unwrap();
        let cone = session.create_source("ConeSource", Properties::new()).unwrap();

        session.delete(&cone).unwrap();
        assert_eq!(session.active_source().unwrap(), None);
    }

    #[test]
    fn test_delete_view_clears_its_camera() {
        let mut session = session();
        session.connect().unwrap();
        let view = session.get_active_view_or_create().unwrap();
        let camera = session.camera_for_view(&view).unwrap();
        session.set_active_camera(camera).unwrap();

        session.delete(&view).unwrap();
        assert_eq!(session.active_view().unwrap(), None);
        assert_eq!(session.active_camera().unwrap(), None);
    }

    #[test]
    fn test_find_view_or_create_reuses_by_name() {
        let mut session = session();
        session.connect().unwrap();
        let first = session.find_view_or_create("Main", "RenderView").unwrap();
        let second = session.find_view_or_create("Main", "RenderView").unwrap();

        assert_eq!(first, second);
        assert_eq!(session.views().unwrap().len(), 1);
    }

    #[test]
    fn test_show_uses_active_objects() {
        let mut session = session();
        session.connect().unwrap();
        let cone = session.create_source("ConeSource", Properties::new()).unwrap();

        let repr = session.show(None, None).unwrap();
        let props = session.engine().properties(&repr).unwrap();
        assert_eq!(props.get_proxy("Input"), Some(cone));
        assert_eq!(props.get_bool("Visibility"), Some(true));
        assert!(session.active_view().unwrap().is_some());
    }

    #[test]
    fn test_hide_without_view() {
        let mut session = session();
        session.connect().unwrap();
        session.create_source("ConeSource", Properties::new()).unwrap();

        let err = session.hide(None, None).unwrap_err();
        assert!(matches!(err, SimpleError::NoActive { kind: ActiveKind::View }));
    }

    #[test]
    fn test_render_all_views() {
        let mut session = session();
        session.connect().unwrap();
        session.create_view("RenderView", Properties::new()).unwrap();
        session.create_view("XYChartView", Properties::new()).unwrap();

        assert_eq!(session.render_all_views().unwrap(), 2);
        assert_eq!(session.engine().stats().renders, 2);
    }

    #[test]
    fn test_interact_uses_active_view() {
        let mut session = session();
        session.connect().unwrap();
        let view = session.create_view("RenderView", Properties::new()).unwrap();

        assert_eq!(session.interact(None).unwrap(), view);
        assert_eq!(session.engine().stats().interactions, 1);
    }

    #[test]
    fn test_clear_active_leaves_other_slots() {
        let mut session = session();
        session.connect().unwrap();
        let cone = session.create_source("ConeSource", Properties::new()).unwrap();
        let view = session.get_active_view_or_create().unwrap();

        let cleared = session.clear_active(ActiveKind::Source);
        assert_eq!(cleared, Some(ActiveObject::Proxy(cone)));
        assert_eq!(session.active_source().unwrap(), None);
        assert_eq!(session.active_view().unwrap(), Some(view));
    }

    #[test]
    fn test_reset_session_keeps_exports() {
        let mut session = session();
        session.connect().unwrap();
        session.extend_namespace(&[]);
        let exported = session.exports().len();

        let connection = session.reset_session().unwrap();
        assert_eq!(session.active_connection().unwrap(), Some(connection));
        assert_eq!(session.exports().len(), exported);
    }

    #[test]
    fn test_constructor_names_from_labels() {
        let mut session = session();
        session.connect().unwrap();
        let report = session.extend_namespace(&[]);

        assert!(report.exports.added.contains(&"Sphere".to_string()));
        assert!(report.exports.added.contains(&"ClipClosedSurface".to_string()));
        assert!(report.exports.added.contains(&"RenderView".to_string()));
        assert!(report.sweep.is_clean());
        assert!(session.constructor("3DGlyphs").is_none());
    }

    #[test]
    fn test_filter_constructor_takes_active_source() {
        let mut session = session();
        session.connect().unwrap();
        session.extend_namespace(&[]);

        let sphere = session.invoke("Sphere", &Args::new()).unwrap();
        let shrink = session
            .invoke("Shrink", &Args::new().kwarg("ShrinkFactor", 0.8))
            .unwrap();

        let shrink = shrink.as_proxy().unwrap();
        let props = session.engine().properties(&shrink).unwrap();
        assert_eq!(props.get("Input"), Some(&sphere));
        assert_eq!(props.get_float("ShrinkFactor"), Some(0.8));
        assert_eq!(session.active_source().unwrap(), Some(shrink));
    }

    #[test]
    fn test_invoke_unknown_name() {
        let mut session = session();
        let err = session.invoke("NoSuchThing", &Args::new()).unwrap_err();
        assert!(matches!(err, SimpleError::UnknownFunction(name) if name == "NoSuchThing"));
    }
    #[test]
    fn test_set_config_applies_to_later_calls() {
        let mut session = session();
        session.connect().unwrap();
        session.set_config(SessionConfig {
            auto_create_view: false,
            ..SessionConfig::default()
        });

        assert!(!session.config().auto_create_view);
        assert!(session.get_active_view_or_create().is_err());
    }

    #[test]
    fn test_registration_name_must_be_string() {
        let mut session = session();
        session.connect().unwrap();
        let props = Properties::new().with(REGISTRATION_NAME, 3i64);

        let err = session.create_source("SphereSource", props).unwrap_err();
        assert!(matches!(
            err,
            SimpleError::Call { source: CallError::TypeMismatch { ref name, .. }, .. } if name == REGISTRATION_NAME
        ));
        assert!(session.sources().unwrap().is_empty());
    }

    #[test]
    fn test_empty_registration_name_creates_nothing() {
        let mut session = session();
        session.connect().unwrap();
        let props = Properties::new().with(REGISTRATION_NAME, "  ");

        let err = session.create_source("SphereSource", props).unwrap_err();
        assert!(matches!(err, SimpleError::Engine(EngineError::InvalidProperty { .. })));
        assert!(session.sources().unwrap().is_empty());
        assert_eq!(session.active_source().unwrap(), None);
    }

    #[test]
    fn test_failed_rename_removes_new_object() {
        let mut session = session();
        session.connect().unwrap();
        let props = Properties::new().with(REGISTRATION_NAME, "two\nlines");

        assert!(session.create_source("ConeSource", props).is_err());
        assert!(session.sources().unwrap().is_empty());
        assert_eq!(session.active_source().unwrap(), None);
    }

    #[test]
    fn test_properties_default_to_active_source() {
        let mut session = session();
        session.connect().unwrap();
        let cone = session.create_source("ConeSource", Properties::new()).unwrap();

        session
            .set_properties(None, &Properties::new().with("Height", 3.0))
            .unwrap();
        assert_eq!(session.get_property(None, "Height").unwrap(), PropertyValue::Float(3.0));
        assert_eq!(
            session.get_property(Some(&cone), "Radius").unwrap(),
            PropertyValue::Float(0.5)
        );
        assert!(matches!(
            session.get_property(None, "Depth"),
            Err(SimpleError::Engine(EngineError::UnknownProperty { .. }))
        ));
    }

    #[test]
    fn test_set_properties_without_source() {
        let mut session = session();
        session.connect().unwrap();
        let err = session
            .set_properties(None, &Properties::new().with("Radius", 1.0))
            .unwrap_err();
        assert!(matches!(err, SimpleError::NoActive { kind: ActiveKind::Source }));
    }

    #[test]
    fn test_reset_property_restores_default() {
        let mut session = session();
        session.connect().unwrap();
        let sphere = session
            .create_source("SphereSource", Properties::new().with("Radius", 4.0))
            .unwrap();

        let restored = session.reset_property(Some(&sphere), "Radius").unwrap();
        assert_eq!(restored, PropertyValue::Float(0.5));
        assert_eq!(
            session.engine().properties(&sphere).unwrap().get_float("Radius"),
            Some(0.5)
        );
        assert!(session.reset_property(Some(&sphere), "Height").is_err());
    }

    #[test]
    fn test_get_representation_is_hidden_until_shown() {
        let mut session = session();
        session.connect().unwrap();
        let cone = session.create_source("ConeSource", Properties::new()).unwrap();

        let repr = session.get_representation(None, None).unwrap();
        assert_eq!(
            session.engine().properties(&repr).unwrap().get_bool("Visibility"),
            Some(false)
        );
        assert!(session.active_view().unwrap().is_some());

        let shown = session.show(Some(&cone), None).unwrap();
        assert_eq!(shown, repr);
        assert_eq!(session.get_representation(Some(&cone), None).unwrap(), repr);
    }

    #[test]
    fn test_builtin_names_are_reserved() {
        let session = session();
        for name in BUILTIN_EXPORTS {
            assert!(session.namespaces().reserved_by(name).is_some(), "{}", name);
        }
    }

    #[test]
    fn test_constructor_replaces_plugin_callable() {
        use crate::namespace::{FnCallable, StaticNamespace};

        let mut session = session();
        let plugin = StaticNamespace::new("shapes")
            .with(FnCallable::new("Sphere", |_: &Args| Ok(PropertyValue::Float(1.0))));
        session.load_plugin(&plugin).unwrap();
        assert_eq!(session.namespaces().origin("Sphere"), Some("shapes"));

        session.connect().unwrap();
        let report = session.extend_namespace(&[]);

        assert_eq!(report.sweep.rejected.len(), 1);
        assert_eq!(report.sweep.rejected[0].0, "Sphere");
        assert_eq!(session.namespaces().origin("Sphere"), None);
        let sphere = session.invoke("Sphere", &Args::new()).unwrap();
        assert!(matches!(sphere, PropertyValue::Proxy(_)));
    }

    #[test]
    fn test_definition_added_later_gets_constructor() {
        let mut session = session();
        session.connect().unwrap();
        session.extend_namespace(&[]);
        assert!(session.constructor("Plane").is_none());

        session.engine_mut().add_definition(ProxyDefinition::new(
            ProxyGroup::Sources,
            "PlaneSource",
            "Plane",
        ));
        let report = session.extend_namespace(&[]);

        assert_eq!(report.exports.added, vec!["Plane"]);
        let plane = session.invoke("Plane", &Args::new()).unwrap().as_proxy().unwrap();
        assert_eq!(plane.xml_name, "PlaneSource");
    }
}
