//! Active-object registry
//!
//! Tracks what is "currently active" in a session: the connection, view,
//! source and camera that convenience calls target when the caller does
//! not name one. Each slot holds at most one value and is independent of
//! the others: setting the view never touches the camera slot.
//!
//! Stored handles are not trusted blindly. Every read checks that the
//! owning connection is still alive and reports a stale reference when it
//! is not.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::{
    ConnectionId, ConnectionService, Engine, ProxyGroup, ProxyHandle, ProxyService,
};
use crate::error::{EngineError, SimpleError, SimpleResult};

/// Slot of the active-object registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActiveKind {
    Connection,
    View,
    Source,
    Camera,
}

impl ActiveKind {
    pub const ALL: [ActiveKind; 4] = [
        ActiveKind::Connection,
        ActiveKind::View,
        ActiveKind::Source,
        ActiveKind::Camera,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveKind::Connection => "connection",
            ActiveKind::View => "view",
            ActiveKind::Source => "source",
            ActiveKind::Camera => "camera",
        }
    }

    /// Proxy group a slot accepts; `None` for the connection slot
    pub fn group(&self) -> Option<ProxyGroup> {
        match self {
            ActiveKind::Connection => None,
            ActiveKind::View => Some(ProxyGroup::Views),
            ActiveKind::Source => Some(ProxyGroup::Sources),
            ActiveKind::Camera => Some(ProxyGroup::Cameras),
        }
    }
}

impl fmt::Display for ActiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActiveKind {
    type Err = SimpleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "connection" => Ok(ActiveKind::Connection),
            "view" => Ok(ActiveKind::View),
            "source" | "proxy" => Ok(ActiveKind::Source),
            "camera" => Ok(ActiveKind::Camera),
            _ => Err(SimpleError::UnknownKind(s.to_string())),
        }
    }
}

/// Value held by a slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveObject {
    Connection(ConnectionId),
    Proxy(ProxyHandle),
}

impl ActiveObject {
    /// Connection that owns this object
    pub fn connection(&self) -> ConnectionId {
        match self {
            ActiveObject::Connection(id) => *id,
            ActiveObject::Proxy(handle) => handle.connection,
        }
    }

    pub fn as_connection(&self) -> Option<ConnectionId> {
        match self {
            ActiveObject::Connection(id) => Some(*id),
            ActiveObject::Proxy(_) => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyHandle> {
        match self {
            ActiveObject::Proxy(handle) => Some(handle),
            ActiveObject::Connection(_) => None,
        }
    }

    pub fn into_proxy(self) -> Option<ProxyHandle> {
        match self {
            ActiveObject::Proxy(handle) => Some(handle),
            ActiveObject::Connection(_) => None,
        }
    }
}

impl From<ConnectionId> for ActiveObject {
    fn from(id: ConnectionId) -> Self {
        ActiveObject::Connection(id)
    }
}

impl From<ProxyHandle> for ActiveObject {
    fn from(handle: ProxyHandle) -> Self {
        ActiveObject::Proxy(handle)
    }
}

/// The four active-object slots
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveObjects {
    connection: Option<ConnectionId>,
    view: Option<ProxyHandle>,
    source: Option<ProxyHandle>,
    camera: Option<ProxyHandle>,
}

impl ActiveObjects {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value without liveness validation
    pub fn peek(&self, kind: ActiveKind) -> Option<ActiveObject> {
        match kind {
            ActiveKind::Connection => self.connection.map(ActiveObject::Connection),
            ActiveKind::View => self.view.clone().map(ActiveObject::Proxy),
            ActiveKind::Source => self.source.clone().map(ActiveObject::Proxy),
            ActiveKind::Camera => self.camera.clone().map(ActiveObject::Proxy),
        }
    }

    /// Active value of a slot, or `None` when the slot is empty.
    ///
    /// Fails with [`SimpleError::StaleReference`] when the stored object's
    /// connection has been torn down, and with [`SimpleError::Deleted`] when
    /// the object itself is gone.
    pub fn get<E: Engine + ?Sized>(
        &self,
        kind: ActiveKind,
        engine: &E,
    ) -> SimpleResult<Option<ActiveObject>> {
        let Some(object) = self.peek(kind) else {
            return Ok(None);
        };
        let connection = object.connection();
        if !engine.is_alive(connection) {
            tracing::debug!("Active {} refers to dead connection {}", kind, connection);
            return Err(SimpleError::StaleReference { kind, connection });
        }
        if let ActiveObject::Proxy(handle) = &object {
            if !engine.exists(handle) {
                tracing::debug!("Active {} {} was deleted", kind, handle);
                return Err(SimpleError::Deleted {
                    kind,
                    handle: handle.clone(),
                });
            }
        }
        Ok(Some(object))
    }

    /// Replace the value of a slot.
    ///
    /// Proxies must belong to the active connection and to the group the
    /// slot accepts. No other slot is modified.
    pub fn set<E: Engine + ?Sized>(
        &mut self,
        kind: ActiveKind,
        object: ActiveObject,
        engine: &E,
    ) -> SimpleResult<()> {
        match (kind, object) {
            (ActiveKind::Connection, ActiveObject::Connection(id)) => {
                if !engine.is_alive(id) {
                    return Err(SimpleError::UnknownConnection(id));
                }
                self.connection = Some(id);
                Ok(())
            }
            (ActiveKind::Connection, ActiveObject::Proxy(handle)) => {
                Err(SimpleError::KindMismatch {
                    kind,
                    group: handle.group,
                })
            }
            (_, ActiveObject::Connection(_)) => Err(SimpleError::NotAProxy { kind }),
            (_, ActiveObject::Proxy(handle)) => {
                let expected = self.live_connection(engine)?;
                if handle.connection != expected {
                    return Err(SimpleError::WrongConnection {
                        kind,
                        expected,
                        found: handle.connection,
                    });
                }
                if kind.group() != Some(handle.group) {
                    return Err(SimpleError::KindMismatch {
                        kind,
                        group: handle.group,
                    });
                }
                if !engine.exists(&handle) {
                    return Err(EngineError::ProxyNotFound(handle.id).into());
                }
                if let Some(slot) = self.proxy_slot_mut(kind) {
                    *slot = Some(handle);
                }
                Ok(())
            }
        }
    }

    /// Empty a slot, returning what it held
    pub fn clear(&mut self, kind: ActiveKind) -> Option<ActiveObject> {
        let previous = self.peek(kind);
        match self.proxy_slot_mut(kind) {
            Some(slot) => *slot = None,
            None => self.connection = None,
        }
        previous
    }

    /// Empty every slot owned by `connection`
    pub fn forget_connection(&mut self, connection: ConnectionId) {
        if self.connection == Some(connection) {
            self.connection = None;
        }
        for slot in [&mut self.view, &mut self.source, &mut self.camera] {
            if slot.as_ref().is_some_and(|h| h.connection == connection) {
                *slot = None;
            }
        }
    }

    /// Empty every slot pointing at `handle`
    pub fn forget_proxy(&mut self, handle: &ProxyHandle) {
        for slot in [&mut self.view, &mut self.source, &mut self.camera] {
            if slot.as_ref() == Some(handle) {
                *slot = None;
            }
        }
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        ActiveKind::ALL.iter().all(|kind| self.peek(*kind).is_none())
    }

    fn live_connection<E: Engine + ?Sized>(&self, engine: &E) -> SimpleResult<ConnectionId> {
        let connection = self.connection.ok_or(SimpleError::NoActiveConnection)?;
        if !engine.is_alive(connection) {
            return Err(SimpleError::StaleReference {
                kind: ActiveKind::Connection,
                connection,
            });
        }
        Ok(connection)
    }

    fn proxy_slot_mut(&mut self, kind: ActiveKind) -> Option<&mut Option<ProxyHandle>> {
        match kind {
            ActiveKind::View => Some(&mut self.view),
            ActiveKind::Source => Some(&mut self.source),
            ActiveKind::Camera => Some(&mut self.camera),
            ActiveKind::Connection => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ConnectionService, ProxyService};
    use crate::local::{LocalEngine, BUILTIN_URL};
    use crate::properties::Properties;

    fn setup() -> (LocalEngine, ActiveObjects, ConnectionId) {
        let mut engine = LocalEngine::new();
        let cs = engine.establish(BUILTIN_URL).unwrap();
        let mut active = ActiveObjects::new();
        active
            .set(ActiveKind::Connection, cs.into(), &engine)
            .unwrap();
        (engine, active, cs)
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("View".parse::<ActiveKind>().unwrap(), ActiveKind::View);
        assert_eq!("camera".parse::<ActiveKind>().unwrap(), ActiveKind::Camera);
        assert!(matches!(
            "layout".parse::<ActiveKind>(),
            Err(SimpleError::UnknownKind(name)) if name == "layout"
        ));
    }

    #[test]
    fn test_empty_slot_is_none() {
        let engine = LocalEngine::new();
        let active = ActiveObjects::new();
        for kind in ActiveKind::ALL {
            assert!(active.get(kind, &engine).unwrap().is_none());
        }
        assert!(active.is_empty());
    }

    #[test]
    fn test_set_view_leaves_camera_alone() {
        let (mut engine, mut active, cs) = setup();
        let view = engine
            .create(cs, ProxyGroup::Views, "RenderView", &Properties::new())
            .unwrap();

        active
            .set(ActiveKind::View, view.clone().into(), &engine)
            .unwrap();
        assert_eq!(
            active.get(ActiveKind::View, &engine).unwrap(),
            Some(ActiveObject::Proxy(view))
        );
        assert!(active.get(ActiveKind::Camera, &engine).unwrap().is_none());
    }

    #[test]
    fn test_group_must_match_slot() {
        let (mut engine, mut active, cs) = setup();
        let source = engine
            .create(cs, ProxyGroup::Sources, "ConeSource", &Properties::new())
            .unwrap();
        let err = active
            .set(ActiveKind::View, source.into(), &engine)
            .unwrap_err();
        assert!(matches!(
            err,
            SimpleError::KindMismatch {
                kind: ActiveKind::View,
                group: ProxyGroup::Sources
            }
        ));
    }

    #[test]
    fn test_proxy_needs_active_connection() {
        let mut engine = LocalEngine::new();
        let cs = engine.establish(BUILTIN_URL).unwrap();
        let source = engine
            .create(cs, ProxyGroup::Sources, "ConeSource", &Properties::new())
            .unwrap();

        let mut active = ActiveObjects::new();
        let err = active
            .set(ActiveKind::Source, source.into(), &engine)
            .unwrap_err();
        assert!(matches!(err, SimpleError::NoActiveConnection));
    }

    #[test]
    fn test_stale_after_teardown() {
        let (mut engine, mut active, cs) = setup();
        let view = engine
            .create(cs, ProxyGroup::Views, "RenderView", &Properties::new())
            .unwrap();
        active.set(ActiveKind::View, view.into(), &engine).unwrap();

        engine.disconnect(cs).unwrap();

        let err = active.get(ActiveKind::View, &engine).unwrap_err();
        assert!(matches!(
            err,
            SimpleError::StaleReference {
                kind: ActiveKind::View,
                connection
            } if connection == cs
        ));
    }

    #[test]
    fn test_forget_connection_clears_owned_slots() {
        let (mut engine, mut active, cs) = setup();
        let source = engine
            .create(cs, ProxyGroup::Sources, "ConeSource", &Properties::new())
            .unwrap();
        active
            .set(ActiveKind::Source, source.into(), &engine)
            .unwrap();

        active.forget_connection(cs);
        assert!(active.is_empty());
    }

    #[test]
    fn test_deleted_behind_registry_reported() {
        let (mut engine, mut active, cs) = setup();
        let source = engine
            .create(cs, ProxyGroup::Sources, "ConeSource", &Properties::new())
            .unwrap();
        active
            .set(ActiveKind::Source, source.clone().into(), &engine)
            .unwrap();

        engine.delete(&source).unwrap();

        let err = active.get(ActiveKind::Source, &engine).unwrap_err();
        assert!(matches!(
            err,
            SimpleError::Deleted { kind: ActiveKind::Source, ref handle } if *handle == source
        ));
        assert!(active.get(ActiveKind::Connection, &engine).unwrap().is_some());
    }
}
