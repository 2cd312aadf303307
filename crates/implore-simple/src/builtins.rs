//! Name-based dispatch for the builtin exports.
//!
//! Scripting front-ends call everything by name through
//! [`SessionContext::invoke`]. Constructors and plugin callables are
//! resolved there; the names in [`BUILTIN_EXPORTS`](crate::exports::BUILTIN_EXPORTS)
//! end up here and are mapped onto the typed session methods.
//!
//! Connections cross this boundary as their raw integer id.

use crate::active::{ActiveKind, ActiveObject};
use crate::engine::{ConnectionId, Engine, ProxyGroup, ProxyHandle};
use crate::error::{CallError, SimpleError, SimpleResult};
use crate::properties::{Args, Properties, PropertyValue};
use crate::session::{SessionContext, StartupOutcome};

/// Run the builtin export `name`
pub fn dispatch<E: Engine>(
    session: &mut SessionContext<E>,
    name: &str,
    args: &Args,
) -> SimpleResult<PropertyValue> {
    let call = Call { name, args };

    match name {
        "extend_namespace" => {
            let report = session.extend_namespace(&[]);
            Ok(PropertyValue::Int(report.exports.added.len() as i64))
        }

        "connect" => session.connect().map(connection_value),
        "disconnect" => session.disconnect().map(|_| PropertyValue::None),
        "reset_session" => session.reset_session().map(connection_value),
        "initialize" => session.initialize().map(|outcome| {
            PropertyValue::String(
                match outcome {
                    StartupOutcome::Satellite => "satellite",
                    StartupOutcome::Connected(_) => "connected",
                    StartupOutcome::Extended(_) => "extended",
                }
                .to_string(),
            )
        }),

        "get_active" => {
            let kind = call.kind(0)?;
            session.get_active(kind).map(active_value)
        }
        "set_active" => {
            let kind = call.kind(0)?;
            let object = call.active_object("object", 1)?;
            session.set_active(kind, object).map(|_| PropertyValue::None)
        }
        "get_active_connection" => session
            .active_connection()
            .map(|c| c.map_or(PropertyValue::None, connection_value)),
        "get_active_view" => session.active_view().map(proxy_value),
        "get_active_source" => session.active_source().map(proxy_value),
        "get_active_camera" => session.active_camera().map(proxy_value),
        "set_active_connection" => {
            let connection = call.connection("connection", 0)?;
            session
                .set_active_connection(connection)
                .map(|_| PropertyValue::None)
        }
        "set_active_view" => {
            let view = call.require_proxy("view", 0)?;
            session.set_active_view(view).map(|_| PropertyValue::None)
        }
        "set_active_source" => {
            let source = call.require_proxy("source", 0)?;
            session.set_active_source(source).map(|_| PropertyValue::None)
        }
        "set_active_camera" => {
            let camera = call.require_proxy("camera", 0)?;
            session.set_active_camera(camera).map(|_| PropertyValue::None)
        }
        "get_active_view_or_create" => session.get_active_view_or_create().map(PropertyValue::Proxy),
        "camera_for_view" => {
            let view = match call.proxy("view", 0)? {
                Some(view) => view,
                None => session.active_view()?.ok_or(SimpleError::NoActive {
                    kind: ActiveKind::View,
                })?,
            };
            session.camera_for_view(&view).map(PropertyValue::Proxy)
        }

        "create" => {
            let group = call.group(0)?;
            let xml_name = call.string("xml_name", 1)?;
            session
                .create(group, &xml_name, call.properties(&["group", "xml_name"]))
                .map(PropertyValue::Proxy)
        }
        "create_source" => {
            let xml_name = call.string("xml_name", 0)?;
            session
                .create_source(&xml_name, call.properties(&["xml_name"]))
                .map(PropertyValue::Proxy)
        }
        "create_view" => {
            let xml_name = call.string("xml_name", 0)?;
            session
                .create_view(&xml_name, call.properties(&["xml_name"]))
                .map(PropertyValue::Proxy)
        }
        "delete" => {
            let proxy = call.require_proxy("proxy", 0)?;
            session.delete(&proxy).map(|_| PropertyValue::None)
        }
        "rename" => {
            let proxy = call.require_proxy("proxy", 0)?;
            let new_name = call.string("name", 1)?;
            session.rename(&proxy, &new_name).map(|_| PropertyValue::None)
        }
        "find_source" => {
            let source_name = call.string("name", 0)?;
            session.find_source(&source_name).map(proxy_value)
        }
        "find_view" => {
            let view_name = call.string("name", 0)?;
            session.find_view(&view_name).map(proxy_value)
        }
        "find_view_or_create" => {
            let view_name = call.string("name", 0)?;
            let xml_name = match call.args.lookup("xml_name", 1) {
                Some(_) => call.string("xml_name", 1)?,
                None => session.config().default_view.clone(),
            };
            session
                .find_view_or_create(&view_name, &xml_name)
                .map(PropertyValue::Proxy)
        }
        "get_sources" => session.sources().map(list_value),
        "get_views" => session.views().map(list_value),

        "set_properties" => {
            let proxy = call.proxy("proxy", 0)?;
            session
                .set_properties(proxy.as_ref(), &call.properties(&["proxy"]))
                .map(PropertyValue::Proxy)
        }
        "get_property" => {
            let property = call.string("name", 0)?;
            let proxy = call.proxy("proxy", 1)?;
            session.get_property(proxy.as_ref(), &property)
        }
        "reset_property" => {
            let property = call.string("name", 0)?;
            let proxy = call.proxy("proxy", 1)?;
            session.reset_property(proxy.as_ref(), &property)
        }
        "get_representation" => {
            let source = call.proxy("source", 0)?;
            let view = call.proxy("view", 1)?;
            session
                .get_representation(source.as_ref(), view.as_ref())
                .map(PropertyValue::Proxy)
        }

        "render" => {
            let view = call.proxy("view", 0)?;
            session.render(view.as_ref()).map(PropertyValue::Proxy)
        }
        "render_all_views" => session
            .render_all_views()
            .map(|count| PropertyValue::Int(count as i64)),
        "interact" => {
            let view = call.proxy("view", 0)?;
            session.interact(view.as_ref()).map(PropertyValue::Proxy)
        }
        "show" => {
            let source = call.proxy("source", 0)?;
            let view = call.proxy("view", 1)?;
            session
                .show(source.as_ref(), view.as_ref())
                .map(PropertyValue::Proxy)
        }
        "hide" => {
            let source = call.proxy("source", 0)?;
            let view = call.proxy("view", 1)?;
            session
                .hide(source.as_ref(), view.as_ref())
                .map(PropertyValue::Proxy)
        }

        "load_plugin" => Err(call.fail(
            "plugins are loaded from the host with SessionContext::load_plugin",
        )),
        "invoke" => {
            let target = call.string("name", 0)?;
            if target == "invoke" {
                return Err(call.fail("cannot invoke 'invoke' by name"));
            }
            // A positional target name is not forwarded
            let skip = if args.keywords.contains("name") { 0 } else { 1 };
            let forwarded = Args {
                positional: args.positional.iter().skip(skip).cloned().collect(),
                keywords: call.properties(&["name"]),
            };
            session.invoke(&target, &forwarded)
        }

        _ => Err(SimpleError::UnknownFunction(name.to_string())),
    }
}

/// Argument accessors that attribute failures to the called name
struct Call<'a> {
    name: &'a str,
    args: &'a Args,
}

impl Call<'_> {
    fn error(&self, source: CallError) -> SimpleError {
        SimpleError::Call {
            name: self.name.to_string(),
            source,
        }
    }

    fn fail(&self, message: &str) -> SimpleError {
        self.error(CallError::Failed(message.to_string()))
    }

    fn mismatch(&self, arg: &str, expected: &str) -> SimpleError {
        self.error(CallError::TypeMismatch {
            name: arg.to_string(),
            expected: expected.to_string(),
        })
    }

    fn string(&self, arg: &str, index: usize) -> SimpleResult<String> {
        self.args
            .require_string(arg, index)
            .map(str::to_string)
            .map_err(|source| self.error(source))
    }

    /// Optional proxy argument; `None` stands for "use the active one"
    fn proxy(&self, arg: &str, index: usize) -> SimpleResult<Option<ProxyHandle>> {
        match self.args.lookup(arg, index) {
            None | Some(PropertyValue::None) => Ok(None),
            Some(PropertyValue::Proxy(handle)) => Ok(Some(handle.clone())),
            Some(_) => Err(self.mismatch(arg, "proxy")),
        }
    }

    fn require_proxy(&self, arg: &str, index: usize) -> SimpleResult<ProxyHandle> {
        self.proxy(arg, index)?
            .ok_or_else(|| self.error(CallError::MissingArgument(arg.to_string())))
    }

    fn connection(&self, arg: &str, index: usize) -> SimpleResult<ConnectionId> {
        match self.args.lookup(arg, index) {
            Some(PropertyValue::Int(raw)) if *raw > 0 => Ok(ConnectionId::new(*raw as u64)),
            Some(_) => Err(self.mismatch(arg, "connection id")),
            None => Err(self.error(CallError::MissingArgument(arg.to_string()))),
        }
    }

    fn kind(&self, index: usize) -> SimpleResult<ActiveKind> {
        self.string("kind", index)?.parse()
    }

    /// Value for a slot: an integer is a connection id, anything else a proxy
    fn active_object(&self, arg: &str, index: usize) -> SimpleResult<ActiveObject> {
        match self.args.lookup(arg, index) {
            Some(PropertyValue::Int(_)) => self.connection(arg, index).map(ActiveObject::from),
            _ => self.require_proxy(arg, index).map(ActiveObject::from),
        }
    }

    fn group(&self, index: usize) -> SimpleResult<ProxyGroup> {
        let group = self.string("group", index)?;
        parse_group(&group).ok_or_else(|| self.mismatch("group", "proxy group name"))
    }

    /// Keyword arguments minus the ones consumed as call parameters
    fn properties(&self, consumed: &[&str]) -> Properties {
        self.args
            .keywords
            .iter()
            .filter(|(key, _)| !consumed.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn parse_group(name: &str) -> Option<ProxyGroup> {
    [
        ProxyGroup::Sources,
        ProxyGroup::Views,
        ProxyGroup::Cameras,
        ProxyGroup::Representations,
        ProxyGroup::LookupTables,
        ProxyGroup::Layouts,
    ]
    .into_iter()
    .find(|group| group.as_str().eq_ignore_ascii_case(name))
}

fn connection_value(connection: ConnectionId) -> PropertyValue {
    PropertyValue::Int(connection.raw() as i64)
}

fn proxy_value(handle: Option<ProxyHandle>) -> PropertyValue {
    handle.map_or(PropertyValue::None, PropertyValue::Proxy)
}

fn active_value(object: Option<ActiveObject>) -> PropertyValue {
    match object {
        Some(ActiveObject::Connection(connection)) => connection_value(connection),
        Some(ActiveObject::Proxy(handle)) => PropertyValue::Proxy(handle),
        None => PropertyValue::None,
    }
}

fn list_value(handles: Vec<ProxyHandle>) -> PropertyValue {
    PropertyValue::List(handles.into_iter().map(PropertyValue::Proxy).collect())
}
