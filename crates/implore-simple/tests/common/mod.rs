//! Shared session builders for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use implore_simple::{
    Args, CallError, CallResult, FnCallable, LocalEngine, NameableCallable, Namespace,
    PropertyValue, SessionConfig, SessionContext, StaticNamespace,
};

/// Fresh session on the local engine, not yet connected
pub fn session() -> SessionContext<LocalEngine> {
    SessionContext::new(LocalEngine::new(), SessionConfig::default())
}

/// Session with an active `builtin:` connection
pub fn connected() -> SessionContext<LocalEngine> {
    let mut session = session();
    session.connect().expect("builtin connection");
    session
}

/// Callable that returns a constant
pub fn constant(name: &str, value: f64) -> impl NameableCallable + 'static {
    FnCallable::new(name, move |_: &Args| Ok(PropertyValue::Float(value)))
}

/// Namespace exposing constant callables under `names`
pub fn plugin(namespace: &str, names: &[(&str, f64)]) -> StaticNamespace {
    names
        .iter()
        .fold(StaticNamespace::new(namespace), |ns, (name, value)| {
            ns.with(constant(name, *value))
        })
}

/// Namespace whose introspection always fails
pub struct BrokenPlugin(pub &'static str);

impl Namespace for BrokenPlugin {
    fn name(&self) -> &str {
        self.0
    }

    fn contributions(&self) -> CallResult<Vec<Arc<dyn NameableCallable>>> {
        Err(CallError::Introspection {
            namespace: self.0.to_string(),
            message: "import failed".to_string(),
        })
    }
}
