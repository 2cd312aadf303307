//! Namespace extension registry.
//!
//! Plugins contribute convenience functions by handing the session a
//! [`Namespace`]: a named bundle of [`NameableCallable`]s. Registering a
//! namespace records every qualifying callable for lookup and returns the
//! names, which the session then merges into its export set.
//!
//! # Example
//!
//! ```ignore
//! let plugin = StaticNamespace::new("my_plugin")
//!     .with(FnCallable::new("Double", |args: &Args| {
//!         Ok(PropertyValue::Float(args.require_float("value", 0)? * 2.0))
//!     }));
//!
//! let names = registry.register_namespace(&plugin)?.names;
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{CallError, CallResult};
use crate::exports::validate_export_name;
use crate::properties::{Args, PropertyValue};

/// A callable that can be exported under a name
pub trait NameableCallable {
    fn name(&self) -> &str;

    fn invoke(&self, args: &Args) -> CallResult<PropertyValue>;

    /// One-line description shown in listings
    fn description(&self) -> &str {
        ""
    }
}

/// A source of contributed callables (typically a plugin)
pub trait Namespace {
    fn name(&self) -> &str;

    /// Enumerate the callables this namespace offers.
    ///
    /// Introspection may fail; the registry reports the failure and moves
    /// on to the next namespace.
    fn contributions(&self) -> CallResult<Vec<Arc<dyn NameableCallable>>>;
}

/// Closure-backed callable
pub struct FnCallable<F> {
    name: String,
    description: String,
    func: F,
}

impl<F> FnCallable<F>
where
    F: Fn(&Args) -> CallResult<PropertyValue>,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            func,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl<F> NameableCallable for FnCallable<F>
where
    F: Fn(&Args) -> CallResult<PropertyValue>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, args: &Args) -> CallResult<PropertyValue> {
        (self.func)(args)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Namespace with a fixed list of callables
#[derive(Default)]
pub struct StaticNamespace {
    name: String,
    callables: Vec<Arc<dyn NameableCallable>>,
}

impl StaticNamespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            callables: Vec::new(),
        }
    }

    pub fn with(mut self, callable: impl NameableCallable + 'static) -> Self {
        self.callables.push(Arc::new(callable));
        self
    }

    pub fn with_shared(mut self, callable: Arc<dyn NameableCallable>) -> Self {
        self.callables.push(callable);
        self
    }
}

impl Namespace for StaticNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    fn contributions(&self) -> CallResult<Vec<Arc<dyn NameableCallable>>> {
        Ok(self.callables.clone())
    }
}

/// Whether a contributed name is meant for export.
///
/// Names must be identifiers; a leading underscore marks a helper that the
/// namespace keeps to itself.
pub fn is_exportable(name: &str) -> bool {
    !name.starts_with('_') && validate_export_name(name).is_ok()
}

/// A name whose callable moved from one namespace to another
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rebinding {
    pub name: String,
    pub previous: String,
    pub namespace: String,
}

/// Outcome of scanning one namespace
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registration {
    /// Names registered, in contribution order
    pub names: Vec<String>,

    /// Registered names that replaced another namespace's callable
    pub rebound: Vec<Rebinding>,

    /// Names refused because the session itself provides them
    pub rejected: Vec<(String, String)>,
}

/// Result of scanning several namespaces
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepReport {
    /// Names registered, in scan order
    pub names: Vec<String>,

    pub rebound: Vec<Rebinding>,

    pub rejected: Vec<(String, String)>,

    /// Namespaces that could not be scanned
    pub failed: Vec<(String, CallError)>,
}

impl SweepReport {
    /// Fold one namespace's registration into the sweep
    pub fn absorb(&mut self, registration: Registration) {
        self.names.extend(registration.names);
        self.rebound.extend(registration.rebound);
        self.rejected.extend(registration.rejected);
    }

    /// Fold another sweep into this one
    pub fn merge(&mut self, other: SweepReport) {
        self.names.extend(other.names);
        self.rebound.extend(other.rebound);
        self.rejected.extend(other.rejected);
        self.failed.extend(other.failed);
    }

    /// No namespace failed and no name was refused
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.rejected.is_empty()
    }
}

struct Entry {
    namespace: String,
    callable: Arc<dyn NameableCallable>,
}

/// Registry of contributed callables, keyed by exported name.
///
/// Every exported name resolves to exactly one callable. Names the session
/// provides itself (builtins and proxy constructors) are reserved and
/// cannot be taken by a namespace; between namespaces the latest
/// registration wins.
#[derive(Default)]
pub struct NamespaceRegistry {
    entries: IndexMap<String, Entry>,
    namespaces: Vec<String>,
    /// name -> owner description
    reserved: IndexMap<String, String>,
}

impl NamespaceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `name` for `owner`.
    ///
    /// A callable already registered under the name is dropped; the
    /// namespace it came from is returned.
    pub fn reserve(&mut self, name: &str, owner: impl Into<String>) -> Option<String> {
        self.reserved.insert(name.to_string(), owner.into());
        self.entries.shift_remove(name).map(|entry| entry.namespace)
    }

    /// Owner of a reserved name
    pub fn reserved_by(&self, name: &str) -> Option<&str> {
        self.reserved.get(name).map(String::as_str)
    }

    /// Scan a namespace and record its qualifying callables.
    ///
    /// Names already registered by an earlier namespace are rebound to the
    /// new callable and listed in [`Registration::rebound`]. Reserved names
    /// are refused and listed in [`Registration::rejected`].
    pub fn register_namespace(&mut self, namespace: &dyn Namespace) -> CallResult<Registration> {
        let contributions = namespace.contributions()?;
        let mut registration = Registration::default();

        for callable in contributions {
            let name = callable.name().to_string();
            if !is_exportable(&name) {
                tracing::debug!(
                    "Skipping '{}' from namespace '{}': not exportable",
                    name,
                    namespace.name()
                );
                continue;
            }
            if let Some(owner) = self.reserved.get(&name) {
                tracing::warn!(
                    "'{}' from namespace '{}' refused: provided by {}",
                    name,
                    namespace.name(),
                    owner
                );
                registration
                    .rejected
                    .push((name, format!("provided by {}", owner)));
                continue;
            }

            let previous = self.entries.insert(
                name.clone(),
                Entry {
                    namespace: namespace.name().to_string(),
                    callable,
                },
            );
            if let Some(previous) = previous.filter(|p| p.namespace != namespace.name()) {
                tracing::debug!(
                    "'{}' from namespace '{}' replaces the one from '{}'",
                    name,
                    namespace.name(),
                    previous.namespace
                );
                registration.rebound.push(Rebinding {
                    name: name.clone(),
                    previous: previous.namespace,
                    namespace: namespace.name().to_string(),
                });
            }
            if !registration.names.contains(&name) {
                registration.names.push(name);
            }
        }

        if !self.namespaces.iter().any(|n| n == namespace.name()) {
            self.namespaces.push(namespace.name().to_string());
        }
        Ok(registration)
    }

    /// Scan several namespaces; a failing namespace does not stop the sweep.
    pub fn register_namespaces(&mut self, namespaces: &[&dyn Namespace]) -> SweepReport {
        let mut report = SweepReport::default();
        for namespace in namespaces {
            match self.register_namespace(*namespace) {
                Ok(registration) => report.absorb(registration),
                Err(err) => {
                    tracing::warn!("Failed to scan namespace '{}': {}", namespace.name(), err);
                    report.failed.push((namespace.name().to_string(), err));
                }
            }
        }
        report
    }

    /// Look up a callable by exported name
    pub fn get(&self, name: &str) -> Option<Arc<dyn NameableCallable>> {
        self.entries.get(name).map(|e| Arc::clone(&e.callable))
    }

    /// Namespace that contributed `name`
    pub fn origin(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.namespace.as_str())
    }

    /// One-line description of a registered callable
    pub fn describe(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|e| e.callable.description())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in first-registration order
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Namespaces scanned so far
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for NamespaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceRegistry")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .field("namespaces", &self.namespaces)
            .field("reserved", &self.reserved.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(name: &str, value: f64) -> FnCallable<impl Fn(&Args) -> CallResult<PropertyValue>> {
        FnCallable::new(name, move |_: &Args| Ok(PropertyValue::Float(value)))
    }

    struct BrokenNamespace;

    impl Namespace for BrokenNamespace {
        fn name(&self) -> &str {
            "broken"
        }

        fn contributions(&self) -> CallResult<Vec<Arc<dyn NameableCallable>>> {
            Err(CallError::Introspection {
                namespace: "broken".to_string(),
                message: "module failed to import".to_string(),
            })
        }
    }

    #[test]
    fn test_register_returns_names_in_order() {
        let ns = StaticNamespace::new("plugin_a")
            .with(constant("Foo", 1.0))
            .with(constant("Bar", 2.0));
        let mut registry = NamespaceRegistry::new();

        let registration = registry.register_namespace(&ns).unwrap();
        assert_eq!(registration.names, vec!["Foo", "Bar"]);
        assert!(registration.rebound.is_empty());
        assert_eq!(registry.origin("Foo"), Some("plugin_a"));
    }

    #[test]
    fn test_private_and_invalid_names_skipped() {
        let ns = StaticNamespace::new("plugin")
            .with(constant("_helper", 0.0))
            .with(constant("has space", 0.0))
            .with(constant("Visible", 0.0));
        let mut registry = NamespaceRegistry::new();

        let registration = registry.register_namespace(&ns).unwrap();
        assert_eq!(registration.names, vec!["Visible"]);
        assert!(!registry.contains("_helper"));
    }

    #[test]
    fn test_later_namespace_rebinds_name() {
        let a = StaticNamespace::new("a").with(constant("Bar", 1.0));
        let b = StaticNamespace::new("b").with(constant("Bar", 2.0));
        let mut registry = NamespaceRegistry::new();
        registry.register_namespace(&a).unwrap();
        let registration = registry.register_namespace(&b).unwrap();

        assert_eq!(
            registration.rebound,
            vec![Rebinding {
                name: "Bar".to_string(),
                previous: "a".to_string(),
                namespace: "b".to_string(),
            }]
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.origin("Bar"), Some("b"));
        let value = registry.get("Bar").unwrap().invoke(&Args::new()).unwrap();
        assert_eq!(value, PropertyValue::Float(2.0));
    }

    #[test]
    fn test_sweep_survives_broken_namespace() {
        let good = StaticNamespace::new("good").with(constant("Baz", 3.0));
        let mut registry = NamespaceRegistry::new();

        let report = registry.register_namespaces(&[&BrokenNamespace, &good]);
        assert_eq!(report.names, vec!["Baz"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert_eq!(registry.namespaces(), &["good".to_string()]);
    }

    #[test]
    fn test_reregistering_same_namespace_is_not_a_rebind() {
        let ns = StaticNamespace::new("a").with(constant("Foo", 1.0));
        let mut registry = NamespaceRegistry::new();
        registry.register_namespace(&ns).unwrap();

        let again = registry.register_namespace(&ns).unwrap();
        assert_eq!(again.names, vec!["Foo"]);
        assert!(again.rebound.is_empty());
        assert_eq!(registry.namespaces().len(), 1);
    }

    #[test]
    fn test_reserved_names_refused() {
        let mut registry = NamespaceRegistry::new();
        registry.reserve("render", "builtin");
        let ns = StaticNamespace::new("p")
            .with(constant("render", 9.0))
            .with(constant("Blur", 1.0));

        let registration = registry.register_namespace(&ns).unwrap();
        assert_eq!(registration.names, vec!["Blur"]);
        assert_eq!(registration.rejected.len(), 1);
        assert_eq!(registration.rejected[0].0, "render");
        assert!(!registry.contains("render"));
        assert_eq!(registry.reserved_by("render"), Some("builtin"));
    }

    #[test]
    fn test_reserve_evicts_registered_callable() {
        let mut registry = NamespaceRegistry::new();
        let ns = StaticNamespace::new("p").with(constant("Sphere", 7.0));
        registry.register_namespace(&ns).unwrap();

        let evicted = registry.reserve("Sphere", "constructor 'SphereSource'");
        assert_eq!(evicted.as_deref(), Some("p"));
        assert!(registry.get("Sphere").is_none());
        assert_eq!(registry.reserve("Sphere", "constructor 'SphereSource'"), None);
    }

    #[test]
    fn test_shared_callable_and_description() {
        let shared: Arc<dyn NameableCallable> =
            Arc::new(constant("Normals", 1.0).with_description("Compute point normals"));
        let a = StaticNamespace::new("a").with_shared(Arc::clone(&shared));
        let b = StaticNamespace::new("b").with_shared(shared);
        let mut registry = NamespaceRegistry::new();

        let report = registry.register_namespaces(&[&a, &b]);
        assert_eq!(report.names, vec!["Normals", "Normals"]);
        assert_eq!(report.rebound.len(), 1);
        assert_eq!(registry.describe("Normals"), Some("Compute point normals"));
        assert_eq!(registry.describe("Missing"), None);
    }
}
