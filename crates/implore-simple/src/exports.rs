//! Exported symbol set
//!
//! The public surface of the convenience layer is an ordered list of unique
//! names. It starts from [`BUILTIN_EXPORTS`] and only grows: plugins and
//! namespaces merge their names in with [`ExportSet::extend`], which is an
//! idempotent set union that keeps registration order.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Names exported by every session before any plugin is loaded
pub const BUILTIN_EXPORTS: &[&str] = &[
    "extend_namespace",
    // session
    "connect",
    "disconnect",
    "reset_session",
    "initialize",
    // active objects
    "get_active",
    "set_active",
    "get_active_connection",
    "get_active_view",
    "get_active_source",
    "get_active_camera",
    "set_active_connection",
    "set_active_view",
    "set_active_source",
    "set_active_camera",
    "get_active_view_or_create",
    "camera_for_view",
    // proxies
    "create",
    "create_source",
    "create_view",
    "delete",
    "rename",
    "find_source",
    "find_view",
    "find_view_or_create",
    "get_sources",
    "get_views",
    // properties
    "set_properties",
    "get_property",
    "reset_property",
    "get_representation",
    // rendering
    "render",
    "render_all_views",
    "interact",
    "show",
    "hide",
    // plugins
    "load_plugin",
    "invoke",
];

/// Outcome of merging a batch of names
///
/// Each name is merged independently. A name listed in `failed` did not
/// roll back the names merged before it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendReport {
    /// Names inserted by this call, in order
    pub added: Vec<String>,

    /// Names that were already present
    pub skipped: Vec<String>,

    /// Names rejected, with the reason
    pub failed: Vec<(String, String)>,
}

impl ExtendReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: ExtendReport) {
        self.added.extend(other.added);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

/// Ordered set of exported names
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSet {
    names: IndexSet<String>,
}

impl ExportSet {
    /// Create an empty set (for testing)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a set seeded with [`BUILTIN_EXPORTS`]
    pub fn builtin() -> Self {
        Self::seeded(BUILTIN_EXPORTS.iter().copied())
    }

    /// Create a set from a static list; repeated names keep their first position
    pub fn seeded<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            names: names.into_iter().map(str::to_string).collect(),
        }
    }

    /// Merge `names`, skipping those already present.
    ///
    /// Calling this twice with the same names leaves the set unchanged the
    /// second time; previously present names never move.
    pub fn extend<I, S>(&mut self, names: I) -> ExtendReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ExtendReport::default();
        for name in names {
            let name = name.as_ref();
            if let Err(reason) = validate_export_name(name) {
                tracing::warn!("Not exporting '{}': {}", name, reason);
                report.failed.push((name.to_string(), reason));
                continue;
            }
            if self.names.insert(name.to_string()) {
                tracing::debug!("Exported '{}'", name);
                report.added.push(name.to_string());
            } else {
                report.skipped.push(name.to_string());
            }
        }
        report
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names in registration order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Check that a name can appear on the exported surface.
///
/// Exported names are identifiers: ASCII letters, digits and underscores,
/// not starting with a digit.
pub fn validate_export_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("name is empty".to_string()),
        Some(c) if c.is_ascii_digit() => {
            return Err("name starts with a digit".to_string());
        }
        _ => {}
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(format!("'{}' is not allowed in a name", bad));
    }
    Ok(())
}

/// Turn a human-readable label into an exportable identifier.
///
/// Characters outside `[A-Za-z0-9_]` are dropped ("Clip Closed Surface"
/// becomes "ClipClosedSurface"). Returns `None` when nothing usable is
/// left or the result would start with a digit.
pub fn make_identifier(label: &str) -> Option<String> {
    let name: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    validate_export_name(&name).ok()?;
    Some(name)
}
