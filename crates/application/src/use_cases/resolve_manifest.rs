//! Resolve deployment manifest use case.

use std::sync::Arc;

use manifold_domain::{DeploymentContext, IgnorePattern};
use serde_json::{Map, Value};

use crate::error::ResolverResult;
use crate::variable_resolver::{InterpolateOptions, VariableResolver};

/// Key holding the raw copy of a `properties` map.
pub const UNINTERPOLATED_PROPERTIES: &str = "uninterpolated_properties";

const PROPERTIES: &str = "properties";

/// Use case for turning a raw deployment manifest into a resolved one.
///
/// Every `properties` map at the global, instance group and job level is
/// copied to an `uninterpolated_properties` sibling that interpolation never
/// touches, so later stages can still see the placeholders the operator wrote.
pub struct ResolveManifest {
    resolver: Arc<dyn VariableResolver>,
}

impl ResolveManifest {
    /// Creates a new `ResolveManifest` use case.
    #[must_use]
    pub fn new(resolver: Arc<dyn VariableResolver>) -> Self {
        Self { resolver }
    }

    /// Returns the resolved copy of `raw`.
    ///
    /// When `resolve_interpolation` is false only the shadow copies are
    /// injected.
    ///
    /// # Errors
    /// Propagates any resolver error from interpolation.
    pub async fn execute(
        &self,
        raw: &Value,
        ctx: &DeploymentContext,
        resolve_interpolation: bool,
    ) -> ResolverResult<Value> {
        let mut manifest = raw.clone();
        inject_uninterpolated_properties(&mut manifest);

        if !resolve_interpolation {
            return Ok(manifest);
        }

        let options = InterpolateOptions::new().ignoring(shadow_ignore_patterns());
        self.resolver.interpolate(&manifest, ctx, &options).await
    }
}

/// Patterns covering every location a shadow copy can be injected at, for
/// both the current and the legacy (`jobs` / `templates`) manifest layout.
#[must_use]
pub fn shadow_ignore_patterns() -> Vec<IgnorePattern> {
    vec![
        IgnorePattern::new().key(UNINTERPOLATED_PROPERTIES),
        IgnorePattern::new()
            .key("instance_groups")
            .any_index()
            .key(UNINTERPOLATED_PROPERTIES),
        IgnorePattern::new()
            .key("instance_groups")
            .any_index()
            .key("jobs")
            .any_index()
            .key(UNINTERPOLATED_PROPERTIES),
        IgnorePattern::new()
            .key("jobs")
            .any_index()
            .key(UNINTERPOLATED_PROPERTIES),
        IgnorePattern::new()
            .key("jobs")
            .any_index()
            .key("templates")
            .any_index()
            .key(UNINTERPOLATED_PROPERTIES),
    ]
}

fn inject_uninterpolated_properties(manifest: &mut Value) {
    let Some(root) = manifest.as_object_mut() else {
        return;
    };
    copy_properties(root);

    // Manifests without `instance_groups` use the legacy layout.
    let (outer, inner) = if root.contains_key("instance_groups") {
        ("instance_groups", "jobs")
    } else {
        ("jobs", "templates")
    };

    let Some(Value::Array(groups)) = root.get_mut(outer) else {
        return;
    };
    for group in groups.iter_mut().filter_map(Value::as_object_mut) {
        copy_properties(group);
        if let Some(Value::Array(jobs)) = group.get_mut(inner) {
            for job in jobs.iter_mut().filter_map(Value::as_object_mut) {
                copy_properties(job);
            }
        }
    }
}

fn copy_properties(node: &mut Map<String, Value>) {
    if let Some(properties @ Value::Object(_)) = node.get(PROPERTIES) {
        let shadow = properties.clone();
        node.insert(UNINTERPOLATED_PROPERTIES.to_string(), shadow);
    }
}
