//! Variable resolution module
//!
//! Resolves `((placeholder))` tokens in deployment manifests against the
//! secret store, generating missing values on demand.
//!
//! Two implementations share the [`VariableResolver`] contract:
//! [`EnabledResolver`] talks to the store, [`DisabledResolver`] leaves
//! manifests untouched. Which one a deployment gets is a configuration
//! decision made when the resolver is built.

mod disabled;
mod engine;
mod generator;
mod response;
mod substitute;

use async_trait::async_trait;
use manifold_domain::{DeploymentContext, IgnorePattern, VariableSpec};
use serde_json::Value;

use crate::error::ResolverResult;

pub use disabled::DisabledResolver;
pub use engine::EnabledResolver;
pub use generator::GenerationPolicy;
pub use response::{FetchedVariable, GeneratedVariable};

/// Options for [`VariableResolver::interpolate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpolateOptions {
    /// Subtrees excluded from placeholder discovery.
    pub subtrees_to_ignore: Vec<IgnorePattern>,

    /// Reject relative placeholder names before contacting the store.
    pub must_be_absolute_name: bool,
}

impl InterpolateOptions {
    /// Creates default options: nothing ignored, relative names allowed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds subtrees to ignore.
    #[must_use]
    pub fn ignoring(mut self, patterns: impl IntoIterator<Item = IgnorePattern>) -> Self {
        self.subtrees_to_ignore.extend(patterns);
        self
    }

    /// Requires every placeholder name to be absolute.
    #[must_use]
    pub const fn absolute_names_only(mut self) -> Self {
        self.must_be_absolute_name = true;
        self
    }
}

/// Options for [`VariableResolver::prepare_and_get_property`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyOptions {
    /// DNS names of the instance group, used to build certificate parameters.
    pub dns_record_names: Vec<String>,

    /// Reject relative placeholder names before consulting the store.
    pub must_be_absolute_name: bool,
}

/// Resolves manifest placeholders for a deployment.
#[async_trait]
pub trait VariableResolver: Send + Sync {
    /// Returns a copy of `tree` with every placeholder outside the ignored
    /// subtrees replaced by its value.
    ///
    /// A placeholder making up a whole string is replaced by the value with
    /// its native type; one embedded in surrounding text is replaced by the
    /// value's textual form. Either every placeholder is substituted or the
    /// call fails; the input is never modified.
    ///
    /// # Errors
    /// - [`ResolverError::IncorrectNameSyntax`] listing every malformed token.
    /// - [`ResolverError::AbsoluteNameRequired`] for relative names when
    ///   absolute ones are required.
    /// - [`ResolverError::Fetch`] listing every variable that could not be
    ///   fetched or descended into.
    ///
    /// [`ResolverError::IncorrectNameSyntax`]: crate::ResolverError::IncorrectNameSyntax
    /// [`ResolverError::AbsoluteNameRequired`]: crate::ResolverError::AbsoluteNameRequired
    /// [`ResolverError::Fetch`]: crate::ResolverError::Fetch
    async fn interpolate(
        &self,
        tree: &Value,
        ctx: &DeploymentContext,
        options: &InterpolateOptions,
    ) -> ResolverResult<Value>;

    /// Resolves a single job property.
    ///
    /// Returns `default` when `value` is absent and `value` itself when it is
    /// not a whole placeholder. For a whole placeholder the store is checked;
    /// a missing variable yields `default` when there is one, and otherwise is
    /// generated if `variable_type` is given and generation is not suppressed
    /// with `!`. The placeholder itself is returned so the generated secret
    /// never lands in the manifest.
    ///
    /// # Errors
    /// Name syntax, fetch and generation errors.
    async fn prepare_and_get_property(
        &self,
        value: Option<&Value>,
        default: Option<&Value>,
        variable_type: Option<&str>,
        ctx: &DeploymentContext,
        options: &PropertyOptions,
    ) -> ResolverResult<Option<Value>>;

    /// Generates every declared variable, in order.
    ///
    /// # Errors
    /// Name syntax errors for any declared name (checked before generating
    /// anything), then the first generation error.
    async fn generate_values(
        &self,
        variables: &[VariableSpec],
        ctx: &DeploymentContext,
    ) -> ResolverResult<()>;
}
