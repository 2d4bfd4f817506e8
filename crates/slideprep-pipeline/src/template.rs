//! Conversion-script templating.
//!
//! This module defines the [`TemplateRenderer`] trait, the seam behind
//! which the template engine sits, and [`PlaceholderRenderer`], which
//! substitutes `{{ name }}` placeholders from a [`TemplateParams`] map.
//! Templates only ever need plain value interpolation. Any other
//! template syntax (filters, `{% %}` blocks, `{# #}` comments) is
//! rejected rather than passed through into the rendered script.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::types::format_decimal;

/// Suffix stripped from a template file name to form the rendered
/// script's file name.
pub const TEMPLATE_SUFFIX: &str = ".jinja2";

// Literal pattern; exercised by the tests below.
#[allow(clippy::expect_used)]
static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

#[allow(clippy::expect_used)]
static DELIMITER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[{%#]").expect("delimiter pattern is valid"));

/// Errors that can occur while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The template references parameters that were not supplied.
    #[error("template is missing parameter bindings for: {}", .0.join(", "))]
    MissingParameter(Vec<String>),

    /// The template uses syntax beyond `{{ name }}` substitution.
    #[error("unsupported template syntax on line {line}: {snippet}")]
    UnsupportedSyntax {
        /// 1-based line of the first unsupported construct.
        line: usize,
        /// The offending line, trimmed.
        snippet: String,
    },
}

/// Named parameters for a template render, stored as their rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams(BTreeMap<String, String>);

impl TemplateParams {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a float parameter, formatted with [`format_decimal`].
    #[must_use]
    pub fn with_float(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_owned(), format_decimal(value));
        self
    }

    /// Bind a text parameter verbatim.
    #[must_use]
    pub fn with_text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_owned(), value.into());
        self
    }

    /// Rendered value of a parameter, if bound.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parameters for a conversion script: `mpp_x` and `mpp_y`, with
    /// `mpp_y` defaulting to `mpp_x`.
    #[must_use]
    pub fn pixel_size(mpp_x: f64, mpp_y: Option<f64>) -> Self {
        Self::new()
            .with_float("mpp_x", mpp_x)
            .with_float("mpp_y", mpp_y.unwrap_or(mpp_x))
    }
}

/// Trait for template engines.
///
/// Input: template source text and bound parameters.
/// Output: the rendered text.
pub trait TemplateRenderer {
    /// Render `template` with `params`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if the template cannot be rendered with
    /// the given parameters.
    fn render(&self, template: &str, params: &TemplateParams) -> Result<String, RenderError>;
}

/// `{{ name }}` substitution. Whitespace inside the braces is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, params: &TemplateParams) -> Result<String, RenderError> {
        check_supported(template)?;

        let mut missing: Vec<String> = PLACEHOLDER_PATTERN
            .captures_iter(template)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| params.get(name).is_none())
            .map(str::to_owned)
            .collect();
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(RenderError::MissingParameter(missing));
        }

        let rendered = PLACEHOLDER_PATTERN.replace_all(template, |caps: &Captures<'_>| {
            caps.get(1)
                .and_then(|m| params.get(m.as_str()))
                .unwrap_or_default()
                .to_owned()
        });
        Ok(rendered.into_owned())
    }
}

/// Reject any `{{`, `{%` or `{#` that is not part of a plain placeholder.
fn check_supported(template: &str) -> Result<(), RenderError> {
    for (index, line) in template.lines().enumerate() {
        let stripped = PLACEHOLDER_PATTERN.replace_all(line, "");
        if DELIMITER_PATTERN.is_match(&stripped) {
            return Err(RenderError::UnsupportedSyntax {
                line: index + 1,
                snippet: line.trim().to_owned(),
            });
        }
    }
    Ok(())
}

/// File name of the script rendered from `template_name` for a tissue:
/// `<tissue>_<template name without .jinja2>`.
#[must_use]
pub fn rendered_script_name(tissue_name: &str, template_name: &str) -> String {
    let stem = template_name
        .strip_suffix(TEMPLATE_SUFFIX)
        .unwrap_or(template_name);
    format!("{tissue_name}_{stem}")
}
