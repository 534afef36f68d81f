//! Component registry: descriptor name → HTML template.
//!
//! Dispatch is a closed lookup. A descriptor whose name is not registered is
//! skipped with a warning; a descriptor whose template fails to render is
//! skipped the same way. Neither aborts the page.
//!
//! Templates are [minijinja](https://docs.rs/minijinja) sources rendered
//! with the descriptor's `props` as the context, HTML-autoescaped. Props are
//! passed through as given; a missing prop renders as empty.

use std::collections::BTreeSet;
use std::fmt;

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use tracing::warn;

use crate::error::RenderError;
use crate::model::ComponentDescriptor;

const CTA: &str = r#"<section class="cta cta-{{ type | default("warning") }}" data-component="CTA">
  {%- if badge %}<span class="cta-badge">{{ badge }}</span>{% endif %}
  <h3 class="cta-title">{{ title }}</h3>
  {%- if description %}<p class="cta-description">{{ description }}</p>{% endif %}
  {%- if button_href %}<a class="button button-{{ type | default("warning") }}" href="{{ button_href | safe_href }}">{{ button_name }}</a>{% endif %}
</section>"#;

const CARD: &str = r#"<article class="card" data-component="Card">
  <h3 class="card-title">{{ title }}</h3>
  {%- if description %}<p class="card-description">{{ description }}</p>{% endif %}
  {%- if href %}<a class="card-link" href="{{ href | safe_href }}">{{ link_label | default("Ver más") }}</a>{% endif %}
</article>"#;

const BREADCRUMB: &str = r##"<nav aria-label="breadcrumb" data-component="Breadcrumb"><ol>
  {%- for item in items %}
  {%- if loop.last %}<li><span aria-current="page">{{ item.label }}</span></li>
  {%- else %}<li><a href="{{ item.href | safe_href }}">{{ item.label }}</a></li>{% endif %}
  {%- endfor %}
</ol></nav>"##;

const NAV: &str = r#"<nav class="main-nav" data-component="Nav"><ul>
  {%- for item in items %}
  <li><a href="{{ item.href | safe_href }}" data-icon="{{ item.icon }}"{% if item.is_active %} class="active" aria-current="page"{% endif %}>{{ item.label }}</a></li>
  {%- endfor %}
</ul></nav>"#;

const BUTTON: &str = r#"{% if href -%}
<a class="button button-{{ variant | default("default") }}" data-component="Button" href="{{ href | safe_href }}">{{ label }}</a>
{%- else -%}
<button type="button" class="button button-{{ variant | default("default") }}" data-component="Button">{{ label }}</button>
{%- endif %}"#;

/// Link schemes a component may emit. Relative links always pass.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

/// Placeholder emitted for a missing or refused link.
const INERT_HREF: &str = "#";

/// `safe_href` filter: passes relative links and [`ALLOWED_SCHEMES`],
/// replaces anything else (`javascript:`, `data:`, ...) with `#`.
///
/// Whitespace and control characters are ignored when reading the scheme,
/// since browsers drop them too (`java\tscript:`).
pub fn safe_href(value: Option<String>) -> String {
    let Some(href) = value else {
        return INERT_HREF.to_string();
    };
    let compact: String = href
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    if compact.is_empty() {
        return INERT_HREF.to_string();
    }
    let scheme = compact
        .split_once(':')
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.contains(['/', '?', '#']));
    match scheme {
        None => href,
        Some(scheme) if ALLOWED_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) => href,
        Some(scheme) => {
            warn!("Refusing {scheme}: link in component props");
            INERT_HREF.to_string()
        }
    }
}

/// Built-in component names and their templates.
pub const BUILTIN_COMPONENTS: &[(&str, &str)] = &[
    ("CTA", CTA),
    ("Card", CARD),
    ("Breadcrumb", BREADCRUMB),
    ("Nav", NAV),
    ("Button", BUTTON),
];

/// One successfully rendered descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedComponent {
    pub name: String,
    pub html: String,
}

/// A descriptor that produced no output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedComponent {
    pub name: String,
    pub reason: String,
}

/// Output of [`ComponentRegistry::render_all`], in descriptor order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenderedComponents {
    pub components: Vec<RenderedComponent>,
    pub skipped: Vec<SkippedComponent>,
}

impl RenderedComponents {
    pub fn html(&self) -> String {
        self.components
            .iter()
            .map(|c| c.html.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Closed set of renderable components.
pub struct ComponentRegistry {
    env: Environment<'static>,
    names: BTreeSet<String>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &self.names)
            .finish()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// An empty registry. Every descriptor will be skipped.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.add_filter("safe_href", safe_href);
        Self {
            env,
            names: BTreeSet::new(),
        }
    }

    /// Registry with `CTA`, `Card`, `Breadcrumb`, `Nav` and `Button`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for &(name, source) in BUILTIN_COMPONENTS {
            if let Err(e) = registry.env.add_template(name, source) {
                warn!("Built-in component {name} failed to compile: {e}");
                continue;
            }
            registry.names.insert(name.to_string());
        }
        registry
    }

    /// Register (or replace) a component template.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), RenderError> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|source| RenderError::Template {
                component: name.clone(),
                source,
            })?;
        self.names.insert(name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Render one descriptor. `None` when the name is not registered.
    pub fn render(&self, descriptor: &ComponentDescriptor) -> Option<Result<String, RenderError>> {
        let name = descriptor.component_name.as_str();
        if !self.contains(name) {
            return None;
        }
        let result = self
            .env
            .get_template(name)
            .and_then(|tmpl| tmpl.render(&descriptor.props))
            .map_err(|source| RenderError::Template {
                component: name.to_string(),
                source,
            });
        Some(result)
    }

    /// Render descriptors in order, skipping unknown or failing ones.
    pub fn render_all(&self, descriptors: &[ComponentDescriptor]) -> RenderedComponents {
        let mut out = RenderedComponents::default();
        for descriptor in descriptors {
            let name = &descriptor.component_name;
            match self.render(descriptor) {
                Some(Ok(html)) => out.components.push(RenderedComponent {
                    name: name.clone(),
                    html,
                }),
                Some(Err(e)) => {
                    warn!("Skipping component {name}: {e}");
                    out.skipped.push(SkippedComponent {
                        name: name.clone(),
                        reason: e.to_string(),
                    });
                }
                None => {
                    warn!("Skipping unknown component {name}");
                    out.skipped.push(SkippedComponent {
                        name: name.clone(),
                        reason: "unknown component".to_string(),
                    });
                }
            }
        }
        out
    }
}
