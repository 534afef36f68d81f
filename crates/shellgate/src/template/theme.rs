//! CSS custom properties derived from the tenant branding.

use std::fmt;

use serde::Serialize;

use crate::model::TemplateData;

/// The three theme variables the shell stylesheet reads.
///
/// Pure function of [`TemplateData`]; holds no state of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeVars {
    pub primary: String,
    pub light_color: String,
    pub logo_width: String,
}

impl ThemeVars {
    pub fn from_template(data: &TemplateData) -> Self {
        Self {
            primary: sanitize(&data.tenant.primary_color),
            light_color: sanitize(&data.tenant.light_color),
            logo_width: sanitize(&data.tenant.logo_width_token),
        }
    }

    /// `:root { ... }` block for a `<style>` element.
    pub fn css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ThemeVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ":root {{ --primary: {}; --light-color: {}; --logo-width: {}; }}",
            self.primary, self.light_color, self.logo_width
        )
    }
}

// Values come from the backend and end up inside a <style> element.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ';' | '{' | '}' | '<' | '>' | '"' | '\'' | '\\'))
        .collect::<String>()
        .trim()
        .to_string()
}
