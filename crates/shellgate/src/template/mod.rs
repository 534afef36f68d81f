//! Tenant/user chrome: fetch, cache and invalidation.
//!
//! - [`TemplateStore`] owns the current [`TemplateData`](crate::model::TemplateData)
//!   and its [`TemplatePhase`].
//! - [`TemplateCache`] persists the last fetched chrome across restarts.
//! - [`ThemeVars`] derives the CSS variables from the tenant branding.

pub mod cache;
pub mod store;
pub mod theme;

pub use cache::{CACHE_FILE, FileTemplateCache, MemoryTemplateCache, TemplateCache};
pub use store::{TemplatePhase, TemplateSnapshot, TemplateStore};
pub use theme::ThemeVars;
