//! Wire and state types shared by the gate, the template store and the
//! content composer.
//!
//! Field names serialize in camelCase. Every field also accepts the
//! snake_case spelling emitted by the backend (`main_menu`, `logo_width`,
//! `component`, ...), so payloads from either generation of the API decode
//! into the same types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Tenant name carried by the "not yet loaded" placeholder.
pub const SKELETON_NAME: &str = "Skeleton...";

// ── Chrome ─────────────────────────────────────────────────────────

/// Tenant branding. Immutable once fetched for a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantInfo {
    pub name: String,
    #[serde(alias = "logo", alias = "logo_ref")]
    pub logo_ref: String,
    #[serde(alias = "primary_color")]
    pub primary_color: String,
    #[serde(alias = "light_color")]
    pub light_color: String,
    #[serde(alias = "logo_width", alias = "logo_width_token")]
    pub logo_width_token: String,
}

/// One entry of the main menu. `id` is unique within a menu.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub href: String,
    #[serde(default, alias = "icon", alias = "icon_key")]
    pub icon_key: String,
    #[serde(
        default,
        alias = "is_active",
        alias = "is_active_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_active_default: Option<bool>,
}

/// Summary of the signed-in user shown in the header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderData {
    #[serde(alias = "full_name")]
    pub full_name: String,
    #[serde(alias = "position_name")]
    pub position_name: String,
    #[serde(alias = "avatar", alias = "avatar_ref")]
    pub avatar_ref: String,
}

/// Everything the shell needs to draw its chrome.
///
/// One instance per active session. Replaced wholesale, never patched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateData {
    pub tenant: TenantInfo,
    #[serde(alias = "main_menu")]
    pub main_menu: Vec<MenuItem>,
    pub header: HeaderData,
}

impl TemplateData {
    /// The "not yet loaded" sentinel.
    pub fn skeleton() -> Self {
        Self {
            tenant: TenantInfo {
                name: SKELETON_NAME.into(),
                logo_ref: "images/xcc_small.png".into(),
                primary_color: "#219ebc".into(),
                light_color: "#E3F6FB".into(),
                logo_width_token: "96px".into(),
            },
            main_menu: Vec::new(),
            header: HeaderData {
                full_name: SKELETON_NAME.into(),
                position_name: SKELETON_NAME.into(),
                avatar_ref: String::new(),
            },
        }
    }

    /// Empty-but-loaded chrome used when the template fetch fails.
    ///
    /// Not the sentinel, so the shell stops asking for a fetch.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_skeleton(&self) -> bool {
        self.tenant.name == SKELETON_NAME
    }

    /// Look up a menu entry by id.
    pub fn menu_item(&self, id: &str) -> Option<&MenuItem> {
        self.main_menu.iter().find(|item| item.id == id)
    }
}

// ── Page content ───────────────────────────────────────────────────

/// Declarative instruction naming a registered component and its props.
///
/// Props are not validated: `null` or a non-object decodes as no props.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    #[serde(
        rename = "componentName",
        alias = "component",
        alias = "component_name"
    )]
    pub component_name: String,
    #[serde(default, deserialize_with = "lenient_props")]
    pub props: Map<String, Value>,
}

fn lenient_props<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

impl ComponentDescriptor {
    pub fn new(component_name: impl Into<String>, props: Value) -> Self {
        let props = match props {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            component_name: component_name.into(),
            props,
        }
    }
}

/// A breadcrumb trail entry. The last entry is the current page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Page body returned by the content endpoint.
///
/// Decodes from three shapes:
///
/// ```text
/// {"content": [...], "activeMenuItemId": "home", "breadcrumbs": [...]}
/// {"content": [...], "main_menu": {"set_active": "home"}}
/// [{"component": "Card", "props": {...}}]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PageWire")]
pub struct PageResponse {
    pub content: Vec<ComponentDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_menu_item_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl PageResponse {
    /// Decode a content endpoint body.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// Descriptors stay raw `Value`s here so one malformed entry is dropped on
// its own instead of failing the whole page.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageWire {
    Bare(Vec<Value>),
    Wrapped(WrappedPage),
}

#[derive(Deserialize)]
struct WrappedPage {
    #[serde(default)]
    content: Option<Vec<Value>>,
    #[serde(default, rename = "activeMenuItemId", alias = "active_menu_item_id")]
    active_menu_item_id: Option<String>,
    #[serde(default)]
    main_menu: Option<MainMenuDirective>,
    #[serde(default)]
    breadcrumbs: Option<Vec<Breadcrumb>>,
}

#[derive(Deserialize)]
struct MainMenuDirective {
    #[serde(default)]
    set_active: Option<String>,
}

impl From<PageWire> for PageResponse {
    fn from(wire: PageWire) -> Self {
        match wire {
            PageWire::Bare(content) => Self {
                content: decode_descriptors(content),
                ..Default::default()
            },
            PageWire::Wrapped(page) => Self {
                content: decode_descriptors(page.content.unwrap_or_default()),
                active_menu_item_id: page
                    .active_menu_item_id
                    .or_else(|| page.main_menu.and_then(|m| m.set_active))
                    .filter(|id| !id.is_empty()),
                breadcrumbs: page.breadcrumbs.unwrap_or_default(),
            },
        }
    }
}

fn decode_descriptors(raw: Vec<Value>) -> Vec<ComponentDescriptor> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!("Skipping malformed content entry #{index}: {e}");
                None
            }
        })
        .collect()
}
