//! User-facing preferences persisted in the state store.
//!
//! Stored as `{"version": 2, "settings": {...}}`. Two older unversioned
//! layouts are still read and upgraded in place; anything else falls back
//! to defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

pub const SETTINGS_VERSION: u64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub organize_root: String,
    pub enable_auto_organize: bool,
    /// Path template with `{Artist}`, `{Album}`, `{Title}`, `{Year}`.
    pub organize_rule: String,
    pub theme: ThemeSettings,
    pub sidebar: SidebarSettings,
    pub minimize_to_tray: bool,
    pub close_to_tray: bool,
    pub show_quality_badges: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicBackground {
    None,
    #[default]
    Cover,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeSettings {
    pub mode: String,
    pub dynamic_bg: DynamicBackground,
    pub custom_background: CustomBackground,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomBackground {
    pub image_path: String,
    pub blur: f64,
    pub opacity: f64,
    pub mask_color: String,
    pub mask_alpha: f64,
    pub scale: f64,
    pub foreground_style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SidebarSettings {
    pub show_local_music: bool,
    pub show_favorites: bool,
    pub show_recent: bool,
    pub show_folders: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            organize_root: String::new(),
            enable_auto_organize: false,
            organize_rule: "{Artist}/{Album}/{Title}".to_string(),
            theme: ThemeSettings::default(),
            sidebar: SidebarSettings::default(),
            minimize_to_tray: false,
            close_to_tray: false,
            show_quality_badges: true,
        }
    }
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            mode: "dark".to_string(),
            dynamic_bg: DynamicBackground::default(),
            custom_background: CustomBackground::default(),
        }
    }
}

impl Default for CustomBackground {
    fn default() -> Self {
        Self {
            image_path: String::new(),
            blur: 10.0,
            opacity: 1.0,
            mask_color: "#000000".to_string(),
            mask_alpha: 0.3,
            scale: 1.0,
            foreground_style: "light".to_string(),
        }
    }
}

impl Default for SidebarSettings {
    fn default() -> Self {
        Self {
            show_local_music: true,
            show_favorites: true,
            show_recent: true,
            show_folders: true,
        }
    }
}

impl AppSettings {
    /// The value written to storage.
    pub fn to_stored(&self) -> Value {
        json!({ "version": SETTINGS_VERSION, "settings": self })
    }

    /// Read any known stored layout. Never fails.
    pub fn from_stored(raw: &Value) -> Self {
        match upgrade(raw) {
            Some(v) => serde_json::from_value(v).unwrap_or_else(|e| {
                warn!("stored settings do not fit the current schema, using defaults: {e}");
                Self::default()
            }),
            None => {
                warn!("unrecognised stored settings, using defaults");
                Self::default()
            }
        }
    }
}

/// Bring a stored value up to the current settings object.
fn upgrade(raw: &Value) -> Option<Value> {
    let obj = raw.as_object()?;
    match obj.get("version") {
        Some(v) if v.as_u64() == Some(SETTINGS_VERSION) => obj.get("settings").filter(|s| s.is_object()).cloned(),
        Some(_) => None,
        None if is_v0(obj) => {
            info!("upgrading settings from the original layout");
            Some(v1_to_v2(&v0_to_v1(obj)))
        }
        None => {
            info!("upgrading unversioned settings");
            Some(v1_to_v2(obj))
        }
    }
}

fn is_v0(obj: &Map<String, Value>) -> bool {
    obj.get("theme")
        .and_then(Value::as_object)
        .is_some_and(|t| t.contains_key("enableDynamicBg") || t.contains_key("customBgPath"))
}

/// `theme.enableDynamicBg` and the flat custom background fields become
/// `theme.dynamicBgType` and a `customBackground` object.
fn v0_to_v1(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut out = obj.clone();
    let mut theme = obj.get("theme").and_then(Value::as_object).cloned().unwrap_or_default();

    let enabled = theme.remove("enableDynamicBg").and_then(|v| v.as_bool()).unwrap_or(true);
    let path = theme
        .remove("customBgPath")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let kind = if !path.is_empty() {
        "custom"
    } else if enabled {
        "cover"
    } else {
        "none"
    };

    let mut bg = Map::new();
    bg.insert("imagePath".into(), Value::String(path));
    for key in ["opacity", "blur"] {
        if let Some(v) = theme.remove(key) {
            bg.insert(key.into(), v);
        }
    }

    theme.insert("dynamicBgType".into(), Value::String(kind.into()));
    out.insert("theme".into(), Value::Object(theme));
    out.insert("customBackground".into(), Value::Object(bg));
    out
}

/// `theme.dynamicBgType` becomes `theme.dynamicBg` and the custom
/// background moves under `theme`.
fn v1_to_v2(obj: &Map<String, Value>) -> Value {
    let mut out = obj.clone();
    let mut theme = out
        .remove("theme")
        .and_then(|t| match t {
            Value::Object(m) => Some(m),
            _ => None,
        })
        .unwrap_or_default();

    if let Some(kind) = theme.remove("dynamicBgType") {
        theme.insert("dynamicBg".into(), kind);
    }
    if let Some(bg) = out.remove("customBackground") {
        theme.entry("customBackground").or_insert(bg);
    }
    out.insert("theme".into(), Value::Object(theme));
    Value::Object(out)
}
