//! Target modes and their capability table.
//!
//! Every resource is authored for one platform dialect (its source mode) and
//! compiled for another (the target mode). Capabilities gate which branches
//! of the graph resolver run at all: plugin export and independent
//! sub-packages exist only on some platforms.

use serde::{Deserialize, Serialize};

/// Platform dialect a resource targets or was authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Wx,
    Ali,
    Swan,
    Web,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wx => "wx",
            Self::Ali => "ali",
            Self::Swan => "swan",
            Self::Web => "web",
        }
    }

    /// Parse a mode name as it appears in resource queries (`?mode=ali`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "wx" => Some(Self::Wx),
            "ali" => Some(Self::Ali),
            "swan" => Some(Self::Swan),
            "web" => Some(Self::Web),
            _ => None,
        }
    }

    /// The platform's implicit global object identifier.
    #[must_use]
    pub fn global_object(&self) -> &'static str {
        match self {
            Self::Wx => "wx",
            Self::Ali => "my",
            Self::Swan => "swan",
            Self::Web => "window",
        }
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Wx => Capabilities {
                supports_plugins: true,
                supports_independent: true,
                tab_bar: TabBarSchema {
                    list_key: "list",
                    icon_key: "iconPath",
                    active_icon_key: "selectedIconPath",
                },
                option_menu: Some(OptionMenuSchema { icon_key: "icon" }),
            },
            Self::Ali => Capabilities {
                supports_plugins: false,
                // Alipay has no independent sub-packages; the field is
                // stripped instead of resolved.
                supports_independent: false,
                tab_bar: TabBarSchema {
                    list_key: "items",
                    icon_key: "icon",
                    active_icon_key: "activeIcon",
                },
                option_menu: None,
            },
            Self::Swan => Capabilities {
                supports_plugins: false,
                supports_independent: true,
                tab_bar: TabBarSchema {
                    list_key: "list",
                    icon_key: "iconPath",
                    active_icon_key: "selectedIconPath",
                },
                option_menu: None,
            },
            Self::Web => Capabilities {
                supports_plugins: false,
                supports_independent: false,
                tab_bar: TabBarSchema {
                    list_key: "list",
                    icon_key: "iconPath",
                    active_icon_key: "selectedIconPath",
                },
                option_menu: None,
            },
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key names the target platform uses inside its `tabBar` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabBarSchema {
    pub list_key: &'static str,
    pub icon_key: &'static str,
    pub active_icon_key: &'static str,
}

/// Key names for the option menu config, absent on platforms without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionMenuSchema {
    pub icon_key: &'static str,
}

/// What the target platform supports, keyed by [`Mode`].
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub supports_plugins: bool,
    pub supports_independent: bool,
    pub tab_bar: TabBarSchema,
    pub option_menu: Option<OptionMenuSchema>,
}
