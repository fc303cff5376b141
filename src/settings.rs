//! Declarative description of the settings surface. The tab is a table of
//! groups and fields, not imperative widget wiring, so any host front end
//! can render it: each field names its config key, its kind, and how to
//! read and write it. Color fields degrade to plain hex inputs on hosts
//! without a color picker.

use crate::color::Rgb;
use crate::config::{PanelConfig, SortKey, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// Whole milliseconds.
    Duration,
    /// Fractional pixels.
    Number,
    Text,
    /// Hex color.
    Color,
    Select { options: &'static [(&'static str, &'static str)] },
}

/// The widget a host should render for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    Text,
    ColorPicker,
    Dropdown,
}

/// What widgets the host front end can actually provide.
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetCaps {
    pub color_picker: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SettingField {
    /// camelCase config key, identical to the on-disk JSON key.
    pub key: &'static str,
    pub name: &'static str,
    pub desc: &'static str,
    pub kind: SettingKind,
}

#[derive(Debug, Clone, Copy)]
pub struct SettingGroup {
    pub title: &'static str,
    pub fields: &'static [SettingField],
}

const SORT_BY_OPTIONS: &[(&str, &str)] = &[("count", "Count"), ("latest", "Latest")];
const SORT_ORDER_OPTIONS: &[(&str, &str)] = &[("desc", "Descending"), ("asc", "Ascending")];

/// The settings tab, in display order.
pub const SETTING_GROUPS: &[SettingGroup] = &[
    SettingGroup {
        title: "Hot update",
        fields: &[
            SettingField {
                key: "metadataDebounceMs",
                name: "Metadata debounce (ms)",
                desc: "Debounce for metadata change handling; lower is snappier but costs CPU",
                kind: SettingKind::Duration,
            },
            SettingField {
                key: "frontmatterReadDelay",
                name: "Frontmatter read delay (ms)",
                desc: "Delay before reading note content when the cache has no frontmatter yet",
                kind: SettingKind::Duration,
            },
        ],
    },
    SettingGroup {
        title: "Animation",
        fields: &[
            SettingField {
                key: "expandDuration",
                name: "Slide duration (ms)",
                desc: "Height animation when a subtree expands or collapses",
                kind: SettingKind::Duration,
            },
            SettingField {
                key: "expandEasing",
                name: "Slide easing",
                desc: "CSS easing curve for the height animation",
                kind: SettingKind::Text,
            },
            SettingField {
                key: "barExpandDuration",
                name: "Bar expand (ms)",
                desc: "Horizontal grow time of the background bars",
                kind: SettingKind::Duration,
            },
            SettingField {
                key: "barCollapseDuration",
                name: "Bar collapse (ms)",
                desc: "Horizontal shrink time of the background bars",
                kind: SettingKind::Duration,
            },
            SettingField {
                key: "barPreheatExpandMs",
                name: "Bar preheat expand (ms)",
                desc: "How early the bars start revealing before the height slide lands",
                kind: SettingKind::Duration,
            },
            SettingField {
                key: "barPreheatCollapseMs",
                name: "Bar preheat collapse (ms)",
                desc: "How long the bars shrink before the height collapse begins",
                kind: SettingKind::Duration,
            },
        ],
    },
    SettingGroup {
        title: "Layout",
        fields: &[
            SettingField {
                key: "sidePadding",
                name: "Side padding (px)",
                desc: "Distance between the panel content and the container edges",
                kind: SettingKind::Number,
            },
            SettingField {
                key: "subTagIndent",
                name: "Sub-tag indent (px)",
                desc: "Text indent per nesting level; bars stay aligned with the parent",
                kind: SettingKind::Number,
            },
        ],
    },
    SettingGroup {
        title: "Colors & Appearance",
        fields: &[
            SettingField {
                key: "barColor0",
                name: "Color - lowest",
                desc: "",
                kind: SettingKind::Color,
            },
            SettingField {
                key: "barColor1",
                name: "Color - low",
                desc: "",
                kind: SettingKind::Color,
            },
            SettingField {
                key: "barColor2",
                name: "Color - mid",
                desc: "",
                kind: SettingKind::Color,
            },
            SettingField {
                key: "barColor3",
                name: "Color - high",
                desc: "",
                kind: SettingKind::Color,
            },
            SettingField {
                key: "barCornerRadius",
                name: "Bar corner radius (px)",
                desc: "",
                kind: SettingKind::Number,
            },
        ],
    },
    SettingGroup {
        title: "Sorting",
        fields: &[
            SettingField {
                key: "sortBy",
                name: "Sort by",
                desc: "",
                kind: SettingKind::Select { options: SORT_BY_OPTIONS },
            },
            SettingField {
                key: "sortOrder",
                name: "Sort order",
                desc: "",
                kind: SettingKind::Select { options: SORT_ORDER_OPTIONS },
            },
        ],
    },
];

/// Resolves the widget for a field against the host's capabilities.
pub fn widget_for(field: &SettingField, caps: WidgetCaps) -> Widget {
    match field.kind {
        SettingKind::Color if caps.color_picker => Widget::ColorPicker,
        SettingKind::Select { .. } => Widget::Dropdown,
        _ => Widget::Text,
    }
}

/// Display label for a field. Color fields rendered as plain text inputs
/// get a hex hint so the expected format is visible.
pub fn label_for(field: &SettingField, caps: WidgetCaps) -> String {
    if field.kind == SettingKind::Color && widget_for(field, caps) == Widget::Text {
        format!("{} (hex)", field.name)
    } else {
        field.name.to_string()
    }
}

/// Current value of a field, as the string its widget edits.
pub fn current_value(cfg: &PanelConfig, key: &str) -> Option<String> {
    let v = match key {
        "metadataDebounceMs" => cfg.metadata_debounce_ms.to_string(),
        "frontmatterReadDelay" => cfg.frontmatter_read_delay.to_string(),
        "expandDuration" => cfg.expand_duration.to_string(),
        "expandEasing" => cfg.expand_easing.clone(),
        "barExpandDuration" => cfg.bar_expand_duration.to_string(),
        "barCollapseDuration" => cfg.bar_collapse_duration.to_string(),
        "barPreheatExpandMs" => cfg.bar_preheat_expand_ms.to_string(),
        "barPreheatCollapseMs" => cfg.bar_preheat_collapse_ms.to_string(),
        "sidePadding" => cfg.side_padding.to_string(),
        "subTagIndent" => cfg.sub_tag_indent.to_string(),
        "barColor0" => cfg.bar_color0.clone(),
        "barColor1" => cfg.bar_color1.clone(),
        "barColor2" => cfg.bar_color2.clone(),
        "barColor3" => cfg.bar_color3.clone(),
        "barCornerRadius" => cfg.bar_corner_radius.to_string(),
        "sortBy" => match cfg.sort_by {
            SortKey::Count => "count".to_string(),
            SortKey::Latest => "latest".to_string(),
        },
        "sortOrder" => match cfg.sort_order {
            SortOrder::Desc => "desc".to_string(),
            SortOrder::Asc => "asc".to_string(),
        },
        _ => return None,
    };
    Some(v)
}

/// Writes a field from its widget's raw string. Unparsable input puts the
/// field back on its shipped default. Returns false when the raw value was
/// rejected (the key is still assigned either way).
pub fn apply(cfg: &mut PanelConfig, key: &str, raw: &str) -> bool {
    let defaults = PanelConfig::default();
    match key {
        "metadataDebounceMs" => {
            set_u64(&mut cfg.metadata_debounce_ms, raw, defaults.metadata_debounce_ms)
        }
        "frontmatterReadDelay" => {
            set_u64(&mut cfg.frontmatter_read_delay, raw, defaults.frontmatter_read_delay)
        }
        "expandDuration" => set_u64(&mut cfg.expand_duration, raw, defaults.expand_duration),
        "expandEasing" => set_text(&mut cfg.expand_easing, raw, &defaults.expand_easing),
        "barExpandDuration" => {
            set_u64(&mut cfg.bar_expand_duration, raw, defaults.bar_expand_duration)
        }
        "barCollapseDuration" => {
            set_u64(&mut cfg.bar_collapse_duration, raw, defaults.bar_collapse_duration)
        }
        "barPreheatExpandMs" => {
            set_u64(&mut cfg.bar_preheat_expand_ms, raw, defaults.bar_preheat_expand_ms)
        }
        "barPreheatCollapseMs" => {
            set_u64(&mut cfg.bar_preheat_collapse_ms, raw, defaults.bar_preheat_collapse_ms)
        }
        "sidePadding" => set_f32(&mut cfg.side_padding, raw, defaults.side_padding),
        "subTagIndent" => set_f32(&mut cfg.sub_tag_indent, raw, defaults.sub_tag_indent),
        "barColor0" => set_color(&mut cfg.bar_color0, raw, &defaults.bar_color0),
        "barColor1" => set_color(&mut cfg.bar_color1, raw, &defaults.bar_color1),
        "barColor2" => set_color(&mut cfg.bar_color2, raw, &defaults.bar_color2),
        "barColor3" => set_color(&mut cfg.bar_color3, raw, &defaults.bar_color3),
        "barCornerRadius" => set_f32(&mut cfg.bar_corner_radius, raw, defaults.bar_corner_radius),
        "sortBy" => match raw {
            "count" => {
                cfg.sort_by = SortKey::Count;
                true
            }
            "latest" => {
                cfg.sort_by = SortKey::Latest;
                true
            }
            _ => {
                cfg.sort_by = defaults.sort_by;
                false
            }
        },
        "sortOrder" => match raw {
            "desc" => {
                cfg.sort_order = SortOrder::Desc;
                true
            }
            "asc" => {
                cfg.sort_order = SortOrder::Asc;
                true
            }
            _ => {
                cfg.sort_order = defaults.sort_order;
                false
            }
        },
        _ => false,
    }
}

fn set_u64(slot: &mut u64, raw: &str, default: u64) -> bool {
    match raw.trim().parse::<u64>() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => {
            *slot = default;
            false
        }
    }
}

fn set_f32(slot: &mut f32, raw: &str, default: f32) -> bool {
    match raw.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => {
            *slot = v;
            true
        }
        _ => {
            *slot = default;
            false
        }
    }
}

fn set_text(slot: &mut String, raw: &str, default: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        *slot = default.to_string();
        false
    } else {
        *slot = trimmed.to_string();
        true
    }
}

fn set_color(slot: &mut String, raw: &str, default: &str) -> bool {
    if Rgb::parse_hex(raw).is_some() {
        *slot = raw.trim().to_string();
        true
    } else {
        *slot = default.to_string();
        false
    }
}
