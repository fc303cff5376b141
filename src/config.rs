use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::anim::Easing;

/// Sibling ordering key for the tag tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Count,
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Desc,
    Asc,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runtime configuration of the panel. Keys are camelCase on disk and every
/// field carries its own default, so a partially stored config merges over
/// the defaults field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelConfig {
    /// Milliseconds without input before the panel enters idle presentation.
    pub idle_timeout: u64,
    /// Bar alpha while the panel is active.
    pub active_bar_opacity: f32,
    /// Bar alpha while the panel is idle.
    pub idle_bar_alpha: f32,
    /// Row-height expand/collapse duration (ms).
    pub expand_duration: u64,
    /// CSS easing string for the height animation.
    pub expand_easing: String,
    /// Hard cap on bar width (px).
    pub max_bar_width: f32,
    /// Width/left/top resync transition duration (ms).
    pub bar_animation_duration: u64,
    /// Bar color transition duration (ms).
    pub bar_fade_duration: u64,
    /// Text indent per depth level (px).
    pub sub_tag_indent: f32,
    /// Panel side padding (px).
    pub side_padding: f32,

    pub bar_expand_duration: u64,
    pub bar_collapse_duration: u64,
    pub bar_fade_in_duration: u64,
    pub bar_fade_out_duration: u64,
    /// Bar scale-up starts this long before the height expand completes (ms).
    pub bar_preheat_expand_ms: u64,
    /// Height collapse starts this long before the bar collapse completes (ms).
    pub bar_preheat_collapse_ms: u64,

    pub bar_color0: String,
    pub bar_color1: String,
    pub bar_color2: String,
    pub bar_color3: String,
    pub bar_corner_radius: f32,

    pub right_padding: f32,

    pub sort_by: SortKey,
    pub sort_order: SortOrder,

    pub metadata_debounce_ms: u64,
    pub frontmatter_read_delay: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            idle_timeout: 8000,
            active_bar_opacity: 0.30,
            idle_bar_alpha: 0.95,
            expand_duration: 320,
            expand_easing: "cubic-bezier(0.2,0.8,0.2,1)".to_string(),
            max_bar_width: 300.0,
            bar_animation_duration: 320,
            bar_fade_duration: 200,
            sub_tag_indent: 12.0,
            side_padding: 16.0,

            bar_expand_duration: 260,
            bar_collapse_duration: 220,
            bar_fade_in_duration: 160,
            bar_fade_out_duration: 140,
            bar_preheat_expand_ms: 100,
            bar_preheat_collapse_ms: 80,

            bar_color0: "#9BE9A8".to_string(),
            bar_color1: "#40C463".to_string(),
            bar_color2: "#30A14E".to_string(),
            bar_color3: "#216E39".to_string(),
            bar_corner_radius: 4.0,

            right_padding: 12.0,

            sort_by: SortKey::Count,
            sort_order: SortOrder::Desc,

            metadata_debounce_ms: 40,
            frontmatter_read_delay: 80,
        }
    }
}

impl PanelConfig {
    /// Loads a config file, merging stored keys over defaults. A missing or
    /// unreadable file yields the defaults; the panel never fails to open
    /// because of its config.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!(?path, %err, "config parse failed, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Per-file modify debounce, clamped to a sane window around the
    /// configured value.
    pub fn modify_debounce(&self) -> Duration {
        Duration::from_millis(self.metadata_debounce_ms.clamp(12, 120))
    }

    /// Delay before the pending metadata batch is flushed.
    pub fn meta_batch_delay(&self) -> Duration {
        Duration::from_millis(self.metadata_debounce_ms.max(1))
    }

    /// Artificial delay before a raw-content read, giving the host cache a
    /// chance to settle first.
    pub fn frontmatter_delay(&self) -> Duration {
        Duration::from_millis(self.frontmatter_read_delay)
    }

    /// Delay before the post-batch recheck pass.
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_millis((self.frontmatter_read_delay * 2).max(40))
    }

    /// Parsed easing curve, falling back to the shipped default when the
    /// stored string is not a valid CSS easing.
    pub fn easing(&self) -> Easing {
        Easing::parse_css(&self.expand_easing).unwrap_or_else(Easing::standard)
    }

    pub fn bar_color(&self, tier: usize) -> &str {
        match tier {
            0 => &self.bar_color0,
            1 => &self.bar_color1,
            2 => &self.bar_color2,
            _ => &self.bar_color3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipping_values() {
        let cfg = PanelConfig::default();
        assert_eq!(cfg.idle_timeout, 8000);
        assert_eq!(cfg.expand_duration, 320);
        assert_eq!(cfg.bar_color0, "#9BE9A8");
        assert_eq!(cfg.sort_by, SortKey::Count);
        assert_eq!(cfg.sort_order, SortOrder::Desc);
    }

    #[test]
    fn partial_json_merges_over_defaults() {
        let cfg: PanelConfig =
            serde_json::from_str(r#"{"idleTimeout": 1200, "sortBy": "latest"}"#).unwrap();
        assert_eq!(cfg.idle_timeout, 1200);
        assert_eq!(cfg.sort_by, SortKey::Latest);
        // untouched keys keep their defaults
        assert_eq!(cfg.metadata_debounce_ms, 40);
        assert_eq!(cfg.bar_color3, "#216E39");
    }

    #[test]
    fn keys_serialize_camel_case() {
        let text = serde_json::to_string(&PanelConfig::default()).unwrap();
        assert!(text.contains("\"metadataDebounceMs\""));
        assert!(text.contains("\"barPreheatExpandMs\""));
        assert!(text.contains("\"barColor0\""));
        assert!(text.contains("\"sortOrder\":\"desc\""));
    }

    #[test]
    fn debounce_clamped_to_window() {
        let mut cfg = PanelConfig::default();
        cfg.metadata_debounce_ms = 1;
        assert_eq!(cfg.modify_debounce(), Duration::from_millis(12));
        cfg.metadata_debounce_ms = 5000;
        assert_eq!(cfg.modify_debounce(), Duration::from_millis(120));
        cfg.metadata_debounce_ms = 60;
        assert_eq!(cfg.modify_debounce(), Duration::from_millis(60));
    }

    #[test]
    fn recheck_delay_floors_at_40ms() {
        let mut cfg = PanelConfig::default();
        cfg.frontmatter_read_delay = 5;
        assert_eq!(cfg.recheck_delay(), Duration::from_millis(40));
        cfg.frontmatter_read_delay = 80;
        assert_eq!(cfg.recheck_delay(), Duration::from_millis(160));
    }
}
