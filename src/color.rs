use crate::config::PanelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Fallback green used when a configured color cannot be parsed.
    pub const FALLBACK: Rgb = Rgb { r: 64, g: 169, b: 99 };

    /// Parses `#RRGGBB` or `#RGB` (leading `#` optional).
    pub fn parse_hex(hex: &str) -> Option<Rgb> {
        let h = hex.trim().trim_start_matches('#');
        let expanded;
        let h = match h.len() {
            3 => {
                expanded = h
                    .chars()
                    .flat_map(|c| [c, c])
                    .collect::<String>();
                expanded.as_str()
            }
            6 => h,
            _ => return None,
        };
        let v = u32::from_str_radix(h, 16).ok()?;
        Some(Rgb {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        })
    }
}

/// Quantizes a count/max ratio into a color tier. The lowest tier covers
/// everything at or below a quarter of the maximum, including zero.
pub fn tier_for_ratio(ratio: f32) -> usize {
    if ratio > 0.75 {
        3
    } else if ratio > 0.5 {
        2
    } else if ratio > 0.25 {
        1
    } else {
        0
    }
}

pub fn tier_for_count(count: usize, max_count: usize) -> usize {
    tier_for_ratio(count as f32 / max_count.max(1) as f32)
}

/// Resolves the configured color of a tier, falling back to a neutral green
/// when the stored string is not valid hex.
pub fn tier_color(cfg: &PanelConfig, tier: usize) -> Rgb {
    Rgb::parse_hex(cfg.bar_color(tier)).unwrap_or(Rgb::FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        assert_eq!(
            Rgb::parse_hex("#40C463"),
            Some(Rgb { r: 0x40, g: 0xC4, b: 0x63 })
        );
        assert_eq!(
            Rgb::parse_hex("216e39"),
            Some(Rgb { r: 0x21, g: 0x6e, b: 0x39 })
        );
    }

    #[test]
    fn expands_three_digit_shorthand() {
        assert_eq!(
            Rgb::parse_hex("#4c6"),
            Some(Rgb { r: 0x44, g: 0xcc, b: 0x66 })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Rgb::parse_hex(""), None);
        assert_eq!(Rgb::parse_hex("#12345"), None);
        assert_eq!(Rgb::parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn tier_thresholds_are_exclusive() {
        assert_eq!(tier_for_ratio(0.0), 0);
        assert_eq!(tier_for_ratio(0.25), 0);
        assert_eq!(tier_for_ratio(0.26), 1);
        assert_eq!(tier_for_ratio(0.5), 1);
        assert_eq!(tier_for_ratio(0.51), 2);
        assert_eq!(tier_for_ratio(0.75), 2);
        assert_eq!(tier_for_ratio(0.76), 3);
        assert_eq!(tier_for_ratio(1.0), 3);
    }

    #[test]
    fn tier_for_count_floors_max_at_one() {
        assert_eq!(tier_for_count(0, 0), 0);
        assert_eq!(tier_for_count(1, 0), 3);
        assert_eq!(tier_for_count(1, 4), 0);
        assert_eq!(tier_for_count(4, 4), 3);
    }

    #[test]
    fn unparsable_config_color_falls_back() {
        let mut cfg = PanelConfig::default();
        cfg.bar_color2 = "not-a-color".to_string();
        assert_eq!(tier_color(&cfg, 2), Rgb::FALLBACK);
        assert_eq!(tier_color(&cfg, 0), Rgb { r: 0x9B, g: 0xE9, b: 0xA8 });
    }
}
