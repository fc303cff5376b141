//! Bar geometry. Maps laid-out rows to target rectangles for the
//! background bars: alignment edge, proportional width, and color tier.

use crate::color;
use crate::config::PanelConfig;

/// One visible row as the row layer laid it out.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSlot {
    pub path: String,
    pub depth: usize,
    /// Alignment edge of the row, `sub_tag_indent * depth`.
    pub left: f32,
    pub top: f32,
    pub height: f32,
    pub count: usize,
}

/// Target rectangle and tier for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarTarget {
    pub path: String,
    pub left: f32,
    pub width: f32,
    pub top: f32,
    pub height: f32,
    pub count: usize,
    pub tier: usize,
}

const MIN_AVAILABLE: f32 = 40.0;
const ALIGN_SLACK: f32 = 0.5;

/// Left edge the bar at `index` aligns to: the nearest preceding slot
/// whose own edge sits strictly left of this one, so sibling bars share
/// an origin and stay width-comparable. Falls back to the slot's own edge.
fn alignment_left(slots: &[RowSlot], index: usize) -> f32 {
    let own = slots[index].left;
    slots[..index]
        .iter()
        .rev()
        .find(|s| s.left < own - ALIGN_SLACK)
        .map(|s| s.left)
        .unwrap_or(own)
}

/// Computes bar targets for every slot. `max_count` is the panel-wide
/// aggregate maximum; widths scale linearly against it and cap at the
/// configured maximum or the space left of the right padding, whichever
/// is smaller.
pub fn bar_targets(
    slots: &[RowSlot],
    container_width: f32,
    max_count: usize,
    cfg: &PanelConfig,
) -> Vec<BarTarget> {
    let denom = max_count.max(1) as f32;
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let left = alignment_left(slots, i);
            let available = (container_width - left - cfg.right_padding).max(MIN_AVAILABLE);
            let actual_max = cfg.max_bar_width.min(available);
            let width = slot.count as f32 / denom * actual_max;
            BarTarget {
                path: slot.path.clone(),
                left,
                width,
                top: slot.top,
                height: slot.height,
                count: slot.count,
                tier: color::tier_for_count(slot.count, max_count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(path: &str, depth: usize, top: f32, count: usize) -> RowSlot {
        RowSlot {
            path: path.into(),
            depth,
            left: 12.0 * depth as f32,
            top,
            height: 24.0,
            count,
        }
    }

    fn cfg() -> PanelConfig {
        PanelConfig::default()
    }

    #[test]
    fn siblings_share_an_alignment_edge() {
        let slots = vec![
            slot("proj", 0, 0.0, 4),
            slot("proj/x", 1, 30.0, 3),
            slot("proj/y", 1, 60.0, 1),
        ];
        let bars = bar_targets(&slots, 400.0, 4, &cfg());
        assert_eq!(bars[1].left, bars[2].left);
        // children align at the parent's edge
        assert_eq!(bars[1].left, 0.0);
    }

    #[test]
    fn top_level_rows_align_at_their_own_edge() {
        let slots = vec![slot("a", 0, 0.0, 2), slot("b", 0, 30.0, 1)];
        let bars = bar_targets(&slots, 400.0, 2, &cfg());
        assert_eq!(bars[0].left, 0.0);
        assert_eq!(bars[1].left, 0.0);
    }

    #[test]
    fn grandchildren_align_at_the_child_edge() {
        let slots = vec![
            slot("a", 0, 0.0, 3),
            slot("a/b", 1, 30.0, 2),
            slot("a/b/c", 2, 60.0, 1),
            slot("a/b/d", 2, 90.0, 1),
        ];
        let bars = bar_targets(&slots, 400.0, 3, &cfg());
        assert_eq!(bars[2].left, 12.0);
        assert_eq!(bars[3].left, 12.0);
    }

    #[test]
    fn widths_scale_with_count_and_cap_at_max() {
        let slots = vec![
            slot("a", 0, 0.0, 4),
            slot("b", 0, 30.0, 2),
            slot("c", 0, 60.0, 1),
        ];
        let c = cfg();
        let bars = bar_targets(&slots, 1000.0, 4, &c);
        let cap = c.max_bar_width as f32;
        assert_eq!(bars[0].width, cap);
        assert!((bars[1].width - cap / 2.0).abs() < 1e-3);
        assert!((bars[2].width - cap / 4.0).abs() < 1e-3);
        for b in &bars {
            assert!(b.width <= cap + 1e-3);
        }
    }

    #[test]
    fn narrow_containers_floor_the_available_span() {
        let slots = vec![slot("a", 0, 0.0, 1)];
        let bars = bar_targets(&slots, 30.0, 1, &cfg());
        // available floors at 40 even when the container is narrower
        assert_eq!(bars[0].width, 40.0);
    }

    #[test]
    fn zero_max_count_divides_by_one() {
        let slots = vec![slot("a", 0, 0.0, 1)];
        let bars = bar_targets(&slots, 400.0, 0, &cfg());
        assert!(bars[0].width > 0.0);
    }

    #[test]
    fn tier_follows_the_count_ratio() {
        let slots = vec![
            slot("hot", 0, 0.0, 10),
            slot("warm", 0, 30.0, 6),
            slot("mild", 0, 60.0, 4),
            slot("cold", 0, 90.0, 1),
        ];
        let bars = bar_targets(&slots, 400.0, 10, &cfg());
        assert_eq!(bars[0].tier, 3);
        assert_eq!(bars[1].tier, 2);
        assert_eq!(bars[2].tier, 1);
        assert_eq!(bars[3].tier, 0);
    }
}
