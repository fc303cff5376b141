//! Bar overlay engine. Owns one animated bar per visible tag row and keeps
//! the set reconciled against the row layout: the per-frame rebuild pass
//! retargets geometry (snapping inside a sync window, easing outside it),
//! creates bars for new rows, and drops bars whose row is gone.
//!
//! Motion that is not plain geometry tracking goes through the play
//! operations: reveal-from-left on expand, shrink-to-left on collapse, and
//! the flagged removal animation for tags that crossed to zero.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::anim::{Easing, Transition};
use crate::color::{self, Rgb};
use crate::config::PanelConfig;
use crate::layout::{self, BarTarget, RowSlot};

/// Tier color cross-fade duration.
const COLOR_FADE: Duration = Duration::from_millis(200);
/// Minimum spacing between rebuild passes.
const REBUILD_GATE: Duration = Duration::from_millis(8);
/// Floor for the rebuild retarget duration outside a sync window.
const RETARGET_FLOOR_MS: u64 = 200;

#[derive(Debug, Clone)]
struct ColorFade {
    from: Rgb,
    to: Rgb,
    t: Transition,
}

impl ColorFade {
    fn settled(c: Rgb, now: Instant) -> Self {
        Self { from: c, to: c, t: Transition::settled(1.0, now) }
    }

    fn retarget(&mut self, c: Rgb, now: Instant) {
        if c == self.to {
            return;
        }
        self.from = self.sample(now);
        self.to = c;
        self.t = Transition::animate(0.0, 1.0, COLOR_FADE, Easing::Linear, now);
    }

    fn snap(&mut self, c: Rgb, now: Instant) {
        *self = Self::settled(c, now);
    }

    fn sample(&self, now: Instant) -> Rgb {
        let t = self.t.sample(now).clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb { r: mix(self.from.r, self.to.r), g: mix(self.from.g, self.to.g), b: mix(self.from.b, self.to.b) }
    }
}

#[derive(Debug)]
struct Bar {
    left: Transition,
    top: Transition,
    width: Transition,
    height: f32,
    count: usize,
    tier: usize,
    color: ColorFade,
    /// Inner horizontal scale, origin at the left edge.
    scale: Transition,
    /// Inner opacity, independent of the idle presentation alpha.
    alpha: Transition,
    /// Pinned screen top while the row underneath is sliding away.
    locked_top: Option<f32>,
    /// Playing the removal animation; the rebuild pass must not reap it,
    /// its own timer does.
    removing: bool,
}

/// Sampled bar state for the renderer. `alpha` is the bar's own opacity;
/// the idle-mode alpha multiplies on top of it.
#[derive(Debug, Clone)]
pub struct BarView {
    pub path: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub scale: f32,
    pub alpha: f32,
    pub color: Rgb,
}

#[derive(Debug, Default)]
pub struct BarOverlay {
    bars: HashMap<String, Bar>,
    last_rebuild: Option<Instant>,
}

impl BarOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles the overlay against the current row slots. Rate-gated;
    /// back-to-back calls within the gate are dropped. `instant` snaps
    /// geometry and color so per-frame calls inside a sync window track the
    /// rows exactly; outside a window the retarget eases over
    /// `max(200, expand_duration)`.
    pub fn rebuild(
        &mut self,
        slots: &[RowSlot],
        container_width: f32,
        max_count: usize,
        cfg: &PanelConfig,
        instant: bool,
        now: Instant,
    ) {
        if let Some(last) = self.last_rebuild {
            if now.duration_since(last) < REBUILD_GATE {
                return;
            }
        }
        self.last_rebuild = Some(now);

        let easing = cfg.easing();
        let dur = if instant {
            Duration::ZERO
        } else {
            Duration::from_millis(cfg.expand_duration.max(RETARGET_FLOOR_MS))
        };

        let targets = layout::bar_targets(slots, container_width, max_count, cfg);
        let mut used: HashSet<&str> = HashSet::with_capacity(targets.len());
        for target in &targets {
            let tier_color = color::tier_color(cfg, target.tier);
            match self.bars.get_mut(&target.path) {
                Some(bar) => {
                    let top_goal = bar.locked_top.unwrap_or(target.top);
                    bar.left.retarget(target.left, dur, easing, now);
                    bar.width.retarget(target.width, dur, easing, now);
                    bar.top.retarget(top_goal, dur, easing, now);
                    bar.height = target.height;
                    bar.count = target.count;
                    bar.tier = target.tier;
                    if instant {
                        bar.color.snap(tier_color, now);
                    } else {
                        bar.color.retarget(tier_color, now);
                    }
                }
                None => {
                    self.bars.insert(target.path.clone(), Bar {
                        left: Transition::settled(target.left, now),
                        top: Transition::settled(target.top, now),
                        width: Transition::settled(target.width, now),
                        height: target.height,
                        count: target.count,
                        tier: target.tier,
                        color: ColorFade::settled(tier_color, now),
                        scale: Transition::settled(1.0, now),
                        alpha: Transition::settled(1.0, now),
                        locked_top: None,
                        removing: false,
                    });
                }
            }
            used.insert(target.path.as_str());
        }

        self.bars.retain(|path, bar| used.contains(path.as_str()) || bar.removing);
    }

    /// Creates a bar that grows in on its own: width from zero, inner
    /// reveal from the left. Used for tags that appear outside an
    /// expand/collapse operation. An existing bar is left as is, except
    /// that a pending removal is called off.
    pub fn create_bar(&mut self, target: &BarTarget, cfg: &PanelConfig, now: Instant) {
        if let Some(bar) = self.bars.get_mut(&target.path) {
            bar.removing = false;
            return;
        }
        let easing = cfg.easing();
        let grow = Duration::from_millis(cfg.bar_expand_duration.max(80));
        let fade = Duration::from_millis(cfg.bar_fade_in_duration.max(40));
        self.bars.insert(target.path.clone(), Bar {
            left: Transition::settled(target.left, now),
            top: Transition::settled(target.top, now),
            width: Transition::animate(0.0, target.width, grow, easing, now),
            height: target.height,
            count: target.count,
            tier: target.tier,
            color: ColorFade::settled(color::tier_color(cfg, target.tier), now),
            scale: Transition::animate(0.0, 1.0, grow, easing, now),
            alpha: Transition::animate(0.0, 1.0, fade, Easing::Linear, now),
            locked_top: None,
            removing: false,
        });
    }

    /// Creates a bar at its final rectangle but invisible (scale and alpha
    /// zero), waiting for the expand preheat to reveal it.
    pub fn create_hidden(&mut self, target: &BarTarget, cfg: &PanelConfig, now: Instant) {
        if let Some(bar) = self.bars.get_mut(&target.path) {
            bar.removing = false;
            return;
        }
        self.bars.insert(target.path.clone(), Bar {
            left: Transition::settled(target.left, now),
            top: Transition::settled(target.top, now),
            width: Transition::settled(target.width, now),
            height: target.height,
            count: target.count,
            tier: target.tier,
            color: ColorFade::settled(color::tier_color(cfg, target.tier), now),
            scale: Transition::settled(0.0, now),
            alpha: Transition::settled(0.0, now),
            locked_top: None,
            removing: false,
        });
    }

    /// Scales the bars up from the left and fades them in. Returns the
    /// play's total duration (the completion slack included) for the caller
    /// to schedule against.
    pub fn play_expand(&mut self, paths: &[String], cfg: &PanelConfig, now: Instant) -> Duration {
        let easing = cfg.easing();
        let scale_dur = Duration::from_millis(cfg.bar_expand_duration);
        let fade_dur = Duration::from_millis(cfg.bar_fade_in_duration);
        for path in paths {
            if let Some(bar) = self.bars.get_mut(path) {
                bar.scale.retarget(1.0, scale_dur, easing, now);
                bar.alpha.retarget(1.0, fade_dur, Easing::Linear, now);
            }
        }
        scale_dur.max(fade_dur) + Duration::from_millis(40)
    }

    /// Shrinks the bars to the left edge and fades them out; the bars stay
    /// in the overlay until their rows are gone.
    pub fn play_collapse(&mut self, paths: &[String], cfg: &PanelConfig, now: Instant) -> Duration {
        let easing = cfg.easing();
        let scale_dur = Duration::from_millis(cfg.bar_collapse_duration);
        let fade_dur = Duration::from_millis(cfg.bar_fade_out_duration);
        for path in paths {
            if let Some(bar) = self.bars.get_mut(path) {
                bar.scale.retarget(0.0, scale_dur, easing, now);
                bar.alpha.retarget(0.0, fade_dur, Easing::Linear, now);
            }
        }
        scale_dur.max(fade_dur) + Duration::from_millis(40)
    }

    /// Starts the removal animation for a tag that crossed to zero. The bar
    /// is flagged so rebuild passes leave it alone; the caller removes it
    /// after `max(120, bar_collapse_duration)`.
    pub fn play_remove(&mut self, path: &str, cfg: &PanelConfig, now: Instant) -> bool {
        let easing = cfg.easing();
        let Some(bar) = self.bars.get_mut(path) else {
            return false;
        };
        bar.removing = true;
        bar.scale.retarget(
            0.0,
            Duration::from_millis(cfg.bar_collapse_duration.max(80)),
            easing,
            now,
        );
        bar.alpha.retarget(
            0.0,
            Duration::from_millis(cfg.bar_fade_out_duration.max(40)),
            Easing::Linear,
            now,
        );
        true
    }

    pub fn is_removing(&self, path: &str) -> bool {
        self.bars.get(path).map(|b| b.removing).unwrap_or(false)
    }

    /// Pins the bar at its current top so the collapse of the rows under it
    /// does not drag it around while it shrinks.
    pub fn lock_tops(&mut self, paths: &[String], now: Instant) {
        for path in paths {
            if let Some(bar) = self.bars.get_mut(path) {
                bar.locked_top = Some(bar.top.sample(now));
            }
        }
    }

    pub fn unlock_all(&mut self) {
        for bar in self.bars.values_mut() {
            bar.locked_top = None;
        }
    }

    pub fn remove_path(&mut self, path: &str) -> bool {
        self.bars.remove(path).is_some()
    }

    pub fn remove_paths(&mut self, paths: &[String]) {
        for path in paths {
            self.bars.remove(path);
        }
    }

    /// Width and color patch for count changes that did not move any tag
    /// across zero. Returns the tags that had a row but no bar yet; the
    /// caller arranges their creation.
    pub fn update_bars(
        &mut self,
        changed: &[String],
        slots: &[RowSlot],
        container_width: f32,
        max_count: usize,
        cfg: &PanelConfig,
        now: Instant,
    ) -> Vec<String> {
        let easing = cfg.easing();
        let dur = Duration::from_millis(cfg.bar_animation_duration.max(120));
        let targets = layout::bar_targets(slots, container_width, max_count, cfg);
        let mut missing = Vec::new();
        for path in changed {
            let Some(target) = targets.iter().find(|t| &t.path == path) else {
                continue;
            };
            match self.bars.get_mut(path) {
                Some(bar) => {
                    bar.width.retarget(target.width, dur, easing, now);
                    bar.count = target.count;
                    bar.tier = target.tier;
                    bar.color.retarget(color::tier_color(cfg, target.tier), now);
                }
                None => missing.push(path.clone()),
            }
        }
        missing
    }

    pub fn contains(&self, path: &str) -> bool {
        self.bars.contains_key(path)
    }

    /// Bars parked invisible whose reveal never came (the operation that
    /// scheduled it was superseded). A structural rebuild replays these.
    pub fn hidden_paths(&self) -> Vec<String> {
        self.bars
            .iter()
            .filter(|(_, bar)| !bar.removing && bar.scale.target() == 0.0 && bar.alpha.target() == 0.0)
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn views(&self, now: Instant) -> Vec<BarView> {
        let mut out: Vec<BarView> = self
            .bars
            .iter()
            .map(|(path, bar)| BarView {
                path: path.clone(),
                left: bar.left.sample(now),
                top: bar.top.sample(now),
                width: bar.width.sample(now),
                height: bar.height,
                scale: bar.scale.sample(now),
                alpha: bar.alpha.sample(now),
                color: bar.color.sample(now),
            })
            .collect();
        out.sort_by(|a, b| a.top.partial_cmp(&b.top).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.last_rebuild = None;
    }
}
