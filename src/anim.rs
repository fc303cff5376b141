//! Time-based property animation: CSS-style easing curves and
//! retargetable value transitions sampled against the session clock.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    CubicBezier { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl Easing {
    /// The curve the panel ships with for height and width motion.
    pub fn standard() -> Self {
        Easing::CubicBezier { x1: 0.2, y1: 0.8, x2: 0.2, y2: 1.0 }
    }

    /// Parses a CSS easing string: `linear`, the named curves, or
    /// `cubic-bezier(x1, y1, x2, y2)`.
    pub fn parse_css(text: &str) -> Option<Easing> {
        let t = text.trim().to_ascii_lowercase();
        match t.as_str() {
            "linear" => return Some(Easing::Linear),
            "ease" => return Some(Easing::CubicBezier { x1: 0.25, y1: 0.1, x2: 0.25, y2: 1.0 }),
            "ease-in" => return Some(Easing::CubicBezier { x1: 0.42, y1: 0.0, x2: 1.0, y2: 1.0 }),
            "ease-out" => return Some(Easing::CubicBezier { x1: 0.0, y1: 0.0, x2: 0.58, y2: 1.0 }),
            "ease-in-out" => {
                return Some(Easing::CubicBezier { x1: 0.42, y1: 0.0, x2: 0.58, y2: 1.0 })
            }
            _ => {}
        }
        let inner = t.strip_prefix("cubic-bezier(")?.strip_suffix(')')?;
        let mut nums = inner.split(',').map(|p| p.trim().parse::<f32>());
        let x1 = nums.next()?.ok()?;
        let y1 = nums.next()?.ok()?;
        let x2 = nums.next()?.ok()?;
        let y2 = nums.next()?.ok()?;
        if nums.next().is_some() {
            return None;
        }
        Some(Easing::CubicBezier { x1, y1, x2, y2 })
    }

    /// Eased progress for linear progress `p`; input outside [0,1] clamps.
    pub fn apply(&self, p: f32) -> f32 {
        let p = p.clamp(0.0, 1.0);
        match *self {
            Easing::Linear => p,
            Easing::CubicBezier { x1, y1, x2, y2 } => bezier_solve(p, x1, y1, x2, y2),
        }
    }
}

impl Default for Easing {
    fn default() -> Self {
        Easing::Linear
    }
}

// Horner-form coefficients for a unit bezier through (0,0) and (1,1).
fn bezier_solve(x: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let cx = 3.0 * x1;
    let bx = 3.0 * (x2 - x1) - cx;
    let ax = 1.0 - cx - bx;
    let cy = 3.0 * y1;
    let by = 3.0 * (y2 - y1) - cy;
    let ay = 1.0 - cy - by;

    let sample_x = |t: f32| ((ax * t + bx) * t + cx) * t;
    let sample_y = |t: f32| ((ay * t + by) * t + cy) * t;
    let sample_dx = |t: f32| (3.0 * ax * t + 2.0 * bx) * t + cx;

    // Newton first, bisection when the slope flattens out
    let mut t = x;
    for _ in 0..8 {
        let err = sample_x(t) - x;
        if err.abs() < 1e-5 {
            return sample_y(t);
        }
        let d = sample_dx(t);
        if d.abs() < 1e-6 {
            break;
        }
        t -= err / d;
    }
    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    t = x;
    while hi - lo > 1e-5 {
        if sample_x(t) < x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    sample_y(t)
}

/// A retargetable scalar transition. Zero duration means the value is
/// settled at `to`.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    from: f32,
    to: f32,
    start: Instant,
    duration: Duration,
    easing: Easing,
}

impl Transition {
    pub fn settled(value: f32, now: Instant) -> Self {
        Self { from: value, to: value, start: now, duration: Duration::ZERO, easing: Easing::Linear }
    }

    pub fn animate(from: f32, to: f32, duration: Duration, easing: Easing, now: Instant) -> Self {
        if duration.is_zero() {
            return Self::settled(to, now);
        }
        Self { from, to, start: now, duration, easing }
    }

    /// Retargets toward `to` from the currently sampled value. A zero
    /// duration snaps; an unchanged target leaves the transition running
    /// rather than restarting it, so per-frame resyncs do not stall
    /// animations at their first sample.
    pub fn retarget(&mut self, to: f32, duration: Duration, easing: Easing, now: Instant) {
        if duration.is_zero() {
            *self = Self::settled(to, now);
            return;
        }
        if (to - self.to).abs() < 1e-3 {
            return;
        }
        let from = self.sample(now);
        *self = Self { from, to, start: now, duration, easing };
    }

    pub fn jump(&mut self, to: f32, now: Instant) {
        *self = Self::settled(to, now);
    }

    pub fn sample(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return self.to;
        }
        if now <= self.start {
            return self.from;
        }
        let elapsed = now.duration_since(self.start);
        if elapsed >= self.duration {
            return self.to;
        }
        let p = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * self.easing.apply(p)
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn done(&self, now: Instant) -> bool {
        self.duration.is_zero() || now.duration_since(self.start) >= self.duration
    }

    /// Ends the motion at its target, the emergency exit used on dispose.
    pub fn finish(&mut self) {
        self.from = self.to;
        self.duration = Duration::ZERO;
    }
}
