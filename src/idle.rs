//! Idle presentation timer. Input anywhere in the panel re-arms it; once it
//! lapses the panel dims its text and brings the bars up to full alpha.

use std::time::{Duration, Instant};

use crate::config::PanelConfig;

#[derive(Debug)]
pub struct IdleTimer {
    deadline: Option<Instant>,
    idle: bool,
}

impl IdleTimer {
    pub fn new(cfg: &PanelConfig, now: Instant) -> Self {
        Self { deadline: arm(cfg, now), idle: false }
    }

    /// Re-arms the timer. Returns true when this input woke the panel out
    /// of idle, so the caller can refresh the presentation.
    pub fn note_input(&mut self, cfg: &PanelConfig, now: Instant) -> bool {
        self.deadline = arm(cfg, now);
        let woke = self.idle;
        self.idle = false;
        woke
    }

    /// Returns true on the tick that crosses into idle.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.idle {
            return false;
        }
        match self.deadline {
            Some(d) if now >= d => {
                self.idle = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Alpha the bars render with in the current mode.
    pub fn bar_alpha(&self, cfg: &PanelConfig) -> f32 {
        if self.idle {
            cfg.idle_bar_alpha
        } else {
            cfg.active_bar_opacity
        }
    }
}

// A zero timeout disables idle entirely.
fn arm(cfg: &PanelConfig, now: Instant) -> Option<Instant> {
    (cfg.idle_timeout > 0).then(|| now + Duration::from_millis(cfg.idle_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lapses_after_the_timeout() {
        let cfg = PanelConfig::default();
        let t0 = Instant::now();
        let mut idle = IdleTimer::new(&cfg, t0);
        assert!(!idle.tick(t0 + Duration::from_millis(10)));
        assert!(idle.tick(t0 + Duration::from_millis(cfg.idle_timeout + 1)));
        assert!(idle.is_idle());
        // only the crossing tick reports
        assert!(!idle.tick(t0 + Duration::from_millis(cfg.idle_timeout + 500)));
    }

    #[test]
    fn input_rearms_and_wakes() {
        let cfg = PanelConfig::default();
        let t0 = Instant::now();
        let mut idle = IdleTimer::new(&cfg, t0);
        let mid = t0 + Duration::from_millis(cfg.idle_timeout / 2);
        assert!(!idle.note_input(&cfg, mid), "not idle yet, nothing to wake");
        // old deadline passed but the re-arm moved it
        assert!(!idle.tick(t0 + Duration::from_millis(cfg.idle_timeout + 1)));

        let lapse = mid + Duration::from_millis(cfg.idle_timeout + 1);
        assert!(idle.tick(lapse));
        assert!(idle.note_input(&cfg, lapse + Duration::from_millis(5)), "woke from idle");
        assert!(!idle.is_idle());
    }

    #[test]
    fn alpha_follows_the_mode() {
        let cfg = PanelConfig::default();
        let t0 = Instant::now();
        let mut idle = IdleTimer::new(&cfg, t0);
        assert_eq!(idle.bar_alpha(&cfg), cfg.active_bar_opacity);
        idle.tick(t0 + Duration::from_millis(cfg.idle_timeout + 1));
        assert_eq!(idle.bar_alpha(&cfg), cfg.idle_bar_alpha);
    }

    #[test]
    fn zero_timeout_disables_idle() {
        let mut cfg = PanelConfig::default();
        cfg.idle_timeout = 0;
        let t0 = Instant::now();
        let mut idle = IdleTimer::new(&cfg, t0);
        assert!(!idle.tick(t0 + Duration::from_millis(1_000_000)));
        assert!(!idle.is_idle());
    }
}
