// Effect selection: direct picks and the timed "spin" that lands on a random effect.
// Visual expectation: during a spin the picture flicks through effects every few
// frames, then settles on one that differs from where it started.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::catalog::EffectId;
use crate::error::Error;
use crate::fx::FxRng;
use crate::session::ControlEvent;

/// Spin cadence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinPolicy {
    /// Total ticks, the last one settling.
    pub ticks: u32,
    pub interval_ms: u64,
}

impl Default for SpinPolicy {
    fn default() -> Self {
        Self {
            ticks: 15,
            interval_ms: 80,
        }
    }
}

impl SpinPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

struct Spin {
    origin: EffectId,
    fired: u32,
    next_at: Instant,
}

/// Owns the active effect id. The render loop reads `current()` every tick.
pub struct EffectSelector {
    current: EffectId,
    spin: Option<Spin>,
    policy: SpinPolicy,
}

impl EffectSelector {
    pub fn new(initial: EffectId, policy: SpinPolicy) -> Self {
        Self {
            current: initial,
            spin: None,
            policy,
        }
    }

    /// The id to render right now (a preview while spinning).
    pub fn current(&self) -> EffectId {
        self.current
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    /// Select by string id. Unknown ids fail with `UnknownEffect`.
    pub fn select(&mut self, id: &str) -> Result<ControlEvent, Error> {
        let id: EffectId = id.parse()?;
        self.select_id(id)
    }

    /// Select a catalog entry. Locked while a spin runs.
    pub fn select_id(&mut self, id: EffectId) -> Result<ControlEvent, Error> {
        if self.is_spinning() {
            return Err(Error::SelectionLocked);
        }
        Ok(self.settle(id))
    }

    fn settle(&mut self, id: EffectId) -> ControlEvent {
        self.current = id;
        let def = id.definition();
        tracing::info!(effect = %id, "effect selected");
        ControlEvent::EffectChanged {
            id,
            name: def.name,
            description: def.description,
        }
    }

    /// Start a spin. Returns `None` if one is already running.
    pub fn trigger_spin(&mut self, now: Instant) -> Option<ControlEvent> {
        if self.is_spinning() {
            tracing::debug!("spin already running, trigger ignored");
            return None;
        }
        self.spin = Some(Spin {
            origin: self.current,
            fired: 0,
            next_at: now + self.policy.interval(),
        });
        tracing::debug!(origin = %self.current, ticks = self.policy.ticks, "spin started");
        Some(ControlEvent::SpinStarted)
    }

    /// Fire every spin tick due at `now`, in order.
    pub fn poll(&mut self, now: Instant, rng: &mut FxRng) -> Vec<ControlEvent> {
        let interval = self.policy.interval();
        let last_tick = self.policy.ticks.max(1);
        let mut events = Vec::new();

        loop {
            let Some(spin) = self.spin.as_mut() else { break };
            if now < spin.next_at {
                break;
            }
            spin.fired += 1;
            spin.next_at += interval;
            let (fired, origin) = (spin.fired, spin.origin);

            if fired < last_tick {
                // Cosmetic only: no description change.
                let id = EffectId::ALL[rng.index(EffectId::ALL.len())];
                self.current = id;
                tracing::trace!(tick = fired, effect = %id, "spin preview");
                events.push(ControlEvent::SpinPreview(id));
            } else {
                self.spin = None;
                let landed = pick_excluding(origin, rng);
                events.push(self.settle(landed));
                events.push(ControlEvent::SpinEnded);
                tracing::debug!(origin = %origin, landed = %landed, "spin ended");
            }
        }
        events
    }

    /// Abandon a running spin without firing anything; restores the pre-spin effect.
    pub fn cancel(&mut self) -> bool {
        match self.spin.take() {
            Some(spin) => {
                self.current = spin.origin;
                tracing::debug!("spin cancelled");
                true
            }
            None => false,
        }
    }
}

/// Uniform pick among every catalog id except `exclude`.
/// Draws from the n-1 remaining slots directly; needs at least two entries.
pub fn pick_excluding(exclude: EffectId, rng: &mut FxRng) -> EffectId {
    let n = EffectId::ALL.len();
    debug_assert!(n >= 2);
    let mut i = rng.index(n - 1);
    if i >= exclude.index() {
        i += 1;
    }
    EffectId::ALL[i]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn select_emits_effect_changed() {
        let mut sel = EffectSelector::new(EffectId::Self_, SpinPolicy::default());
        let ev = sel.select("anima").unwrap();
        assert_eq!(sel.current(), EffectId::Anima);
        assert!(matches!(ev, ControlEvent::EffectChanged { id: EffectId::Anima, name: "Anima", .. }));
    }

    #[test]
    fn select_unknown_keeps_current() {
        let mut sel = EffectSelector::new(EffectId::Persona, SpinPolicy::default());
        assert!(matches!(sel.select("jung"), Err(Error::UnknownEffect(_))));
        assert_eq!(sel.current(), EffectId::Persona);
    }

    #[test]
    fn spin_runs_fixed_cadence_then_settles() {
        let t0 = Instant::now();
        let mut rng = FxRng::from_seed(42);
        let mut sel = EffectSelector::new(EffectId::Shadow, SpinPolicy::default());

        assert_eq!(sel.trigger_spin(t0), Some(ControlEvent::SpinStarted));
        assert!(sel.trigger_spin(t0).is_none());
        assert!(matches!(sel.select_id(EffectId::Anima), Err(Error::SelectionLocked)));

        assert!(sel.poll(t0 + ms(79), &mut rng).is_empty());
        let first = sel.poll(t0 + ms(80), &mut rng);
        assert!(matches!(first.as_slice(), [ControlEvent::SpinPreview(_)]));

        let rest = sel.poll(t0 + ms(80 * 15), &mut rng);
        assert_eq!(rest.len(), 13 + 2);
        assert!(rest[..13].iter().all(|e| matches!(e, ControlEvent::SpinPreview(_))));
        match &rest[13] {
            ControlEvent::EffectChanged { id, .. } => {
                assert_ne!(*id, EffectId::Shadow);
                assert_eq!(sel.current(), *id);
            }
            other => panic!("expected EffectChanged, got {other:?}"),
        }
        assert_eq!(rest[14], ControlEvent::SpinEnded);
        assert!(!sel.is_spinning());
        assert!(sel.poll(t0 + ms(10_000), &mut rng).is_empty());
    }

    #[test]
    fn spin_never_lands_on_its_origin() {
        let mut rng = FxRng::from_seed(7);
        let policy = SpinPolicy { ticks: 3, interval_ms: 10 };
        for trial in 0..500 {
            let origin = EffectId::ALL[trial % 5];
            let mut sel = EffectSelector::new(origin, policy.clone());
            let t0 = Instant::now();
            sel.trigger_spin(t0);
            sel.poll(t0 + ms(30), &mut rng);
            assert!(!sel.is_spinning());
            assert_ne!(sel.current(), origin, "trial {trial}");
        }
    }

    #[test]
    fn exclusion_sampling_reaches_every_other_id() {
        let mut rng = FxRng::from_seed(3);
        let seen: HashSet<EffectId> = (0..400).map(|_| pick_excluding(EffectId::Anima, &mut rng)).collect();
        assert_eq!(seen.len(), 4);
        assert!(!seen.contains(&EffectId::Anima));
    }

    #[test]
    fn cancelled_spin_never_fires() {
        let t0 = Instant::now();
        let mut rng = FxRng::from_seed(1);
        let mut sel = EffectSelector::new(EffectId::Trickster, SpinPolicy::default());
        sel.trigger_spin(t0);
        sel.poll(t0 + ms(200), &mut rng);
        assert!(sel.cancel());
        assert_eq!(sel.current(), EffectId::Trickster);
        assert!(sel.poll(t0 + ms(60_000), &mut rng).is_empty());
        assert!(!sel.cancel());
        assert!(sel.select_id(EffectId::Self_).is_ok());
    }
}
