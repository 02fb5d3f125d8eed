// Wrappers for Env composition. The training/inference pipeline applies, in
// order: action restriction -> grayscale conversion -> episode statistics ->
// reset-argument adapter. The adapter is last because the vectorized layer
// above it drives the `ResetArgs` calling convention.

use crate::core::{Env, Frame, Info, InfoValue, ResetArgs, ResetOptions, Step};
use crate::envs::scroller::Buttons;
use crate::spaces::Discrete;

/// The reduced action set used for side-scrolling: mostly rightward movement
/// plus a bare jump and a retreat.
pub const SIMPLE_MOVEMENT: [Buttons; 7] = [
    Buttons::NONE,
    Buttons::RIGHT,
    Buttons::RIGHT.union(Buttons::A),
    Buttons::RIGHT.union(Buttons::B),
    Buttons::RIGHT.union(Buttons::A).union(Buttons::B),
    Buttons::A,
    Buttons::LEFT,
];

/// Restricts the native button-mask action space to a small discrete set of
/// combos. Callers act in `[0, n)`; each index selects one button combo.
pub struct JoypadSpace<E: Env<Act = Buttons>> {
    inner: E,
    actions: Vec<Buttons>,
    space: Discrete,
}

impl<E: Env<Act = Buttons>> JoypadSpace<E> {
    pub fn new(inner: E, table: &[Buttons]) -> Self {
        assert!(!table.is_empty(), "JoypadSpace requires at least one combo");
        Self {
            inner,
            actions: table.to_vec(),
            space: Discrete::new(table.len() as u32),
        }
    }

    /// Wrap with the standard [`SIMPLE_MOVEMENT`] table.
    pub fn simple_movement(inner: E) -> Self {
        Self::new(inner, &SIMPLE_MOVEMENT)
    }

    pub fn action_space(&self) -> &Discrete { &self.space }

    pub fn inner(&self) -> &E { &self.inner }
    pub fn inner_mut(&mut self) -> &mut E { &mut self.inner }
    pub fn into_inner(self) -> E { self.inner }
}

impl<E: Env<Act = Buttons>> Env for JoypadSpace<E> {
    type Obs = E::Obs;
    type Act = u32;

    fn reset(&mut self) -> (Self::Obs, Info) { self.inner.reset() }

    fn step(&mut self, action: Self::Act) -> Step<Self::Obs> {
        let combo = self.actions.get(action as usize).copied();
        let combo = combo.unwrap_or_else(|| {
            panic!(
                "action {} outside restricted space of {} combos",
                action,
                self.actions.len()
            )
        });
        self.inner.step(combo)
    }

    fn render(&self) -> Option<Frame> { self.inner.render() }
    fn close(&mut self) { self.inner.close() }
}

/// ITU-R 601 luma conversion of a color frame to a single kept channel.
pub fn to_grayscale(frame: &Frame) -> Frame {
    let c = frame.channels as usize;
    debug_assert!(c == 3 || c == 4, "grayscale conversion expects RGB(A) input");
    let mut data = Vec::with_capacity(frame.num_pixels());
    for px in frame.data.chunks_exact(c) {
        let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        data.push(y.round().min(255.0) as u8);
    }
    Frame { width: frame.width, height: frame.height, channels: 1, data }
}

/// Converts color observations to single-channel grayscale, keeping the
/// channel dimension (height x width x 1).
pub struct GrayscaleObservation<E: Env<Obs = Frame>> {
    inner: E,
}

impl<E: Env<Obs = Frame>> GrayscaleObservation<E> {
    pub fn new(inner: E) -> Self { Self { inner } }
}

impl<E: Env<Obs = Frame>> Env for GrayscaleObservation<E> {
    type Obs = Frame;
    type Act = E::Act;

    fn reset(&mut self) -> (Self::Obs, Info) {
        let (obs, info) = self.inner.reset();
        (to_grayscale(&obs), info)
    }

    fn step(&mut self, action: Self::Act) -> Step<Self::Obs> {
        let s = self.inner.step(action);
        Step::new(to_grayscale(&s.observation), s.reward, s.terminated, s.truncated, s.info)
    }

    fn render(&self) -> Option<Frame> { self.inner.render() }
    fn close(&mut self) { self.inner.close() }
}

/// Tracks cumulative return, episode length and the best x-position reached.
/// On episode end (terminated or truncated), it injects keys into the
/// returned Step's Info:
/// - "episode_return": f64
/// - "episode_length": i64
/// - "episode_best_x": i64 (when the env reports "x_pos")
pub struct RecordEpisodeStatistics<E: Env> {
    inner: E,
    ep_return: f64,
    ep_length: i64,
    ep_best_x: i64,
}

impl<E: Env> RecordEpisodeStatistics<E> {
    pub fn new(inner: E) -> Self {
        Self { inner, ep_return: 0.0, ep_length: 0, ep_best_x: 0 }
    }
}

impl<E: Env> Env for RecordEpisodeStatistics<E> {
    type Obs = E::Obs;
    type Act = E::Act;

    fn reset(&mut self) -> (Self::Obs, Info) {
        self.ep_return = 0.0;
        self.ep_length = 0;
        self.ep_best_x = 0;
        self.inner.reset()
    }

    fn step(&mut self, action: Self::Act) -> Step<Self::Obs> {
        let mut s = self.inner.step(action);
        self.ep_return += s.reward as f64;
        self.ep_length += 1;
        if let Some(x) = s.info.get_i64("x_pos") {
            self.ep_best_x = self.ep_best_x.max(x);
        }
        if s.terminated || s.truncated {
            s.info.insert("episode_return", InfoValue::from(self.ep_return));
            s.info.insert("episode_length", InfoValue::from(self.ep_length));
            s.info.insert("episode_best_x", InfoValue::from(self.ep_best_x));
            // reset counters for next episode
            self.ep_return = 0.0;
            self.ep_length = 0;
            self.ep_best_x = 0;
        }
        s
    }

    fn render(&self) -> Option<Frame> { self.inner.render() }
    fn close(&mut self) { self.inner.close() }
}

/// Reset-argument compatibility adapter.
///
/// The vectorized layer always supplies `seed` and `options` when resetting.
/// The environments below this point only expose a zero-argument reset, so
/// this adapter implements [`ResetArgs`] by accepting both parameters and
/// discarding them, then delegating to the wrapped env's own reset. The
/// return value passes through unchanged, and a failure in the wrapped reset
/// propagates unmodified; no translation happens here.
pub struct ResetCompat<E: Env> {
    inner: E,
}

impl<E: Env> ResetCompat<E> {
    pub fn new(inner: E) -> Self { Self { inner } }

    pub fn inner(&self) -> &E { &self.inner }
    pub fn inner_mut(&mut self) -> &mut E { &mut self.inner }
    pub fn into_inner(self) -> E { self.inner }
}

impl<E: Env> Env for ResetCompat<E> {
    type Obs = E::Obs;
    type Act = E::Act;

    fn reset(&mut self) -> (Self::Obs, Info) { self.inner.reset() }
    fn step(&mut self, action: Self::Act) -> Step<Self::Obs> { self.inner.step(action) }
    fn render(&self) -> Option<Frame> { self.inner.render() }
    fn close(&mut self) { self.inner.close() }
}

impl<E: Env> ResetArgs for ResetCompat<E> {
    /// Both `seed` and `options` are accepted and ignored.
    fn reset_with(&mut self, _seed: Option<u64>, _options: Option<&ResetOptions>) -> (Self::Obs, Info) {
        self.inner.reset()
    }
}
