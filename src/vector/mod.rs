// Vectorized environments: a synchronous batch of N env copies plus a
// frame-stacking layer over it. Both run in the current thread; there is no
// concurrency anywhere in the pipeline.

use std::collections::VecDeque;

use crate::core::{Env, Frame, Info, ResetArgs, ResetOptions, Step};

/// Runs N copies of an environment in the current thread.
///
/// The contained envs are driven through the [`ResetArgs`] convention: every
/// reset supplies a seed and options, whether or not the env honors them
/// (the `ResetCompat` adapter discards both for envs that don't).
///
/// `step_all` auto-resets any env whose episode just ended and returns the
/// fresh first observation of the next episode in its place, with the done
/// flags of the finished episode still set. An infinite predict/step loop
/// therefore needs no reset handling of its own.
pub struct SyncVectorEnv<E: ResetArgs> {
    envs: Vec<E>,
}

impl<E: ResetArgs> SyncVectorEnv<E> {
    /// Create N copies using the provided factory closure.
    pub fn new<F>(n: usize, mut factory: F) -> Self
    where
        F: FnMut() -> E,
    {
        assert!(n > 0, "SyncVectorEnv requires at least one env");
        let mut envs = Vec::with_capacity(n);
        for _ in 0..n {
            envs.push(factory());
        }
        Self { envs }
    }

    /// Number of contained environments.
    pub fn len(&self) -> usize { self.envs.len() }
    /// Whether there are no environments.
    pub fn is_empty(&self) -> bool { self.envs.is_empty() }

    /// Reset all environments. If `base_seed` is provided, each env is offered
    /// base_seed + i; whether the env uses it is the env's (or its adapter's)
    /// business.
    pub fn reset_all(
        &mut self,
        base_seed: Option<u64>,
        options: Option<&ResetOptions>,
    ) -> Vec<(E::Obs, Info)> {
        self.envs
            .iter_mut()
            .enumerate()
            .map(|(i, e)| {
                let seed = base_seed.map(|s| s + i as u64);
                e.reset_with(seed, options)
            })
            .collect()
    }

    /// Step all environments with a batch of actions, auto-resetting finished
    /// episodes. The length of `actions` must equal `self.len()`.
    pub fn step_all(&mut self, actions: Vec<E::Act>) -> Vec<Step<E::Obs>> {
        assert_eq!(actions.len(), self.envs.len(), "actions len must match envs len");
        self.envs
            .iter_mut()
            .zip(actions.into_iter())
            .map(|(e, a)| {
                let mut s = e.step(a);
                if s.terminated || s.truncated {
                    let (obs, _reset_info) = e.reset_with(None, None);
                    s.observation = obs;
                }
                s
            })
            .collect()
    }

    /// Render all environments; returns a vector of optional frames (one per env).
    pub fn render_all(&self) -> Vec<Option<Frame>> {
        self.envs.iter().map(|e| e.render()).collect()
    }

    /// Close all environments.
    pub fn close_all(&mut self) {
        for e in &mut self.envs { e.close(); }
    }

    /// Get immutable access to underlying envs (advanced usage).
    pub fn envs(&self) -> &[E] { &self.envs }
    /// Get mutable access to underlying envs (advanced usage).
    pub fn envs_mut(&mut self) -> &mut [E] { &mut self.envs }
}

/// Concatenate a deque of equally-shaped frames along the trailing channel
/// axis, oldest first. Output channels = per-frame channels * deque length.
fn stack_frames(frames: &VecDeque<Frame>) -> Frame {
    let n = frames.len();
    debug_assert!(n > 0);
    let (h, w, c) = frames[0].shape();
    let cs = c as usize * n;
    let pixels = (h as usize) * (w as usize);
    let mut data = vec![0u8; pixels * cs];
    for (k, f) in frames.iter().enumerate() {
        debug_assert_eq!(f.shape(), (h, w, c), "stacked frames must share a shape");
        let fc = c as usize;
        for px in 0..pixels {
            let src = px * fc;
            let dst = px * cs + k * fc;
            data[dst..dst + fc].copy_from_slice(&f.data[src..src + fc]);
        }
    }
    Frame { width: w, height: h, channels: cs as u32, data }
}

/// Stacks the most recent `n_stack` observations of each env along the
/// trailing channel axis, giving the policy short-term temporal context.
///
/// On (re)start of an episode the stack is zero-filled, so the first stacked
/// observation is n-1 black frames followed by the real one. The batched
/// output shape is batch x height x width x channels*n_stack.
pub struct VecFrameStack<E: ResetArgs<Obs = Frame>> {
    venv: SyncVectorEnv<E>,
    n_stack: usize,
    stacks: Vec<VecDeque<Frame>>,
}

impl<E: ResetArgs<Obs = Frame>> VecFrameStack<E> {
    pub fn new(venv: SyncVectorEnv<E>, n_stack: usize) -> Self {
        assert!(n_stack > 0, "VecFrameStack requires n_stack > 0");
        let n = venv.len();
        Self {
            venv,
            n_stack,
            stacks: vec![VecDeque::new(); n],
        }
    }

    pub fn num_envs(&self) -> usize { self.venv.len() }
    pub fn n_stack(&self) -> usize { self.n_stack }

    fn refill(stack: &mut VecDeque<Frame>, n_stack: usize, obs: Frame) {
        stack.clear();
        let (h, w, c) = obs.shape();
        for _ in 0..n_stack - 1 {
            stack.push_back(Frame::zeros(w, h, c));
        }
        stack.push_back(obs);
    }

    /// Reset every env and return the batch of stacked observations.
    pub fn reset_all(
        &mut self,
        base_seed: Option<u64>,
        options: Option<&ResetOptions>,
    ) -> Vec<Frame> {
        let results = self.venv.reset_all(base_seed, options);
        results
            .into_iter()
            .zip(self.stacks.iter_mut())
            .map(|((obs, _info), stack)| {
                Self::refill(stack, self.n_stack, obs);
                stack_frames(stack)
            })
            .collect()
    }

    /// Step every env; observations in the returned steps are stacked. When
    /// an episode ends the underlying layer has already swapped in the next
    /// episode's first observation, and the stack restarts from zeros.
    pub fn step_all(&mut self, actions: Vec<E::Act>) -> Vec<Step<Frame>> {
        let steps = self.venv.step_all(actions);
        steps
            .into_iter()
            .zip(self.stacks.iter_mut())
            .map(|(s, stack)| {
                if s.terminated || s.truncated {
                    Self::refill(stack, self.n_stack, s.observation);
                } else {
                    if stack.len() == self.n_stack {
                        stack.pop_front();
                    }
                    stack.push_back(s.observation);
                }
                Step::new(stack_frames(stack), s.reward, s.terminated, s.truncated, s.info)
            })
            .collect()
    }

    pub fn close_all(&mut self) { self.venv.close_all() }

    pub fn venv(&self) -> &SyncVectorEnv<E> { &self.venv }
    pub fn venv_mut(&mut self) -> &mut SyncVectorEnv<E> { &mut self.venv }
}
