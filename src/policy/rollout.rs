use crate::core::Frame;

/// On-policy storage for one rollout of `n_steps` across `n_envs` envs,
/// with GAE(lambda) advantage and return computation.
///
/// `episode_starts[t][e]` is true when env `e` was freshly reset before the
/// step stored at `t`; it masks bootstrapping across episode boundaries.
pub struct RolloutBuffer {
    n_steps: usize,
    n_envs: usize,
    obs: Vec<Vec<Frame>>,
    actions: Vec<Vec<u32>>,
    rewards: Vec<Vec<f32>>,
    episode_starts: Vec<Vec<bool>>,
    values: Vec<Vec<f32>>,
    log_probs: Vec<Vec<f32>>,
    advantages: Vec<Vec<f32>>,
    returns: Vec<Vec<f32>>,
}

impl RolloutBuffer {
    pub fn new(n_steps: usize, n_envs: usize) -> Self {
        Self {
            n_steps,
            n_envs,
            obs: Vec::with_capacity(n_steps),
            actions: Vec::with_capacity(n_steps),
            rewards: Vec::with_capacity(n_steps),
            episode_starts: Vec::with_capacity(n_steps),
            values: Vec::with_capacity(n_steps),
            log_probs: Vec::with_capacity(n_steps),
            advantages: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.obs.clear();
        self.actions.clear();
        self.rewards.clear();
        self.episode_starts.clear();
        self.values.clear();
        self.log_probs.clear();
        self.advantages.clear();
        self.returns.clear();
    }

    pub fn len(&self) -> usize { self.obs.len() }
    pub fn is_empty(&self) -> bool { self.obs.is_empty() }
    pub fn is_full(&self) -> bool { self.obs.len() >= self.n_steps }

    /// Total number of stored transitions across all envs.
    pub fn flat_len(&self) -> usize { self.obs.len() * self.n_envs }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        obs: Vec<Frame>,
        actions: Vec<u32>,
        rewards: Vec<f32>,
        episode_starts: Vec<bool>,
        values: Vec<f32>,
        log_probs: Vec<f32>,
    ) {
        debug_assert_eq!(obs.len(), self.n_envs);
        debug_assert!(!self.is_full(), "rollout buffer overfilled");
        self.obs.push(obs);
        self.actions.push(actions);
        self.rewards.push(rewards);
        self.episode_starts.push(episode_starts);
        self.values.push(values);
        self.log_probs.push(log_probs);
    }

    /// GAE(lambda), bootstrapped with the value of the observation after the
    /// final stored step. `last_dones` masks that bootstrap for envs whose
    /// final step ended an episode.
    pub fn compute_returns_and_advantages(
        &mut self,
        last_values: &[f32],
        last_dones: &[bool],
        gamma: f32,
        gae_lambda: f32,
    ) {
        let t_max = self.len();
        self.advantages = vec![vec![0.0; self.n_envs]; t_max];
        self.returns = vec![vec![0.0; self.n_envs]; t_max];

        for e in 0..self.n_envs {
            let mut gae = 0.0f32;
            for t in (0..t_max).rev() {
                let (next_non_terminal, next_value) = if t == t_max - 1 {
                    ((!last_dones[e]) as u8 as f32, last_values[e])
                } else {
                    ((!self.episode_starts[t + 1][e]) as u8 as f32, self.values[t + 1][e])
                };
                let delta =
                    self.rewards[t][e] + gamma * next_value * next_non_terminal - self.values[t][e];
                gae = delta + gamma * gae_lambda * next_non_terminal * gae;
                self.advantages[t][e] = gae;
                self.returns[t][e] = gae + self.values[t][e];
            }
        }
    }

    /// Flat accessor over (step, env) pairs; index layout is t * n_envs + e.
    pub fn get(&self, idx: usize) -> Transition<'_> {
        let t = idx / self.n_envs;
        let e = idx % self.n_envs;
        Transition {
            obs: &self.obs[t][e],
            action: self.actions[t][e],
            log_prob: self.log_probs[t][e],
            advantage: self.advantages[t][e],
            ret: self.returns[t][e],
        }
    }
}

/// One flattened transition, borrowed from the buffer.
pub struct Transition<'a> {
    pub obs: &'a Frame,
    pub action: u32,
    pub log_prob: f32,
    pub advantage: f32,
    pub ret: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs() -> Vec<Frame> {
        vec![Frame::zeros(1, 1, 1)]
    }

    #[test]
    fn gae_matches_hand_computation() {
        // Single env, three steps, no episode boundary.
        // gamma = 0.5, lambda = 1.0 reduces GAE to discounted-sum minus value.
        let mut buf = RolloutBuffer::new(3, 1);
        for (r, v) in [(1.0, 0.0), (1.0, 0.0), (1.0, 0.0)] {
            buf.push(obs(), vec![0], vec![r], vec![false], vec![v], vec![0.0]);
        }
        buf.compute_returns_and_advantages(&[0.0], &[false], 0.5, 1.0);
        // returns: r2 = 1, r1 = 1 + 0.5 = 1.5, r0 = 1 + 0.5*1.5 = 1.75
        assert!((buf.get(2).ret - 1.0).abs() < 1e-6);
        assert!((buf.get(1).ret - 1.5).abs() < 1e-6);
        assert!((buf.get(0).ret - 1.75).abs() < 1e-6);
    }

    #[test]
    fn episode_boundary_masks_bootstrap() {
        // Step 1 starts a new episode, so step 0 must not see step 1's value.
        let mut buf = RolloutBuffer::new(2, 1);
        buf.push(obs(), vec![0], vec![1.0], vec![false], vec![0.0], vec![0.0]);
        buf.push(obs(), vec![0], vec![1.0], vec![true], vec![5.0], vec![0.0]);
        buf.compute_returns_and_advantages(&[7.0], &[false], 1.0, 1.0);
        // step 1 bootstraps from last_values: 1 + 7 = 8
        assert!((buf.get(1).ret - 8.0).abs() < 1e-6);
        // step 0 is cut off by the boundary: return is just its own reward
        assert!((buf.get(0).ret - 1.0).abs() < 1e-6);
    }

    #[test]
    fn flat_index_walks_steps_then_envs() {
        let mut buf = RolloutBuffer::new(2, 2);
        buf.push(
            vec![Frame::zeros(1, 1, 1); 2],
            vec![1, 2],
            vec![0.0; 2],
            vec![false; 2],
            vec![0.0; 2],
            vec![0.0; 2],
        );
        buf.push(
            vec![Frame::zeros(1, 1, 1); 2],
            vec![3, 4],
            vec![0.0; 2],
            vec![false; 2],
            vec![0.0; 2],
            vec![0.0; 2],
        );
        buf.compute_returns_and_advantages(&[0.0; 2], &[false; 2], 0.99, 0.95);
        assert_eq!(buf.flat_len(), 4);
        assert_eq!(buf.get(0).action, 1);
        assert_eq!(buf.get(1).action, 2);
        assert_eq!(buf.get(2).action, 3);
        assert_eq!(buf.get(3).action, 4);
    }
}
