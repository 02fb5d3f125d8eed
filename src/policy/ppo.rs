use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap, ops};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::core::{Frame, ResetArgs, Result, RlError};
use crate::policy::callback::{Checkpointable, TrainCallback};
use crate::policy::net::CnnPolicy;
use crate::policy::rollout::RolloutBuffer;
use crate::utils::rng::{RngStream, rng_from_seed};
use crate::vector::VecFrameStack;

/// PPO hyperparameters. Serialized alongside checkpoints so a saved policy
/// can be reconstructed without the training script.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PpoConfig {
    pub learning_rate: f64,
    /// Environment steps collected per rollout.
    pub n_steps: usize,
    pub batch_size: usize,
    /// Optimization passes over each rollout.
    pub n_epochs: usize,
    pub gamma: f32,
    pub gae_lambda: f32,
    pub clip_range: f32,
    pub vf_coef: f32,
    pub ent_coef: f32,
    pub seed: u64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            n_steps: 2048,
            batch_size: 64,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.2,
            vf_coef: 0.5,
            ent_coef: 0.0,
            seed: 0,
        }
    }
}

/// Metadata sidecar written next to the weights blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct PolicyMeta {
    config: PpoConfig,
    obs_height: usize,
    obs_width: usize,
    obs_channels: usize,
    n_actions: usize,
    num_timesteps: u64,
    version: String,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateStats {
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy: f32,
}

#[derive(Serialize)]
struct ProgressRecord {
    timesteps: u64,
    n_calls: u64,
    fps: f64,
    mean_episode_return: f64,
    policy_loss: f32,
    value_loss: f32,
    entropy: f32,
}

/// Appends one JSON line per rollout under the log directory.
struct ProgressWriter {
    file: std::fs::File,
}

impl ProgressWriter {
    fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("progress.jsonl"))?;
        Ok(Self { file })
    }

    fn append(&mut self, rec: &ProgressRecord) -> Result<()> {
        use std::io::Write;
        let line = serde_json::to_string(rec)?;
        writeln!(self.file, "{line}")?;
        Ok(())
    }
}

/// Proximal Policy Optimization over stacked pixel observations.
///
/// Owns the actor-critic network, its optimizer state and the training loop.
/// Everything runs synchronously in the calling thread; `learn` blocks until
/// the requested number of timesteps is reached or a callback requests a stop.
pub struct Ppo {
    varmap: VarMap,
    policy: CnnPolicy,
    opt: AdamW,
    config: PpoConfig,
    device: Device,
    /// (height, width, channels) of a single stacked observation.
    obs_shape: (usize, usize, usize),
    n_actions: usize,
    num_timesteps: u64,
    n_calls: u64,
    rng: RngStream,
    log_dir: Option<PathBuf>,
}

impl Ppo {
    pub fn new(
        config: PpoConfig,
        obs_shape: (usize, usize, usize),
        n_actions: usize,
        device: Device,
    ) -> Result<Self> {
        let (h, w, c) = obs_shape;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let policy = CnnPolicy::new(vb, c, h, w, n_actions)?;
        let opt = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW { lr: config.learning_rate, ..Default::default() },
        )?;
        let rng = rng_from_seed(config.seed);
        Ok(Self {
            varmap,
            policy,
            opt,
            config,
            device,
            obs_shape,
            n_actions,
            num_timesteps: 0,
            n_calls: 0,
            rng,
            log_dir: None,
        })
    }

    /// Route per-rollout progress records to `<dir>/progress.jsonl`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn config(&self) -> &PpoConfig { &self.config }
    pub fn n_actions(&self) -> usize { self.n_actions }
    pub fn num_timesteps(&self) -> u64 { self.num_timesteps }

    /// Batch of frames -> `[batch, channels, height, width]` float tensor.
    fn obs_to_tensor(&self, frames: &[Frame]) -> Result<Tensor> {
        let (h, w, c) = self.obs_shape;
        let mut flat = Vec::with_capacity(frames.len() * h * w * c);
        for f in frames {
            if f.shape() != (h as u32, w as u32, c as u32) {
                return Err(RlError::InvalidObservation(format!(
                    "expected {h}x{w}x{c} observation, got {:?}",
                    f.shape()
                )));
            }
            flat.extend(f.data.iter().map(|&v| v as f32 / 255.0));
        }
        let t = Tensor::from_vec(flat, (frames.len(), h, w, c), &self.device)?;
        Ok(t.permute((0, 3, 1, 2))?)
    }

    /// Per-row action log-probabilities and state values for a batch.
    fn policy_outputs(&self, obs: &[Frame]) -> Result<(Vec<Vec<f32>>, Vec<f32>)> {
        let t = self.obs_to_tensor(obs)?;
        let (logits, values) = self.policy.forward(&t)?;
        let logp = ops::log_softmax(&logits, D::Minus1)?;
        Ok((logp.to_vec2::<f32>()?, values.to_vec1::<f32>()?))
    }

    fn sample_row(&mut self, log_probs: &[f32]) -> usize {
        let r: f32 = self.rng.gen_range(0.0..1.0);
        let mut acc = 0.0;
        for (i, lp) in log_probs.iter().enumerate() {
            acc += lp.exp();
            if r < acc {
                return i;
            }
        }
        log_probs.len() - 1
    }

    fn argmax_row(log_probs: &[f32]) -> usize {
        let mut best = 0;
        for (i, lp) in log_probs.iter().enumerate() {
            if *lp > log_probs[best] {
                best = i;
            }
        }
        best
    }

    /// Sample actions for a rollout step, returning (actions, values,
    /// log-probs of the chosen actions).
    fn sample_actions(&mut self, obs: &[Frame]) -> Result<(Vec<u32>, Vec<f32>, Vec<f32>)> {
        let (logp_rows, values) = self.policy_outputs(obs)?;
        let mut actions = Vec::with_capacity(logp_rows.len());
        let mut log_probs = Vec::with_capacity(logp_rows.len());
        for row in &logp_rows {
            let a = self.sample_row(row);
            actions.push(a as u32);
            log_probs.push(row[a]);
        }
        Ok((actions, values, log_probs))
    }

    /// Predict actions for a batch of observations. With `deterministic` the
    /// most likely action is taken; otherwise actions are sampled from the
    /// policy distribution.
    pub fn predict(&mut self, obs: &[Frame], deterministic: bool) -> Result<Vec<u32>> {
        let (logp_rows, _values) = self.policy_outputs(obs)?;
        let actions = logp_rows
            .iter()
            .map(|row| {
                if deterministic { Self::argmax_row(row) } else { self.sample_row(row) }
            })
            .map(|a| a as u32)
            .collect();
        Ok(actions)
    }

    /// Run the synchronous rollout/update loop against a vectorized env until
    /// `total_timesteps` environment steps have been taken. The callback is
    /// invoked once per completed step with the cumulative call count; it can
    /// stop training early by returning false.
    pub fn learn<E>(
        &mut self,
        env: &mut VecFrameStack<E>,
        total_timesteps: u64,
        mut callback: Option<&mut dyn TrainCallback>,
    ) -> Result<()>
    where
        E: ResetArgs<Obs = Frame, Act = u32>,
    {
        let n_envs = env.num_envs();
        if let Some(cb) = callback.as_deref_mut() {
            cb.on_training_start()?;
        }

        let mut obs: Vec<Frame> = env.reset_all(None, None);
        let mut episode_starts = vec![true; n_envs];
        let mut buffer = RolloutBuffer::new(self.config.n_steps, n_envs);
        let mut recent_returns: VecDeque<f64> = VecDeque::with_capacity(100);
        let mut progress = match &self.log_dir {
            Some(dir) => Some(ProgressWriter::create(dir)?),
            None => None,
        };
        let t_start = Instant::now();

        while self.num_timesteps < total_timesteps {
            buffer.reset();
            let mut stop_requested = false;

            for _ in 0..self.config.n_steps {
                let (actions, values, log_probs) = self.sample_actions(&obs)?;
                let steps = env.step_all(actions.clone());
                self.num_timesteps += n_envs as u64;
                self.n_calls += 1;

                let mut rewards = Vec::with_capacity(n_envs);
                let mut dones = Vec::with_capacity(n_envs);
                let mut next_obs = Vec::with_capacity(n_envs);
                for s in steps {
                    rewards.push(s.reward);
                    dones.push(s.terminated || s.truncated);
                    if let Some(r) = s.info.get_f64("episode_return") {
                        if recent_returns.len() == 100 {
                            recent_returns.pop_front();
                        }
                        recent_returns.push_back(r);
                    }
                    next_obs.push(s.observation);
                }

                buffer.push(
                    std::mem::replace(&mut obs, next_obs),
                    actions,
                    rewards,
                    episode_starts.clone(),
                    values,
                    log_probs,
                );
                episode_starts = dones;

                if let Some(cb) = callback.as_deref_mut() {
                    if !cb.on_step(self.n_calls, self)? {
                        stop_requested = true;
                        break;
                    }
                }
            }

            let (_, last_values) = self.policy_outputs(&obs)?;
            buffer.compute_returns_and_advantages(
                &last_values,
                &episode_starts,
                self.config.gamma,
                self.config.gae_lambda,
            );

            let stats = self.update(&buffer)?;

            let elapsed = t_start.elapsed().as_secs_f64().max(1e-9);
            let fps = self.num_timesteps as f64 / elapsed;
            let mean_episode_return = if recent_returns.is_empty() {
                0.0
            } else {
                recent_returns.iter().sum::<f64>() / recent_returns.len() as f64
            };
            tracing::info!(
                timesteps = self.num_timesteps,
                fps = fps as u64,
                mean_episode_return,
                policy_loss = stats.policy_loss,
                value_loss = stats.value_loss,
                entropy = stats.entropy,
                "rollout complete"
            );
            if let Some(w) = progress.as_mut() {
                w.append(&ProgressRecord {
                    timesteps: self.num_timesteps,
                    n_calls: self.n_calls,
                    fps,
                    mean_episode_return,
                    policy_loss: stats.policy_loss,
                    value_loss: stats.value_loss,
                    entropy: stats.entropy,
                })?;
            }

            if stop_requested {
                break;
            }
        }
        Ok(())
    }

    /// Clipped-surrogate update over the finished rollout.
    fn update(&mut self, buffer: &RolloutBuffer) -> Result<UpdateStats> {
        let cfg = self.config.clone();
        let total = buffer.flat_len();
        let mut indices: Vec<usize> = (0..total).collect();

        let mut sums = UpdateStats::default();
        let mut batches = 0u32;

        for _ in 0..cfg.n_epochs {
            indices.shuffle(&mut self.rng);
            for chunk in indices.chunks(cfg.batch_size) {
                if chunk.len() < 2 {
                    continue;
                }
                let b = chunk.len();
                let mut frames = Vec::with_capacity(b);
                let mut actions = Vec::with_capacity(b);
                let mut old_logp = Vec::with_capacity(b);
                let mut advs = Vec::with_capacity(b);
                let mut rets = Vec::with_capacity(b);
                for &i in chunk {
                    let tr = buffer.get(i);
                    frames.push(tr.obs.clone());
                    actions.push(tr.action);
                    old_logp.push(tr.log_prob);
                    advs.push(tr.advantage);
                    rets.push(tr.ret);
                }

                // Advantages are normalized within each minibatch.
                let mean = advs.iter().sum::<f32>() / b as f32;
                let var = advs.iter().map(|a| (a - mean) * (a - mean)).sum::<f32>() / b as f32;
                let std = var.sqrt().max(1e-8);
                let advs_norm: Vec<f32> = advs.iter().map(|a| (a - mean) / std).collect();

                let obs_t = self.obs_to_tensor(&frames)?;
                let (logits, values) = self.policy.forward(&obs_t)?;
                let logp_all = ops::log_softmax(&logits, D::Minus1)?;

                let actions_t = Tensor::from_vec(actions, (b,), &self.device)?;
                let new_logp = logp_all.gather(&actions_t.unsqueeze(1)?, 1)?.squeeze(1)?;
                let old_logp_t = Tensor::from_vec(old_logp, (b,), &self.device)?;
                let adv_t = Tensor::from_vec(advs_norm, (b,), &self.device)?;
                let ret_t = Tensor::from_vec(rets, (b,), &self.device)?;

                let ratio = (&new_logp - &old_logp_t)?.exp()?;
                let unclipped = (&ratio * &adv_t)?;
                let clipped =
                    (ratio.clamp(1.0 - cfg.clip_range, 1.0 + cfg.clip_range)? * &adv_t)?;
                let policy_loss = unclipped.minimum(&clipped)?.mean_all()?.neg()?;
                let value_loss = (&ret_t - &values)?.sqr()?.mean_all()?;
                let entropy = (logp_all.exp()? * &logp_all)?.sum(D::Minus1)?.mean_all()?.neg()?;

                let scaled_v = value_loss.affine(cfg.vf_coef as f64, 0.0)?;
                let scaled_e = entropy.affine(cfg.ent_coef as f64, 0.0)?;
                let loss = ((&policy_loss + &scaled_v)? - &scaled_e)?;
                self.opt.backward_step(&loss)?;

                sums.policy_loss += policy_loss.to_scalar::<f32>()?;
                sums.value_loss += value_loss.to_scalar::<f32>()?;
                sums.entropy += entropy.to_scalar::<f32>()?;
                batches += 1;
            }
        }

        if batches > 0 {
            sums.policy_loss /= batches as f32;
            sums.value_loss /= batches as f32;
            sums.entropy /= batches as f32;
        }
        Ok(sums)
    }

    /// Load a policy from a weights blob saved by [`Checkpointable::save_to`],
    /// using the metadata sidecar to rebuild the network.
    pub fn load<P: AsRef<Path>>(path: P, device: Device) -> Result<Self> {
        let path = path.as_ref();
        let meta_path = path.with_extension("meta.json");
        let meta: PolicyMeta = serde_json::from_str(&std::fs::read_to_string(&meta_path)?)?;
        let mut ppo = Self::new(
            meta.config,
            (meta.obs_height, meta.obs_width, meta.obs_channels),
            meta.n_actions,
            device,
        )?;
        ppo.varmap.load(path.with_extension("safetensors"))?;
        ppo.num_timesteps = meta.num_timesteps;
        Ok(ppo)
    }
}

impl Checkpointable for Ppo {
    /// Writes `<path>.safetensors` (weights, format owned by candle) and
    /// `<path>.meta.json` (enough to rebuild the network for loading).
    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.varmap.save(path.with_extension("safetensors"))?;
        let (h, w, c) = self.obs_shape;
        let meta = PolicyMeta {
            config: self.config.clone(),
            obs_height: h,
            obs_width: w,
            obs_channels: c,
            n_actions: self.n_actions,
            num_timesteps: self.num_timesteps,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        std::fs::write(path.with_extension("meta.json"), serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_ppo() -> Ppo {
        Ppo::new(PpoConfig::default(), (36, 36, 2), 5, Device::Cpu).unwrap()
    }

    fn fixed_obs() -> Vec<Frame> {
        let mut f = Frame::zeros(36, 36, 2);
        for (i, v) in f.data.iter_mut().enumerate() {
            *v = (i % 251) as u8;
        }
        vec![f]
    }

    #[test]
    fn predict_stays_in_action_range() {
        let mut ppo = tiny_ppo();
        let obs = fixed_obs();
        for deterministic in [true, false] {
            let actions = ppo.predict(&obs, deterministic).unwrap();
            assert_eq!(actions.len(), 1);
            assert!(actions[0] < 5);
        }
    }

    #[test]
    fn deterministic_predict_is_stable() {
        let mut ppo = tiny_ppo();
        let obs = fixed_obs();
        let a = ppo.predict(&obs, true).unwrap();
        let b = ppo.predict(&obs, true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn save_then_load_restores_behavior() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("ckpt");

        let mut ppo = tiny_ppo();
        ppo.save_to(&stem).unwrap();
        assert!(stem.with_extension("safetensors").is_file());
        assert!(stem.with_extension("meta.json").is_file());

        let mut loaded = Ppo::load(stem.with_extension("safetensors"), Device::Cpu).unwrap();
        let obs = fixed_obs();
        assert_eq!(
            ppo.predict(&obs, true).unwrap(),
            loaded.predict(&obs, true).unwrap()
        );
    }

    #[test]
    fn mismatched_observation_shape_is_rejected() {
        let mut ppo = tiny_ppo();
        let wrong = vec![Frame::zeros(8, 8, 2)];
        assert!(matches!(
            ppo.predict(&wrong, true),
            Err(RlError::InvalidObservation(_))
        ));
    }
}
