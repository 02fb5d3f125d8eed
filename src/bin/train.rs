use anyhow::Result;
use candle_core::Device;
use tracing::Level;

use scroller_rl::{
    CheckpointCallback, PIPELINE_ACTIONS, Ppo, PpoConfig, assemble_scroller_env,
    pipeline_obs_shape,
};

// Every knob is a literal constant; there are no CLI flags or env vars.
const STAGE: u32 = 1;
const ENV_SEED: u64 = 0;
const N_ENVS: usize = 1;
const N_STACK: usize = 4;
const CHECKPOINT_DIR: &str = "./train/";
const LOG_DIR: &str = "./logs/";
const CHECK_FREQ: u64 = 1_000_000;
const TOTAL_TIMESTEPS: u64 = 1_000_000;
const LEARNING_RATE: f64 = 0.000001;
const N_STEPS: usize = 512;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let mut env = assemble_scroller_env(STAGE, ENV_SEED, N_ENVS, N_STACK);

    let mut callback =
        CheckpointCallback::new(CHECK_FREQ, Some(CHECKPOINT_DIR.into()));

    let config = PpoConfig {
        learning_rate: LEARNING_RATE,
        n_steps: N_STEPS,
        ..Default::default()
    };
    let mut model = Ppo::new(
        config,
        pipeline_obs_shape(N_STACK),
        PIPELINE_ACTIONS,
        Device::Cpu,
    )?
    .with_log_dir(LOG_DIR);

    model.learn(&mut env, TOTAL_TIMESTEPS, Some(&mut callback))?;

    tracing::info!(timesteps = model.num_timesteps(), "training finished");
    Ok(())
}
