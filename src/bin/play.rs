use anyhow::Result;
use candle_core::Device;
use tracing::Level;

use scroller_rl::{Ppo, assemble_scroller_env};

const STAGE: u32 = 1;
const ENV_SEED: u64 = 0;
const N_ENVS: usize = 1;
const N_STACK: usize = 4;
const MODEL_PATH: &str = "./train/best_model_1000000.safetensors";

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let mut env = assemble_scroller_env(STAGE, ENV_SEED, N_ENVS, N_STACK);
    // A missing or corrupt artifact ends the process here, before the loop.
    let mut model = Ppo::load(MODEL_PATH, Device::Cpu)?;

    let mut obs = env.reset_all(None, None);
    // Runs until the process is killed; finished episodes auto-reset below.
    loop {
        let actions = model.predict(&obs, false)?;
        let steps = env.step_all(actions);
        obs = steps
            .into_iter()
            .map(|s| {
                if s.terminated || s.truncated {
                    if let Some(x) = s.info.get_i64("episode_best_x") {
                        tracing::info!(best_x = x, "episode finished");
                    }
                }
                s.observation
            })
            .collect();
    }
}
