//! Pipeline assembly: the fixed construction sequence both runtime modes
//! share. The wrapper order is a contract: each layer expects the interface
//! produced by the one before it, and the vectorizer must sit directly under
//! the frame stacker.

use crate::envs::scroller::{ScrollerEnv, VIEW_H, VIEW_W};
use crate::vector::{SyncVectorEnv, VecFrameStack};
use crate::wrappers::{
    GrayscaleObservation, JoypadSpace, RecordEpisodeStatistics, ResetCompat, SIMPLE_MOVEMENT,
};

/// The fully assembled environment type: platformer, restricted to the
/// simple-movement action set, grayscaled, with episode statistics, adapted
/// to the seeded reset convention, vectorized, frame-stacked.
pub type ScrollerPipeline = VecFrameStack<
    ResetCompat<RecordEpisodeStatistics<GrayscaleObservation<JoypadSpace<ScrollerEnv>>>>,
>;

/// Number of discrete actions the assembled pipeline accepts.
pub const PIPELINE_ACTIONS: usize = SIMPLE_MOVEMENT.len();

/// Observation shape of one stacked frame: (height, width, channels).
pub const fn pipeline_obs_shape(n_stack: usize) -> (usize, usize, usize) {
    (VIEW_H as usize, VIEW_W as usize, n_stack)
}

/// Build the environment stack in its contractual order:
/// base env -> action restriction -> grayscale -> episode statistics ->
/// reset-argument adapter -> vectorize -> frame stack.
pub fn assemble_scroller_env(stage: u32, seed: u64, n_envs: usize, n_stack: usize) -> ScrollerPipeline {
    let venv = SyncVectorEnv::new(n_envs, || {
        let env = ScrollerEnv::new(stage, seed);
        let env = JoypadSpace::simple_movement(env);
        let env = GrayscaleObservation::new(env);
        let env = RecordEpisodeStatistics::new(env);
        ResetCompat::new(env)
    });
    VecFrameStack::new(venv, n_stack)
}
