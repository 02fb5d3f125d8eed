use scroller_rl::{
    Env, GrayscaleObservation, JoypadSpace, RecordEpisodeStatistics, ResetCompat, ScrollerEnv,
    Step, SyncVectorEnv,
};

fn wrapped(
    stage: u32,
    seed: u64,
) -> ResetCompat<RecordEpisodeStatistics<GrayscaleObservation<JoypadSpace<ScrollerEnv>>>> {
    let env = ScrollerEnv::new(stage, seed);
    let env = JoypadSpace::simple_movement(env);
    let env = GrayscaleObservation::new(env);
    let env = RecordEpisodeStatistics::new(env);
    ResetCompat::new(env)
}

// Ensure a vector env with N=1 produces the same rollout as a single env
// when construction seeds and actions are the same.
#[test]
fn single_vs_vector_n1_same_rollout() {
    // Single env
    let mut single = wrapped(1, 5);
    let (_obs_s, _info_s) = single.reset();

    // Vector env with N=1; the reset seed is offered but discarded by the
    // adapter, so determinism comes from the construction seed alone.
    let mut vec_env = SyncVectorEnv::new(1, || wrapped(1, 5));
    let _obs_all = vec_env.reset_all(Some(0), None);

    // Use a fixed action sequence: mostly running right with some jumps
    let actions = vec![1u32, 1, 4, 4, 1, 2, 1, 1, 4, 1];
    for a in actions {
        let s_single: Step<_> = single.step(a);
        let s_vec = vec_env.step_all(vec![a]).remove(0);
        assert_eq!(s_single.observation, s_vec.observation);
        assert!((s_single.reward - s_vec.reward).abs() < 1e-6);
        assert_eq!(s_single.terminated, s_vec.terminated);
        assert_eq!(s_single.truncated, s_vec.truncated);
        if s_single.terminated || s_single.truncated {
            break;
        }
    }
}

// Basic sanity for N=2 shape/length behavior
#[test]
fn vector_two_envs_steps_lengths() {
    let mut v = SyncVectorEnv::new(2, || wrapped(1, 123));
    let obs_infos = v.reset_all(Some(123), None);
    assert_eq!(obs_infos.len(), 2);
    let steps = v.step_all(vec![0, 1]);
    assert_eq!(steps.len(), 2);
    // Grayscale observations keep a single channel
    assert_eq!(steps[0].observation.channels, 1);
    assert_eq!(steps[1].observation.channels, 1);
}
