pub mod core;
pub mod spaces;
pub mod utils;
pub mod envs;
pub mod wrappers;
pub mod vector;
pub mod policy;
pub mod pipeline;

pub use crate::core::{Env, Frame, Info, InfoValue, ResetArgs, ResetOptions, Result, RlError, Step};
pub use crate::spaces::{Discrete, MultiBinary, Space};
pub use crate::envs::{Buttons, RewardConfig, ScrollerEnv};
pub use crate::wrappers::{
    GrayscaleObservation, JoypadSpace, RecordEpisodeStatistics, ResetCompat, SIMPLE_MOVEMENT,
};
pub use crate::vector::{SyncVectorEnv, VecFrameStack};
pub use crate::policy::{CheckpointCallback, Checkpointable, Ppo, PpoConfig, TrainCallback};
pub use crate::pipeline::{PIPELINE_ACTIONS, ScrollerPipeline, assemble_scroller_env, pipeline_obs_shape};
pub use crate::utils::{encode_png, save_png};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// A tiny dummy environment to validate the trait compiles and basic methods work.
    struct CounterEnv {
        state: i32,
    }

    impl Env for CounterEnv {
        type Obs = i32;
        type Act = i32;

        fn reset(&mut self) -> (Self::Obs, Info) {
            self.state = 0;
            (self.state, Info::new())
        }

        fn step(&mut self, action: Self::Act) -> Step<Self::Obs> {
            self.state += action;
            let terminated = self.state >= 3;
            Step::new(self.state, 1.0, terminated, false, Info::new())
        }
    }

    #[test]
    fn dummy_env_runs() {
        let mut env = CounterEnv { state: 0 };
        let (_obs, _info) = env.reset();
        let s1 = env.step(1);
        assert_eq!(s1.observation, 1);
        assert!(!s1.terminated);
        let s2 = env.step(2);
        assert_eq!(s2.observation, 3);
        assert!(s2.terminated);
        env.close();
    }

    #[test]
    fn spaces_discrete_and_multibinary() {
        let mut rng = StdRng::seed_from_u64(42);
        let d = Discrete::new(5);
        for _ in 0..100 {
            let v = d.sample(&mut rng);
            assert!(d.contains(&v));
        }

        let mb = MultiBinary::new(Buttons::COUNT);
        for _ in 0..50 {
            let v = mb.sample(&mut rng);
            assert!(mb.contains(&v));
            assert_eq!(v.len(), Buttons::COUNT);
            assert!(v.iter().all(|&x| x == 0 || x == 1));
        }

        // Negative containment checks
        let bad_mb = vec![0, 1, 2, 0, 1, 0];
        assert!(!mb.contains(&bad_mb));
    }

    #[test]
    fn every_restricted_action_lives_in_the_native_space() {
        let native = MultiBinary::new(Buttons::COUNT);
        for combo in SIMPLE_MOVEMENT {
            assert!(native.contains(&combo.to_bit_vec()));
        }
    }

    #[test]
    fn scroller_runs_under_the_joypad_wrapper() {
        let mut env = JoypadSpace::simple_movement(ScrollerEnv::new(1, 0));
        let (_obs, _info) = env.reset();
        for a in [1u32, 2, 4, 0, 6] {
            let s = env.step(a);
            assert_eq!(s.observation.channels, 3);
            if s.terminated || s.truncated {
                break;
            }
        }
    }

    #[cfg(not(feature = "image"))]
    #[test]
    fn encode_png_without_feature_not_supported() {
        let frame = Frame::zeros(2, 2, 3);
        let err = encode_png(&frame).unwrap_err();
        match err {
            RlError::NotSupported(_) => {}
            other => panic!("Expected NotSupported, got {:?}", other),
        }
    }

    #[cfg(feature = "image")]
    #[test]
    fn encode_png_with_feature_produces_png_signature() {
        let mut env = ScrollerEnv::new(1, 0);
        let (frame, _info) = env.reset();
        let bytes = encode_png(&frame).expect("PNG encoding should succeed");
        let sig = &bytes[..8];
        assert_eq!(sig, &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
