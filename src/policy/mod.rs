pub mod net;
pub mod rollout;
pub mod ppo;
pub mod callback;

pub use net::CnnPolicy;
pub use rollout::RolloutBuffer;
pub use ppo::{Ppo, PpoConfig};
pub use callback::{CheckpointCallback, Checkpointable, TrainCallback};
