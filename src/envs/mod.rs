pub mod scroller;

pub use scroller::{Buttons, RewardConfig, ScrollerEnv};
