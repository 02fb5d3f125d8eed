pub mod rng;
pub mod render;
pub mod canvas;

pub use rng::{RngStream, SeedSequence, rng_from_seed, sample_u64};
pub use render::{encode_png, save_png};
pub use canvas::{Canvas, Color};
