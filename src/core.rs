// Core traits and types shared by the environment, the wrapper chain and the
// policy side of the crate.

/// A minimal, serde-free info map attached to resets and steps.
/// It stores small numbers of key-value pairs (episode counters, game state).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    entries: Vec<(String, InfoValue)>,
}

impl Info {
    /// Create an empty Info map.
    pub fn new() -> Self { Self { entries: Vec::new() } }

    /// Insert or replace a key with the given value.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: InfoValue) {
        let k = key.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(kk, _)| kk == &k) {
            *v = value;
        } else {
            self.entries.push((k, value));
        }
    }

    /// Get a reference to a value by key.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get a numeric value as i64, if the key holds one.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(InfoValue::I64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get a numeric value as f64, if the key holds one.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(InfoValue::F64(v)) => Some(*v),
            Some(InfoValue::I64(v)) => Some(*v as f64),
            _ => None,
        }
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Number of entries.
    pub fn len(&self) -> usize { self.entries.len() }
}

/// A small set of value types commonly used in info maps.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl From<bool> for InfoValue { fn from(v: bool) -> Self { InfoValue::Bool(v) } }
impl From<i64> for InfoValue { fn from(v: i64) -> Self { InfoValue::I64(v) } }
impl From<i32> for InfoValue { fn from(v: i32) -> Self { InfoValue::I64(v as i64) } }
impl From<u32> for InfoValue { fn from(v: u32) -> Self { InfoValue::I64(v as i64) } }
impl From<f64> for InfoValue { fn from(v: f64) -> Self { InfoValue::F64(v) } }
impl From<f32> for InfoValue { fn from(v: f32) -> Self { InfoValue::F64(v as f64) } }
impl From<&str> for InfoValue { fn from(v: &str) -> Self { InfoValue::Str(v.to_string()) } }
impl From<String> for InfoValue { fn from(v: String) -> Self { InfoValue::Str(v) } }

/// A row-major, channel-last pixel observation.
///
/// `data.len() == height * width * channels`. Channels are interleaved per
/// pixel, so the trailing axis is the channel axis, which is the axis the
/// frame-stacking layer concatenates along.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// An all-zero (black) frame of the given dimensions.
    pub fn zeros(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; (width as usize) * (height as usize) * (channels as usize)],
        }
    }

    /// (height, width, channels): the observation shape, trailing axis last.
    pub fn shape(&self) -> (u32, u32, u32) { (self.height, self.width, self.channels) }

    /// Number of pixels (height * width).
    pub fn num_pixels(&self) -> usize { (self.width as usize) * (self.height as usize) }
}

/// A step result from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<Obs> {
    pub observation: Obs,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl<Obs> Step<Obs> {
    pub fn new(observation: Obs, reward: f32, terminated: bool, truncated: bool, info: Info) -> Self {
        Self { observation, reward, terminated, truncated, info }
    }
}

/// Errors surfaced by the harness. None of them are recovered from locally:
/// construction, checkpoint and model-load failures propagate to the caller.
#[derive(thiserror::Error, Debug)]
pub enum RlError {
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),
    #[error("Operation not supported: {0}")]
    NotSupported(String),
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Other error: {0}")]
    Other(String),
}

/// Convenience alias for results using RlError.
pub type Result<T> = std::result::Result<T, RlError>;

/// Core environment trait: the emulator-style contract.
///
/// `reset` deliberately takes no arguments. The base environment has no
/// seeding or options surface at reset time (its RNG is fixed at
/// construction), which is exactly the signature the `ResetCompat` wrapper
/// papers over for callers that follow the [`ResetArgs`] convention.
pub trait Env {
    type Obs;
    type Act;

    /// Reset the environment to an initial state.
    fn reset(&mut self) -> (Self::Obs, Info);

    /// Apply an action and advance the environment by one step.
    fn step(&mut self, action: Self::Act) -> Step<Self::Obs>;

    /// Render a frame of the current state, if supported.
    fn render(&self) -> Option<Frame> { None }

    /// Close and release any external resources.
    fn close(&mut self) {}
}

/// Optional knobs a caller may pass at reset time under the [`ResetArgs`]
/// convention. The base environment ignores these entirely.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetOptions {
    /// Request a specific stage layout on the next episode.
    pub stage: Option<u32>,
}

/// The modern reset calling convention: vectorized layers always supply a
/// seed and options. Environments (or adapters) implementing this trait
/// declare explicitly which of those parameters they honor; an adapter that
/// accepts-and-ignores them says so in its signature and documentation rather
/// than swallowing unknown keyword arguments at runtime.
pub trait ResetArgs: Env {
    fn reset_with(&mut self, seed: Option<u64>, options: Option<&ResetOptions>) -> (Self::Obs, Info);
}
