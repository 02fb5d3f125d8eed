use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::policy::ppo::Ppo;

/// Anything that can persist its full state under a checkpoint path. The
/// artifact layout (weights blob plus metadata sidecar) is the implementor's
/// business; callers treat the path as opaque.
pub trait Checkpointable {
    fn save_to(&self, path: &Path) -> Result<()>;
}

/// Hooks the training loop invokes. The loop owns the step counters and
/// passes them in explicitly; callbacks carry no hidden coupling to it.
pub trait TrainCallback {
    /// Invoked once when training starts, before the first rollout.
    fn on_training_start(&mut self) -> Result<()> { Ok(()) }

    /// Invoked once per completed environment step with the cumulative call
    /// count. Returning false asks the loop to stop early.
    fn on_step(&mut self, n_calls: u64, model: &Ppo) -> Result<bool>;
}

/// Persists model state every `check_freq` steps during training.
///
/// Initialization (at training start) idempotently creates the save
/// directory. When no save path is configured the callback is a no-op:
/// it neither creates directories nor computes checkpoint paths. A save
/// failure propagates to the training loop; there is no retry.
pub struct CheckpointCallback {
    check_freq: u64,
    save_path: Option<PathBuf>,
    prefix: String,
}

impl CheckpointCallback {
    pub fn new(check_freq: u64, save_path: Option<PathBuf>) -> Self {
        assert!(check_freq > 0, "check_freq must be a positive integer");
        Self { check_freq, save_path, prefix: "best_model".into() }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Ensure the save directory exists. Safe to call repeatedly, whether or
    /// not the directory already exists.
    pub fn init(&self) -> Result<()> {
        if let Some(dir) = &self.save_path {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Deterministic checkpoint path for a step count: prefix + "_" + count,
    /// under the save directory.
    pub fn checkpoint_path(&self, dir: &Path, n_calls: u64) -> PathBuf {
        dir.join(format!("{}_{}", self.prefix, n_calls))
    }

    /// Frequency check and save. Always signals continue, whether or not a
    /// save happened on this step.
    pub fn handle_step<M: Checkpointable>(&mut self, n_calls: u64, model: &M) -> Result<bool> {
        if n_calls % self.check_freq == 0 {
            if let Some(dir) = self.save_path.clone() {
                let path = self.checkpoint_path(&dir, n_calls);
                model.save_to(&path)?;
                tracing::info!(path = %path.display(), n_calls, "checkpoint saved");
            }
        }
        Ok(true)
    }
}

impl TrainCallback for CheckpointCallback {
    fn on_training_start(&mut self) -> Result<()> {
        self.init()
    }

    fn on_step(&mut self, n_calls: u64, model: &Ppo) -> Result<bool> {
        self.handle_step(n_calls, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records the paths it was asked to save under instead of writing.
    #[derive(Default)]
    pub(crate) struct RecordingModel {
        pub saves: RefCell<Vec<PathBuf>>,
    }

    impl Checkpointable for RecordingModel {
        fn save_to(&self, path: &Path) -> Result<()> {
            self.saves.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn saves_only_on_exact_multiples() {
        let dir = tempfile::tempdir().unwrap();
        let mut cb = CheckpointCallback::new(10, Some(dir.path().to_path_buf()));
        cb.init().unwrap();
        let model = RecordingModel::default();
        for n in 1..=25 {
            assert!(cb.handle_step(n, &model).unwrap());
        }
        let saves = model.saves.borrow();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].file_name().unwrap(), "best_model_10");
        assert_eq!(saves[1].file_name().unwrap(), "best_model_20");
    }

    #[test]
    fn directory_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train");
        let cb = CheckpointCallback::new(1, Some(path.clone()));
        cb.init().unwrap();
        assert!(path.is_dir());
        // second init on a pre-existing directory must not fault
        cb.init().unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn absent_save_path_disables_saving() {
        let mut cb = CheckpointCallback::new(5, None);
        cb.init().unwrap();
        let model = RecordingModel::default();
        for n in 1..=20 {
            // still signals continue on every step
            assert!(cb.handle_step(n, &model).unwrap());
        }
        assert!(model.saves.borrow().is_empty());
    }

    #[test]
    #[should_panic(expected = "positive integer")]
    fn zero_check_freq_is_rejected() {
        let _ = CheckpointCallback::new(0, None);
    }
}
