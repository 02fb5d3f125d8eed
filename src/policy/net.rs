use candle_core::{Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder, conv2d, linear};

// (kernel, stride) of the three conv stages.
const CONV_STAGES: [(usize, usize); 3] = [(8, 4), (4, 2), (3, 1)];

fn conv_out(mut size: usize) -> usize {
    for (k, s) in CONV_STAGES {
        size = (size - k) / s + 1;
    }
    size
}

/// Actor-critic network over stacked pixel observations.
///
/// A shared convolutional torso (32x8x8/4, 64x4x4/2, 64x3x3/1, dense 512)
/// feeds two heads: action logits and a scalar state value. Input is
/// `[batch, channels, height, width]` float in [0, 1].
pub struct CnnPolicy {
    c1: Conv2d,
    c2: Conv2d,
    c3: Conv2d,
    fc: Linear,
    actor: Linear,
    critic: Linear,
}

impl CnnPolicy {
    pub fn new(
        vb: VarBuilder,
        in_channels: usize,
        height: usize,
        width: usize,
        n_actions: usize,
    ) -> Result<Self> {
        assert!(
            conv_out(height) >= 1 && conv_out(width) >= 1,
            "observation {height}x{width} too small for the conv torso"
        );
        let c1 = conv2d(in_channels, 32, 8, Conv2dConfig { stride: 4, ..Default::default() }, vb.pp("c1"))?;
        let c2 = conv2d(32, 64, 4, Conv2dConfig { stride: 2, ..Default::default() }, vb.pp("c2"))?;
        let c3 = conv2d(64, 64, 3, Conv2dConfig { stride: 1, ..Default::default() }, vb.pp("c3"))?;
        let flat = 64 * conv_out(height) * conv_out(width);
        let fc = linear(flat, 512, vb.pp("fc"))?;
        let actor = linear(512, n_actions, vb.pp("actor"))?;
        let critic = linear(512, 1, vb.pp("critic"))?;
        Ok(Self { c1, c2, c3, fc, actor, critic })
    }

    /// Returns (action logits `[batch, n_actions]`, state values `[batch]`).
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = self.c1.forward(obs)?.relu()?;
        let x = self.c2.forward(&x)?.relu()?;
        let x = self.c3.forward(&x)?.relu()?;
        let x = x.flatten_from(1)?;
        let x = self.fc.forward(&x)?.relu()?;
        let logits = self.actor.forward(&x)?;
        let values = self.critic.forward(&x)?.squeeze(1)?;
        Ok((logits, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn forward_shapes() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = CnnPolicy::new(vb, 4, 36, 36, 7).unwrap();
        let obs = Tensor::zeros((2, 4, 36, 36), DType::F32, &device).unwrap();
        let (logits, values) = net.forward(&obs).unwrap();
        assert_eq!(logits.dims(), &[2, 7]);
        assert_eq!(values.dims(), &[2]);
    }

    #[test]
    fn conv_out_matches_hand_computation() {
        // 36 -> (36-8)/4+1 = 8 -> (8-4)/2+1 = 3 -> (3-3)/1+1 = 1
        assert_eq!(conv_out(36), 1);
        // the native view height
        assert_eq!(conv_out(240), 26);
        assert_eq!(conv_out(256), 28);
    }
}
