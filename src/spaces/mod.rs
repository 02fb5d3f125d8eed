/// Space implementations.
///
/// Two spaces cover this crate's needs: `Discrete` for the restricted action
/// set the policy samples from, and `MultiBinary` for the native controller
/// button mask the base environment consumes.

pub mod space;

use rand::distributions::{Distribution, Uniform};
use rand::Rng;

pub use space::Space;

/// A discrete space of integers in [0, n).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discrete {
    n: u32,
}

impl Discrete {
    pub fn new(n: u32) -> Self {
        assert!(n > 0, "Discrete space requires n > 0");
        Self { n }
    }

    pub fn n(&self) -> u32 { self.n }
}

impl Space for Discrete {
    type Element = u32;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Element {
        // Uniform over [0, n)
        if self.n == 1 { return 0; }
        let dist = Uniform::from(0..self.n);
        dist.sample(rng)
    }

    fn contains(&self, elem: &Self::Element) -> bool { *elem < self.n }
}

/// A fixed-length binary vector space of size `n`.
/// Elements are vectors of 0/1 values (u8), one per controller button.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiBinary {
    n: usize,
}

impl MultiBinary {
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "MultiBinary requires n > 0");
        Self { n }
    }

    pub fn n(&self) -> usize { self.n }
}

impl Space for MultiBinary {
    type Element = Vec<u8>;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Element {
        // Sample each bit independently with p=0.5 using a uniform over {0,1}
        let dist = Uniform::from(0u8..=1u8);
        (0..self.n).map(|_| dist.sample(rng)).collect()
    }

    fn contains(&self, elem: &Self::Element) -> bool {
        elem.len() == self.n && elem.iter().all(|&v| v == 0 || v == 1)
    }
}
