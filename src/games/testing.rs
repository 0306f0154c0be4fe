//! Scripted draw source for resolver unit tests.

use std::collections::VecDeque;

use crate::fairness::RandomSource;

pub struct ScriptedSource {
    values: VecDeque<f64>,
}

impl ScriptedSource {
    pub fn uniforms(values: &[f64]) -> Self {
        Self {
            values: values.iter().copied().collect(),
        }
    }

    /// Each `(value, min, max)` becomes the uniform that `next_int(min, max)`
    /// maps onto `value`.
    pub fn ints(script: &[(u64, u64, u64)]) -> Self {
        Self {
            values: script
                .iter()
                .map(|&(value, min, max)| uniform_for(value, min, max))
                .collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// Centre of the band that `scale_to_range` maps onto `value`.
pub fn uniform_for(value: u64, min: u64, max: u64) -> f64 {
    assert!((min..=max).contains(&value));
    let span = (max - min + 1) as f64;
    ((value - min) as f64 + 0.5) / span
}

impl RandomSource for ScriptedSource {
    fn next_uniform(&mut self) -> f64 {
        self.values.pop_front().expect("scripted source exhausted")
    }
}
