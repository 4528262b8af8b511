//! Procedural noise beds.
//!
//! Endless sample streams for the two [`NoiseLayer`]s: pink noise through a
//! 400 Hz low-pass for rain, brown noise through an 80 Hz low-pass for the
//! distant city.

use super::NoiseLayer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    Pink,
    Brown,
}

/// Single-pole low-pass filter.
#[derive(Debug, Clone, Copy)]
struct OnePole {
    alpha: f32,
    state: f32,
}

impl OnePole {
    fn new(cutoff_hz: f32, sample_rate: u32) -> Self {
        let alpha = 1.0 - (-2.0 * PI * cutoff_hz / sample_rate as f32).exp();
        Self { alpha, state: 0.0 }
    }

    fn process(&mut self, input: f32) -> f32 {
        self.state += self.alpha * (input - self.state);
        self.state
    }
}

/// An infinite mono noise source.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    color: NoiseColor,
    sample_rate: u32,
    rng: StdRng,
    pink: [f32; 7],
    brown: f32,
    filter: OnePole,
    makeup: f32,
}

impl NoiseGenerator {
    pub fn new(color: NoiseColor, cutoff_hz: f32, sample_rate: u32, seed: u64) -> Self {
        let makeup = match color {
            NoiseColor::Pink => 2.0,
            NoiseColor::Brown => 1.5,
        };
        Self {
            color,
            sample_rate,
            rng: StdRng::seed_from_u64(seed),
            pink: [0.0; 7],
            brown: 0.0,
            filter: OnePole::new(cutoff_hz, sample_rate),
            makeup,
        }
    }

    /// The generator used for `layer`.
    pub fn for_layer(layer: NoiseLayer, sample_rate: u32, seed: u64) -> Self {
        match layer {
            NoiseLayer::Rain => Self::new(NoiseColor::Pink, 400.0, sample_rate, seed),
            NoiseLayer::City => Self::new(NoiseColor::Brown, 80.0, sample_rate, seed),
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn raw(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        match self.color {
            // Paul Kellet's refined pink filter.
            NoiseColor::Pink => {
                let b = &mut self.pink;
                b[0] = 0.99886 * b[0] + white * 0.0555179;
                b[1] = 0.99332 * b[1] + white * 0.0750759;
                b[2] = 0.96900 * b[2] + white * 0.1538520;
                b[3] = 0.86650 * b[3] + white * 0.3104856;
                b[4] = 0.55000 * b[4] + white * 0.5329522;
                b[5] = -0.7616 * b[5] - white * 0.0168980;
                let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
                b[6] = white * 0.115926;
                out * 0.11
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + 0.02 * white) / 1.02;
                self.brown * 3.5
            }
        }
    }
}

impl Iterator for NoiseGenerator {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let raw = self.raw();
        let filtered = self.filter.process(raw) * self.makeup;
        Some(filtered.clamp(-1.0, 1.0))
    }
}
