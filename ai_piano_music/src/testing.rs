// Test helpers shared across modules.

use ai_piano_prng::RandomSource;

/// A `RandomSource` that replays a fixed list of floats, cycling when it
/// runs out. Lets tests force each branch of the melodic walk.
pub struct Scripted {
    values: Vec<f64>,
    pos: usize,
}

impl Scripted {
    pub fn new(values: &[f64]) -> Self {
        assert!(!values.is_empty(), "Scripted needs at least one value");
        Scripted {
            values: values.to_vec(),
            pos: 0,
        }
    }

    /// Number of floats handed out so far.
    pub fn drawn(&self) -> usize {
        self.pos
    }
}

impl RandomSource for Scripted {
    fn next_f64(&mut self) -> f64 {
        let v = self.values[self.pos % self.values.len()];
        self.pos += 1;
        v
    }
}
