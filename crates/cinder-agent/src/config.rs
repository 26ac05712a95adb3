/// Tuning knobs for one conversation driver
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Upper bound on model calls per turn
    pub max_iterations: usize,
    pub temperature: f32,
    /// Request streamed replies and republish their deltas
    pub stream: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            temperature: 0.2,
            stream: false,
        }
    }
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}
