pub mod fft;
pub mod spectrogram;
pub mod stft;
pub mod window;

use std::fmt::{Debug, Display};
use std::iter::Sum;

use rustfft::num_traits::{Float, FloatConst};

/// Floating-point sample type the pipeline can run in.
pub trait Real: Float + FloatConst + Sum + Default + Send + Sync + Debug + Display + 'static {
    /// Convert an `f64` constant or count into this precision.
    fn lit(x: f64) -> Self;
    fn as_f64(self) -> f64;
}

impl Real for f32 {
    fn lit(x: f64) -> Self {
        x as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    fn lit(x: f64) -> Self {
        x
    }

    fn as_f64(self) -> f64 {
        self
    }
}
