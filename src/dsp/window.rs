use serde::Deserialize;

use super::Real;

/// Analysis window applied to each frame before the transform.
///
/// Config files go through [`WindowType::from_name`], so an unknown name
/// there falls back the same way it does on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum WindowType {
    Rectangular,
    #[default]
    Hann,
    Hamming,
}

impl WindowType {
    /// Resolve a window by name. Unknown names fall back to rectangular.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "hann" | "hanning" => WindowType::Hann,
            "hamming" => WindowType::Hamming,
            "rectangular" | "rect" | "none" => WindowType::Rectangular,
            other => {
                log::warn!("Unknown window '{}', using rectangular", other);
                WindowType::Rectangular
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WindowType::Rectangular => "rectangular",
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
        }
    }

    /// Coefficient `w(n)` for a window of length `len` (`len >= 2`).
    pub fn coefficient<T: Real>(self, n: usize, len: usize) -> T {
        let phase = T::lit(2.0) * T::PI() * T::lit(n as f64) / T::lit((len - 1) as f64);
        match self {
            WindowType::Rectangular => T::one(),
            WindowType::Hann => T::lit(0.5) * (T::one() - phase.cos()),
            WindowType::Hamming => T::lit(0.54) - T::lit(0.46) * phase.cos(),
        }
    }
}

impl From<String> for WindowType {
    fn from(name: String) -> Self {
        WindowType::from_name(&name)
    }
}

/// Scale `block` in place by the window of the same length.
pub fn apply<T: Real>(block: &mut [T], kind: WindowType) {
    if kind == WindowType::Rectangular {
        return;
    }
    let len = block.len();
    for (n, x) in block.iter_mut().enumerate() {
        *x = *x * kind.coefficient::<T>(n, len);
    }
}
