use super::Real;

/// Row-major `n_frames x n_bins` magnitude matrix in frame order.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrogram<T> {
    data: Vec<T>,
    n_frames: usize,
    n_bins: usize,
}

impl<T: Real> Spectrogram<T> {
    /// Wrap an already ordered buffer. Returns `None` when the length does not
    /// match the shape.
    pub fn from_rows(data: Vec<T>, n_frames: usize, n_bins: usize) -> Option<Self> {
        if data.len() != n_frames * n_bins {
            return None;
        }
        Some(Self {
            data,
            n_frames,
            n_bins,
        })
    }

    #[cfg(test)]
    pub fn empty(n_bins: usize) -> Self {
        Self {
            data: Vec::new(),
            n_frames: 0,
            n_bins,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn is_empty(&self) -> bool {
        self.n_frames == 0
    }

    pub fn row(&self, frame: usize) -> &[T] {
        let start = frame * self.n_bins;
        &self.data[start..start + self.n_bins]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.n_bins.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_shape() {
        assert!(Spectrogram::from_rows(vec![0.0f32; 5], 2, 3).is_none());
    }

    #[test]
    fn rows_follow_frame_order() {
        let s = Spectrogram::from_rows(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2).unwrap();
        assert_eq!(s.row(1), &[3.0, 4.0]);
        let rows: Vec<&[f64]> = s.rows().collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], &[5.0, 6.0]);
    }

    #[test]
    fn empty_has_no_rows() {
        let s: Spectrogram<f32> = Spectrogram::empty(1025);
        assert!(s.is_empty());
        assert_eq!(s.rows().count(), 0);
    }
}
