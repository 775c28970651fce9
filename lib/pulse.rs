//! Piecewise-constant per-qubit drive modulation.

use ndarray as nd;
use crate::error::{ Error, Result };

/// Per-qubit, per-segment drive modulation over `[0, duration)`.
///
/// Segment `s` of `m` covers `[s, s + 1) * duration / m`; the drive amplitude
/// of qubit `q` at time `t` is scaled by `1 + amps[[q, s]]`. Amplitudes are
/// always clipped to `[-clip, clip]`.
#[derive(Clone, Debug, PartialEq)]
pub struct PulseSchedule {
    amps: nd::Array2<f64>,
    clip: f64,
    duration: f64,
}

impl PulseSchedule {
    /// Validate and clip an amplitude array of shape `(n_qubits, n_segments)`.
    pub fn new(
        amps: nd::Array2<f64>,
        n_qubits: usize,
        n_segments: usize,
        clip: f64,
        duration: f64,
    ) -> Result<Self>
    {
        if amps.dim() != (n_qubits, n_segments) {
            return Err(Error::ShapeMismatch {
                what: "pulse amplitudes",
                expected: (n_qubits, n_segments),
                got: amps.dim(),
            });
        }
        if n_segments == 0 {
            return Err(Error::config("pulse schedule needs at least one segment"));
        }
        if !(clip.is_finite() && clip >= 0.0) {
            return Err(Error::config(format!("invalid pulse clip bound {}", clip)));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(Error::config(format!("invalid pulse duration {}", duration)));
        }
        if amps.iter().any(|a| !a.is_finite()) {
            return Err(Error::config("pulse amplitudes must be finite"));
        }
        let amps = amps.mapv(|a| a.clamp(-clip, clip));
        Ok(Self { amps, clip, duration })
    }

    /// All-zero schedule.
    pub fn zeros(n_qubits: usize, n_segments: usize, clip: f64, duration: f64)
        -> Result<Self>
    {
        Self::new(
            nd::Array2::zeros((n_qubits, n_segments)),
            n_qubits, n_segments, clip, duration,
        )
    }

    pub fn n_qubits(&self) -> usize { self.amps.nrows() }

    pub fn n_segments(&self) -> usize { self.amps.ncols() }

    pub fn clip(&self) -> f64 { self.clip }

    pub fn duration(&self) -> f64 { self.duration }

    pub fn amps(&self) -> &nd::Array2<f64> { &self.amps }

    /// Segment index active at time `t`; times outside `[0, duration)` map to
    /// the first or last segment.
    pub fn segment_at(&self, t: f64) -> usize {
        let m = self.n_segments();
        let s = (t / self.duration * m as f64).floor();
        if s <= 0.0 { 0 } else { (s as usize).min(m - 1) }
    }

    /// Modulation of qubit `q` at time `t`.
    ///
    /// *Panics* if `q` is out of range.
    pub fn amp_at(&self, q: usize, t: f64) -> f64 {
        self.amps[[q, self.segment_at(t)]]
    }

    /// Modulation of every qubit at time `t`.
    pub fn modulation(&self, t: f64) -> nd::Array1<f64> {
        self.amps.column(self.segment_at(t)).to_owned()
    }

    /// Mean squared amplitude, the regularization term of the objective.
    pub fn mean_sq(&self) -> f64 {
        self.amps.iter().map(|a| a * a).sum::<f64>() / self.amps.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_shape_mismatch() {
        let amps = nd::Array2::zeros((3, 5));
        let err = PulseSchedule::new(amps, 4, 5, 0.8, 1.0).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch { expected: (4, 5), got: (3, 5), .. }
        ));
    }

    #[test]
    fn clips_to_bound() {
        let amps = nd::array![[2.0, -0.1], [-3.0, 0.5]];
        let p = PulseSchedule::new(amps, 2, 2, 0.8, 1.0).unwrap();
        assert_eq!(p.amps(), &nd::array![[0.8, -0.1], [-0.8, 0.5]]);
        assert!(p.amps().iter().all(|a| a.abs() <= p.clip()));
    }

    #[test]
    fn segment_lookup() {
        let amps = nd::array![[0.1, 0.2, 0.3, 0.4]];
        let p = PulseSchedule::new(amps, 1, 4, 1.0, 8.0).unwrap();
        assert_eq!(p.amp_at(0, -1.0), 0.1);
        assert_eq!(p.amp_at(0, 0.0), 0.1);
        assert_eq!(p.amp_at(0, 2.0), 0.2);
        assert_eq!(p.amp_at(0, 7.99), 0.4);
        assert_eq!(p.amp_at(0, 100.0), 0.4);
        assert_eq!(p.modulation(5.0), nd::array![0.3]);
        let z = PulseSchedule::zeros(2, 3, 0.5, 1.0).unwrap();
        assert_eq!(z.mean_sq(), 0.0);
    }
}
