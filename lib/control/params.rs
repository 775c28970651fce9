//! Flat, bounded parameter vector for the optimizer, with named segments for
//! each group of tunable knobs.

use ndarray as nd;
use crate::{
    config::DaemonConfig,
    error::{ Error, Result },
};

/// A group of tunable knobs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Pulse amplitudes, qubit-major.
    PulseAmplitudes,
    /// Per-qubit dephasing-rate multipliers.
    DephasingScales,
    /// Per-qubit noise-strength multipliers.
    NoiseScales,
}

/// Location and bounds of one segment inside the flat vector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentSpec {
    pub kind: Segment,
    pub start: usize,
    pub len: usize,
    pub lower: f64,
    pub upper: f64,
}

impl SegmentSpec {
    pub fn range(&self) -> std::ops::Range<usize> { self.start..self.start + self.len }
}

/// Everything the optimizer may change about a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Knobs {
    /// `(n_qubits, n_pulses)`.
    pub pulse_amps: nd::Array2<f64>,
    pub dephasing_scales: Vec<f64>,
    pub noise_scales: Vec<f64>,
}

impl Knobs {
    pub fn n_qubits(&self) -> usize { self.pulse_amps.nrows() }

    fn check(&self) -> Result<()> {
        let n = self.n_qubits();
        for (what, v) in [
            ("dephasing scales", &self.dephasing_scales),
            ("noise scales", &self.noise_scales),
        ] {
            if v.len() != n {
                return Err(Error::ShapeMismatch { what, expected: (n, 1), got: (v.len(), 1) });
            }
        }
        Ok(())
    }
}

/// Packed knob values plus the segment layout needed to unpack them.
///
/// Only the segments enabled in the [`DaemonConfig`] are present. Values are
/// kept inside their segment's bounds at all times.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamVector {
    values: nd::Array1<f64>,
    segments: Vec<SegmentSpec>,
    shape: (usize, usize),
}

impl ParamVector {
    /// Pack the enabled knob groups, projecting them onto their bounds.
    pub fn pack(knobs: &Knobs, config: &DaemonConfig) -> Result<Self> {
        knobs.check()?;
        let shape = knobs.pulse_amps.dim();
        let mut values: Vec<f64> = Vec::new();
        let mut segments: Vec<SegmentSpec> = Vec::new();
        let mut push
            = |kind: Segment,
               data: &mut dyn Iterator<Item = f64>,
               (lower, upper): (f64, f64)|
        {
            let start = values.len();
            values.extend(data);
            segments.push(SegmentSpec { kind, start, len: values.len() - start, lower, upper });
        };
        if config.optimize_pulses {
            push(
                Segment::PulseAmplitudes,
                &mut knobs.pulse_amps.iter().copied(),
                (-config.amp_clip, config.amp_clip),
            );
        }
        if config.optimize_gamma_phi {
            push(
                Segment::DephasingScales,
                &mut knobs.dephasing_scales.iter().copied(),
                config.gamma_phi_scale_bounds,
            );
        }
        if config.optimize_noise_strength {
            push(
                Segment::NoiseScales,
                &mut knobs.noise_scales.iter().copied(),
                config.noise_scale_bounds,
            );
        }
        let mut packed = Self { values: nd::Array1::from(values), segments, shape };
        packed.clip();
        Ok(packed)
    }

    /// Write the packed values back over `base`; segments not present are
    /// taken from `base` unchanged.
    pub fn unpack(&self, base: &Knobs) -> Result<Knobs> {
        base.check()?;
        if base.pulse_amps.dim() != self.shape {
            return Err(Error::ShapeMismatch {
                what: "pulse amplitudes", expected: self.shape, got: base.pulse_amps.dim() });
        }
        let mut knobs = base.clone();
        for spec in self.segments.iter() {
            let vals = self.values.slice(nd::s![spec.range()]);
            match spec.kind {
                Segment::PulseAmplitudes => {
                    knobs.pulse_amps.iter_mut().zip(vals.iter())
                        .for_each(|(a, v)| { *a = *v; });
                },
                Segment::DephasingScales => {
                    knobs.dephasing_scales = vals.to_vec();
                },
                Segment::NoiseScales => {
                    knobs.noise_scales = vals.to_vec();
                },
            }
        }
        Ok(knobs)
    }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn values(&self) -> &nd::Array1<f64> { &self.values }

    pub fn segments(&self) -> &[SegmentSpec] { &self.segments }

    pub fn segment(&self, kind: Segment) -> Option<&SegmentSpec> {
        self.segments.iter().find(|s| s.kind == kind)
    }

    /// Values of one segment, if present.
    pub fn slice(&self, kind: Segment) -> Option<nd::ArrayView1<'_, f64>> {
        self.segment(kind).map(|s| self.values.slice(nd::s![s.range()]))
    }

    /// Project every value onto its segment's bounds.
    pub fn clip(&mut self) {
        for spec in self.segments.iter() {
            self.values.slice_mut(nd::s![spec.range()])
                .mapv_inplace(|v| v.clamp(spec.lower, spec.upper));
        }
    }

    /// `self + scale * direction`, projected onto the bounds.
    ///
    /// *Panics* if `direction` does not have the same length as `self`.
    pub fn shifted(&self, direction: &nd::Array1<f64>, scale: f64) -> Self {
        let mut out = self.clone();
        out.values.scaled_add(scale, direction);
        out.clip();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knobs() -> Knobs {
        Knobs {
            pulse_amps: nd::array![[0.1, -0.2, 0.3], [0.0, 0.5, -0.4]],
            dephasing_scales: vec![1.0, 0.5],
            noise_scales: vec![0.25, 1.5],
        }
    }

    #[test]
    fn pack_unpack_round_trip() {
        let config = DaemonConfig::default();
        let k = knobs();
        let packed = ParamVector::pack(&k, &config).unwrap();
        assert_eq!(packed.len(), 6 + 2 + 2);
        assert_eq!(packed.segment(Segment::DephasingScales).unwrap().start, 6);
        assert_eq!(packed.slice(Segment::NoiseScales).unwrap().to_vec(), vec![0.25, 1.5]);
        assert_eq!(packed.unpack(&k).unwrap(), k);
    }

    #[test]
    fn disabled_segments_come_from_base() {
        let config = DaemonConfig { optimize_pulses: false, ..Default::default() };
        let k = knobs();
        let packed = ParamVector::pack(&k, &config).unwrap();
        assert_eq!(packed.len(), 4);
        assert!(packed.segment(Segment::PulseAmplitudes).is_none());
        let moved = packed.shifted(&nd::Array1::ones(4), 0.1);
        let out = moved.unpack(&k).unwrap();
        assert_eq!(out.pulse_amps, k.pulse_amps);
        assert!((out.dephasing_scales[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn values_stay_in_bounds() {
        let config = DaemonConfig::default();
        let mut k = knobs();
        k.pulse_amps[[0, 0]] = 3.0;
        k.noise_scales[0] = -1.0;
        let packed = ParamVector::pack(&k, &config).unwrap();
        assert_eq!(packed.values()[0], config.amp_clip);
        let moved = packed.shifted(&nd::Array1::ones(packed.len()), 10.0);
        for spec in moved.segments() {
            for v in moved.values().slice(nd::s![spec.range()]).iter() {
                assert!(*v >= spec.lower && *v <= spec.upper);
            }
        }
        let out = moved.unpack(&k).unwrap();
        assert_eq!(out.noise_scales, vec![2.0, 2.0]);
        assert_eq!(out.dephasing_scales, vec![2.0, 2.0]);
    }

    #[test]
    fn shape_mismatch_rejected() {
        let config = DaemonConfig::default();
        let mut k = knobs();
        k.noise_scales.pop();
        assert!(matches!(
            ParamVector::pack(&k, &config),
            Err(Error::ShapeMismatch { .. })
        ));
        let packed = ParamVector::pack(&knobs(), &config).unwrap();
        let other = Knobs { pulse_amps: nd::Array2::zeros((2, 4)), ..knobs() };
        assert!(packed.unpack(&other).is_err());
    }
}
