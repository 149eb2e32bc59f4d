//! Raw probe-level intensity data

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{LimmaError, Result};

/// Source of raw probe intensities consumed by the normalizer.
///
/// Implementors expose `(probe, sample) -> intensity` lookups plus the
/// platform's probe-to-feature grouping. Probes are addressed by position.
pub trait RawIntensityProvider {
    /// Sample identifiers, in column order
    fn sample_ids(&self) -> &[String];

    /// Probe identifiers, in row order
    fn probe_ids(&self) -> &[String];

    /// Raw intensity of one probe in one sample
    fn intensity(&self, probe: usize, sample: usize) -> f64;

    /// Feature (probeset) the probe belongs to
    fn feature_id(&self, probe: usize) -> &str;

    fn n_probes(&self) -> usize {
        self.probe_ids().len()
    }

    fn n_samples(&self) -> usize {
        self.sample_ids().len()
    }
}

/// Find the first duplicated identifier, if any
fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().find(|id| !seen.insert(id.as_str())).map(|s| s.as_str())
}

/// Matrix-backed raw intensities (probes x samples)
#[derive(Debug, Clone)]
pub struct RawIntensities {
    /// Raw intensity values (probes x samples)
    intensities: Array2<f64>,
    /// Probe identifiers
    probe_ids: Vec<String>,
    /// Sample identifiers
    sample_ids: Vec<String>,
    /// Feature identifier for each probe (defaults to the probe itself)
    feature_ids: Vec<String>,
}

impl RawIntensities {
    /// Create raw intensities where every probe is its own feature
    pub fn new(
        intensities: Array2<f64>,
        probe_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_probes, n_samples) = intensities.dim();

        if probe_ids.len() != n_probes {
            return Err(LimmaError::DimensionMismatch {
                expected: format!("{} probe IDs", n_probes),
                got: format!("{} probe IDs", probe_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(LimmaError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if intensities.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(LimmaError::MalformedInput {
                reason: "Intensities must be non-negative finite values".to_string(),
            });
        }

        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(LimmaError::MalformedInput {
                reason: format!("Duplicate sample ID '{}'", dup),
            });
        }

        if let Some(dup) = first_duplicate(&probe_ids) {
            return Err(LimmaError::MalformedInput {
                reason: format!("Duplicate probe ID '{}'", dup),
            });
        }

        let feature_ids = probe_ids.clone();

        Ok(Self {
            intensities,
            probe_ids,
            sample_ids,
            feature_ids,
        })
    }

    /// Attach a probe -> feature map.
    ///
    /// Probes missing from the map are not part of any probeset and are
    /// dropped. Fails if no probe is left.
    pub fn with_probe_map(self, probe_map: &HashMap<String, String>) -> Result<Self> {
        let keep: Vec<usize> = (0..self.n_probes())
            .filter(|&i| probe_map.contains_key(&self.probe_ids[i]))
            .collect();

        let dropped = self.n_probes() - keep.len();
        if dropped > 0 {
            log::warn!("{} probes have no feature assignment and were dropped", dropped);
        }

        if keep.is_empty() {
            return Err(LimmaError::MalformedInput {
                reason: "No probe in the intensity matrix is covered by the probe map".to_string(),
            });
        }

        let intensities = self.intensities.select(Axis(0), &keep);
        let probe_ids: Vec<String> = keep.iter().map(|&i| self.probe_ids[i].clone()).collect();
        let feature_ids: Vec<String> = probe_ids
            .iter()
            .map(|p| probe_map[p].clone())
            .collect();

        Ok(Self {
            intensities,
            probe_ids,
            sample_ids: self.sample_ids,
            feature_ids,
        })
    }

    /// Get the raw intensities as a view
    pub fn intensities(&self) -> ArrayView2<'_, f64> {
        self.intensities.view()
    }

    /// Feature identifier of every probe
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Number of distinct features
    pub fn n_features(&self) -> usize {
        self.feature_ids.iter().collect::<HashSet<_>>().len()
    }
}

impl RawIntensityProvider for RawIntensities {
    fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    fn probe_ids(&self) -> &[String] {
        &self.probe_ids
    }

    fn intensity(&self, probe: usize, sample: usize) -> f64 {
        self.intensities[[probe, sample]]
    }

    fn feature_id(&self, probe: usize) -> &str {
        &self.feature_ids[probe]
    }
}

/// Column subset of another provider, used to drop outlier arrays before
/// normalization without copying the intensities.
#[derive(Debug)]
pub struct SampleSubset<'a, P: RawIntensityProvider + ?Sized> {
    inner: &'a P,
    /// Inner column of every kept sample
    columns: Vec<usize>,
    sample_ids: Vec<String>,
}

impl<'a, P: RawIntensityProvider + ?Sized> SampleSubset<'a, P> {
    /// Keep every sample of `inner` except the `excluded` ones.
    ///
    /// Fails on an identifier `inner` does not have, or if nothing is left.
    pub fn new(inner: &'a P, excluded: &[String]) -> Result<Self> {
        for id in excluded {
            if !inner.sample_ids().contains(id) {
                return Err(LimmaError::MalformedInput {
                    reason: format!("Cannot exclude unknown sample '{}'", id),
                });
            }
        }

        let columns: Vec<usize> = (0..inner.n_samples())
            .filter(|&j| !excluded.contains(&inner.sample_ids()[j]))
            .collect();
        if columns.is_empty() {
            return Err(LimmaError::EmptyData {
                reason: "Every sample was excluded".to_string(),
            });
        }
        let sample_ids = columns.iter().map(|&j| inner.sample_ids()[j].clone()).collect();

        Ok(Self {
            inner,
            columns,
            sample_ids,
        })
    }

    /// Column of `inner` behind each kept sample
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }
}

impl<P: RawIntensityProvider + ?Sized> RawIntensityProvider for SampleSubset<'_, P> {
    fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    fn probe_ids(&self) -> &[String] {
        self.inner.probe_ids()
    }

    fn intensity(&self, probe: usize, sample: usize) -> f64 {
        self.inner.intensity(probe, self.columns[sample])
    }

    fn feature_id(&self, probe: usize) -> &str {
        self.inner.feature_id(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_raw_intensities_creation() {
        let raw = RawIntensities::new(
            array![[10.0, 20.0, 30.0], [5.0, 15.0, 25.0]],
            ids("p", 2),
            ids("s", 3),
        )
        .unwrap();
        assert_eq!(raw.n_probes(), 2);
        assert_eq!(raw.n_samples(), 3);
        assert_eq!(raw.feature_id(1), "p2");
        assert_eq!(raw.intensity(0, 2), 30.0);
    }

    #[test]
    fn test_negative_intensities_rejected() {
        let result =
            RawIntensities::new(array![[10.0, -5.0], [5.0, 15.0]], ids("p", 2), ids("s", 2));
        assert!(matches!(result, Err(LimmaError::MalformedInput { .. })));
    }

    #[test]
    fn test_nan_intensities_rejected() {
        let result = RawIntensities::new(array![[10.0, f64::NAN]], ids("p", 1), ids("s", 2));
        assert!(matches!(result, Err(LimmaError::MalformedInput { .. })));
    }

    #[test]
    fn test_duplicate_samples_rejected() {
        let result = RawIntensities::new(
            array![[1.0, 2.0]],
            ids("p", 1),
            vec!["s1".to_string(), "s1".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_probe_map_drops_unmapped() {
        let raw = RawIntensities::new(
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
            ids("p", 3),
            ids("s", 2),
        )
        .unwrap();
        let map: HashMap<String, String> = [("p1", "f1"), ("p3", "f1")]
            .iter()
            .map(|(p, f)| (p.to_string(), f.to_string()))
            .collect();

        let mapped = raw.with_probe_map(&map).unwrap();
        assert_eq!(mapped.n_probes(), 2);
        assert_eq!(mapped.n_features(), 1);
        assert_eq!(mapped.probe_ids(), &["p1".to_string(), "p3".to_string()]);
        assert_eq!(mapped.intensity(1, 0), 5.0);
        assert_eq!(mapped.intensity(1, 1), 6.0);
    }

    #[test]
    fn test_sample_subset() {
        let raw = RawIntensities::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            ids("p", 2),
            ids("s", 3),
        )
        .unwrap();
        let kept = SampleSubset::new(&raw, &["s2".to_string()]).unwrap();
        assert_eq!(kept.sample_ids(), &["s1".to_string(), "s3".to_string()]);
        assert_eq!(kept.columns(), &[0, 2]);
        assert_eq!(kept.n_probes(), 2);
        assert_eq!(kept.intensity(0, 1), 3.0);
        assert_eq!(kept.intensity(1, 0), 4.0);
        assert_eq!(kept.feature_id(1), "p2");

        assert!(matches!(
            SampleSubset::new(&raw, &["s9".to_string()]),
            Err(LimmaError::MalformedInput { .. })
        ));
        assert!(matches!(
            SampleSubset::new(&raw, &ids("s", 3)),
            Err(LimmaError::EmptyData { .. })
        ));
    }

    #[test]
    fn test_sample_subset_through_trait_object() {
        let raw = RawIntensities::new(array![[7.0, 8.0]], ids("p", 1), ids("s", 2)).unwrap();
        let provider: &dyn RawIntensityProvider = &raw;
        let kept = SampleSubset::new(provider, &["s1".to_string()]).unwrap();
        assert_eq!(kept.n_samples(), 1);
        assert_eq!(kept.intensity(0, 0), 8.0);
    }
}
