use super::cdf;
use super::piecewise::PiecewiseLinearCdf;
use crate::error::{BleachError, BleachResult};

/// Remapping table that gives `source` the distribution of `reference`.
///
/// Level `a` maps to the smallest level `j` whose reference CDF reaches the
/// source CDF at `a`, and to the last level if none is found before it.
pub fn match_histograms(source: &[u64], reference: &[u64]) -> BleachResult<Vec<usize>> {
    if source.len() != reference.len() {
        return Err(BleachError::HistogramSizeMismatch {
            expected: reference.len(),
            actual: source.len(),
        });
    }
    let levels = source.len();
    let source_cdf = cdf(source)?;
    let reference_cdf = cdf(reference)?;
    let searchable = &reference_cdf[..levels - 1];

    Ok(source_cdf
        .iter()
        .map(|&p| searchable.partition_point(|&r| r < p))
        .collect())
}

/// Remapping table that gives `source` the distribution described by `reference`.
pub fn match_to_piecewise(
    source: &[u64],
    reference: &PiecewiseLinearCdf,
) -> BleachResult<Vec<usize>> {
    if source.len() != reference.levels() {
        return Err(BleachError::HistogramSizeMismatch {
            expected: reference.levels(),
            actual: source.len(),
        });
    }
    let source_cdf = cdf(source)?;
    Ok(source_cdf.iter().map(|&p| reference.invert(p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::gaussian_histogram;

    /// Straight transcription of the downward scan the partition-point search replaces.
    fn scan_table(source: &[u64], reference: &[u64]) -> Vec<usize> {
        let pa = cdf(source).unwrap();
        let pr = cdf(reference).unwrap();
        pa.iter()
            .map(|&p| {
                let mut j = pr.len() - 1;
                while j > 0 && p <= pr[j - 1] {
                    j -= 1;
                }
                j
            })
            .collect()
    }

    #[test]
    fn test_self_match_is_identity_on_occupied_levels() {
        let h = gaussian_histogram(100.0, 20.0);
        let table = match_histograms(&h, &h).unwrap();
        for (level, &count) in h.iter().enumerate() {
            if count > 0 {
                assert_eq!(table[level], level);
            }
        }
    }

    #[test]
    fn test_point_masses_map_onto_each_other() {
        let mut source = vec![0u64; 256];
        let mut reference = vec![0u64; 256];
        source[10] = 500;
        reference[200] = 80;
        let table = match_histograms(&source, &reference).unwrap();
        assert_eq!(table[10], 200);
        assert_eq!(table[0], 0);
        assert_eq!(table[255], 200);
    }

    #[test]
    fn test_partition_point_agrees_with_scan() {
        let pairs = [
            (gaussian_histogram(80.0, 15.0), gaussian_histogram(160.0, 40.0)),
            (gaussian_histogram(200.0, 5.0), gaussian_histogram(30.0, 60.0)),
            (vec![1u64; 256], gaussian_histogram(128.0, 10.0)),
        ];
        for (source, reference) in pairs {
            assert_eq!(
                match_histograms(&source, &reference).unwrap(),
                scan_table(&source, &reference)
            );
        }
    }

    #[test]
    fn test_flat_histogram_against_uniform_model_is_near_identity() {
        let source = vec![100u64; 256];
        let reference = PiecewiseLinearCdf::new(256, &[(0, 0.0), (127, 0.5), (255, 1.0)]).unwrap();
        let table = match_to_piecewise(&source, &reference).unwrap();
        assert_eq!(table.len(), 256);
        for (level, &mapped) in table.iter().enumerate() {
            assert!((mapped as i64 - level as i64).abs() <= 2);
        }
    }

    #[test]
    fn test_size_mismatch_and_empty_histograms() {
        assert!(matches!(
            match_histograms(&[1, 2, 3], &[1, 2]),
            Err(BleachError::HistogramSizeMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            match_histograms(&[0, 0], &[1, 2]),
            Err(BleachError::NumericalDegeneracy(_))
        ));
        let reference = PiecewiseLinearCdf::new(256, &[]).unwrap();
        assert!(matches!(
            match_to_piecewise(&[1, 2, 3], &reference),
            Err(BleachError::HistogramSizeMismatch { .. })
        ));
    }
}
