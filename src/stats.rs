//! Descriptive statistics over score columns.
//!
//! Everything here works on plain `&[f64]` slices with missing values
//! already removed. Empty input yields `None` rather than `NaN`.

use std::cmp::Ordering;
use std::f64::consts::PI;

pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    Some(v.iter().sum::<f64>() / v.len() as f64)
}

fn sorted(v: &[f64]) -> Vec<f64> {
    let mut s = v.to_vec();
    s.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    s
}

/// Quantile of already-sorted data, linear interpolation between the two
/// closest ranks (`pos = q * (n - 1)`).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn quantile(v: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(v), q)
}

pub fn median(v: &[f64]) -> Option<f64> {
    quantile(v, 0.5)
}

/// Sample standard deviation (n - 1 denominator). Undefined below two values.
pub fn sample_std(v: &[f64]) -> Option<f64> {
    if v.len() < 2 {
        return None;
    }
    let m = mean(v)?;
    let ss: f64 = v.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (v.len() - 1) as f64).sqrt())
}

/// The aggregate bundle printed for every pivot group and `describe` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: Option<f64>,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl Summary {
    pub fn from_values(v: &[f64]) -> Option<Summary> {
        if v.is_empty() {
            return None;
        }
        let s = sorted(v);
        let sum: f64 = s.iter().sum();
        let q = |p| quantile_sorted(&s, p).unwrap_or(f64::NAN);
        Some(Summary {
            count: s.len(),
            sum,
            mean: sum / s.len() as f64,
            median: q(0.5),
            min: s[0],
            max: s[s.len() - 1],
            std: sample_std(&s),
            q1: q(0.25),
            q2: q(0.5),
            q3: q(0.75),
        })
    }
}

/// Pearson correlation of paired samples. `None` when fewer than two pairs
/// or either side has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn normal_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Coordinates of a normal probability plot.
#[derive(Debug, Clone)]
pub struct ProbPlot {
    /// Theoretical normal quantiles, ascending.
    pub theoretical: Vec<f64>,
    /// Sample values, ascending.
    pub ordered: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
}

/// Order-statistic medians (Filliben) against the standard normal, with a
/// least-squares line through the points.
pub fn probplot(v: &[f64]) -> Option<ProbPlot> {
    let n = v.len();
    if n < 2 {
        return None;
    }
    let ordered = sorted(v);
    let last = 0.5f64.powf(1.0 / n as f64);
    let theoretical: Vec<f64> = (1..=n)
        .map(|i| {
            let m = if i == 1 {
                1.0 - last
            } else if i == n {
                last
            } else {
                (i as f64 - 0.3175) / (n as f64 + 0.365)
            };
            normal_ppf(m)
        })
        .collect();

    let mx = mean(&theoretical)?;
    let my = mean(&ordered)?;
    let sxx: f64 = theoretical.iter().map(|x| (x - mx).powi(2)).sum();
    let sxy: f64 = theoretical
        .iter()
        .zip(&ordered)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum();
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r = pearson(&theoretical, &ordered).unwrap_or(0.0);
    Some(ProbPlot {
        theoretical,
        ordered,
        slope,
        intercept,
        r,
    })
}

/// Gaussian kernel density estimate with Scott's bandwidth rule.
#[derive(Debug, Clone)]
pub struct Kde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl Kde {
    pub fn new(v: &[f64]) -> Option<Kde> {
        let std = sample_std(v)?;
        if std == 0.0 {
            return None;
        }
        let factor = (v.len() as f64).powf(-0.2);
        Some(Kde {
            samples: v.to_vec(),
            bandwidth: std * factor,
        })
    }

    pub fn density(&self, x: f64) -> f64 {
        let h = self.bandwidth;
        let norm = 1.0 / (self.samples.len() as f64 * h * (2.0 * PI).sqrt());
        let s: f64 = self
            .samples
            .iter()
            .map(|xi| (-0.5 * ((x - xi) / h).powi(2)).exp())
            .sum();
        norm * s
    }

    /// Evaluate on `points` evenly spaced values over `[lo, hi]`.
    pub fn curve(&self, lo: f64, hi: f64, points: usize) -> Vec<(f64, f64)> {
        let points = points.max(2);
        let step = (hi - lo) / (points - 1) as f64;
        (0..points)
            .map(|i| {
                let x = lo + step * i as f64;
                (x, self.density(x))
            })
            .collect()
    }
}

/// Equal-width histogram; the last bin is closed on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn with_range(v: &[f64], bins: usize, lo: f64, hi: f64) -> Histogram {
        let bins = bins.max(1);
        let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; bins];
        for &x in v {
            if x < lo || x > hi {
                continue;
            }
            let idx = (((x - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Histogram { edges, counts }
    }

    pub fn bin_width(&self) -> f64 {
        self.edges[1] - self.edges[0]
    }
}

pub fn min_max(v: &[f64]) -> Option<(f64, f64)> {
    let mut it = v.iter().copied();
    let first = it.next()?;
    Some(it.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn summary_matches_hand_computed_values() {
        let s = Summary::from_values(&[6.0, 4.0, 5.0]).unwrap();
        assert_eq!(s.count, 3);
        assert!(close(s.sum, 15.0));
        assert!(close(s.mean, 5.0));
        assert!(close(s.median, 5.0));
        assert!(close(s.q1, 4.5));
        assert!(close(s.q3, 5.5));
        assert!(close(s.std.unwrap(), 1.0));
        assert_eq!((s.min, s.max), (4.0, 6.0));
    }

    #[test]
    fn quantiles_interpolate_linearly() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(close(quantile(&v, 0.25).unwrap(), 1.75));
        assert!(close(quantile(&v, 0.5).unwrap(), 2.5));
        assert!(close(quantile(&v, 0.75).unwrap(), 3.25));
        assert!(close(quantile(&v, 1.0).unwrap(), 4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn std_needs_two_values() {
        assert_eq!(sample_std(&[3.0]), None);
        let s = Summary::from_values(&[3.0]).unwrap();
        assert_eq!(s.std, None);
        assert!(close(s.q1, 3.0));
    }

    #[test]
    fn pearson_detects_perfect_and_flat_relations() {
        let x = [1.0, 2.0, 3.0];
        assert!(close(pearson(&x, &[2.0, 4.0, 6.0]).unwrap(), 1.0));
        assert!(close(pearson(&x, &[3.0, 2.0, 1.0]).unwrap(), -1.0));
        assert_eq!(pearson(&[1.0, 2.0], &[5.0, 5.0]), None);
    }

    #[test]
    fn normal_ppf_known_points() {
        assert!(normal_ppf(0.5).abs() < 1e-9);
        assert!((normal_ppf(0.975) - 1.959963985).abs() < 1e-6);
        assert!((normal_ppf(0.01) + 2.326347874).abs() < 1e-6);
    }

    #[test]
    fn probplot_of_symmetric_data() {
        let p = probplot(&[3.0, 1.0, 2.0]).unwrap();
        assert_eq!(p.ordered, vec![1.0, 2.0, 3.0]);
        assert!(p.theoretical[1].abs() < 1e-9);
        assert!(close(p.theoretical[0], -p.theoretical[2]));
        assert!(close(p.intercept, 2.0));
        assert!(p.r > 0.99);
    }

    #[test]
    fn kde_integrates_to_about_one() {
        let kde = Kde::new(&[1.0, 2.0, 2.5, 3.0, 4.0]).unwrap();
        let curve = kde.curve(-5.0, 10.0, 1501);
        let dx = 15.0 / 1500.0;
        let area: f64 = curve.iter().map(|(_, y)| y * dx).sum();
        assert!((area - 1.0).abs() < 1e-3);
        assert!(Kde::new(&[2.0, 2.0]).is_none());
    }

    #[test]
    fn histogram_puts_max_in_last_bin() {
        let h = Histogram::with_range(&[0.0, 1.0, 2.0, 3.0, 4.0], 4, 0.0, 4.0);
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
        assert!(close(h.bin_width(), 1.0));
        let flat = Histogram::with_range(&[5.0, 5.0], 2, 5.0, 5.0);
        assert_eq!(flat.counts.iter().sum::<usize>(), 2);
    }
}
