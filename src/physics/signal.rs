//! Numerical building blocks for telemetry processing.
//!
//! Semantics follow the usual scientific-Python conventions so that traces
//! processed here line up with reference tooling: `gradient` uses second-order
//! central differences, `interp` clamps outside the sample range and
//! `percentile` interpolates linearly between order statistics.

/// Default Savitzky–Golay window for 10 Hz car telemetry.
pub const SAVGOL_WINDOW: usize = 9;
pub const SAVGOL_POLYORDER: usize = 2;

/// Least-squares polynomial fit. Coefficients are returned lowest order first.
///
/// Returns `None` when the system is singular (e.g. fewer distinct x values than
/// `degree + 1`).
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = x.len().min(y.len());
    let terms = degree + 1;
    if n < terms {
        return None;
    }

    // Normal equations: (AᵀA) c = Aᵀy
    let mut ata = vec![vec![0.0; terms]; terms];
    let mut aty = vec![0.0; terms];
    for k in 0..n {
        let mut powers = vec![1.0; 2 * terms - 1];
        for p in 1..powers.len() {
            powers[p] = powers[p - 1] * x[k];
        }
        for i in 0..terms {
            aty[i] += powers[i] * y[k];
            for j in 0..terms {
                ata[i][j] += powers[i + j];
            }
        }
    }

    solve_linear(ata, aty)
}

pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Savitzky–Golay smoothing with polynomial-fit edges.
///
/// `window` must be odd and greater than `polyorder`; otherwise the input is
/// returned unchanged.
pub fn savgol_filter(y: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let n = y.len();
    if window % 2 == 0 || window <= polyorder || window > n {
        return y.to_vec();
    }

    let half = window / 2;
    let offsets: Vec<f64> = (0..window).map(|i| i as f64 - half as f64).collect();

    // The smoothed centre value is linear in the window; recover its weights by
    // fitting unit impulses.
    let mut weights = Vec::with_capacity(window);
    for i in 0..window {
        let mut impulse = vec![0.0; window];
        impulse[i] = 1.0;
        match polyfit(&offsets, &impulse, polyorder) {
            Some(c) => weights.push(c[0]),
            None => return y.to_vec(),
        }
    }

    let mut out = vec![0.0; n];
    for k in half..n - half {
        out[k] = weights
            .iter()
            .zip(&y[k - half..=k + half])
            .map(|(w, v)| w * v)
            .sum();
    }

    let positions: Vec<f64> = (0..window).map(|i| i as f64).collect();
    if let Some(head) = polyfit(&positions, &y[..window], polyorder) {
        for (k, slot) in out.iter_mut().enumerate().take(half) {
            *slot = polyval(&head, k as f64);
        }
    }
    if let Some(tail) = polyfit(&positions, &y[n - window..], polyorder) {
        for k in n - half..n {
            out[k] = polyval(&tail, (k - (n - window)) as f64);
        }
    }

    out
}

/// Applies the default filter, shrinking the window on short traces.
pub fn smooth_speed(speed: &[f64]) -> Vec<f64> {
    let mut window = SAVGOL_WINDOW.min(speed.len());
    if window % 2 == 0 {
        window = window.saturating_sub(1);
    }
    if window <= 3 || window <= SAVGOL_POLYORDER {
        return speed.to_vec();
    }
    savgol_filter(speed, window, SAVGOL_POLYORDER)
}

/// Numerical derivative of `y`. With `x = None` unit spacing is assumed.
pub fn gradient(y: &[f64], x: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let at = |i: usize| x.map(|xs| xs[i]).unwrap_or(i as f64);

    let mut out = vec![0.0; n];
    out[0] = (y[1] - y[0]) / (at(1) - at(0));
    out[n - 1] = (y[n - 1] - y[n - 2]) / (at(n - 1) - at(n - 2));
    for i in 1..n - 1 {
        let hs = at(i) - at(i - 1);
        let hd = at(i + 1) - at(i);
        out[i] = (hs * hs * y[i + 1] + (hd * hd - hs * hs) * y[i] - hd * hd * y[i - 1])
            / (hs * hd * (hd + hs));
    }
    out
}

/// Centred rolling mean; positions without a full window become 0.
pub fn centered_rolling_mean(y: &[f64], window: usize) -> Vec<f64> {
    let n = y.len();
    if window == 0 || window > n {
        return vec![0.0; n];
    }
    let before = window / 2;
    let after = window - 1 - before;

    (0..n)
        .map(|i| {
            if i < before || i + after >= n {
                return 0.0;
            }
            let slice = &y[i - before..=i + after];
            if slice.iter().any(|v| !v.is_finite()) {
                0.0
            } else {
                slice.iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`. `xp` must be ascending.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    let hi = xp[..n].partition_point(|v| *v <= x);
    let lo = hi - 1;
    let span = xp[hi] - xp[lo];
    if span == 0.0 {
        return fp[hi];
    }
    fp[lo] + (fp[hi] - fp[lo]) * (x - xp[lo]) / span
}

pub fn interp_many(xs: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    xs.iter().map(|x| interp(*x, xp, fp)).collect()
}

pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

pub fn diff(y: &[f64]) -> Vec<f64> {
    y.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Linear-interpolation percentile, `q` in `[0, 100]`.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

pub fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}
