//! Text-rendered plots for terminal and Markdown output.

use hlb_math::Interval;

use crate::evaluate::{CoefficientSummary, TermDiagnostics};

const BARS: &[char] = &['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Sparkline of `values` scaled to their own range.
pub fn sparkline(values: &[f64]) -> String {
    let (lo, hi) = finite_range(values.iter().copied());
    sparkline_in(values, lo, hi)
}

/// Sparkline of `values` scaled to `[lo, hi]`.
///
/// Several series drawn with the same bounds are directly comparable.
pub fn sparkline_in(values: &[f64], lo: f64, hi: f64) -> String {
    let range = hi - lo;
    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                return ' ';
            }
            let idx = if range > 0.0 {
                ((v - lo) / range * 7.0).round() as isize
            } else {
                0
            };
            BARS[idx.clamp(0, 7) as usize]
        })
        .collect()
}

/// Horizontal bar of `value` out of `max`.
pub fn bar(value: f64, max: f64, width: usize) -> String {
    let filled = if max > 0.0 && value > 0.0 {
        (((value / max) * width as f64).round() as usize).min(width)
    } else {
        0
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Number line from `lo` to `hi` with `interval` bracketed, `mark` as `●`
/// and `zero` as `┆` when it falls inside the axis.
pub fn interval_line(
    interval: &Interval,
    mark: f64,
    zero: Option<f64>,
    lo: f64,
    hi: f64,
    width: usize,
) -> String {
    let width = width.max(3);
    let pos = |x: f64| -> Option<usize> {
        if !x.is_finite() || hi <= lo {
            return None;
        }
        let p = ((x - lo) / (hi - lo) * (width - 1) as f64).round();
        (0.0..=(width - 1) as f64).contains(&p).then_some(p as usize)
    };

    let mut cells = vec![' '; width];
    if let (Some(a), Some(b)) = (pos(interval.lower), pos(interval.upper)) {
        for c in &mut cells[a..=b] {
            *c = '─';
        }
        cells[a] = '[';
        cells[b] = ']';
    }
    if let Some(z) = zero.and_then(pos) {
        if cells[z] == ' ' {
            cells[z] = '┆';
        }
    }
    if let Some(m) = pos(mark) {
        cells[m] = '●';
    }
    cells.into_iter().collect()
}

/// One line per chain: the thinned trace on a shared vertical scale.
pub fn trace_plot(term: &TermDiagnostics) -> Vec<String> {
    let (lo, hi) = finite_range(term.trace.iter().flatten().copied());
    term.trace
        .iter()
        .enumerate()
        .map(|(c, series)| format!("chain {:<2} {}", c + 1, sparkline_in(series, lo, hi)))
        .collect()
}

/// One line per chain: kernel density over the shared grid.
pub fn density_plot(term: &TermDiagnostics) -> Vec<String> {
    let (_, top) = finite_range(term.density.iter().flatten().copied());
    let mut lines: Vec<String> = term
        .density
        .iter()
        .enumerate()
        .map(|(c, d)| format!("chain {:<2} {}", c + 1, sparkline_in(d, 0.0, top)))
        .collect();
    if let (Some(first), Some(last)) = (term.density_grid.first(), term.density_grid.last()) {
        lines.push(format!("         {:+.3} .. {:+.3}", first, last));
    }
    lines
}

/// Autocorrelation by lag, averaged over chains. Lag 0 is omitted.
pub fn acf_plot(term: &TermDiagnostics, width: usize) -> Vec<String> {
    let lags = term.acf.iter().map(Vec::len).min().unwrap_or(0);
    let chains = term.acf.len().max(1) as f64;
    (1..lags)
        .map(|lag| {
            let rho = term.acf.iter().map(|a| a[lag]).sum::<f64>() / chains;
            let sign = if rho < 0.0 { '-' } else { ' ' };
            format!("lag {:>3} {}{} {:+.3}", lag, sign, bar(rho.abs(), 1.0, width), rho)
        })
        .collect()
}

/// Forest plot of coefficient intervals against zero.
pub fn forest_plot(coefficients: &[CoefficientSummary], width: usize) -> Vec<String> {
    if coefficients.is_empty() {
        return Vec::new();
    }
    let (mut lo, mut hi) = finite_range(
        coefficients
            .iter()
            .flat_map(|c| [c.interval.lower, c.interval.upper]),
    );
    lo = lo.min(0.0);
    hi = hi.max(0.0);
    let label_width = coefficients.iter().map(|c| c.term.len()).max().unwrap_or(0);
    coefficients
        .iter()
        .map(|c| {
            format!(
                "{:<label_width$} {}{}",
                c.term,
                interval_line(&c.interval, c.median, Some(0.0), lo, hi, width),
                if c.significant { " *" } else { "" },
            )
        })
        .collect()
}

fn finite_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo, hi)
    }
}
