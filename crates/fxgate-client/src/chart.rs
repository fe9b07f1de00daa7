//! Terminal line chart for rate series.

use std::fmt::Write;

/// Glyph used for plotted points.
const POINT: char = '*';

/// Shrink `values` to at most `width` points by averaging equal-sized buckets.
pub fn downsample(values: &[f64], width: usize) -> Vec<f64> {
    if width == 0 || values.len() <= width {
        return values.to_vec();
    }
    (0..width)
        .map(|column| {
            let start = column * values.len() / width;
            let end = ((column + 1) * values.len() / width).max(start + 1);
            let bucket = &values[start..end];
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
        .collect()
}

/// Render `values` as a line chart of at most `width` columns and exactly
/// `height` rows, with the maximum labelled on the top row and the minimum
/// on the bottom row.
pub fn render_line_chart(values: &[f64], width: usize, height: usize) -> String {
    if values.is_empty() || width == 0 || height == 0 {
        return "No data".to_string();
    }

    let columns = downsample(values, width);
    let (min, max) = columns
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let range = max - min;

    // Row index of each column, 0 being the bottom row
    let levels: Vec<usize> = columns
        .iter()
        .map(|v| {
            if range > 0.0 {
                (((v - min) / range) * (height - 1) as f64).round() as usize
            } else {
                0
            }
        })
        .collect();

    let top_label = format!("{:.4}", max);
    let bottom_label = format!("{:.4}", min);
    // A single row carries both bounds
    let single_label = format!("{} / {}", top_label, bottom_label);
    let label_width = if height == 1 {
        single_label.len()
    } else {
        top_label.len().max(bottom_label.len())
    };

    let mut out = String::new();
    for row in (0..height).rev() {
        let label = if height == 1 {
            single_label.as_str()
        } else if row == height - 1 {
            top_label.as_str()
        } else if row == 0 {
            bottom_label.as_str()
        } else {
            ""
        };
        let plot: String = levels
            .iter()
            .map(|level| if *level == row { POINT } else { ' ' })
            .collect();
        let _ = writeln!(out, "{:>w$} │{}", label, plot.trim_end(), w = label_width);
    }
    let _ = write!(
        out,
        "{:>w$} └{}",
        "",
        "─".repeat(columns.len()),
        w = label_width
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series() {
        assert_eq!(render_line_chart(&[], 40, 10), "No data");
        assert_eq!(render_line_chart(&[1.0], 0, 10), "No data");
    }

    #[test]
    fn test_downsample_bucket_mean() {
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        assert_eq!(downsample(&values, 4), vec![0.5, 2.5, 4.5, 6.5]);
        assert_eq!(downsample(&values, 20), values);
    }

    #[test]
    fn test_render_small_series() {
        let chart = render_line_chart(&[1.0, 2.0, 3.0], 10, 3);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(
            lines,
            vec![
                "3.0000 │  *",
                "       │ *",
                "1.0000 │*",
                "       └───",
            ]
        );
    }

    #[test]
    fn test_flat_series_sits_on_bottom_row() {
        let chart = render_line_chart(&[5.0, 5.0, 5.0], 10, 4);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "5.0000 │***");
    }

    #[test]
    fn test_single_row_shows_both_bounds() {
        let chart = render_line_chart(&[1.0, 3.0], 10, 1);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "3.0000 / 1.0000 │**");
    }

    #[test]
    fn test_long_series_fits_width() {
        let values: Vec<f64> = (0..1000).map(|i| (i as f64 / 50.0).sin()).collect();
        let chart = render_line_chart(&values, 60, 12);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines.len(), 13);
        let axis = lines[12];
        assert_eq!(axis.chars().filter(|c| *c == '─').count(), 60);
        for line in &lines[..12] {
            let plot = line.split('│').nth(1).unwrap();
            assert!(plot.chars().count() <= 60);
        }
    }
}
