//! Debug rendering of a spectrogram and its constellation to an SVG file.
//! Purely a host-side inspection aid; nothing in the pipeline depends on it.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::config::DB_FLOOR;
use crate::peaks::Peak;
use crate::spectrogram::Spectrogram;

const WIDTH: f64 = 1920.0;
const HEIGHT: f64 = 1080.0;
const TIME_CELLS: usize = 400;
const FREQ_CELLS: usize = 200;

pub fn write_spectrogram_svg<P: AsRef<Path>>(
    spec: &Spectrogram,
    peaks: &[Peak],
    output_path: P,
    title: &str,
) -> std::io::Result<()> {
    if spec.cols() == 0 {
        let svg = format!(
            "<svg xmlns='http://www.w3.org/2000/svg' width='{WIDTH}' height='{HEIGHT}'>\n\
             <rect width='100%' height='100%' fill='black'/>\n\
             <text x='{cx}' y='{cy}' fill='white' font-family='monospace' font-size='20' \
             text-anchor='middle'>No frames to visualize</text>\n</svg>",
            cx = WIDTH / 2.0,
            cy = HEIGHT / 2.0
        );
        return File::create(output_path)?.write_all(svg.as_bytes());
    }

    let (rows, cols) = (spec.rows(), spec.cols());

    // Downsample onto a coarse grid, keeping the loudest cell per bucket.
    let mut grid = vec![vec![DB_FLOOR; TIME_CELLS]; FREQ_CELLS];
    for f in 0..rows {
        let fc = f * FREQ_CELLS / rows;
        for t in 0..cols {
            let tc = t * TIME_CELLS / cols;
            grid[fc][tc] = grid[fc][tc].max(spec.data[[f, t]]);
        }
    }

    let max_db = spec.data.iter().fold(DB_FLOOR, |a, &b| a.max(b));
    let min_db = spec.data.iter().fold(max_db, |a, &b| a.min(b));
    let span = (max_db - min_db).max(1.0);

    let padding_left = 130.0;
    let padding_top = 60.0;
    let plot_w = WIDTH - padding_left - 50.0;
    let plot_h = HEIGHT - padding_top - 60.0;
    let cell_w = plot_w / TIME_CELLS as f64;
    let cell_h = plot_h / FREQ_CELLS as f64;

    let mut cells = String::new();
    for (fc, row) in grid.iter().enumerate() {
        for (tc, &db) in row.iter().enumerate() {
            let norm = (db - min_db) / span;
            if norm <= 0.0 {
                continue;
            }
            let x = padding_left + tc as f64 * cell_w;
            let y = padding_top + (FREQ_CELLS - 1 - fc) as f64 * cell_h;
            cells.push_str(&format!(
                "<rect x='{x:.2}' y='{y:.2}' width='{cell_w:.2}' height='{cell_h:.2}' fill='{}'/>\n",
                heat_color(norm)
            ));
        }
    }

    // Constellation overlay.
    let mut markers = String::new();
    for peak in peaks {
        let x = padding_left + (peak.time_idx as f64 + 0.5) / cols as f64 * plot_w;
        let y = padding_top + (1.0 - (peak.freq_idx as f64 + 0.5) / rows as f64) * plot_h;
        markers.push_str(&format!(
            "<circle cx='{x:.2}' cy='{y:.2}' r='3' fill='none' stroke='red' stroke-width='1.5'/>\n"
        ));
    }

    let max_freq = spec.freqs.last().copied().unwrap_or(0.0);
    let max_time = spec.times.last().copied().unwrap_or(0.0);
    let labels = format!(
        "<g fill='white' font-family='monospace' font-size='12'>\n\
         <text x='{padding_left}' y='{ty}' text-anchor='start'>freq: 0 Hz → {max_freq:.0} Hz</text>\n\
         <text x='{padding_left}' y='{by}' text-anchor='start'>time: 0 → {max_time:.2}s</text>\n\
         <text x='{tx}' y='{ty}' text-anchor='end'>{name} ({count} peaks)</text>\n</g>",
        ty = padding_top - 15.0,
        by = padding_top + plot_h + 25.0,
        tx = padding_left + plot_w,
        name = svg_escape(title),
        count = peaks.len(),
    );

    let svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{WIDTH}' height='{HEIGHT}' \
         viewBox='0 0 {WIDTH} {HEIGHT}'>\n\
         <rect width='100%' height='100%' fill='black'/>\n\
         <g>\n{cells}</g>\n<g>\n{markers}</g>\n{labels}\n</svg>"
    );

    File::create(output_path)?.write_all(svg.as_bytes())
}

// Black → blue → cyan → yellow → red gradient.
fn heat_color(norm: f64) -> String {
    const STOPS: [(f64, f64, f64); 5] = [
        (0.0, 0.0, 0.0),
        (0.0, 0.0, 255.0),
        (0.0, 255.0, 255.0),
        (255.0, 255.0, 0.0),
        (255.0, 0.0, 0.0),
    ];

    let clamped = norm.clamp(0.0, 1.0) * (STOPS.len() - 1) as f64;
    let lo = clamped.floor() as usize;
    let hi = clamped.ceil() as usize;
    let frac = clamped - lo as f64;

    let r = STOPS[lo].0 + (STOPS[hi].0 - STOPS[lo].0) * frac;
    let g = STOPS[lo].1 + (STOPS[hi].1 - STOPS[lo].1) * frac;
    let b = STOPS[lo].2 + (STOPS[hi].2 - STOPS[lo].2) * frac;
    format!("#{:02x}{:02x}{:02x}", r as u8, g as u8, b as u8)
}

fn svg_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
    out
}
