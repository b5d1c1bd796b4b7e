//! Presentation of an ensemble score: the clamped percentage, its two-decimal text
//! form, and the two-slice proportion chart.

use itertools::Itertools;
use std::f64::consts::PI;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::io;
use std::path::Path;

/// Lowest percentage ever shown.
pub const MIN_DISPLAY_PERCENT: f64 = 0.01;

/// Highest percentage ever shown.
pub const MAX_DISPLAY_PERCENT: f64 = 99.99;

pub const DISCLAIMER: &str = "This result cannot be used for clinical diagnosis. \
Please consider performing CGP tests at a physician's discretion.";

/// Keeps a percentage away from absolute certainty in either direction. An undefined
/// percentage is shown as the lower limit.
pub fn clamp_display_percent(percent: f64) -> f64 {
    if percent.is_nan() || percent < MIN_DISPLAY_PERCENT {
        MIN_DISPLAY_PERCENT
    } else if percent > MAX_DISPLAY_PERCENT {
        MAX_DISPLAY_PERCENT
    } else {
        percent
    }
}

/// The outcome of one scoring request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Ensemble mean probability in [0, 1].
    pub probability: f64,
    /// Each member's probability, in member order.
    pub member_probabilities: Vec<f64>,
}

impl Prediction {
    pub fn new(probability: f64, member_probabilities: Vec<f64>) -> Self {
        Self {
            probability,
            member_probabilities,
        }
    }

    /// The unclamped percentage.
    pub fn raw_percent(&self) -> f64 {
        self.probability * 100.0
    }

    /// The percentage as shown to the user, always within [0.01, 99.99].
    pub fn display_percent(&self) -> f64 {
        clamp_display_percent(self.raw_percent())
    }

    /// Two-decimal text form, e.g. `30.00%`.
    pub fn formatted(&self) -> String {
        format!("{:.2}%", self.display_percent())
    }

    /// One line per member, e.g. `member 0: 12.34%`.
    pub fn member_breakdown(&self) -> String {
        self.member_probabilities
            .iter()
            .enumerate()
            .map(|(index, p)| format!("member {index}: {:.2}%", p * 100.0))
            .join("\n")
    }

    pub fn chart(&self) -> ProportionChart {
        ProportionChart::from_percent(self.display_percent())
    }
}

/// One wedge of the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub percent: f64,
    pub color: &'static str,
    /// Outward offset as a fraction of the radius.
    pub explode: f64,
}

/// Score versus remainder, drawn clockwise from twelve o'clock with the score
/// wedge pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct ProportionChart {
    pub slices: [Slice; 2],
}

const SCORE_COLOR: &str = "limegreen";
const REMAINDER_COLOR: &str = "lightgrey";
const SCORE_EXPLODE: f64 = 0.1;
const START_ANGLE_DEGREES: f64 = 90.0;

impl ProportionChart {
    /// The score is clamped to the display range first, so neither wedge ever
    /// spans the full circle.
    pub fn from_percent(percent: f64) -> Self {
        let percent = clamp_display_percent(percent);
        Self {
            slices: [
                Slice {
                    percent,
                    color: SCORE_COLOR,
                    explode: SCORE_EXPLODE,
                },
                Slice {
                    percent: 100.0 - percent,
                    color: REMAINDER_COLOR,
                    explode: 0.0,
                },
            ],
        }
    }

    /// Renders the chart as a standalone square SVG document.
    pub fn to_svg(&self, size_px: u32) -> String {
        let size = f64::from(size_px);
        let center = size / 2.0;
        // Leave room for the exploded wedge.
        let radius = size / 2.0 / (1.0 + SCORE_EXPLODE) * 0.95;

        let mut svg = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size_px}" height="{size_px}" viewBox="0 0 {size_px} {size_px}">"#
        );

        let mut start = START_ANGLE_DEGREES;
        for slice in &self.slices {
            let sweep = slice.percent / 100.0 * 360.0;
            let end = start - sweep;
            let middle = (start + end) / 2.0;
            let (dx, dy) = polar(slice.explode * radius, middle);
            let (cx, cy) = (center + dx, center + dy);
            let (x0, y0) = polar(radius, start);
            let (x1, y1) = polar(radius, end);
            let large_arc = u8::from(sweep > 180.0);
            let _ = writeln!(
                svg,
                r#"  <path d="M {cx:.3} {cy:.3} L {:.3} {:.3} A {radius:.3} {radius:.3} 0 {large_arc} 1 {:.3} {:.3} Z" fill="{}"/>"#,
                cx + x0,
                cy + y0,
                cx + x1,
                cy + y1,
                slice.color
            );
            start = end;
        }

        svg.push_str("</svg>\n");
        svg
    }

    pub fn write_svg(&self, path: &Path, size_px: u32) -> io::Result<()> {
        fs::write(path, self.to_svg(size_px))
    }
}

/// Offset of a point at `degrees` (counter-clockwise from three o'clock) in SVG
/// screen coordinates, where y grows downwards.
fn polar(radius: f64, degrees: f64) -> (f64, f64) {
    let radians = degrees * PI / 180.0;
    (radius * radians.cos(), -radius * radians.sin())
}
