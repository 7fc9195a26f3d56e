#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use crate::metrics::{PositionBucket, Series};
use chrono::NaiveDate;
use plotters::prelude::*;
use std::io::Cursor;

/// Configuration options for chart generation
///
/// This structure contains the customizable properties shared by every
/// dashboard chart.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    /// Creates a default configuration for a position trend chart
    ///
    /// # Returns
    /// * `GraphOptions` - 1000x500 pixels, dates on X and positions on Y
    fn default() -> Self {
        Self {
            title: "Ranking evolution".to_string(),
            x_label: "Date".to_string(),
            y_label: "Position (1 is top)".to_string(),
            width: 1000,
            height: 500,
        }
    }
}

/// Creates a line chart of positions over time
///
/// One line is drawn per series. The position axis is reversed so that
/// position 1 sits at the top of the chart.
///
/// # Arguments
/// * `series` - Named (date, position) lines
/// * `options` - Chart styling options
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
///
/// # Errors
/// * Returns an error if no series contains a point
pub fn create_line_chart(
    series: &[Series],
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let (first, last) = date_span(series).ok_or("No data points to draw")?;
    let (best, worst) = position_span(series);

    let mut buffer = vec![0u8; options.width as usize * options.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        // Positions are plotted negated so that better ranks are drawn higher
        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(first..last, -worst..-best)?;

        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .x_label_formatter(&|date: &NaiveDate| date.format("%Y-%m-%d").to_string())
            .y_label_formatter(&|y: &f64| format!("{:.0}", -y))
            .draw()?;

        for (idx, line) in series.iter().enumerate() {
            let color = Palette99::pick(idx).mix(0.9);
            chart
                .draw_series(LineSeries::new(
                    line.points.iter().map(|&(date, position)| (date, -position)),
                    color.stroke_width(2),
                ))?
                .label(line.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
    }

    encode_png(buffer, options.width, options.height)
}

/// Creates a bar chart of keyword counts per position bucket
///
/// Bars use the bucket colours and are ordered best bucket first.
///
/// # Arguments
/// * `distribution` - Keyword count per bucket on the latest date
/// * `options` - Chart styling options
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
pub fn create_distribution_chart(
    distribution: &[(PositionBucket, usize)],
    options: &GraphOptions,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let max_count = distribution.iter().map(|(_, count)| *count).max().unwrap_or(0);
    let x_range = -0.5..distribution.len() as f64 - 0.5;
    let y_range = 0.0..max_count as f64 + 1.0;

    let mut buffer = vec![0u8; options.width as usize * options.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_range, y_range)?;

        let bucket_label = |x: &f64| {
            let idx = x.round();
            if (x - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            distribution
                .get(idx as usize)
                .map(|(bucket, _)| bucket.label().to_string())
                .unwrap_or_default()
        };

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(distribution.len())
            .x_label_formatter(&bucket_label)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(distribution.iter().enumerate().map(|(idx, (bucket, count))| {
            let (r, g, b) = bucket.color();
            let x = idx as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *count as f64)], RGBColor(r, g, b).filled())
        }))?;

        root.present()?;
    }

    encode_png(buffer, options.width, options.height)
}

// Encode the RGB drawing buffer as PNG in memory
fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let image = image::RgbImage::from_raw(width, height, buffer).ok_or("Chart buffer has the wrong size")?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)?;
    Ok(png)
}

/// First and last dates over all series; a single day is widened by one day
pub(crate) fn date_span(series: &[Series]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = series.iter().flat_map(|line| line.points.iter().map(|(date, _)| *date));
    let first = dates.clone().min()?;
    let last = dates.max()?;
    if first == last {
        return Some((first, first.succ_opt().unwrap_or(first)));
    }
    Some((first, last))
}

/// Best and worst positions with a margin of one on each side
pub(crate) fn position_span(series: &[Series]) -> (f64, f64) {
    let positions = series.iter().flat_map(|line| line.points.iter().map(|(_, p)| *p));
    let best = positions.clone().fold(f64::INFINITY, f64::min);
    let worst = positions.fold(f64::NEG_INFINITY, f64::max);
    if !best.is_finite() || !worst.is_finite() {
        return (0.0, 10.0);
    }
    ((best - 1.0).max(0.0), worst + 1.0)
}
