use indexmap::{IndexMap, indexmap};
use log::info;
use plotters::prelude::*;
use std::path::Path;

use crate::system::results::{NodeView, ResultKey};
use crate::system::time_index::TimeIndex;
use crate::system::topology::{DEMAND, ELECTRICITY_BUS, EXCESS, GENSET, PV, STORAGE};

pub const DEFAULT_PLOT_FILE: &str = "electricity_flows.png";
const TITLE: &str = "Flows into and out of bel";
const Y_LABEL: &str = "Energy [MWh]";

fn edge(from: &str, to: &str) -> ResultKey {
    (from.to_string(), Some(to.to_string()))
}

/// Line colours of the electricity bus flows, as hex strings
pub fn flow_colors() -> IndexMap<ResultKey, String> {
    indexmap! {
        edge(ELECTRICITY_BUS, DEMAND) => "#ce4aff".to_string(),
        edge(ELECTRICITY_BUS, EXCESS) => "#5b5bae".to_string(),
        edge(GENSET, ELECTRICITY_BUS) => "#636f6b".to_string(),
        edge(PV, ELECTRICITY_BUS) => "#ffde32".to_string(),
        edge(STORAGE, ELECTRICITY_BUS) => "#42c77a".to_string(),
        edge(ELECTRICITY_BUS, STORAGE) => "#42c77a".to_string(),
    }
}

/// Parses `#rrggbb`
pub fn hex_color(hex: &str) -> Option<RGBColor> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

/// Step-post line through the first `end` values: each value holds until the next step
pub fn step_post_points(values: &[f64], end: usize) -> Vec<(f64, f64)> {
    values
        .iter()
        .take(end)
        .enumerate()
        .flat_map(|(t, &value)| [(t as f64, value), ((t + 1) as f64, value)])
        .collect()
}

pub fn flow_label((from, to): &ResultKey) -> String {
    match to {
        Some(to) => format!("({}, {})", from, to),
        None => from.clone(),
    }
}

/// Plots every flow of `view` over the first month of `time_index` and saves it as a PNG.
///
/// Flows without an entry in `colors` are drawn with the default palette.
pub fn plot_electricity_flows(
    view: &NodeView,
    time_index: &TimeIndex,
    colors: &IndexMap<ResultKey, String>,
    file_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let end = time_index.first_month_end();
    if end == 0 {
        return Err(format!(
            "Time index with {} steps is too short to plot a month",
            time_index.len()
        )
        .into());
    }

    let series: Vec<(&ResultKey, Vec<(f64, f64)>)> = view
        .flows()
        .map(|(key, values)| (key, step_post_points(values, end)))
        .collect();
    let y_max = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|&(_, y)| y))
        .fold(0f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

    let root = BitMapBackend::new(file_path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..end as f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .y_desc(Y_LABEL)
        .x_label_formatter(&|x| {
            time_index
                .timestamp(x.max(0.0) as usize)
                .format("%d %b")
                .to_string()
        })
        .draw()?;

    for (i, (key, points)) in series.into_iter().enumerate() {
        let color = colors
            .get(key)
            .and_then(|hex| hex_color(hex))
            .map(|color| color.to_rgba())
            .unwrap_or_else(|| Palette99::pick(i).to_rgba());

        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(flow_label(key))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    info!("Plot saved as {}", file_path.display());
    Ok(())
}
