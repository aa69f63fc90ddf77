//! Network chart rendering.
//!
//! Draws the node-type and IPv4/IPv6 time series as two stacked panels with
//! a "generated" footer, then writes the same PNG to the stable chart path
//! and to the dated archive path.

use crate::config::{parse_hex_colour, ChartConfig};
use crate::models::{IpHistory, TypeHistory};
use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use image::{ImageFormat, RgbImage};
use plotters::coord::combinators::BindKeyPoints;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::PathBuf;
use tracing::{debug, info};

const NETWORK_TITLE: &str = "Tor Network Size Over Time";
const IP_VERSION_TITLE: &str = "IPv4 vs IPv6 Growth";
const Y_DESC: &str = "Node Count";
const X_DESC: &str = "Date";

// Sizes in points, scaled by the configured DPI.
const TITLE_PT: f64 = 12.0;
const DESC_PT: f64 = 10.0;
const TICK_PT: f64 = 9.0;
const LEGEND_PT: f64 = 9.0;
const FOOTER_PT: f64 = 9.0;
const MARGIN_PT: f64 = 8.0;
const X_LABEL_AREA_PT: f64 = 64.0;
const Y_LABEL_AREA_PT: f64 = 56.0;
const FOOTER_HEIGHT_PT: f64 = 18.0;
const FOOTER_PAD_PT: f64 = 4.0;
const LEGEND_LINE_PT: f64 = 20.0;

const GRID_ALPHA: f64 = 0.3;
const MINOR_GRID_ALPHA: f64 = 0.08;
const FOOTER_ALPHA: f64 = 0.7;
const FOOTER_GREY: RGBColor = RGBColor(128, 128, 128);

/// Minor ticks fall on this weekday.
const MINOR_TICK_WEEKDAY: Weekday = Weekday::Tue;

/// Resolved chart geometry and colours.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub line_width: f64,
    pub colours: SeriesColours,
}

/// One colour per plotted series.
#[derive(Debug, Clone, Copy)]
pub struct SeriesColours {
    pub relay: RGBColor,
    pub exit: RGBColor,
    pub guard: RGBColor,
    pub all: RGBColor,
    pub ipv4: RGBColor,
    pub ipv6: RGBColor,
}

fn rgb(value: &str) -> Result<RGBColor> {
    let [r, g, b] = parse_hex_colour(value)?;
    Ok(RGBColor(r, g, b))
}

impl ChartStyle {
    /// Resolve pixel size and colours from the chart settings.
    pub fn from_config(config: &ChartConfig) -> Result<Self> {
        let colours = &config.colours;

        Ok(Self {
            width: (config.width_inches * config.dpi as f64).round() as u32,
            height: (config.height_inches * config.dpi as f64).round() as u32,
            dpi: config.dpi,
            line_width: config.line_width,
            colours: SeriesColours {
                relay: rgb(&colours.relay)?,
                exit: rgb(&colours.exit)?,
                guard: rgb(&colours.guard)?,
                all: rgb(&colours.all)?,
                ipv4: rgb(&colours.ipv4)?,
                ipv6: rgb(&colours.ipv6)?,
            },
        })
    }

    /// Points to whole pixels, at least one.
    fn px(&self, points: f64) -> u32 {
        self.font_px(points).round().max(1.0) as u32
    }

    /// Points to fractional pixels, for font sizes.
    fn font_px(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }
}

/// Where a rendered chart is written.
#[derive(Debug, Clone)]
pub struct ChartOutputs {
    /// Stable path, overwritten on every run.
    pub latest: PathBuf,
    /// Dated archive path. Its directory must already exist.
    pub archive: PathBuf,
}

/// Both histories projected onto the same ascending date sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartData {
    pub dates: Vec<NaiveDate>,
    pub relay: Vec<usize>,
    pub exit: Vec<usize>,
    pub guard: Vec<usize>,
    pub all: Vec<usize>,
    pub ipv4: Vec<usize>,
    pub ipv6: Vec<usize>,
}

impl ChartData {
    /// Dates come from the node-type history; a date missing from the IP
    /// history plots as zero.
    pub fn project(types: &TypeHistory, ips: &IpHistory) -> Self {
        let mut data = Self::default();

        for (date, counts) in types.iter() {
            let ip_counts = ips.get_or_default(date);

            data.dates.push(*date);
            data.relay.push(counts.relay);
            data.exit.push(counts.exit);
            data.guard.push(counts.guard);
            data.all.push(counts.all);
            data.ipv4.push(ip_counts.ipv4);
            data.ipv6.push(ip_counts.ipv6);
        }

        data
    }
}

/// Day-offset x axis with monthly major ticks and weekly minor ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateAxis {
    origin: NaiveDate,
    /// Inclusive range of day offsets from `origin`.
    pub start: i32,
    pub end: i32,
    /// Offsets of the first day of each month in range.
    pub major: Vec<i32>,
    /// Offsets of each week's tick day in range.
    pub minor: Vec<i32>,
}

impl DateAxis {
    /// Axis spanning the given ascending dates with a 5% margin each side.
    pub fn new(dates: &[NaiveDate]) -> Option<Self> {
        let origin = *dates.first()?;
        let last = *dates.last()?;

        let span = (last - origin).num_days() as i32;
        let pad = ((span as f64 * 0.05).ceil() as i32).max(1);

        let mut axis = Self {
            origin,
            start: -pad,
            end: span + pad,
            major: Vec::new(),
            minor: Vec::new(),
        };

        let (from, to) = (axis.date_at(axis.start), axis.date_at(axis.end));
        axis.major = month_starts(from, to).map(|d| axis.offset(d)).collect();
        axis.minor = weekly(from, to, MINOR_TICK_WEEKDAY)
            .map(|d| axis.offset(d))
            .collect();

        // A range inside one month still gets a labelled tick
        if axis.major.is_empty() {
            axis.major.push(0);
        }

        Some(axis)
    }

    pub fn offset(&self, date: NaiveDate) -> i32 {
        (date - self.origin).num_days() as i32
    }

    pub fn date_at(&self, offset: i32) -> NaiveDate {
        self.origin + Duration::days(offset as i64)
    }

    /// Tick label for an offset.
    pub fn label(&self, offset: i32) -> String {
        self.date_at(offset).format("%Y-%m-%d").to_string()
    }
}

/// First days of each month within `from..=to`.
fn month_starts(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let first = from.with_day(1).unwrap_or(from);
    let first = if first < from {
        first.checked_add_months(Months::new(1))
    } else {
        Some(first)
    };

    std::iter::successors(first, |d| d.checked_add_months(Months::new(1)))
        .take_while(move |d| *d <= to)
}

/// Every `weekday` within `from..=to`.
fn weekly(from: NaiveDate, to: NaiveDate, weekday: Weekday) -> impl Iterator<Item = NaiveDate> {
    let ahead = (7 + weekday.num_days_from_monday() - from.weekday().num_days_from_monday()) % 7;
    let first = from + Duration::days(ahead as i64);

    std::iter::successors(Some(first), |d| Some(*d + Duration::days(7)))
        .take_while(move |d| *d <= to)
}

struct Line<'a> {
    label: &'static str,
    colour: RGBColor,
    values: &'a [usize],
}

struct Panel<'a> {
    title: &'static str,
    x_desc: Option<&'static str>,
    lines: Vec<Line<'a>>,
}

/// Render the two-panel network chart and write it to both outputs.
///
/// Returns `Ok(false)` without writing anything when either history is
/// empty. A failed write is returned as an error; nothing is retried.
pub fn render_network_chart(
    types: &TypeHistory,
    ips: &IpHistory,
    style: &ChartStyle,
    outputs: &ChartOutputs,
    generated_on: NaiveDate,
) -> Result<bool> {
    if types.is_empty() || ips.is_empty() {
        println!("No data found!");
        return Ok(false);
    }

    let data = ChartData::project(types, ips);
    let image = draw_chart(&data, style, generated_on)?;

    for path in [&outputs.latest, &outputs.archive] {
        debug!("Writing chart to {}", path.display());
        image
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("Failed to write chart to {}", path.display()))?;
    }

    info!(
        "Chart archived at {} ({}x{})",
        outputs.archive.display(),
        style.width,
        style.height
    );
    println!("\n✓ Chart saved: {}", outputs.latest.display());

    Ok(true)
}

/// Draw the chart into an in-memory RGB image.
fn draw_chart(data: &ChartData, style: &ChartStyle, generated_on: NaiveDate) -> Result<RgbImage> {
    let (width, height) = (style.width, style.height);
    let axis = DateAxis::new(&data.dates).ok_or_else(|| anyhow!("No dates to plot"))?;
    let mut buffer = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let footer_height = style.px(FOOTER_HEIGHT_PT);
        let (plots, footer) = root.split_vertically(height.saturating_sub(footer_height));
        let panels = plots.split_evenly((2, 1));

        let colours = style.colours;
        let network = Panel {
            title: NETWORK_TITLE,
            x_desc: None,
            lines: vec![
                Line {
                    label: "Relay",
                    colour: colours.relay,
                    values: &data.relay,
                },
                Line {
                    label: "Exit",
                    colour: colours.exit,
                    values: &data.exit,
                },
                Line {
                    label: "Guard",
                    colour: colours.guard,
                    values: &data.guard,
                },
                Line {
                    label: "All Nodes",
                    colour: colours.all,
                    values: &data.all,
                },
            ],
        };
        let ip_versions = Panel {
            title: IP_VERSION_TITLE,
            x_desc: Some(X_DESC),
            lines: vec![
                Line {
                    label: "IPv4",
                    colour: colours.ipv4,
                    values: &data.ipv4,
                },
                Line {
                    label: "IPv6",
                    colour: colours.ipv6,
                    values: &data.ipv6,
                },
            ],
        };

        draw_panel(&panels[0], &network, &data.dates, &axis, style)?;
        draw_panel(&panels[1], &ip_versions, &data.dates, &axis, style)?;
        draw_footer(&footer, generated_on, style)?;

        root.present()?;
    }

    RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| anyhow!("Chart buffer does not match {}x{}", width, height))
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &Panel<'_>,
    dates: &[NaiveDate],
    axis: &DateAxis,
    style: &ChartStyle,
) -> Result<()> {
    let y_max = panel
        .lines
        .iter()
        .flat_map(|line| line.values.iter())
        .copied()
        .max()
        .unwrap_or(0);
    let y_top = (y_max as f64 * 1.05).max(1.0);

    let x_range = (axis.start..axis.end)
        .with_key_points(axis.major.clone())
        .with_light_points(axis.minor.clone());

    let mut chart = ChartBuilder::on(area)
        .caption(panel.title, (FontFamily::SansSerif, style.font_px(TITLE_PT)))
        .margin(style.px(MARGIN_PT))
        .x_label_area_size(style.px(X_LABEL_AREA_PT))
        .y_label_area_size(style.px(Y_LABEL_AREA_PT))
        .build_cartesian_2d(x_range, 0f64..y_top)?;

    let tick_font = (FontFamily::SansSerif, style.font_px(TICK_PT)).into_font();
    let desc_font = (FontFamily::SansSerif, style.font_px(DESC_PT)).into_font();
    let x_formatter = |offset: &i32| axis.label(*offset);
    let y_formatter = |value: &f64| format!("{:.0}", value);

    let mut mesh = chart.configure_mesh();
    mesh.x_labels(axis.major.len())
        .x_label_formatter(&x_formatter)
        .x_label_style(tick_font.transform(FontTransform::Rotate90))
        .y_label_formatter(&y_formatter)
        .y_label_style(tick_font)
        .y_desc(Y_DESC)
        .axis_desc_style(desc_font)
        .bold_line_style(BLACK.mix(GRID_ALPHA))
        .light_line_style(BLACK.mix(MINOR_GRID_ALPHA));
    if let Some(x_desc) = panel.x_desc {
        mesh.x_desc(x_desc);
    }
    mesh.draw()?;

    let stroke = style.px(style.line_width);
    let legend_len = style.px(LEGEND_LINE_PT) as i32;

    for line in &panel.lines {
        let colour = line.colour;
        let points = dates
            .iter()
            .zip(line.values.iter())
            .map(|(date, value)| (axis.offset(*date), *value as f64));

        chart
            .draw_series(LineSeries::new(points, colour.stroke_width(stroke)))?
            .label(line.label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + legend_len, y)], colour.stroke_width(stroke))
            });
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .label_font((FontFamily::SansSerif, style.font_px(LEGEND_PT)))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.2))
        .draw()?;

    Ok(())
}

/// Right-aligned "generated" stamp along the bottom edge.
fn draw_footer(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    generated_on: NaiveDate,
    style: &ChartStyle,
) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let text = format!("generated: {}", generated_on.format("%Y-%m-%d"));

    let font = (FontFamily::SansSerif, style.font_px(FOOTER_PT))
        .into_font()
        .color(&FOOTER_GREY.mix(FOOTER_ALPHA))
        .pos(Pos::new(HPos::Right, VPos::Bottom));

    let x = (width as f64 * 0.98) as i32;
    let y = height as i32 - style.px(FOOTER_PAD_PT) as i32;
    area.draw(&Text::new(text, (x, y), font))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{IpVersionCounts, TypeCounts};
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_project_fills_missing_ip_dates_with_zero() {
        let mut types = TypeHistory::new();
        types.insert(date("2024-01-02"), TypeCounts::new(5, 1, 2));
        types.insert(date("2024-01-01"), TypeCounts::new(3, 2, 1));
        let mut ips = IpHistory::new();
        ips.insert(date("2024-01-01"), IpVersionCounts { ipv4: 5, ipv6: 1 });

        let data = ChartData::project(&types, &ips);

        assert_eq!(data.dates, vec![date("2024-01-01"), date("2024-01-02")]);
        assert_eq!(data.relay, vec![3, 5]);
        assert_eq!(data.all, vec![6, 8]);
        assert_eq!(data.ipv4, vec![5, 0]);
        assert_eq!(data.ipv6, vec![1, 0]);
    }

    #[test]
    fn test_date_axis_ticks() {
        let dates = vec![date("2024-01-20"), date("2024-03-10")];
        let axis = DateAxis::new(&dates).unwrap();

        // 50 day span, 3 days of margin either side
        assert_eq!((axis.start, axis.end), (-3, 53));

        let majors: Vec<String> = axis.major.iter().map(|o| axis.label(*o)).collect();
        assert_eq!(majors, vec!["2024-02-01", "2024-03-01"]);

        assert!(axis
            .minor
            .iter()
            .all(|o| axis.date_at(*o).weekday() == Weekday::Tue));
        assert_eq!(axis.label(axis.minor[0]), "2024-01-23");
    }

    #[test]
    fn test_date_axis_single_day() {
        let axis = DateAxis::new(&[date("2024-05-15")]).unwrap();

        assert_eq!((axis.start, axis.end), (-1, 1));
        assert_eq!(axis.major, vec![0]);
        assert!(DateAxis::new(&[]).is_none());
    }

    #[test]
    fn test_month_start_on_range_start() {
        let starts: Vec<_> = month_starts(date("2024-03-01"), date("2024-04-30")).collect();
        assert_eq!(starts, vec![date("2024-03-01"), date("2024-04-01")]);
    }

    #[test]
    fn test_chart_style_from_config() {
        let style = ChartStyle::from_config(&Config::default().chart).unwrap();

        assert_eq!((style.width, style.height), (4200, 3600));
        assert_eq!(style.px(72.0), 300);
        assert_eq!(style.colours.exit, RGBColor(0xe7, 0x4c, 0x3c));
    }

    #[test]
    fn test_render_skips_empty_history() {
        let temp_dir = TempDir::new().unwrap();
        let outputs = ChartOutputs {
            latest: temp_dir.path().join("network-chart.png"),
            archive: temp_dir.path().join("archive.png"),
        };
        let style = ChartStyle::from_config(&Config::default().chart).unwrap();

        let mut types = TypeHistory::new();
        types.insert(date("2024-01-01"), TypeCounts::new(1, 1, 1));

        let written = render_network_chart(
            &types,
            &IpHistory::new(),
            &style,
            &outputs,
            date("2024-06-01"),
        )
        .unwrap();

        assert!(!written);
        assert!(!outputs.latest.exists());
        assert!(!outputs.archive.exists());

        let written = render_network_chart(
            &TypeHistory::new(),
            &IpHistory::new(),
            &style,
            &outputs,
            date("2024-06-01"),
        )
        .unwrap();
        assert!(!written);
        assert!(!outputs.latest.exists());
    }

    fn small_style() -> ChartStyle {
        let mut chart = Config::default().chart;
        chart.dpi = 30;
        ChartStyle::from_config(&chart).unwrap()
    }

    fn three_days() -> (TypeHistory, IpHistory) {
        let mut types = TypeHistory::new();
        let mut ips = IpHistory::new();
        for (day, n) in [("2024-05-30", 10), ("2024-05-31", 12), ("2024-06-01", 11)] {
            types.insert(date(day), TypeCounts::new(n, n / 2, n / 3));
            ips.insert(date(day), IpVersionCounts { ipv4: n, ipv6: 2 });
        }
        (types, ips)
    }

    #[test]
    fn test_render_writes_latest_and_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive_dir = temp_dir.path().join("history/2024/06/2024-06-01");
        std::fs::create_dir_all(&archive_dir).unwrap();
        let outputs = ChartOutputs {
            latest: temp_dir.path().join("network-chart.png"),
            archive: archive_dir.join("network-chart.png"),
        };
        let style = small_style();
        let (types, ips) = three_days();

        let written =
            render_network_chart(&types, &ips, &style, &outputs, date("2024-06-01")).unwrap();

        assert!(written);
        let latest = std::fs::read(&outputs.latest).unwrap();
        let archive = std::fs::read(&outputs.archive).unwrap();
        assert_eq!(latest, archive);

        let decoded = image::open(&outputs.latest).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (style.width, style.height));
    }

    #[test]
    fn test_render_fails_without_archive_dir() {
        let temp_dir = TempDir::new().unwrap();
        let outputs = ChartOutputs {
            latest: temp_dir.path().join("network-chart.png"),
            archive: temp_dir.path().join("history/2024/06/2024-06-01/network-chart.png"),
        };
        let (types, ips) = three_days();

        let result =
            render_network_chart(&types, &ips, &small_style(), &outputs, date("2024-06-01"));

        assert!(result.is_err());
        // The latest chart is written before the archive copy is attempted
        assert!(outputs.latest.exists());
    }
}
