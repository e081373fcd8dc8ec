use std::io;
use std::time::Duration;

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};

use crate::domain::ClusteredTable;
use crate::error::PlotError;

pub const TITLE: &str = "Clusters of Bird Flu Strains by Host";
pub const X_TITLE: &str = "Host (Encoded)";
pub const Y_TITLE: &str = "Strain Index";

const VIRIDIS: [(f64, (u8, u8, u8)); 5] = [
    (0.0, (68, 1, 84)),
    (0.25, (59, 82, 139)),
    (0.5, (33, 145, 140)),
    (0.75, (94, 201, 98)),
    (1.0, (253, 231, 37)),
];

/// Samples the viridis scale at `t` in [0, 1]; values outside are clamped.
pub fn viridis(t: f64) -> Color {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    for pair in VIRIDIS.windows(2) {
        let (lo, (r0, g0, b0)) = pair[0];
        let (hi, (r1, g1, b1)) = pair[1];
        if t <= hi {
            let f = (t - lo) / (hi - lo);
            let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
            return Color::Rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1));
        }
    }
    let (r, g, b) = VIRIDIS[VIRIDIS.len() - 1].1;
    Color::Rgb(r, g, b)
}

pub fn cluster_color(cluster: usize, clusters: usize) -> Color {
    if clusters <= 1 {
        return viridis(0.0);
    }
    viridis(cluster as f64 / (clusters - 1) as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub cluster: usize,
    pub color: Color,
    pub points: Vec<(f64, f64)>,
}

/// Points grouped by cluster: x is the encoded host, y the row index.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPlot {
    pub series: Vec<Series>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub hosts: Vec<String>,
}

impl ScatterPlot {
    pub fn from_table(table: &ClusteredTable) -> Self {
        let mut series: Vec<Series> = (0..table.clusters)
            .map(|cluster| Series {
                cluster,
                color: cluster_color(cluster, table.clusters),
                points: Vec::new(),
            })
            .collect();
        for (index, row) in table.rows.iter().enumerate() {
            if let Some(series) = series.get_mut(row.cluster) {
                series.points.push((row.host_encoded as f64, index as f64));
            }
        }

        let max_code = table
            .rows
            .iter()
            .map(|row| row.host_encoded)
            .max()
            .unwrap_or(0);
        let rows = table.rows.len().max(1);
        Self {
            series,
            x_bounds: [-0.5, max_code as f64 + 0.5],
            y_bounds: [-0.5, rows as f64 - 0.5],
            hosts: table.hosts().into_iter().map(str::to_string).collect(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|series| series.points.len()).sum()
    }
}

/// Draws the chart plus a one-line footer into `area`.
pub fn render(frame: &mut ratatui::Frame, area: Rect, plot: &ScatterPlot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(1)])
        .split(area);

    let datasets: Vec<Dataset> = plot
        .series
        .iter()
        .map(|series| {
            Dataset::default()
                .name(format!("cluster {}", series.cluster))
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(series.color))
                .data(&series.points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(TITLE, Style::default().add_modifier(Modifier::BOLD))),
        )
        .x_axis(
            Axis::default()
                .title(X_TITLE)
                .style(Style::default().fg(Color::Gray))
                .bounds(plot.x_bounds)
                .labels(axis_labels(plot.x_bounds)),
        )
        .y_axis(
            Axis::default()
                .title(Y_TITLE)
                .style(Style::default().fg(Color::Gray))
                .bounds(plot.y_bounds)
                .labels(axis_labels(plot.y_bounds)),
        );
    frame.render_widget(chart, chunks[0]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{} points", plot.point_count()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled("q/Esc/Enter to close", Style::default().fg(Color::DarkGray)),
    ]));
    frame.render_widget(footer, chunks[1]);
}

fn axis_labels(bounds: [f64; 2]) -> Vec<String> {
    let lo = (bounds[0] + 0.5).round() as i64;
    let hi = (bounds[1] - 0.5).round() as i64;
    if hi <= lo {
        return vec![lo.to_string()];
    }
    vec![lo.to_string(), ((lo + hi) / 2).to_string(), hi.to_string()]
}

/// Opens an alternate-screen plot and blocks until the user closes it.
pub fn show(plot: &ScatterPlot) -> Result<(), PlotError> {
    enable_raw_mode().map_err(terminal_error)?;
    let result = io::stdout()
        .execute(EnterAlternateScreen)
        .map_err(terminal_error)
        .and_then(|_| event_loop(plot));

    let raw = disable_raw_mode().map_err(terminal_error);
    let screen = io::stdout()
        .execute(LeaveAlternateScreen)
        .map(|_| ())
        .map_err(terminal_error);
    first_error([result, raw, screen])
}

/// Every restore step has already run; report the earliest failure.
fn first_error<const N: usize>(results: [Result<(), PlotError>; N]) -> Result<(), PlotError> {
    results.into_iter().collect()
}

fn event_loop(plot: &ScatterPlot) -> Result<(), PlotError> {
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).map_err(terminal_error)?;
    terminal.clear().map_err(terminal_error)?;
    loop {
        terminal
            .draw(|frame| {
                let area = frame.area();
                render(frame, area, plot);
            })
            .map_err(terminal_error)?;

        if event::poll(Duration::from_millis(200)).map_err(terminal_error)? {
            if let Event::Key(key) = event::read().map_err(terminal_error)? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter)
                {
                    return Ok(());
                }
            }
        }
    }
}

fn terminal_error(err: io::Error) -> PlotError {
    PlotError::Terminal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viridis_endpoints() {
        assert_eq!(viridis(0.0), Color::Rgb(68, 1, 84));
        assert_eq!(viridis(1.0), Color::Rgb(253, 231, 37));
        assert_eq!(viridis(7.0), Color::Rgb(253, 231, 37));
    }

    #[test]
    fn cluster_colors_span_the_scale() {
        assert_eq!(cluster_color(0, 3), viridis(0.0));
        assert_eq!(cluster_color(1, 3), Color::Rgb(33, 145, 140));
        assert_eq!(cluster_color(2, 3), viridis(1.0));
    }

    #[test]
    fn axis_labels_for_single_value() {
        assert_eq!(axis_labels([-0.5, 0.5]), vec!["0".to_string()]);
        assert_eq!(axis_labels([-0.5, 9.5]), vec!["0", "4", "9"]);
    }

    #[test]
    fn restore_reports_earliest_failure() {
        let err = first_error([
            Ok(()),
            Err(PlotError::Terminal("raw mode".to_string())),
            Err(PlotError::Terminal("screen".to_string())),
        ])
        .unwrap_err();
        assert!(matches!(err, PlotError::Terminal(message) if message == "raw mode"));
        assert!(first_error([Ok(()), Ok(())]).is_ok());
    }
}
