use ratatui::Terminal;
use ratatui::backend::TestBackend;

use avian_flu_clusters::domain::{ClusteredRow, ClusteredTable, MetadataRow};
use avian_flu_clusters::plot::{ScatterPlot, TITLE, X_TITLE, Y_TITLE, cluster_color, render};

fn clustered(rows: &[(&str, usize, usize)]) -> ClusteredTable {
    ClusteredTable {
        clusters: 3,
        rows: rows
            .iter()
            .enumerate()
            .map(|(index, (host, host_encoded, cluster))| ClusteredRow {
                row: MetadataRow {
                    accession: format!("ACC{index}"),
                    organism: String::new(),
                    date: String::new(),
                    host: host.to_string(),
                },
                host_encoded: *host_encoded,
                cluster: *cluster,
            })
            .collect(),
    }
}

fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[test]
fn scatter_groups_points_by_cluster() {
    let table = clustered(&[("duck", 0, 0), ("chicken", 1, 1), ("duck", 0, 0), ("swan", 2, 2)]);
    let plot = ScatterPlot::from_table(&table);

    assert_eq!(plot.series.len(), 3);
    assert_eq!(plot.series[0].points, vec![(0.0, 0.0), (0.0, 2.0)]);
    assert_eq!(plot.series[1].points, vec![(1.0, 1.0)]);
    assert_eq!(plot.series[2].color, cluster_color(2, 3));
    assert_eq!(plot.point_count(), 4);
    assert_eq!(plot.x_bounds, [-0.5, 2.5]);
    assert_eq!(plot.y_bounds, [-0.5, 3.5]);
    assert_eq!(plot.hosts, vec!["duck", "chicken", "swan"]);
}

#[test]
fn render_headless_shows_titles() {
    let table = clustered(&[("duck", 0, 0), ("chicken", 1, 1), ("swan", 2, 2)]);
    let plot = ScatterPlot::from_table(&table);

    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            render(frame, area, &plot);
        })
        .unwrap();

    let text = buffer_text(&terminal);
    assert!(text.contains(TITLE));
    assert!(text.contains(X_TITLE));
    assert!(text.contains(Y_TITLE));
    assert!(text.contains("3 points"));
}

#[test]
fn render_empty_table() {
    let plot = ScatterPlot::from_table(&clustered(&[]));
    assert_eq!(plot.point_count(), 0);

    let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
    terminal
        .draw(|frame| {
            let area = frame.area();
            render(frame, area, &plot);
        })
        .unwrap();
    assert!(buffer_text(&terminal).contains("0 points"));
}
