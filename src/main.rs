// Console host for the dashboard.
//
// The three views render to text surfaces; menu choices stand in for the
// clicks a browser user would make:
// - Option [1] fetches the indicator table (with retry or bundled fallback).
// - Option [2] clicks a city marker on the map.
// - Option [3] picks a score family from the chart's dropdown.
// - Option [4] exports the current ranking and a JSON summary.
use anyhow::Context;
use sdg_dashboard::config::DashboardConfig;
use sdg_dashboard::console::{ConsoleChart, ConsoleMap, MapRemote};
use sdg_dashboard::loader::{source_for, BundledSource, TableLoader, TableSource};
use sdg_dashboard::output;
use sdg_dashboard::types::{CityId, ScoreFamily};
use sdg_dashboard::util;
use sdg_dashboard::views::layout::WindowSize;
use sdg_dashboard::views::{Interaction, ViewKind};
use sdg_dashboard::Dashboard;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const WINDOW: WindowSize = WindowSize {
    width: 1280.0,
    height: 800.0,
    header_height: 0.0,
};

struct App {
    dashboard: Dashboard,
    loader: TableLoader<Box<dyn TableSource>>,
    map: MapRemote,
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask what to do after a failed load. Returns `R`, `B` or `N`.
fn prompt_after_failure() -> String {
    loop {
        print!("Retry (R), use bundled data (B), or back to menu (N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        let resp = buf.trim().to_uppercase();
        match resp.as_str() {
            "R" | "B" | "N" => return resp,
            _ => println!("Invalid choice. Please enter R, B or N."),
        }
    }
}

/// Handle option [1]: fetch the table once and draw every view.
async fn handle_load(app: &mut App) {
    loop {
        match app.loader.table().await {
            Ok(table) => {
                if let Some(report) = app.loader.report() {
                    println!(
                        "Loaded {} cities with {} indicators.",
                        util::format_int(report.total_rows),
                        util::format_int(report.indicator_columns)
                    );
                    if !report.ignored_columns.is_empty() {
                        println!("Note: ignored columns {:?}.", report.ignored_columns);
                    }
                    if report.missing_summaries > 0 {
                        println!(
                            "Note: {} summary cells were empty.",
                            util::format_int(report.missing_summaries)
                        );
                    }
                }
                println!();
                app.dashboard.load(table);
                app.dashboard.resize(WINDOW);
                return;
            }
            Err(e) => {
                eprintln!("Failed to load data: {}\n", e);
                app.dashboard.fail_load(&e);
                match prompt_after_failure().as_str() {
                    "R" => continue,
                    "B" => {
                        let bundled: Box<dyn TableSource> = Box::new(BundledSource);
                        app.loader = TableLoader::new(bundled);
                    }
                    _ => return,
                }
            }
        }
    }
}

/// Handle option [2]: click one city's marker.
fn handle_select_city(app: &mut App) {
    let Some(snap) = app.dashboard.snapshot() else {
        println!("Error: No data loaded. Please load the data first (option 1).\n");
        return;
    };
    for city in snap.table.cities() {
        println!("[{}] {}", city.id.0 + 1, city.name);
    }
    let choice = read_choice();
    match choice.parse::<usize>() {
        Ok(n) if n >= 1 && n <= snap.table.len() => {
            app.map.click_marker(CityId(n - 1));
            app.dashboard.pump();
        }
        _ => println!("Invalid choice. Please enter a number from the list.\n"),
    }
}

/// Handle option [3]: pick a score family by name.
fn handle_select_family(app: &mut App) {
    if app.dashboard.snapshot().is_none() {
        println!("Error: No data loaded. Please load the data first (option 1).\n");
        return;
    }
    let names: Vec<&str> = ScoreFamily::ALL.iter().map(|f| f.tag()).collect();
    println!("Score families: {}", names.join(", "));
    let choice = read_choice();
    app.dashboard
        .events()
        .push(ViewKind::Primary, Interaction::FamilyPicked(choice));
    app.dashboard.pump();
}

/// Handle option [4]: write the ranking CSV and the JSON summary.
fn handle_export(app: &App) -> anyhow::Result<()> {
    let Some(snap) = app.dashboard.snapshot() else {
        println!("Error: No data loaded. Please load the data first (option 1).\n");
        return Ok(());
    };
    let family = app.dashboard.selection().family;

    let rows = output::ranking_rows(&snap, family);
    let file = PathBuf::from(format!("ranking_{}.csv", family.tag()));
    output::write_csv(&file, &rows).with_context(|| format!("exporting {}", file.display()))?;
    println!("Cities ranked by {} score\n", family);
    output::preview_table_rows(&rows, 5);
    println!("(Full table exported to {})\n", file.display());

    let summary = output::summary(&snap, family);
    output::write_json(&PathBuf::from("summary.json"), &summary).context("exporting summary.json")?;
    println!("Summary Stats (summary.json):");
    println!(
        "{{\"ranked_cities\": {}, \"mean_score\": {}}}\n",
        summary.ranked_cities,
        summary
            .mean_score
            .map(|m| util::format_number(m, 2))
            .unwrap_or_else(|| "n/a".to_string())
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = DashboardConfig::from_env();
    let (map, map_remote) = ConsoleMap::new(true);
    let (primary, _) = ConsoleChart::new("indicators", true);
    let (ranked, _) = ConsoleChart::new("ranking", true);
    let loader = TableLoader::new(source_for(&config));
    let dashboard =
        Dashboard::with_surfaces(config, Box::new(map), Box::new(primary), Box::new(ranked));
    let mut app = App {
        dashboard,
        loader,
        map: map_remote,
    };

    loop {
        println!("City Sustainability Dashboard:");
        println!("[1] Load the data");
        println!("[2] Select a city");
        println!("[3] Select a score family");
        println!("[4] Export ranking");
        println!("[5] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(&mut app).await,
            "2" => handle_select_city(&mut app),
            "3" => handle_select_family(&mut app),
            "4" => {
                if let Err(e) = handle_export(&app) {
                    eprintln!("Write error: {:#}\n", e);
                }
            }
            "5" => {
                println!("Exiting the program.");
                return Ok(());
            }
            _ => println!("Invalid choice. Please enter 1 to 5.\n"),
        }
    }
}
