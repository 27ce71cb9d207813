use std::time::Instant;

use indicatif::HumanDuration;
use owo_colors::OwoColorize;

use mdlg::config::DataLayout;
use mdlg::import::{DumpImporter, DumpLayout, ImportWarning};
use mdlg::query::TableFilter;
use mdlg::registry::{DESCRIPTORS, IMAGES, SCENES};
use mdlg::storage::{schema::SCHEMA_VERSION, CatalogStore};
use mdlg::ui::{
    header, import_report, info, records_table, section, stats_table, success, summary_row, theme,
    timing, warning_list, Icons, Spinner,
};
use mdlg::Record;

const MAX_WARNINGS: usize = 10;

/// Open the catalog, which must already exist
fn open_existing(layout: &DataLayout) -> anyhow::Result<CatalogStore> {
    if !layout.database.is_file() {
        anyhow::bail!(
            "no catalog at {} (run `mdlg reset --yes` first)",
            layout.database.display()
        );
    }
    Ok(CatalogStore::open(&layout.database)?)
}

pub fn run_reset(layout: &DataLayout, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!(
            "refusing to delete {} without --yes",
            layout.database.display()
        );
    }

    layout.ensure_dirs()?;
    if layout.database.exists() {
        std::fs::remove_file(&layout.database)?;
        tracing::info!("removed {}", layout.database.display());
    }

    let mut store = CatalogStore::open(&layout.database)?;
    let version = store.ensure_schema(true)?;
    store.close()?;

    success(&format!("Catalog schema {} created", version));
    info("Database", &layout.database.display().to_string());
    info("Dumps", &layout.dumps.display().to_string());
    Ok(())
}

pub fn run_mandragore(layout: &DataLayout, reorganized: bool) -> anyhow::Result<()> {
    let dumps = if reorganized {
        DumpLayout::Reorganized
    } else {
        DumpLayout::Bnf
    };

    let mut store = open_existing(layout)?;
    store.ensure_schema(false)?;

    header(&format!("Importing {} mandragore dumps", dumps));
    println!("{} {}", Icons::FOLDER, layout.dumps.display());

    let started = Instant::now();
    let spinner = Spinner::new("Loading dump files...");
    let reports = DumpImporter::new(&layout.dumps, &mut store).load(dumps.files());
    let reports = match reports {
        Ok(reports) => {
            spinner.finish_with_message("Done");
            reports
        }
        Err(e) => {
            spinner.finish_with_message("Failed");
            return Err(e.into());
        }
    };

    section("Files");
    for report in &reports {
        import_report(report);
    }

    let warnings: Vec<ImportWarning> = reports
        .iter()
        .flat_map(|r| r.warnings.iter().cloned())
        .collect();
    warning_list(&warnings, MAX_WARNINGS);

    println!();
    println!("{}", stats_table(&store.stats()?));
    timing(&HumanDuration(started.elapsed()).to_string());
    Ok(())
}

fn parse_filters(table: &str, options: &[String]) -> anyhow::Result<Vec<TableFilter>> {
    options
        .iter()
        .map(|raw| TableFilter::from_option(table, raw).map_err(Into::into))
        .collect()
}

pub fn run_images(
    layout: &DataLayout,
    images: &[String],
    scenes: &[String],
    descriptors: &[String],
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut filters = parse_filters(IMAGES, images)?;
    filters.extend(parse_filters(SCENES, scenes)?);
    filters.extend(parse_filters(DESCRIPTORS, descriptors)?);

    let store = open_existing(layout)?;
    let mut cursor = store.retrieve_images(&[], &filters, limit)?;
    let total = cursor.total();
    let columns = cursor.columns().to_vec();
    let records = cursor.records()?.collect::<mdlg::Result<Vec<Record>>>()?;

    if json {
        let data = serde_json::json!({
            "total": total,
            "images": records,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No image matches the filters.", Icons::CROSS);
    } else {
        println!("{}", records_table(&columns, &records));
    }
    summary_row("Images:", &total.to_string());
    Ok(())
}

pub fn run_stats(layout: &DataLayout) -> anyhow::Result<()> {
    let store = open_existing(layout)?;
    let stats = store.stats()?;

    println!(
        "{} Catalog statistics ({})",
        Icons::STATS,
        layout.database.display()
    );
    println!("{}", stats_table(&stats));
    summary_row("Schema:", &stats.version);
    Ok(())
}

pub fn run_version() -> anyhow::Result<()> {
    println!(
        "{} {} {}",
        Icons::BOOK,
        "mdlg".bold().style(theme().info.clone()),
        env!("CARGO_PKG_VERSION").bold()
    );
    summary_row("Schema:", SCHEMA_VERSION);
    Ok(())
}
