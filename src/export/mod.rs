//! JSON and CSV renderings of parsed snapshots.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::clusterinfo::table::{Field, Record};
use crate::clusterinfo::{ClusterInfo, Database, DatabaseWithNodes};

/// Table names used for the four entity collections, in output order.
pub const TABLES: [&str; 4] = ["nodes", "databases", "shards", "endpoints"];

/// Something that can be rendered as JSON and CSV text.
pub trait Serializer {
    fn json(&self) -> Result<String>;

    /// Render as CSV; `skip_headers` omits the header row for appending.
    fn csv(&self, skip_headers: bool) -> Result<String>;
}

impl<T: Record + Serialize> Serializer for [T] {
    fn json(&self) -> Result<String> {
        serde_json::to_string(self).context("encoding records as JSON")
    }

    fn csv(&self, skip_headers: bool) -> Result<String> {
        let header = T::FIELDS.iter().map(|f| f.name);
        let rows = self.iter().map(|record| render_row(T::FIELDS, record));
        write_csv(header, rows, skip_headers)
    }
}

impl Serializer for [DatabaseWithNodes] {
    fn json(&self) -> Result<String> {
        serde_json::to_string(self).context("encoding databases as JSON")
    }

    fn csv(&self, skip_headers: bool) -> Result<String> {
        let header = Database::FIELDS
            .iter()
            .map(|f| f.name)
            .chain(std::iter::once("nodes"));
        let rows = self.iter().map(|view| {
            let mut row = render_row(Database::FIELDS, &view.database);
            row.push(view.occupied_nodes().join("/"));
            row
        });
        write_csv(header, rows, skip_headers)
    }
}

impl Serializer for ClusterInfo {
    fn json(&self) -> Result<String> {
        serde_json::to_string(self).context("encoding snapshot as JSON")
    }

    /// All four tables concatenated, each preceded by a `# name` line.
    fn csv(&self, skip_headers: bool) -> Result<String> {
        let mut out = String::new();
        for (name, table) in csv_tables(self, skip_headers)? {
            out.push_str("# ");
            out.push_str(name);
            out.push('\n');
            out.push_str(&table);
        }
        Ok(out)
    }
}

/// Render each entity collection of a snapshot as its own CSV table.
pub fn csv_tables(info: &ClusterInfo, skip_headers: bool) -> Result<BTreeMap<&'static str, String>> {
    let mut tables = BTreeMap::new();
    for name in TABLES {
        let text = match name {
            "nodes" => info.nodes().csv(skip_headers),
            "databases" => info.databases().csv(skip_headers),
            "shards" => info.shards().csv(skip_headers),
            _ => info.endpoints().csv(skip_headers),
        }
        .with_context(|| format!("rendering {name} table"))?;
        tables.insert(name, text);
    }
    Ok(tables)
}

fn render_row<T>(fields: &[Field<T>], record: &T) -> Vec<String> {
    fields.iter().map(|f| (f.render)(record)).collect()
}

fn write_csv<'a, H, R>(header: H, rows: R, skip_headers: bool) -> Result<String>
where
    H: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if !skip_headers {
        writer
            .write_record(header)
            .context("writing CSV header")?;
    }
    for row in rows {
        writer.write_record(&row).context("writing CSV row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Writes snapshot tables as `<table>.csv` files in one directory.
///
/// With `skip_headers` set, rows are appended to existing files so repeated
/// snapshots accumulate into one table per entity.
pub struct CsvDirWriter {
    dir: PathBuf,
    skip_headers: bool,
}

impl CsvDirWriter {
    pub fn new(dir: impl Into<PathBuf>, skip_headers: bool) -> Self {
        Self {
            dir: dir.into(),
            skip_headers,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write all four tables, returning the files touched.
    pub fn write(&self, info: &ClusterInfo) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output directory {}", self.dir.display()))?;

        let mut written = Vec::with_capacity(TABLES.len());
        for (name, table) in csv_tables(info, self.skip_headers)? {
            let path = self.dir.join(format!("{name}.csv"));
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(self.skip_headers)
                .truncate(!self.skip_headers)
                .open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            file.write_all(table.as_bytes())
                .with_context(|| format!("writing {}", path.display()))?;

            tracing::debug!(path = %path.display(), "wrote CSV table");
            written.push(path);
        }

        Ok(written)
    }
}
