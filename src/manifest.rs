use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::bookmap::Bookmap;
use crate::model::Module;

/// Which copy of the manifest a run leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Output,
    Error,
}

impl OutputKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Error => "error",
        }
    }
}

/// `books/Physics.csv` → `books/Physics_output.csv`.
#[must_use]
pub fn output_path(input: &Path, kind: OutputKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{stem}_{}.{}", kind.suffix(), ext.to_string_lossy()),
        None => format!("{stem}_{}", kind.suffix()),
    };
    input.with_file_name(file_name)
}

/// Writes the current module state next to the input manifest, using the
/// input's delimiter, and returns the written path.
pub fn save(bookmap: &Bookmap, units: bool, kind: OutputKind) -> anyhow::Result<PathBuf> {
    let out_path = output_path(&bookmap.path, kind);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&out_path)
        .with_context(|| format!("create manifest output: {}", out_path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(bookmap.delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);

    writer
        .write_record(header(bookmap, units))
        .context("write manifest header")?;
    for module in &bookmap.modules {
        writer
            .write_record(row(module, units))
            .with_context(|| format!("write manifest row: {}", module.full_title()))?;
    }

    let mut file = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("flush manifest output: {}", err.error()))?;
    file.flush().context("flush manifest output")?;

    tracing::debug!(path = %out_path.display(), modules = bookmap.modules.len(), "saved manifest");
    Ok(out_path)
}

fn header(bookmap: &Bookmap, units: bool) -> Vec<&str> {
    let columns = &bookmap.columns;
    let mut header = Vec::with_capacity(8);
    if units {
        header.push(columns.unit_number_column.as_str());
        header.push(columns.unit_title_column.as_str());
    }
    header.extend([
        columns.chapter_number_column.as_str(),
        columns.chapter_title_column.as_str(),
        columns.module_title_column.as_str(),
        columns.source_module_id_column.as_str(),
        columns.destination_module_id_column.as_str(),
        columns.destination_workgroup_column.as_str(),
    ]);
    header
}

fn row(module: &Module, units: bool) -> Vec<String> {
    let mut row = Vec::with_capacity(8);
    if units {
        row.push(module.unit_number.clone());
        row.push(module.unit_title.clone());
    }
    row.extend([
        module.chapter_number.clone(),
        module.chapter_title.clone(),
        module.full_title(),
        module.source_id.clone(),
        module.destination_id.clone(),
        module.destination_workspace_url.clone(),
    ]);
    row
}
