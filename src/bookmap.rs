use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use csv::StringRecord;
use serde::{Deserialize, Deserializer};

use crate::model::{Module, RunOptions, Workgroup, is_blank, split_section_number};

/// Names of the manifest columns each module field is read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColumnConfig {
    pub chapter_number_column: String,
    pub chapter_title_column: String,
    pub module_title_column: String,
    #[serde(rename = "source_module_ID_column")]
    pub source_module_id_column: String,
    #[serde(default)]
    pub source_workgroup_column: String,
    #[serde(rename = "destination_module_ID_column")]
    pub destination_module_id_column: String,
    pub destination_workgroup_column: String,
    pub unit_number_column: String,
    pub unit_title_column: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub strip_section_numbers: bool,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Text(text) => {
            let text = text.trim().to_ascii_lowercase();
            text == "yes" || text == "true"
        }
    })
}

struct ColumnBinding {
    column: fn(&ColumnConfig) -> &str,
    field: fn(&mut Module) -> &mut String,
}

/// Optional per-row columns. A column missing from the header (or a short
/// row) leaves the field empty.
const MODULE_BINDINGS: &[ColumnBinding] = &[
    ColumnBinding {
        column: |c| c.source_module_id_column.as_str(),
        field: |m| &mut m.source_id,
    },
    ColumnBinding {
        column: |c| c.source_workgroup_column.as_str(),
        field: |m| &mut m.source_workspace_url,
    },
    ColumnBinding {
        column: |c| c.destination_module_id_column.as_str(),
        field: |m| &mut m.destination_id,
    },
    ColumnBinding {
        column: |c| c.destination_workgroup_column.as_str(),
        field: |m| &mut m.destination_workspace_url,
    },
    ColumnBinding {
        column: |c| c.chapter_number_column.as_str(),
        field: |m| &mut m.chapter_number,
    },
    ColumnBinding {
        column: |c| c.chapter_title_column.as_str(),
        field: |m| &mut m.chapter_title,
    },
    ColumnBinding {
        column: |c| c.unit_number_column.as_str(),
        field: |m| &mut m.unit_number,
    },
    ColumnBinding {
        column: |c| c.unit_title_column.as_str(),
        field: |m| &mut m.unit_title,
    },
];

/// The parsed manifest of one run plus the chapters it covers.
#[derive(Debug, Clone)]
pub struct Bookmap {
    pub path: PathBuf,
    pub book_title: String,
    pub delimiter: u8,
    pub columns: ColumnConfig,
    /// Active chapter set. Every phase filters against it.
    pub chapters: Vec<String>,
    pub modules: Vec<Module>,
    pub workgroups: Vec<Workgroup>,
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Bookmap {
    /// Reads the manifest at `path` and resolves the chapter set into
    /// `options.chapters`.
    pub fn load(
        path: &Path,
        columns: &ColumnConfig,
        options: &mut RunOptions,
    ) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest: {}", path.display()))?;
        Self::parse(path, &contents, columns, options)
    }

    pub fn parse(
        path: &Path,
        contents: &str,
        columns: &ColumnConfig,
        options: &mut RunOptions,
    ) -> anyhow::Result<Self> {
        let delimiter = delimiter_for(path);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(contents.as_bytes());
        let headers = reader
            .headers()
            .context("read manifest header")?
            .clone();
        if !headers
            .iter()
            .any(|header| header == columns.module_title_column)
        {
            anyhow::bail!(
                "manifest {} has no module title column `{}`",
                path.display(),
                columns.module_title_column
            );
        }
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .context("read manifest rows")?;

        let mut bookmap = Self {
            path: path.to_owned(),
            book_title: book_title_from_path(path),
            delimiter,
            columns: columns.clone(),
            chapters: Vec::new(),
            modules: Vec::new(),
            workgroups: Vec::new(),
            headers,
            rows,
        };

        bookmap.chapters = resolve_chapters(
            &options.chapters,
            &options.exclude,
            bookmap.discovered_chapters(),
        );
        options.chapters = bookmap.chapters.clone();

        let modules = bookmap
            .rows
            .iter()
            .map(|row| bookmap.module_from_row(row))
            .collect::<Vec<_>>();
        bookmap.modules = modules;

        if options.workgroups {
            let workgroups = bookmap
                .chapters
                .iter()
                .map(|chapter| bookmap.workgroup_for(chapter))
                .collect::<Vec<_>>();
            bookmap.workgroups = workgroups;
        }

        tracing::debug!(
            book = %bookmap.book_title,
            modules = bookmap.modules.len(),
            workgroups = bookmap.workgroups.len(),
            chapters = ?bookmap.chapters,
            "parsed bookmap"
        );
        Ok(bookmap)
    }

    #[must_use]
    pub fn is_active_chapter(&self, chapter: &str) -> bool {
        self.chapters.iter().any(|c| c == chapter)
    }

    /// Indices of modules that are still valid and in the active chapter set.
    #[must_use]
    pub fn active_module_indices(&self) -> Vec<usize> {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, module)| module.valid && self.is_active_chapter(&module.chapter_number))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Number of modules (valid or not) whose chapter is in the active set.
    #[must_use]
    pub fn module_count_in_active_chapters(&self) -> usize {
        self.modules
            .iter()
            .filter(|module| self.is_active_chapter(&module.chapter_number))
            .count()
    }

    #[must_use]
    pub fn workgroup_index(&self, chapter: &str) -> Option<usize> {
        self.workgroups
            .iter()
            .position(|workgroup| workgroup.chapter_number == chapter)
    }

    /// Removes `chapter` from the run: its workgroup goes away and every
    /// module in it is invalidated. Returns the full titles of those modules.
    pub fn drop_chapter(&mut self, chapter: &str) -> Vec<String> {
        self.chapters.retain(|c| c != chapter);
        self.workgroups
            .retain(|workgroup| workgroup.chapter_number != chapter);

        let mut invalidated = Vec::new();
        for module in &mut self.modules {
            if module.chapter_number == chapter {
                module.valid = false;
                invalidated.push(module.full_title());
            }
        }
        invalidated
    }

    fn field<'r>(&self, row: &'r StringRecord, column: &str) -> Option<&'r str> {
        if column.is_empty() {
            return None;
        }
        let idx = self.headers.iter().position(|header| header == column)?;
        row.get(idx)
    }

    fn discovered_chapters(&self) -> Vec<String> {
        let mut chapters: Vec<String> = Vec::new();
        for row in &self.rows {
            let chapter = self
                .field(row, &self.columns.chapter_number_column)
                .unwrap_or_default();
            if !chapters.iter().any(|c| c == chapter) {
                chapters.push(chapter.to_owned());
            }
        }
        chapters
    }

    fn module_from_row(&self, row: &StringRecord) -> Module {
        let raw_title = self
            .field(row, &self.columns.module_title_column)
            .unwrap_or_default();
        let (section_number, title) = if self.columns.strip_section_numbers {
            split_section_number(raw_title)
        } else {
            (String::new(), raw_title.to_owned())
        };

        let mut module = Module::new(title, section_number);
        for binding in MODULE_BINDINGS {
            if let Some(value) = self.field(row, (binding.column)(&self.columns)) {
                *(binding.field)(&mut module) = value.to_owned();
            }
        }
        module
    }

    fn workgroup_for(&self, chapter: &str) -> Workgroup {
        let found = self.rows.iter().find(|row| {
            self.field(row, &self.columns.chapter_number_column) == Some(chapter)
        });
        let (number_and_title, chapter_title) = match found {
            Some(row) => {
                let title = self
                    .field(row, &self.columns.chapter_title_column)
                    .unwrap_or_default();
                (format!("{chapter} {title}"), title.to_owned())
            }
            None => (" ".to_owned(), String::new()),
        };
        Workgroup::new(
            format!("{} - {number_and_title}", self.book_title),
            chapter,
            chapter_title,
        )
    }
}

/// Explicit chapters if any, else every discovered chapter, minus the
/// excluded ones. Order follows whichever list supplied the chapters; repeats
/// keep their first position.
#[must_use]
pub fn resolve_chapters(
    include: &[String],
    exclude: &[String],
    discovered: Vec<String>,
) -> Vec<String> {
    let mut chapters = if include.is_empty() {
        discovered
    } else {
        include.to_vec()
    };
    let mut seen = HashSet::new();
    chapters.retain(|chapter| !exclude.contains(chapter) && seen.insert(chapter.clone()));
    chapters
}

#[must_use]
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

/// `Physics.csv` → `Physics`. Files that are neither `.csv` nor `.tsv` keep
/// their whole name.
#[must_use]
pub fn book_title_from_path(path: &Path) -> String {
    let stem_applies = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("csv" | "tsv")
    );
    let name = if stem_applies {
        path.file_stem()
    } else {
        path.file_name()
    };
    name.map(|n| n.to_string_lossy().to_string())
        .filter(|n| !is_blank(n))
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn columns() -> ColumnConfig {
        ColumnConfig {
            chapter_number_column: "Chapter Number".to_owned(),
            chapter_title_column: "Chapter Title".to_owned(),
            module_title_column: "Module Title".to_owned(),
            source_module_id_column: "Module ID".to_owned(),
            source_workgroup_column: String::new(),
            destination_module_id_column: "Destination Module ID".to_owned(),
            destination_workgroup_column: "Destination Workgroup".to_owned(),
            unit_number_column: "Unit Number".to_owned(),
            unit_title_column: "Unit Title".to_owned(),
            strip_section_numbers: true,
        }
    }

    const PHYSICS: &str = "\
Unit Number,Unit Title,Chapter Number,Chapter Title,Module Title,Module ID
1,Mechanics,1,Motion,1.1 Speed,m1
1,Mechanics,1,Motion,1.2 Velocity,m2
1,Mechanics,2,Forces,2.1 Newton,m3
APPENDIX,,9,Tables,Constants,m4
";

    fn parse(contents: &str, options: &mut RunOptions) -> anyhow::Result<Bookmap> {
        Bookmap::parse(Path::new("/books/Physics.csv"), contents, &columns(), options)
    }

    #[test]
    fn rows_become_modules_with_stripped_section_numbers() -> anyhow::Result<()> {
        let mut options = RunOptions::default();
        let bookmap = parse(PHYSICS, &mut options)?;

        assert_eq!(bookmap.book_title, "Physics");
        assert_eq!(bookmap.delimiter, b',');
        assert_eq!(bookmap.modules.len(), 4);

        let first = &bookmap.modules[0];
        assert_eq!(first.section_number, "1.1");
        assert_eq!(first.title, "Speed");
        assert_eq!(first.source_id, "m1");
        assert_eq!(first.chapter_number, "1");
        assert_eq!(first.chapter_title, "Motion");
        assert_eq!(first.unit_number, "1");
        assert_eq!(first.unit_title, "Mechanics");
        assert!(first.valid);

        let appendix = &bookmap.modules[3];
        assert_eq!(appendix.section_number, "");
        assert_eq!(appendix.title, "Constants");
        assert_eq!(appendix.unit_number, "APPENDIX");
        Ok(())
    }

    #[test]
    fn missing_optional_columns_leave_fields_empty() -> anyhow::Result<()> {
        let mut options = RunOptions::default();
        let bookmap = parse("Module Title,Chapter Number\nIntro,1\nShort\n", &mut options)?;

        assert_eq!(bookmap.modules.len(), 2);
        assert_eq!(bookmap.modules[0].source_id, "");
        assert_eq!(bookmap.modules[0].destination_workspace_url, "");
        assert_eq!(bookmap.modules[1].chapter_number, "");
        assert_eq!(bookmap.chapters, vec!["1".to_owned(), String::new()]);
        Ok(())
    }

    #[test]
    fn missing_title_column_is_an_error() {
        let mut options = RunOptions::default();
        let err = parse("Chapter Number,Module ID\n1,m1\n", &mut options)
            .expect_err("title column is required");
        assert!(err.to_string().contains("Module Title"));
    }

    #[test]
    fn stripping_disabled_keeps_titles_whole() -> anyhow::Result<()> {
        let mut columns = columns();
        columns.strip_section_numbers = false;
        let mut options = RunOptions::default();
        let bookmap = Bookmap::parse(Path::new("Physics.csv"), PHYSICS, &columns, &mut options)?;
        assert_eq!(bookmap.modules[0].title, "1.1 Speed");
        assert_eq!(bookmap.modules[0].section_number, "");
        Ok(())
    }

    #[test]
    fn chapters_are_discovered_in_file_order_then_excluded() -> anyhow::Result<()> {
        let mut options = RunOptions {
            exclude: vec!["9".to_owned()],
            ..RunOptions::default()
        };
        let bookmap = parse(PHYSICS, &mut options)?;
        assert_eq!(bookmap.chapters, vec!["1".to_owned(), "2".to_owned()]);
        assert_eq!(options.chapters, bookmap.chapters);
        Ok(())
    }

    #[test]
    fn explicit_chapters_keep_their_order() -> anyhow::Result<()> {
        let mut options = RunOptions {
            chapters: vec!["9".to_owned(), "2".to_owned(), "1".to_owned()],
            exclude: vec!["2".to_owned()],
            ..RunOptions::default()
        };
        let bookmap = parse(PHYSICS, &mut options)?;
        assert_eq!(bookmap.chapters, vec!["9".to_owned(), "1".to_owned()]);
        assert_eq!(bookmap.module_count_in_active_chapters(), 3);
        Ok(())
    }

    #[test]
    fn resolve_chapters_applies_include_then_exclude() {
        let discovered = vec!["1".to_owned(), "2".to_owned(), "3".to_owned()];
        assert_eq!(
            resolve_chapters(&[], &["2".to_owned()], discovered.clone()),
            vec!["1".to_owned(), "3".to_owned()]
        );
        assert_eq!(
            resolve_chapters(&["3".to_owned(), "1".to_owned()], &[], discovered.clone()),
            vec!["3".to_owned(), "1".to_owned()]
        );
        assert!(resolve_chapters(&[], &discovered, discovered.clone()).is_empty());
        let repeated = ["2", "1", "2", "1"].map(str::to_owned);
        assert_eq!(
            resolve_chapters(&repeated, &[], discovered.clone()),
            vec!["2".to_owned(), "1".to_owned()]
        );
    }

    #[test]
    fn workgroups_are_synthesized_per_active_chapter() -> anyhow::Result<()> {
        let mut options = RunOptions {
            workgroups: true,
            chapters: vec!["2".to_owned(), "7".to_owned()],
            ..RunOptions::default()
        };
        let bookmap = parse(PHYSICS, &mut options)?;

        assert_eq!(bookmap.workgroups.len(), 2);
        assert_eq!(bookmap.workgroups[0].title, "Physics - 2 Forces");
        assert_eq!(bookmap.workgroups[0].chapter_title, "Forces");
        assert_eq!(bookmap.workgroups[0].chapter_number, "2");
        // No row for chapter 7: placeholder title, no crash.
        assert_eq!(bookmap.workgroups[1].title, "Physics -  ");
        assert_eq!(bookmap.workgroups[1].chapter_title, "");
        Ok(())
    }

    #[test]
    fn no_workgroups_unless_requested() -> anyhow::Result<()> {
        let mut options = RunOptions::default();
        let bookmap = parse(PHYSICS, &mut options)?;
        assert!(bookmap.workgroups.is_empty());
        Ok(())
    }

    #[test]
    fn drop_chapter_invalidates_its_modules() -> anyhow::Result<()> {
        let mut options = RunOptions {
            workgroups: true,
            ..RunOptions::default()
        };
        let mut bookmap = parse(PHYSICS, &mut options)?;

        let invalidated = bookmap.drop_chapter("1");
        assert_eq!(invalidated, vec!["1.1 Speed".to_owned(), "1.2 Velocity".to_owned()]);
        assert!(!bookmap.is_active_chapter("1"));
        assert!(bookmap.workgroup_index("1").is_none());
        assert_eq!(bookmap.active_module_indices(), vec![2, 3]);
        Ok(())
    }

    #[test]
    fn tsv_files_use_tabs() -> anyhow::Result<()> {
        let mut options = RunOptions::default();
        let bookmap = Bookmap::parse(
            Path::new("Biology.tsv"),
            "Module Title\tChapter Number\n1.1 Cells\t1\n",
            &columns(),
            &mut options,
        )?;
        assert_eq!(bookmap.delimiter, b'\t');
        assert_eq!(bookmap.book_title, "Biology");
        assert_eq!(bookmap.modules[0].title, "Cells");
        Ok(())
    }

    #[test]
    fn book_title_keeps_unknown_extensions() {
        assert_eq!(book_title_from_path(Path::new("/a/b/Chemistry.csv")), "Chemistry");
        assert_eq!(book_title_from_path(Path::new("copy.map")), "copy.map");
    }

    #[test]
    fn strip_flag_accepts_yes_true_and_booleans() -> anyhow::Result<()> {
        let base = serde_json::json!({
            "chapter_number_column": "Chapter Number",
            "chapter_title_column": "Chapter Title",
            "module_title_column": "Module Title",
            "source_module_ID_column": "Module ID",
            "destination_module_ID_column": "Destination Module ID",
            "destination_workgroup_column": "Destination Workgroup",
            "unit_number_column": "Unit Number",
            "unit_title_column": "Unit Title",
        });
        for (value, expected) in [
            (serde_json::json!("YES"), true),
            (serde_json::json!("True"), true),
            (serde_json::json!("no"), false),
            (serde_json::json!(true), true),
        ] {
            let mut raw = base.clone();
            raw["strip_section_numbers"] = value;
            let config: ColumnConfig = serde_json::from_value(raw)?;
            assert_eq!(config.strip_section_numbers, expected);
            assert_eq!(config.source_module_id_column, "Module ID");
            assert_eq!(config.source_workgroup_column, "");
        }
        Ok(())
    }
}
