use crate::error::Error;

/// Unit number marking appendix material that never nests under a unit.
pub const APPENDIX_UNIT: &str = "APPENDIX";

/// Chapter number of front matter, which always attaches to the book root.
pub const FRONT_MATTER_CHAPTER: &str = "0";

/// Workspace placeholders land in when workgroups are not created.
pub const DEFAULT_WORKSPACE: &str = "Members/";

/// Empty or whitespace-only values count as missing everywhere in the tool.
#[must_use]
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Splits a leading section number (`"3.2 Forces"` → `("3.2", "Forces")`).
///
/// Titles that do not start with a digit, or have nothing after the number,
/// are returned whole.
#[must_use]
pub fn split_section_number(title: &str) -> (String, String) {
    if title.starts_with(|c: char| c.is_ascii_digit())
        && let Some((number, rest)) = title.split_once(' ')
    {
        return (number.to_owned(), rest.to_owned());
    }
    (String::new(), title.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub title: String,
    pub section_number: String,
    pub source_workspace_url: String,
    pub source_id: String,
    pub destination_workspace_url: String,
    pub destination_id: String,
    pub chapter_number: String,
    pub chapter_title: String,
    pub unit_number: String,
    pub unit_title: String,
    pub valid: bool,
}

impl Module {
    pub fn new(title: impl Into<String>, section_number: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            section_number: section_number.into(),
            source_workspace_url: String::new(),
            source_id: String::new(),
            destination_workspace_url: String::new(),
            destination_id: String::new(),
            chapter_number: String::new(),
            chapter_title: String::new(),
            unit_number: String::new(),
            unit_title: String::new(),
            valid: true,
        }
    }

    #[must_use]
    pub fn full_title(&self) -> String {
        if is_blank(&self.section_number) {
            self.title.clone()
        } else {
            format!("{} {}", self.section_number, self.title)
        }
    }

    /// Address of the module inside its destination workspace.
    #[must_use]
    pub fn destination_url(&self) -> String {
        let workspace = self.destination_workspace_url.trim_end_matches('/');
        format!("{workspace}/{}/", self.destination_id)
    }
}

/// Destination-side container for the modules of one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workgroup {
    pub title: String,
    pub id: String,
    pub url: String,
    pub chapter_number: String,
    pub chapter_title: String,
    pub unit_number: String,
    /// Indices into [`crate::bookmap::Bookmap::modules`], in placement order.
    pub modules: Vec<usize>,
}

impl Workgroup {
    pub fn new(
        title: impl Into<String>,
        chapter_number: impl Into<String>,
        chapter_title: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            id: String::new(),
            url: String::new(),
            chapter_number: chapter_number.into(),
            chapter_title: chapter_title.into(),
            unit_number: String::new(),
            modules: Vec::new(),
        }
    }

    /// Attaches a placed module. The first member with a unit number decides
    /// the workgroup's unit.
    pub fn add_module(&mut self, index: usize, unit_number: &str) {
        self.modules.push(index);
        if is_blank(&self.unit_number) {
            self.unit_number = unit_number.to_owned();
        }
    }
}

/// Which phases a run performs, plus the chapter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub modules: bool,
    pub workgroups: bool,
    pub copy: bool,
    pub roles: bool,
    pub accept_roles: bool,
    pub collections: bool,
    pub units: bool,
    pub publish: bool,
    pub publish_collection: bool,
    pub dry_run: bool,
    pub chapters: Vec<String>,
    pub exclude: Vec<String>,
}

impl RunOptions {
    #[must_use]
    pub fn creates_placeholders(&self) -> bool {
        self.modules || self.workgroups
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let any_phase = self.creates_placeholders()
            || self.copy
            || self.accept_roles
            || self.collections
            || self.publish;
        if !any_phase {
            anyhow::bail!(
                "nothing to do: enable at least one of --modules, --workgroups, --copy, \
                 --accept-roles, --collection, --publish"
            );
        }
        if self.roles && !self.copy {
            anyhow::bail!("--roles only applies together with --copy");
        }
        if self.publish_collection && !self.collections {
            anyhow::bail!("--publish-collection requires --collection");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub entity: String,
    pub phase: String,
}

/// Ordered failure list shared by every phase of a run.
#[derive(Debug, Default)]
pub struct Failures {
    records: Vec<FailureRecord>,
}

impl Failures {
    pub fn push(&mut self, entity: impl Into<String>, phase: impl Into<String>) {
        self.records.push(FailureRecord {
            entity: entity.into(),
            phase: phase.into(),
        });
    }

    /// Logs `err` and records `entity` as failed in `phase`.
    pub fn record(&mut self, entity: impl Into<String>, phase: &str, err: &Error) {
        let entity = entity.into();
        log_failure(err, &format!("{phase} failed for {entity}"));
        self.push(entity, phase);
    }

    /// Records a per-entity failure, or hands it back when it must stop the
    /// whole run.
    pub fn absorb(
        &mut self,
        entity: impl Into<String>,
        phase: &str,
        err: Error,
    ) -> crate::error::Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        self.record(entity, phase, &err);
        Ok(())
    }

    #[must_use]
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<FailureRecord> {
        self.records
    }
}

/// Expected failures get one error line; anything else also gets its chain.
pub fn log_failure(err: &Error, message: &str) {
    if err.is_expected() {
        tracing::error!(error = %err, "{message}");
    } else {
        tracing::error!(error = %err, "{message} (unexpected error)");
        tracing::debug!(error = ?err, "unexpected error details");
    }
}
