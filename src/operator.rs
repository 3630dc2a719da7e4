use std::fmt;
use std::io::{self, BufRead, Write};

use anyhow::Context as _;

use crate::bookmap::Bookmap;
use crate::model::{RunOptions, is_blank};
use crate::settings::{Roles, Settings};

/// What a run is about to do, shown to the operator before anything happens.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source_server: String,
    pub destination_server: String,
    pub user: String,
    pub book_title: String,
    pub chapters: Vec<String>,
    pub module_count: usize,
    pub options: RunOptions,
    pub roles: Roles,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn new(settings: &Settings, bookmap: &Bookmap, options: &RunOptions) -> Self {
        let warnings = if options.copy {
            missing_source_warnings(bookmap)
        } else {
            Vec::new()
        };
        Self {
            source_server: settings.source_server.clone(),
            destination_server: settings.destination_server.clone(),
            user: settings.destination_user().to_owned(),
            book_title: bookmap.book_title.clone(),
            chapters: bookmap.chapters.clone(),
            module_count: bookmap.module_count_in_active_chapters(),
            options: options.clone(),
            roles: settings.roles.clone(),
            warnings,
        }
    }

    /// One line per entry, in display order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let options = &self.options;
        let mut lines = vec![
            format!("Source: {}", self.source_server),
            format!("Destination: {}", self.destination_server),
            format!("User: {}", self.user),
            format!("Content: {}", self.book_title),
            format!("Which Chapters: {}", self.chapters.join(", ")),
            format!("Number of Modules: {}", self.module_count),
            format!("Create placeholders? {}", options.creates_placeholders()),
        ];
        if options.modules {
            lines.push(format!("Create workgroups? {}", options.workgroups));
        }
        lines.push(format!("Copy content? {}", options.copy));
        if options.copy {
            lines.push(format!("Edit roles? {}", options.roles));
        }
        if options.accept_roles {
            lines.push(format!("Accept roles? {}", options.accept_roles));
        }
        if options.roles || options.accept_roles {
            lines.push(format!("Authors: {}", self.roles.authors.join(", ")));
            lines.push(format!("Maintainers: {}", self.roles.maintainers.join(", ")));
            lines.push(format!("Rightsholders: {}", self.roles.rightsholders.join(", ")));
        }
        lines.push(format!("Create collections? {}", options.collections));
        if options.collections {
            lines.push(format!("Units? {}", options.units));
            lines.push(format!("Publish collection? {}", options.publish_collection));
        }
        lines.push(format!("Publish content? {}", options.publish));
        if options.dry_run {
            lines.push("NOTE: DRY RUN".to_owned());
        }
        lines
    }

    pub fn log(&self) {
        tracing::info!("-------- Summary ---------------------------------------");
        for warning in &self.warnings {
            tracing::warn!("{warning}");
        }
        for line in self.lines() {
            tracing::info!("{line}");
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

fn missing_source_warnings(bookmap: &Bookmap) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut previous: Option<&str> = None;
    for module in &bookmap.modules {
        if bookmap.is_active_chapter(&module.chapter_number) && is_blank(&module.source_id) {
            let after = previous.map_or_else(
                || "it is the first module".to_owned(),
                |title| format!("the module after [{title}]"),
            );
            warnings.push(format!(
                "Input file has missing source module ID for module [{}] - {after}.",
                module.title
            ));
        }
        previous = Some(module.title.as_str());
    }
    warnings
}

/// The person running the tool: confirms the run and hears when it is over.
pub trait Operator {
    /// Presents the summary; `Ok(false)` cancels the run.
    fn confirm(&mut self, summary: &RunSummary) -> anyhow::Result<bool>;
    fn notify_completed(&mut self, book_title: &str);
}

/// Asks on a terminal: `1` proceeds, `2` (or end of input) cancels.
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
}

impl TerminalOperator<io::StdinLock<'static>, io::Stderr> {
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn confirm(&mut self, summary: &RunSummary) -> anyhow::Result<bool> {
        summary.log();
        loop {
            write!(
                self.output,
                "Please verify this information. If there are warnings, consider checking your data.\n\
                 Enter:\n    1 - Proceed\n    2 - Cancel\n>>> "
            )
            .context("write confirmation prompt")?;
            self.output.flush().context("flush confirmation prompt")?;

            let mut answer = String::new();
            let read = self
                .input
                .read_line(&mut answer)
                .context("read confirmation answer")?;
            if read == 0 {
                return Ok(false);
            }
            match answer.trim() {
                "1" => return Ok(true),
                "2" => return Ok(false),
                _ => {}
            }
        }
    }

    fn notify_completed(&mut self, book_title: &str) {
        let _ = writeln!(
            self.output,
            "Content Copy for {book_title} has completed, see the log for results."
        );
    }
}

/// Proceeds without asking (`--yes`). The summary still goes to the log.
#[derive(Debug, Default)]
pub struct AssumeYesOperator;

impl Operator for AssumeYesOperator {
    fn confirm(&mut self, summary: &RunSummary) -> anyhow::Result<bool> {
        summary.log();
        Ok(true)
    }

    fn notify_completed(&mut self, book_title: &str) {
        tracing::info!(book = %book_title, "content copy completed");
    }
}
