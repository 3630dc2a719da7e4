use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::bookmap::Bookmap;
use crate::cli::{RunArgs, SummaryArgs};
use crate::collection;
use crate::copy;
use crate::error::{Error, Result};
use crate::manifest::{self, OutputKind};
use crate::model::{DEFAULT_WORKSPACE, FailureRecord, Failures, RunOptions, log_failure};
use crate::operator::{AssumeYesOperator, Operator, RunSummary, TerminalOperator};
use crate::service::{ContentService, HttpContentService};
use crate::settings::{Roles, Settings};

pub const PLACEHOLDER_PHASE: &str = "creating placeholder";
pub const PUBLISH_PHASE: &str = "publishing module";

/// Outcome of one run, reported to the operator at the end.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub book_title: String,
    /// Manifest written by the run, if any.
    pub output: Option<PathBuf>,
    pub failures: Vec<FailureRecord>,
    /// A fatal error stopped the run early.
    pub aborted: bool,
    /// The operator declined at the confirmation prompt.
    pub cancelled: bool,
}

impl RunReport {
    pub fn log(&self) {
        if let Some(output) = &self.output {
            tracing::info!("See output: {}", output.display());
        }
        for failure in &self.failures {
            tracing::error!("Failed {} - {}", failure.phase, failure.entity);
        }
        tracing::info!("------- Process completed --------");
    }
}

/// One run over a bookmap: the phases, in order, against one service.
pub struct Migration<'a> {
    service: &'a dyn ContentService,
    options: &'a RunOptions,
    source_server: &'a str,
    roles: &'a Roles,
    bookmap: &'a mut Bookmap,
    failures: Failures,
    output: Option<PathBuf>,
}

impl<'a> Migration<'a> {
    pub fn new(
        service: &'a dyn ContentService,
        options: &'a RunOptions,
        source_server: &'a str,
        roles: &'a Roles,
        bookmap: &'a mut Bookmap,
    ) -> Self {
        Self {
            service,
            options,
            source_server,
            roles,
            bookmap,
            failures: Failures::default(),
            output: None,
        }
    }

    /// Runs every enabled phase. A fatal error stops the remaining phases and
    /// leaves an `_error` manifest behind.
    pub fn run(mut self) -> RunReport {
        tracing::debug!("beginning processing");
        let aborted = match self.execute() {
            Ok(()) => false,
            Err(err) => {
                log_failure(&err, "run aborted");
                match manifest::save(self.bookmap, self.options.units, OutputKind::Error) {
                    Ok(path) => self.output = Some(path),
                    Err(save_err) => {
                        tracing::error!(error = %format!("{save_err:#}"), "save error manifest");
                    }
                }
                true
            }
        };

        RunReport {
            book_title: self.bookmap.book_title.clone(),
            output: self.output,
            failures: self.failures.into_records(),
            aborted,
            cancelled: false,
        }
    }

    fn execute(&mut self) -> Result<()> {
        let options = self.options;
        if options.creates_placeholders() {
            self.create_placeholders()?;
            let output = manifest::save(self.bookmap, options.units, OutputKind::Output)?;
            self.output = Some(output);
            tracing::debug!("finished creating placeholders, output has been saved");
        }
        if options.copy {
            copy::copy_content(
                self.service,
                self.bookmap,
                options,
                self.source_server,
                self.roles,
                &mut self.failures,
            )?;
            tracing::debug!("finished copying content");
        }
        if options.accept_roles && !options.dry_run {
            copy::accept_roles(self.service, self.roles, &mut self.failures)?;
            tracing::debug!("finished accepting roles");
        }
        if options.collections {
            collection::assemble(self.service, self.bookmap, options, &mut self.failures)?;
            tracing::debug!("finished creating and populating the collection");
        }
        if options.publish {
            self.publish_modules()?;
            tracing::debug!("finished publishing modules");
        }
        Ok(())
    }

    fn create_placeholders(&mut self) -> Result<()> {
        let options = self.options;
        if options.workgroups {
            tracing::info!("-------- Creating workgroups ------------------------");
            self.create_workgroups()?;
        }

        tracing::info!("-------- Creating modules -------------------------------");
        for idx in self.bookmap.active_module_indices() {
            let chapter = self.bookmap.modules[idx].chapter_number.clone();
            let workgroup = if options.workgroups {
                let wg = self.bookmap.workgroup_index(&chapter).ok_or_else(|| {
                    Error::Unrecoverable(format!("chapter {chapter} has no workgroup"))
                })?;
                Some(wg)
            } else {
                None
            };
            let workspace = match workgroup {
                Some(wg) => self.bookmap.workgroups[wg].url.clone(),
                None => DEFAULT_WORKSPACE.to_owned(),
            };

            let module = &mut self.bookmap.modules[idx];
            let placed = if options.dry_run {
                tracing::info!(module = %module.full_title(), "dry run: would create module");
                Ok(None)
            } else {
                tracing::info!(module = %module.full_title(), workspace = %workspace, "creating module");
                self.service
                    .create_and_publish_module(&module.title, &workspace)
                    .map(Some)
            };

            match placed {
                Ok(remote) => {
                    if let Some(remote) = remote {
                        module.destination_id = remote.id;
                        module.destination_workspace_url = remote.workspace_url;
                    }
                    let unit_number = module.unit_number.clone();
                    if let Some(wg) = workgroup {
                        self.bookmap.workgroups[wg].add_module(idx, &unit_number);
                    }
                }
                Err(err) => {
                    module.valid = false;
                    self.failures
                        .absorb(module.full_title(), PLACEHOLDER_PHASE, err)?;
                }
            }
        }
        Ok(())
    }

    fn create_workgroups(&mut self) -> Result<()> {
        let workgroups = self
            .bookmap
            .workgroups
            .iter()
            .filter(|workgroup| self.bookmap.is_active_chapter(&workgroup.chapter_number))
            .map(|workgroup| (workgroup.chapter_number.clone(), workgroup.title.clone()))
            .collect::<Vec<_>>();

        for (chapter, title) in workgroups {
            if self.options.dry_run {
                tracing::info!(workgroup = %title, "dry run: would create workgroup");
                continue;
            }

            match self.service.create_workgroup(&title) {
                Ok(remote) => {
                    if let Some(wg) = self.bookmap.workgroup_index(&chapter) {
                        let workgroup = &mut self.bookmap.workgroups[wg];
                        tracing::info!(workgroup = %title, id = %remote.id, "created workgroup");
                        workgroup.id = remote.id;
                        workgroup.url = remote.url;
                    }
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    log_failure(&err, &format!("create workgroup {title}"));
                    tracing::error!(
                        "Workgroup {title} failed to be created, skipping chapter {chapter}"
                    );
                    for module in self.bookmap.drop_chapter(&chapter) {
                        self.failures.push(module, PLACEHOLDER_PHASE);
                    }
                }
            }
        }
        Ok(())
    }

    fn publish_modules(&mut self) -> Result<()> {
        for idx in self.bookmap.active_module_indices() {
            let module = &mut self.bookmap.modules[idx];
            tracing::info!(
                "Publishing module: {} - {}",
                module.destination_id,
                module.full_title()
            );
            if self.options.dry_run {
                continue;
            }
            if let Err(err) = self.service.publish_module(&module.destination_url()) {
                module.valid = false;
                self.failures.absorb(module.full_title(), PUBLISH_PHASE, err)?;
            }
        }
        Ok(())
    }
}

/// Confirms with the operator, then migrates `input` with `service`.
pub fn migrate(
    settings: &Settings,
    bookmap: &mut Bookmap,
    options: &RunOptions,
    service: &dyn ContentService,
    operator: &mut dyn Operator,
) -> anyhow::Result<RunReport> {
    let summary = RunSummary::new(settings, bookmap, options);
    if !operator.confirm(&summary).context("confirm run")? {
        tracing::info!("run cancelled by operator");
        return Ok(RunReport {
            book_title: bookmap.book_title.clone(),
            cancelled: true,
            ..RunReport::default()
        });
    }

    let report = Migration::new(
        service,
        options,
        &settings.source_server,
        &settings.roles,
        bookmap,
    )
    .run();
    report.log();
    operator.notify_completed(&report.book_title);
    Ok(report)
}

/// `content-copy run`
pub fn run(args: RunArgs) -> anyhow::Result<RunReport> {
    let settings = Settings::load(&args.input.settings).context("load settings")?;
    crate::logging::init(Some(&settings.logfile)).context("init logging")?;
    tracing::debug!(?args, "parsed cli");

    let mut options = args.phases.to_options();
    options.validate()?;
    let mut bookmap = Bookmap::load(&args.input.manifest, &settings.columns, &mut options)
        .context("load bookmap")?;
    tracing::debug!("bookmap has been created");

    let service = HttpContentService::new(
        &settings.destination_server,
        &settings.destination_credentials,
        Duration::from_secs(args.timeout_secs),
    )?;

    let mut operator: Box<dyn Operator> = if args.yes {
        Box::new(AssumeYesOperator)
    } else {
        Box::new(TerminalOperator::stdio())
    };
    migrate(
        &settings,
        &mut bookmap,
        &options,
        &service,
        operator.as_mut(),
    )
}

/// `content-copy summary`: what `run` would do, without contacting a server.
pub fn summary(args: SummaryArgs) -> anyhow::Result<()> {
    let settings = Settings::load(&args.input.settings).context("load settings")?;
    crate::logging::init(None).context("init logging")?;
    tracing::debug!(?args, "parsed cli");

    let mut options = args.phases.to_options();
    let bookmap = Bookmap::load(&args.input.manifest, &settings.columns, &mut options)
        .context("load bookmap")?;
    print!("{}", RunSummary::new(&settings, &bookmap, &options));
    Ok(())
}
