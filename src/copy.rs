use crate::bookmap::Bookmap;
use crate::error::{Error, Result};
use crate::model::{Failures, RunOptions, is_blank};
use crate::service::{ContentService, CopyRequest};
use crate::settings::Roles;

pub const COPY_PHASE: &str = "copying content";
pub const ROLES_PHASE: &str = "editing roles";

/// Copies source content into every valid placeholder of the active
/// chapters, then applies role edits when enabled.
pub fn copy_content(
    service: &dyn ContentService,
    bookmap: &mut Bookmap,
    options: &RunOptions,
    source_server: &str,
    roles: &Roles,
    failures: &mut Failures,
) -> Result<()> {
    for idx in bookmap.active_module_indices() {
        let module = &mut bookmap.modules[idx];
        let title = module.full_title();

        if is_blank(&module.source_id) {
            module.valid = false;
            failures.absorb(title, COPY_PHASE, Error::domain("no source module id"))?;
            continue;
        }
        if options.dry_run {
            tracing::info!(module = %title, source_id = %module.source_id, "dry run: would copy");
            continue;
        }
        if is_blank(&module.destination_id) {
            module.valid = false;
            failures.absorb(
                title,
                COPY_PHASE,
                Error::domain("no destination placeholder to copy into"),
            )?;
            continue;
        }

        tracing::info!(
            module = %title,
            source_id = %module.source_id,
            destination_id = %module.destination_id,
            "copying module"
        );
        let request = CopyRequest {
            source_server,
            source_id: &module.source_id,
            source_workspace_url: &module.source_workspace_url,
            destination_workspace_url: &module.destination_workspace_url,
            destination_id: &module.destination_id,
        };
        if let Err(err) = service.copy_module(&request) {
            module.valid = false;
            failures.absorb(title, COPY_PHASE, err)?;
            continue;
        }

        if options.roles
            && let Err(err) = service.edit_roles(&module.destination_url(), roles)
        {
            module.valid = false;
            failures.absorb(title, ROLES_PHASE, err)?;
        }
    }
    Ok(())
}

/// Accepts pending collaboration requests on the destination in one call.
pub fn accept_roles(
    service: &dyn ContentService,
    roles: &Roles,
    failures: &mut Failures,
) -> Result<()> {
    match service.accept_pending_roles(roles) {
        Ok(accepted) => {
            tracing::info!(accepted, "accepted pending role requests");
            Ok(())
        }
        Err(err) => failures.absorb("pending role requests", "accepting roles", err),
    }
}
