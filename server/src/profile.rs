use std::sync::Arc;

use log::{debug, o, warn};
use uuid::Uuid;

use crate::environment::Environment;
use crate::errors::DirectoryError;
use crate::media::MediaKind;
use crate::registrant::{Registrant, RegistrantPatch};
use crate::registration::{upload, Attachments};
use crate::saga::CompensationLog;
use crate::validation::validate_patch;

/// Applies a patch to a registrant, replacing any attached files. New
/// files are saved before the record points at them; the files they
/// replace are removed afterwards.
pub async fn update_profile(
    environment: &Environment,
    id: &Uuid,
    mut patch: RegistrantPatch,
    attachments: Attachments,
) -> Result<Registrant, DirectoryError> {
    validate_patch(&patch)?;
    attachments.validate(environment.config.max_file_bytes)?;

    let logger = Arc::new(environment.logger.new(o!("id" => id.to_string())));

    let existing = environment
        .db
        .retrieve(id)
        .await?
        .ok_or(DirectoryError::NonExistentId(*id))?;

    let mut log = CompensationLog::new(
        logger.clone(),
        environment.auth.clone(),
        environment.media.clone(),
    );

    let result = async {
        patch.photo = upload(environment, MediaKind::Photo, attachments.photo, &mut log).await?;
        patch.document =
            upload(environment, MediaKind::Document, attachments.document, &mut log).await?;

        debug!(logger, "Writing patch to database...");
        environment.db.update(id, patch).await
    }
    .await;

    match result {
        Ok(updated) => {
            log.commit();

            let replaced = [
                (existing.photo, updated.photo.as_ref()),
                (existing.document, updated.document.as_ref()),
            ];

            for (old, new) in replaced.iter() {
                if let Some(old) = old {
                    if Some(old) != *new {
                        remove_media(environment, &logger, old).await;
                    }
                }
            }

            Ok(updated)
        }
        Err(e) => {
            log.unwind().await;
            Err(e)
        }
    }
}

/// Deletes a registrant and then, best effort, its stored files.
pub async fn delete_registrant(environment: &Environment, id: &Uuid) -> Result<(), DirectoryError> {
    let logger = Arc::new(environment.logger.new(o!("id" => id.to_string())));

    debug!(logger, "Deleting registrant...");
    let deleted = environment.db.delete(id).await?;

    for path in deleted.photo.iter().chain(deleted.document.iter()) {
        remove_media(environment, &logger, path).await;
    }

    Ok(())
}

async fn remove_media(environment: &Environment, logger: &Arc<log::Logger>, path: &str) {
    debug!(logger, "Removing file..."; "path" => path);

    if let Err(e) = environment.media.delete(path).await {
        warn!(logger, "Failed to remove file"; "path" => path, "error" => %e);
    }
}
