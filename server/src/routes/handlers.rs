use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, o};
use uuid::Uuid;
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::auth::Identity;
use crate::environment::Environment;
use crate::errors::DirectoryError;
use crate::io::{parse_submission, Submission};
use crate::media::{relay_path, MediaKind};
use crate::moderation::{self, Confirmation};
use crate::profile;
use crate::registrant::{FullView, PublicView, Registrant, RegistrantPatch, Registration};
use crate::registration::{self, Attachments};
use crate::routes::{
    guard,
    query::{Credentials, FilterQuery, SearchQuery},
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::store::public_url;

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn register(environment: Environment, content: FormData) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::register(None), e);

        debug!(environment.logger, "Parsing submission...");
        let mut submission = parse_submission(content, environment.config.max_file_bytes)
            .await
            .map_err(error_handler)?;

        let metadata = submission
            .field("metadata")
            .ok_or(DirectoryError::PartsMissing)
            .map_err(error_handler)?;

        debug!(environment.logger, "Parsing registration metadata...");
        let registration: Registration = serde_json::from_str(metadata)
            .map_err(DirectoryError::MalformedMetadata)
            .map_err(error_handler)?;

        let attachments = take_attachments(&mut submission);

        let registrant = registration::register(&environment, registration, attachments)
            .await
            .map_err(error_handler)?;

        let id = registrant.id;
        debug!(environment.logger, "Sending response..."; "id" => id.to_string());

        with_header(
            with_status(json(&SuccessResponse::Created { id }), StatusCode::CREATED),
            "location",
            environment.urls.registrant(&id).as_str(),
        )
    }
}

pub async fn count(environment: Environment) -> RouteResult {
    timed! {
        let count = environment
            .db
            .count_all()
            .await
            .map_err(|e| Rejection::new(Context::count(), e))?;

        json(&SuccessResponse::Count { count })
    }
}

pub async fn search(environment: Environment, query: SearchQuery) -> RouteResult {
    timed! {
        let SearchQuery { q } = query;
        let error_handler = |e: DirectoryError| Rejection::new(Context::search(q.clone()), e);

        let found = match &q {
            Some(term) => {
                debug!(environment.logger, "Searching..."; "q" => term);

                Some(
                    environment
                        .db
                        .search_approved(term)
                        .await
                        .map_err(error_handler)?,
                )
            }
            None => None,
        };

        let registrants = found.as_deref().unwrap_or_default();
        let results = registrants
            .iter()
            .map(|r| public_view(&environment, r))
            .collect::<Result<Vec<_>, _>>()
            .map_err(error_handler)?;

        json(&SuccessResponse::Search {
            searched: found.is_some(),
            results,
        })
    }
}

pub async fn retrieve(
    environment: Environment,
    id: String,
    identity: Option<Identity>,
) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::retrieve(id.clone()), e);

        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Retrieving registrant..."; "id" => id.to_string());

        let registrant = environment
            .db
            .retrieve(&id)
            .await
            .map_err(error_handler)?
            .ok_or(DirectoryError::NonExistentId(id))
            .map_err(error_handler)?;

        let manager = identity.map_or(false, |identity| identity.can_manage(&id));

        if manager {
            json(&full_view(&environment, &registrant).map_err(error_handler)?)
        } else if registrant.approved {
            json(&public_view(&environment, &registrant).map_err(error_handler)?)
        } else {
            return Err(reject::custom(error_handler(DirectoryError::NonExistentId(id))));
        }
    }
}

pub async fn sign_in(environment: Environment, credentials: Credentials) -> RouteResult {
    timed! {
        let session = environment
            .auth
            .sign_in(&credentials.email, &credentials.password)
            .await
            .map_err(|e| Rejection::new(Context::session(), e))?;

        debug!(environment.logger, "Signed in"; "id" => session.id.to_string());

        json(&SuccessResponse::Session(&session))
    }
}

pub async fn caller(environment: Environment, identity: Option<Identity>) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::session(), e);

        let identity = guard::authenticated(identity).map_err(error_handler)?;
        let profile = environment
            .db
            .retrieve_profile(&identity.id)
            .await
            .map_err(error_handler)?;

        json(&SuccessResponse::Caller {
            id: identity.id,
            role: profile.role,
            username: profile.username,
        })
    }
}

pub async fn sign_out(environment: Environment, header: Option<String>) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::session(), e);

        let header = header
            .ok_or(DirectoryError::NotAuthenticated)
            .map_err(error_handler)?;
        let token = guard::bearer_token(&header).map_err(error_handler)?;

        environment.auth.sign_out(&token).await.map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn profile(environment: Environment, identity: Option<Identity>) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::profile(None), e);

        let identity = guard::authenticated(identity).map_err(error_handler)?;
        let registrant = retrieve_existing(&environment, &identity.id)
            .await
            .map_err(error_handler)?;

        json(&full_view(&environment, &registrant).map_err(error_handler)?)
    }
}

pub async fn update_profile(
    environment: Environment,
    identity: Option<Identity>,
    content: FormData,
) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::profile(None), e);

        let identity = guard::authenticated(identity).map_err(error_handler)?;

        patch_registrant(&environment, &identity.id, content)
            .await
            .map_err(error_handler)?
    }
}

pub async fn panel(
    environment: Environment,
    identity: Option<Identity>,
    query: FilterQuery,
) -> RouteResult {
    timed! {
        let FilterQuery { filter } = query;
        let error_handler = |e: DirectoryError| Rejection::new(Context::panel(filter.clone()), e);

        let admin = guard::administrator(identity).map_err(error_handler)?;
        debug!(environment.logger, "Loading panel..."; "by" => admin.id.to_string());

        let panel = moderation::panel(&environment, filter.as_deref())
            .await
            .map_err(error_handler)?;

        let registrants = panel
            .registrants
            .iter()
            .map(|r| full_view(&environment, r))
            .collect::<Result<Vec<_>, _>>()
            .map_err(error_handler)?;

        json(&SuccessResponse::Panel {
            counts: panel.counts,
            registrants,
        })
    }
}

pub async fn admin_retrieve(
    environment: Environment,
    id: String,
    identity: Option<Identity>,
) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::retrieve(id.clone()), e);

        let admin = guard::administrator(identity).map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Retrieving registrant..."; "id" => id.to_string(), "by" => admin.id.to_string());

        let registrant = retrieve_existing(&environment, &id)
            .await
            .map_err(error_handler)?;

        json(&full_view(&environment, &registrant).map_err(error_handler)?)
    }
}

pub async fn admin_update(
    environment: Environment,
    id: String,
    identity: Option<Identity>,
    content: FormData,
) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::profile(Some(id.clone())), e);

        let admin = guard::administrator(identity).map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;
        debug!(environment.logger, "Editing registrant..."; "id" => id.to_string(), "by" => admin.id.to_string());

        patch_registrant(&environment, &id, content)
            .await
            .map_err(error_handler)?
    }
}

pub async fn approve(
    environment: Environment,
    id: String,
    identity: Option<Identity>,
    confirmation: Confirmation,
) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::approve(id.clone()), e);

        let identity = guard::administrator(identity).map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;
        confirmation.require().map_err(error_handler)?;

        debug!(environment.logger, "Approving registrant..."; "id" => id.to_string(), "by" => identity.id.to_string());
        environment.db.approve(&id).await.map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn delete(
    environment: Environment,
    id: String,
    identity: Option<Identity>,
    confirmation: Confirmation,
) -> RouteResult {
    timed! {
        let error_handler = |e: DirectoryError| Rejection::new(Context::delete(id.clone()), e);

        let identity = guard::administrator(identity).map_err(error_handler)?;
        let id = parse_id(&id).map_err(error_handler)?;
        confirmation.require().map_err(error_handler)?;

        debug!(environment.logger, "Deleting registrant..."; "id" => id.to_string(), "by" => identity.id.to_string());
        profile::delete_registrant(&environment, &id)
            .await
            .map_err(error_handler)?;

        StatusCode::NO_CONTENT
    }
}

pub async fn relay(environment: Environment, content: FormData) -> RouteResult {
    timed! {
        let error_handler = |user_id: Option<String>| {
            move |e: DirectoryError| Rejection::new(Context::relay(user_id.clone()), e)
        };

        let mut submission = parse_submission(content, environment.config.max_file_bytes)
            .await
            .map_err(error_handler(None))?;

        let user_id = submission.field("userId").map(str::to_owned);
        let file = submission.take_file("file");

        let (user_id, file) = match (user_id, file) {
            (Some(user_id), Some(file)) => (user_id, file),
            (user_id, _) => {
                return Err(reject::custom(error_handler(user_id)(DirectoryError::PartsMissing)));
            }
        };

        let error_handler = error_handler(Some(user_id.clone()));

        let path = file
            .filename
            .as_deref()
            .and_then(|filename| relay_path(&user_id, filename))
            .ok_or(DirectoryError::PartsMissing)
            .map_err(&error_handler)?;

        let logger = Arc::new(environment.logger.new(o!("path" => path.clone())));
        debug!(logger, "Relaying file to store...");

        environment
            .uploads
            .save(&path, file.content_type.to_string(), file.raw)
            .await
            .map_err(&error_handler)?;

        json(&SuccessResponse::Relay { url: path })
    }
}

async fn patch_registrant(
    environment: &Environment,
    id: &Uuid,
    content: FormData,
) -> Result<Box<dyn Reply>, DirectoryError> {
    let mut submission = parse_submission(content, environment.config.max_file_bytes).await?;

    let patch: RegistrantPatch = match submission.field("metadata") {
        Some(metadata) => serde_json::from_str(metadata).map_err(DirectoryError::MalformedMetadata)?,
        None => RegistrantPatch::default(),
    };

    let attachments = take_attachments(&mut submission);

    debug!(environment.logger, "Updating registrant..."; "id" => id.to_string());
    let updated = profile::update_profile(environment, id, patch, attachments).await?;

    Ok(Box::new(json(&full_view(environment, &updated)?)))
}

async fn retrieve_existing(environment: &Environment, id: &Uuid) -> Result<Registrant, DirectoryError> {
    environment
        .db
        .retrieve(id)
        .await?
        .ok_or(DirectoryError::NonExistentId(*id))
}

fn take_attachments(submission: &mut Submission) -> Attachments {
    Attachments {
        photo: submission.take_file(MediaKind::Photo.part_name()),
        document: submission.take_file(MediaKind::Document.part_name()),
    }
}

fn parse_id(id: &str) -> Result<Uuid, DirectoryError> {
    Uuid::parse_str(id).map_err(|_| DirectoryError::InvalidId(id.to_owned()))
}

fn full_view<'a>(
    environment: &Environment,
    registrant: &'a Registrant,
) -> Result<FullView<'a>, DirectoryError> {
    Ok(FullView {
        registrant,
        photo_url: public_url(&*environment.media, registrant.photo.as_deref())?,
        document_url: public_url(&*environment.media, registrant.document.as_deref())?,
    })
}

fn public_view<'a>(
    environment: &Environment,
    registrant: &'a Registrant,
) -> Result<PublicView<'a>, DirectoryError> {
    let photo_url = public_url(&*environment.media, registrant.photo.as_deref())?;

    Ok(PublicView::new(registrant, photo_url))
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
