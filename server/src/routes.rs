use std::sync::Arc;

use log::{error, warn, Logger};
use warp::filters::body;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::DirectoryError;
use crate::routes::rejection::{Context, FlattenedRejection};

pub mod admin;
mod guard;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The maximum form data size to accept. Individual files are held to a
/// much smaller ceiling while the form is read.
const MAX_CONTENT_LENGTH: u64 = 2 * 1024 * 1024;

/// The maximum JSON body size to accept.
const MAX_JSON_LENGTH: u64 = 16 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Directory error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            warn!(logger, "Request rejected"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status));
    }

    if let Some((status, message)) = malformed_request(&rej) {
        warn!(logger, "Malformed request"; "status" => %status, "message" => &message);

        let flattened = FlattenedRejection {
            context: Context::request(),
            error: message,
        };

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

/// Describes the rejections warp raises for requests that never reach a
/// handler: bad headers, bodies and query strings.
fn malformed_request(rej: &reject::Rejection) -> Option<(StatusCode, String)> {
    if let Some(e) = rej.find::<reject::PayloadTooLarge>() {
        Some((StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))
    } else if let Some(e) = rej.find::<reject::UnsupportedMediaType>() {
        Some((StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string()))
    } else if let Some(e) = rej.find::<reject::LengthRequired>() {
        Some((StatusCode::LENGTH_REQUIRED, e.to_string()))
    } else if let Some(e) = rej.find::<reject::InvalidHeader>() {
        Some((StatusCode::BAD_REQUEST, e.to_string()))
    } else if let Some(e) = rej.find::<reject::MissingHeader>() {
        Some((StatusCode::BAD_REQUEST, e.to_string()))
    } else if let Some(e) = rej.find::<reject::InvalidQuery>() {
        Some((StatusCode::BAD_REQUEST, e.to_string()))
    } else {
        rej.find::<body::BodyDeserializeError>()
            .map(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

fn status_code_for(e: &DirectoryError) -> StatusCode {
    use DirectoryError::*;

    match e {
        MalformedFormSubmission
        | MalformedMetadata(..)
        | PartsMissing
        | MissingField(..)
        | InvalidEmail
        | PasswordTooShort(..)
        | PasswordMismatch
        | TermsNotAccepted
        | InvalidId(..)
        | UnsupportedFileType { .. } => StatusCode::BAD_REQUEST,
        NotAuthenticated | InvalidSession | InvalidCredentials => StatusCode::UNAUTHORIZED,
        Forbidden => StatusCode::FORBIDDEN,
        NonExistentId(..) => StatusCode::NOT_FOUND,
        EmailAlreadyRegistered => StatusCode::CONFLICT,
        FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ConfirmationRequired => StatusCode::PRECONDITION_REQUIRED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::filters::body;
    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::header;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, patch, path as p, path::param as par, post, query};

    use super::{guard, handlers, MAX_CONTENT_LENGTH, MAX_JSON_LENGTH};
    use crate::environment::Environment;
    use crate::moderation::Confirmation;
    use crate::routes::query as q;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $environment:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name($environment: Environment) -> Route {
            let a = $environment.urls.api_path.clone();
            let e = $environment.clone();

            let $route_variable = warp::any()
                .map(move || e.clone())
                .and(p(a));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_register_route => register, env, rt; p("registrants"), end(), post(), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_count_route => count, env, rt; p("registrants"), p("count"), end(), g());
    route!(make_search_route => search, env, rt; p("registrants"), p("search"), end(), g(), query::<q::SearchQuery>());
    route!(make_retrieve_route => retrieve, env, rt; p("registrants"), par::<String>(), end(), g(), guard::identity(env.clone()));
    route!(make_sign_in_route => sign_in, env, rt; p("session"), end(), post(), body::content_length_limit(MAX_JSON_LENGTH), body::json::<q::Credentials>());
    route!(make_caller_route => caller, env, rt; p("session"), end(), g(), guard::identity(env.clone()));
    route!(make_sign_out_route => sign_out, env, rt; p("session"), end(), delete(), header::optional::<String>("authorization"));
    route!(make_profile_route => profile, env, rt; p("profile"), end(), g(), guard::identity(env.clone()));
    route!(make_update_profile_route => update_profile, env, rt; p("profile"), end(), patch(), guard::identity(env.clone()), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_panel_route => panel, env, rt; p("admin"), p("registrants"), end(), g(), guard::identity(env.clone()), query::<q::FilterQuery>());
    route!(make_admin_retrieve_route => admin_retrieve, env, rt; p("admin"), p("registrants"), par::<String>(), end(), g(), guard::identity(env.clone()));
    route!(make_admin_update_route => admin_update, env, rt; p("admin"), p("registrants"), par::<String>(), end(), patch(), guard::identity(env.clone()), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_approve_route => approve, env, rt; p("admin"), p("registrants"), par::<String>(), p("approve"), end(), post(), guard::identity(env.clone()), query::<Confirmation>());
    route!(make_delete_route => delete, env, rt; p("admin"), p("registrants"), par::<String>(), end(), delete(), guard::identity(env.clone()), query::<Confirmation>());
    route!(make_relay_route => relay, env, rt; p("upload"), end(), post(), form().max_length(MAX_CONTENT_LENGTH));

    /// Every API route, tried in order, with errors rendered as JSON.
    pub fn make_api(environment: Environment) -> BoxedFilter<(Box<dyn Reply>,)> {
        let logger = environment.logger.clone();

        make_register_route(environment.clone())
            .or(make_count_route(environment.clone()))
            .unify()
            .or(make_search_route(environment.clone()))
            .unify()
            .or(make_retrieve_route(environment.clone()))
            .unify()
            .or(make_sign_in_route(environment.clone()))
            .unify()
            .or(make_caller_route(environment.clone()))
            .unify()
            .or(make_sign_out_route(environment.clone()))
            .unify()
            .or(make_profile_route(environment.clone()))
            .unify()
            .or(make_update_profile_route(environment.clone()))
            .unify()
            .or(make_panel_route(environment.clone()))
            .unify()
            .or(make_admin_retrieve_route(environment.clone()))
            .unify()
            .or(make_admin_update_route(environment.clone()))
            .unify()
            .or(make_approve_route(environment.clone()))
            .unify()
            .or(make_delete_route(environment.clone()))
            .unify()
            .or(make_relay_route(environment))
            .unify()
            .recover(move |r| super::format_rejection(logger.clone(), r))
            .map(|reply| Box::new(reply) as Box<dyn Reply>)
            .boxed()
    }
}
