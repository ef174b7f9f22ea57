use uuid::Uuid;
use warp::{reject, Filter};

use crate::auth::Identity;
use crate::environment::Environment;
use crate::errors::DirectoryError;
use crate::routes::rejection::{Context, Rejection};

/// Resolves the bearer token of a request, if any, to the identity it
/// belongs to. A token that is present but malformed, unknown or expired
/// rejects the request.
pub fn identity(
    environment: Environment,
) -> impl Filter<Extract = (Option<Identity>,), Error = reject::Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let environment = environment.clone();

        async move {
            resolve(&environment, header.as_deref())
                .await
                .map_err(|e| reject::custom(Rejection::new(Context::authentication(), e)))
        }
    })
}

async fn resolve(
    environment: &Environment,
    header: Option<&str>,
) -> Result<Option<Identity>, DirectoryError> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };

    let token = bearer_token(header)?;

    let id = environment
        .auth
        .identify(&token)
        .await?
        .ok_or(DirectoryError::InvalidSession)?;

    let role = environment.db.retrieve_role(&id).await?;

    Ok(Some(Identity { id, role }))
}

/// Extracts the session token from an `Authorization: Bearer …` header.
pub fn bearer_token(header: &str) -> Result<Uuid, DirectoryError> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(DirectoryError::InvalidSession)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(DirectoryError::InvalidSession);
    }

    Uuid::parse_str(token.trim()).map_err(|_| DirectoryError::InvalidSession)
}

/// Requires a signed-in caller.
pub fn authenticated(identity: Option<Identity>) -> Result<Identity, DirectoryError> {
    identity.ok_or(DirectoryError::NotAuthenticated)
}

/// Requires a signed-in administrator.
pub fn administrator(identity: Option<Identity>) -> Result<Identity, DirectoryError> {
    let identity = authenticated(identity)?;

    if identity.is_admin() {
        Ok(identity)
    } else {
        Err(DirectoryError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    #[test]
    fn bearer_tokens_are_parsed() {
        let token = Uuid::new_v4();

        assert_eq!(bearer_token(&format!("Bearer {}", token)).unwrap(), token);
        assert_eq!(bearer_token(&format!("bearer  {} ", token)).unwrap(), token);
        assert!(matches!(
            bearer_token(&format!("Basic {}", token)),
            Err(DirectoryError::InvalidSession)
        ));
        assert!(matches!(
            bearer_token("Bearer nope"),
            Err(DirectoryError::InvalidSession)
        ));
        assert!(bearer_token("Bearer").is_err());
    }

    #[test]
    fn members_are_not_administrators() {
        let member = Identity {
            id: Uuid::new_v4(),
            role: Role::Member,
        };

        assert!(matches!(
            administrator(None),
            Err(DirectoryError::NotAuthenticated)
        ));
        assert!(matches!(
            administrator(Some(member)),
            Err(DirectoryError::Forbidden)
        ));
        assert!(authenticated(Some(member)).is_ok());
    }
}
