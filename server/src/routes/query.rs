use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub filter: Option<String>,
}

/// The body of a sign-in request.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
