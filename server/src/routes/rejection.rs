use serde::Serialize;
use warp::reject;

use crate::errors::DirectoryError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: DirectoryError,
}

impl Rejection {
    pub fn new(context: Context, error: DirectoryError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            context: self.context.clone(),
            error: format!("{}", self.error),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) error: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Approve { id: String },
    Authentication,
    Count,
    Delete { id: String },
    Panel { filter: Option<String> },
    Profile { id: Option<String> },
    Register { id: Option<String> },
    Relay { user_id: Option<String> },
    Request,
    Retrieve { id: String },
    Search { q: Option<String> },
    Session,
}

impl Context {
    pub fn approve(id: String) -> Context {
        Context::Approve { id }
    }

    pub fn authentication() -> Context {
        Context::Authentication
    }

    pub fn count() -> Context {
        Context::Count
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }

    pub fn panel(filter: Option<String>) -> Context {
        Context::Panel { filter }
    }

    pub fn profile(id: Option<String>) -> Context {
        Context::Profile { id }
    }

    pub fn register(id: Option<String>) -> Context {
        Context::Register { id }
    }

    pub fn relay(user_id: Option<String>) -> Context {
        Context::Relay { user_id }
    }

    pub fn request() -> Context {
        Context::Request
    }

    pub fn retrieve(id: String) -> Context {
        Context::Retrieve { id }
    }

    pub fn search(q: Option<String>) -> Context {
        Context::Search { q }
    }

    pub fn session() -> Context {
        Context::Session
    }
}
