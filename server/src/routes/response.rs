use serde::Serialize;
use uuid::Uuid;

use crate::auth::{Role, Session};
use crate::registrant::{Counts, FullView, PublicView};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Caller {
        id: Uuid,
        role: Role,
        username: Option<String>,
    },
    Count {
        count: i64,
    },
    Created {
        id: Uuid,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Panel {
        counts: Counts,
        registrants: Vec<FullView<'a>>,
    },
    Relay {
        url: String,
    },
    Search {
        searched: bool,
        results: Vec<PublicView<'a>>,
    },
    Session(&'a Session),
}
