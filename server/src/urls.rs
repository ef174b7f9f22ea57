use url::Url;
use uuid::Uuid;

/// Convenience wrapper for URL generation functions.
#[derive(Clone)]
pub struct Urls {
    /// Top-level URL, including trailing slash.
    base: Url,

    /// Path segment all API routes live under.
    pub(crate) api_path: String,
}

impl Urls {
    /// Create a new instance. `api_path` should *not* include slashes.
    pub fn new(base: impl AsRef<str>, api_path: impl Into<String>) -> Self {
        let base =
            Url::parse(base.as_ref()).unwrap_or_else(|_| panic!("parse {} as URL", base.as_ref()));

        Urls {
            base,
            api_path: api_path.into(),
        }
    }

    pub fn registrants(&self) -> Url {
        self.base
            .join(&format!("{}/registrants/", self.api_path))
            .unwrap_or_else(|_| panic!("get registrants URL under {}", self.base))
    }

    pub fn registrant(&self, id: &Uuid) -> Url {
        let id = id.to_string();

        self.registrants()
            .join(&id)
            .unwrap_or_else(|_| panic!("get URL for registrant {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrant_urls_live_under_the_api() {
        let urls = Urls::new("https://diretorio.example.com/", "api");
        let id = Uuid::new_v4();

        assert_eq!(
            urls.registrant(&id).as_str(),
            format!("https://diretorio.example.com/api/registrants/{}", id)
        );
    }
}
