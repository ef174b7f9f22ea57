use mime::Mime;
use uuid::Uuid;

/// The two files a registrant may attach.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MediaKind {
    Photo,
    Document,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Photo, MediaKind::Document];

    /// The name of the multipart part carrying this file.
    pub fn part_name(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Document => "document",
        }
    }

    /// The folder under which files of this kind are stored.
    pub fn folder(self) -> &'static str {
        match self {
            MediaKind::Photo => "fotos_perfil",
            MediaKind::Document => "documentos_ordenacao",
        }
    }

    /// Photos must be images; documents may be images or PDFs.
    pub fn accepts(self, content_type: &Mime) -> bool {
        let is_image = content_type.type_() == mime::IMAGE;

        match self {
            MediaKind::Photo => is_image,
            MediaKind::Document => {
                is_image
                    || (content_type.type_() == mime::APPLICATION
                        && content_type.subtype() == mime::PDF)
            }
        }
    }
}

/// Builds a fresh storage path `{folder}/{random}.{extension}` for a file
/// of the given kind.
pub fn media_path(kind: MediaKind, filename: Option<&str>, content_type: &Mime) -> String {
    let token = Uuid::new_v4();

    match extension(filename, content_type) {
        Some(extension) => format!("{}/{}.{}", kind.folder(), token, extension),
        None => format!("{}/{}", kind.folder(), token),
    }
}

/// Builds the relay path `{owner}/{filename}`, keeping only the last
/// component of the submitted filename.
pub fn relay_path(owner: &str, filename: &str) -> Option<String> {
    let owner = sanitize_component(owner)?;
    let filename = filename.rsplit(|c| c == '/' || c == '\\').next()?;
    let filename = sanitize_component(filename)?;

    Some(format!("{}/{}", owner, filename))
}

fn sanitize_component(component: &str) -> Option<&str> {
    let component = component.trim();

    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(|c: char| c == '/' || c == '\\' || c.is_control())
    {
        None
    } else {
        Some(component)
    }
}

fn extension(filename: Option<&str>, content_type: &Mime) -> Option<String> {
    let from_name = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension)
        .filter(|extension| {
            !extension.is_empty()
                && extension.len() <= 8
                && extension.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|extension| extension.to_ascii_lowercase());

    from_name.or_else(|| {
        let subtype = content_type.subtype();

        if subtype == mime::JPEG {
            Some("jpg".to_owned())
        } else if subtype == mime::PNG || subtype == mime::PDF || subtype == mime::GIF {
            Some(subtype.as_str().to_owned())
        } else {
            None
        }
    })
}
