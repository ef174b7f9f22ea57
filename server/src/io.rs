use std::collections::HashMap;
use std::io;

use bytes::{Buf, Bytes};
use futures::stream::{Stream, StreamExt, TryStreamExt};
use mime::Mime;
use warp::multipart::{FormData, Part};

use crate::errors::DirectoryError;
use crate::validation::check_file_size;

/// The largest text field accepted in a multipart submission.
pub const MAX_FIELD_BYTES: usize = 64 * 1024;

/// A file part of a multipart submission.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Mime,
    pub raw: Vec<u8>,
}

/// The text fields and files of a multipart submission, by part name.
#[derive(Debug, Default)]
pub struct Submission {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl Submission {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Reads a whole multipart submission. Parts carrying a filename are
/// files, everything else is text. Files are cut off as soon as they
/// exceed `file_limit` bytes; empty files count as absent.
pub async fn parse_submission(
    form: FormData,
    file_limit: usize,
) -> Result<Submission, DirectoryError> {
    let mut submission = Submission::default();

    futures::pin_mut!(form);

    while let Some(part) = form
        .try_next()
        .await
        .map_err(|_| DirectoryError::MalformedFormSubmission)?
    {
        let name = part.name().to_owned();
        let filename = part.filename().map(str::to_owned);
        let content_type = part.content_type().map(str::to_owned);

        match filename {
            Some(filename) => {
                let raw = part_as_vec(part, &name, file_limit).await?;

                if raw.is_empty() {
                    continue;
                }

                let content_type = content_type
                    .and_then(|c| c.parse::<Mime>().ok())
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM);

                submission.files.insert(
                    name,
                    UploadedFile {
                        filename: Some(filename),
                        content_type,
                        raw,
                    },
                );
            }
            None => {
                let raw = part_as_vec(part, &name, MAX_FIELD_BYTES).await?;
                let text =
                    String::from_utf8(raw).map_err(|_| DirectoryError::MalformedFormSubmission)?;

                submission.fields.insert(name, text);
            }
        }
    }

    Ok(submission)
}

/// Collects the chunks of a [`Part`], failing once more than `limit`
/// bytes have arrived.
pub async fn part_as_vec(raw: Part, field: &str, limit: usize) -> Result<Vec<u8>, DirectoryError> {
    let stream = part_as_stream(raw);
    futures::pin_mut!(stream);

    let mut collected = Vec::new();

    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|_| DirectoryError::MalformedFormSubmission)?
    {
        check_file_size(field, collected.len() + chunk.len(), limit)?;
        collected.extend_from_slice(&chunk);
    }

    Ok(collected)
}

/// Collects raw data from [`Part`].
pub fn part_as_stream(raw: Part) -> impl Stream<Item = Result<Bytes, io::Error>> {
    raw.stream().map(|r| {
        r.map(|mut x| x.copy_to_bytes(x.remaining()))
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "could not retrieve chunk"))
    })
}
