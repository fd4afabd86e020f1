use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use tar::Archive;
use tracing::{debug, warn};
use xz2::read::XzDecoder;

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::PgapError;
use crate::registry::user_agent_headers;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const PROGRESS_STEP: u64 = 1024 * 1024;

pub trait ArchiveFetcher: Send + Sync {
    /// Streams the tar archive at `url` and unpacks it under `destination`.
    fn fetch_and_extract(
        &self,
        url: &str,
        destination: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<(), PgapError>;
}

#[derive(Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
}

impl HttpArchiveFetcher {
    pub fn new() -> Result<Self, PgapError> {
        // Reference bundles run to tens of gigabytes, so no overall timeout.
        let client = Client::builder()
            .default_headers(user_agent_headers()?)
            .timeout(None)
            .build()
            .map_err(|err| PgapError::Network(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpArchiveFetcher {
    fn fetch_and_extract(
        &self,
        url: &str,
        destination: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<(), PgapError> {
        debug!(url, destination = %destination.display(), "fetching archive");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PgapError::Network(format!("{url}: {err}")))?;
        if !response.status().is_success() {
            return Err(PgapError::ArchiveStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        let total = response.content_length().filter(|len| *len > 0);
        extract_stream(response, total, destination, sink)
    }
}

/// Unpacks a tar stream, plain or compressed with gzip, bzip2 or xz, reporting
/// progress to `sink`.
///
/// Read failures of the underlying stream surface as [`PgapError::Network`];
/// anything the tar reader rejects is a [`PgapError::Archive`]. Entries already
/// written are left in place on failure.
pub fn extract_stream<R: Read>(
    reader: R,
    total: Option<u64>,
    destination: &Path,
    sink: &dyn ProgressSink,
) -> Result<(), PgapError> {
    fs::create_dir_all(destination)
        .map_err(|err| PgapError::Filesystem(format!("create {}: {err}", destination.display())))?;

    let failure = RefCell::new(None);
    let progress = ProgressReader::new(reader, total, sink, &failure);
    let result = unpack(progress, destination);
    sink.event(ProgressEvent::DownloadFinished);

    match result {
        Ok(0) => Err(PgapError::Archive("archive contains no entries".to_string())),
        Ok(count) => {
            debug!(entries = count, "archive extracted");
            Ok(())
        }
        Err(err) => match failure.into_inner() {
            Some(read_err) => Err(PgapError::Network(read_err)),
            None => Err(PgapError::Archive(err.to_string())),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    fn detect(head: &[u8]) -> Self {
        if head.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else if head.starts_with(BZIP2_MAGIC) {
            Compression::Bzip2
        } else if head.starts_with(XZ_MAGIC) {
            Compression::Xz
        } else {
            Compression::None
        }
    }
}

fn unpack<R: Read>(reader: R, destination: &Path) -> io::Result<usize> {
    let mut buffered = BufReader::new(reader);
    let compression = Compression::detect(buffered.fill_buf()?);
    debug!(?compression, "detected archive compression");
    match compression {
        Compression::Gzip => {
            unpack_from(GzDecoder::new(buffered), destination, GzDecoder::into_inner)
        }
        Compression::Bzip2 => {
            unpack_from(BzDecoder::new(buffered), destination, BzDecoder::into_inner)
        }
        Compression::Xz => {
            unpack_from(XzDecoder::new(buffered), destination, XzDecoder::into_inner)
        }
        Compression::None => unpack_from(buffered, destination, |raw| raw),
    }
}

/// Trailing bytes after the end-of-archive marker are drained so progress
/// reaches the full response length.
fn unpack_from<D: Read, S: Read>(
    decoder: D,
    destination: &Path,
    into_source: impl FnOnce(D) -> S,
) -> io::Result<usize> {
    let mut archive = Archive::new(decoder);
    let count = unpack_entries(&mut archive, destination)?;
    io::copy(&mut into_source(archive.into_inner()), &mut io::sink())?;
    Ok(count)
}

fn unpack_entries<R: Read>(archive: &mut Archive<R>, destination: &Path) -> io::Result<usize> {
    let mut count = 0usize;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.unpack_in(destination)? {
            warn!(path = %entry.path()?.display(), "skipping archive entry outside destination");
            continue;
        }
        count += 1;
    }
    Ok(count)
}

struct ProgressReader<'a, R> {
    inner: R,
    bytes: u64,
    total: Option<u64>,
    next_report: u64,
    sink: &'a dyn ProgressSink,
    failure: &'a RefCell<Option<String>>,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    fn new(
        inner: R,
        total: Option<u64>,
        sink: &'a dyn ProgressSink,
        failure: &'a RefCell<Option<String>>,
    ) -> Self {
        Self {
            inner,
            bytes: 0,
            total,
            next_report: 0,
            sink,
            failure,
        }
    }

    fn report(&mut self) {
        self.sink.event(ProgressEvent::Download {
            bytes: self.bytes,
            total: self.total,
        });
        self.next_report = self.bytes + PROGRESS_STEP;
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(0) => {
                if self.bytes > 0 && self.next_report != self.bytes + PROGRESS_STEP {
                    self.report();
                }
                Ok(0)
            }
            Ok(n) => {
                self.bytes += n as u64;
                if self.bytes >= self.next_report {
                    self.report();
                }
                Ok(n)
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(err),
            Err(err) => {
                *self.failure.borrow_mut() = Some(err.to_string());
                Err(err)
            }
        }
    }
}
