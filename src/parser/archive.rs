//! Export sources: `.tbz` archives or single raw export files.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use tracing::{debug, instrument};

use super::ParseError;
use super::export::TableExport;

/// Leading bytes of every bzip2 stream.
const BZIP2_MAGIC: &[u8; 3] = b"BZh";

/// A decoded export backed by a local file.
pub type FileExport = TableExport<BufReader<File>>;

type TbzArchive = tar::Archive<BzDecoder<BufReader<File>>>;

enum SourceKind {
    Archive(Box<TbzArchive>),
    Raw(Option<File>),
}

/// An opened export file, ready to be iterated table by table.
pub struct ExportSource {
    path: PathBuf,
    kind: SourceKind,
}

impl std::fmt::Debug for ExportSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            SourceKind::Archive(_) => "archive",
            SourceKind::Raw(_) => "raw",
        };
        f.debug_struct("ExportSource")
            .field("path", &self.path)
            .field("kind", &kind)
            .finish()
    }
}

impl ExportSource {
    /// Opens `path`, sniffing whether it is a bzip2-compressed tar archive.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the file cannot be opened or read.
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let label = path.display().to_string();
        let mut file = File::open(path).map_err(|e| ParseError::io(&label, e))?;
        let mut magic = [0_u8; 3];
        let is_archive = match file.read_exact(&mut magic) {
            Ok(()) => &magic == BZIP2_MAGIC,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(error) => return Err(ParseError::io(&label, error)),
        };
        file.seek(SeekFrom::Start(0))
            .map_err(|e| ParseError::io(&label, e))?;

        let kind = if is_archive {
            debug!("opening bzip2 tar archive");
            let decoder = BzDecoder::new(BufReader::new(file));
            SourceKind::Archive(Box::new(tar::Archive::new(decoder)))
        } else {
            debug!("opening raw export");
            SourceKind::Raw(Some(file))
        };
        Ok(Self {
            path: path.to_path_buf(),
            kind,
        })
    }

    /// Path the source was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates the table exports of the source.
    ///
    /// Archive members are decoded one at a time as the iterator advances.
    /// The source can be iterated once.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Io`] if the archive cannot be read.
    pub fn exports(&mut self) -> Result<Exports<'_>, ParseError> {
        let label = self.path.display().to_string();
        let inner = match &mut self.kind {
            SourceKind::Archive(archive) => ExportsInner::Archive(
                archive
                    .entries()
                    .map_err(|e| ParseError::io(&label, e))?,
            ),
            SourceKind::Raw(file) => {
                let name = self
                    .path
                    .file_name()
                    .map_or_else(|| label.clone(), |name| name.to_string_lossy().into_owned());
                ExportsInner::Raw(file.take().map(|file| (file, name)))
            }
        };
        Ok(Exports { label, inner })
    }
}

enum ExportsInner<'a> {
    Archive(tar::Entries<'a, BzDecoder<BufReader<File>>>),
    Raw(Option<(File, String)>),
}

/// Lazy sequence of the table exports in an [`ExportSource`].
pub struct Exports<'a> {
    label: String,
    inner: ExportsInner<'a>,
}

impl Iterator for Exports<'_> {
    type Item = Result<FileExport, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            ExportsInner::Raw(raw) => {
                let (file, name) = raw.take()?;
                Some(TableExport::from_reader(BufReader::new(file), name))
            }
            ExportsInner::Archive(entries) => loop {
                let entry = match entries.next()? {
                    Ok(entry) => entry,
                    Err(error) => return Some(Err(ParseError::io(&self.label, error))),
                };
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                return Some(spool_member(entry, &self.label));
            },
        }
    }
}

/// Copies one archive member into an anonymous temporary file and decodes it.
fn spool_member<R: Read>(mut entry: tar::Entry<'_, R>, label: &str) -> Result<FileExport, ParseError> {
    let name = entry
        .path()
        .map_err(|e| ParseError::io(label, e))?
        .to_string_lossy()
        .into_owned();
    debug!(member = %name, size = entry.size(), "parsing archive member");

    let mut spool = tempfile::tempfile().map_err(|e| ParseError::io(&name, e))?;
    io::copy(&mut entry, &mut spool).map_err(|e| ParseError::io(&name, e))?;
    spool
        .seek(SeekFrom::Start(0))
        .map_err(|e| ParseError::io(&name, e))?;
    TableExport::from_reader(BufReader::new(spool), name)
}
