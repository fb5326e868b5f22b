/// Archive member enumeration.
///
/// The walker only knows how to open containers and hand out member streams,
/// in the archive's own order. Deciding what to do with a member (search it,
/// or recurse into it when it is an archive itself) is up to the
/// [`MemberVisitor`]. Each member stream is dropped before the next one is
/// opened, so only one member is ever being read at a time.
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::{SearchError, SearchResult};

/// Receives the members of an archive
pub trait MemberVisitor {
    /// Called once per file member with its in-archive name and content
    fn visit(&mut self, name: &str, reader: &mut dyn Read);

    /// Called when a member could not be opened; the walk continues
    fn member_failed(&mut self, name: &str, error: SearchError);
}

/// Walks a zip archive, returning the number of file members visited.
///
/// Fails only when the archive itself cannot be read.
pub fn walk_zip<R: Read + Seek>(reader: R, visitor: &mut dyn MemberVisitor) -> SearchResult<usize> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut visited = 0;

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to open zip member #{}: {}", i + 1, e);
                visitor.member_failed(&format!("entry #{}", i + 1), SearchError::Zip(e));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        debug!("Visiting zip member {}", name);
        visitor.visit(&name, &mut entry);
        visited += 1;
    }

    Ok(visited)
}

/// Walks a rar archive on disk, returning the number of file members visited
#[cfg(feature = "rar")]
pub fn walk_rar(path: &Path, visitor: &mut dyn MemberVisitor) -> SearchResult<usize> {
    let mut archive = unrar::Archive::new(path)
        .open_for_processing()
        .map_err(SearchError::rar)?;
    let mut visited = 0;

    while let Some(header) = archive.read_header().map_err(SearchError::rar)? {
        let name = header.entry().filename.to_string_lossy().into_owned();
        archive = if header.entry().is_file() {
            // A failed read leaves no cursor to continue from
            let (data, rest) = header
                .read()
                .map_err(|e| SearchError::rar(format!("member {}: {}", name, e)))?;
            debug!("Visiting rar member {}", name);
            visitor.visit(&name, &mut data.as_slice());
            visited += 1;
            rest
        } else {
            header.skip().map_err(SearchError::rar)?
        };
    }

    Ok(visited)
}

/// Walks a rar archive on disk, returning the number of file members visited
#[cfg(not(feature = "rar"))]
pub fn walk_rar(_path: &Path, _visitor: &mut dyn MemberVisitor) -> SearchResult<usize> {
    Err(SearchError::unsupported_archive("rar support not compiled in"))
}
