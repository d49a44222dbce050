//! Filesystem staging
//!
//! A [`Stager`] materializes a package on local disk: it creates the
//! staging directory, extracts the archive into it, reads and writes small
//! files and removes the tree afterwards. All operations block the caller.

use crate::error::{ExtractionError, FilesystemError};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{debug, info};

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const COPY_BUFFER: usize = 64 * 1024;

/// Default mode for staged directories; extracted binaries must be reachable
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Local filesystem capability used by the configurator
pub trait Stager: Send + Sync {
    /// Create `path` as a new directory (parents as needed), executable for
    /// everyone who runs package binaries. An existing `path` is an error, so
    /// a caller that succeeds owns the directory exclusively.
    fn prepare_directory(&self, path: &Path) -> Result<(), FilesystemError>;

    /// Create `path` and its parents if missing; existing directories are kept
    fn ensure_directory(&self, path: &Path) -> Result<(), FilesystemError>;

    /// Write `content` so a partial file never appears at `path`
    fn write_text(&self, path: &Path, content: &str) -> Result<(), FilesystemError>;

    /// Read a whole file
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FilesystemError>;

    /// Unpack `archive` into the existing directory `dest`
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractionError>;

    /// Recursively delete `path`; a missing path is not an error
    fn remove_all(&self, path: &Path) -> Result<(), FilesystemError>;
}

/// Archive formats recognized by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// Sniff the format from the first bytes of a file
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(&ZIP_MAGIC) {
            Some(ArchiveFormat::Zip)
        } else if header.starts_with(&GZIP_MAGIC) {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }
}

/// [`Stager`] backed by `std::fs`
#[derive(Debug, Clone)]
pub struct LocalStager {
    dir_mode: u32,
}

impl Default for LocalStager {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStager {
    pub fn new() -> Self {
        Self {
            dir_mode: DEFAULT_DIR_MODE,
        }
    }

    /// Override the mode applied by `prepare_directory`
    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    fn extract_zip(&self, file: File, archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
        let corrupt = |reason: String| ExtractionError::Corrupt {
            archive: archive.to_path_buf(),
            reason,
        };
        let not_writable = |source: io::Error| ExtractionError::DestinationNotWritable {
            dest: dest.to_path_buf(),
            source,
        };

        let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|e| corrupt(e.to_string()))?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| corrupt(format!("entry escapes destination: {}", entry.name())))?;
            let target = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(not_writable)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(not_writable)?;
            }

            // Header sizes are untrusted; stream so only real bytes are buffered
            let mut out = File::create(&target).map_err(not_writable)?;
            let mut buf = vec![0u8; COPY_BUFFER];
            loop {
                let n = entry
                    .read(&mut buf)
                    .map_err(|e| corrupt(format!("{}: {}", entry.name(), e)))?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n]).map_err(not_writable)?;
            }

            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(not_writable)?;
            }
        }

        debug!(archive = %archive.display(), entries = zip.len(), "Extracted zip archive");
        Ok(())
    }

    fn extract_tar_gz(&self, file: File, archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
        let classify = |e: io::Error| classify_unpack_error(e, archive, dest);

        let mut tarball = tar::Archive::new(GzDecoder::new(file));
        let mut count = 0usize;

        for entry in tarball.entries().map_err(classify)? {
            let mut entry = entry.map_err(classify)?;
            if !entry.unpack_in(dest).map_err(classify)? {
                let name = entry
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                return Err(ExtractionError::Corrupt {
                    archive: archive.to_path_buf(),
                    reason: format!("entry escapes destination: {}", name),
                });
            }
            count += 1;
        }

        debug!(archive = %archive.display(), entries = count, "Extracted tar.gz archive");
        Ok(())
    }
}

/// Split tar unpack failures into "the destination refused the write" and
/// "the archive itself is bad"
fn classify_unpack_error(e: io::Error, archive: &Path, dest: &Path) -> ExtractionError {
    match e.kind() {
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::ReadOnlyFilesystem
        | io::ErrorKind::StorageFull
        | io::ErrorKind::QuotaExceeded
        | io::ErrorKind::NotADirectory
        | io::ErrorKind::AlreadyExists => ExtractionError::DestinationNotWritable {
            dest: dest.to_path_buf(),
            source: e,
        },
        _ => ExtractionError::Corrupt {
            archive: archive.to_path_buf(),
            reason: e.to_string(),
        },
    }
}

impl Stager for LocalStager {
    fn prepare_directory(&self, path: &Path) -> Result<(), FilesystemError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| FilesystemError::new("create parent of", path, e))?;
        }
        fs::create_dir(path).map_err(|e| FilesystemError::new("create directory", path, e))?;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(self.dir_mode)) {
            // Not yet handed to the caller, so undo the claim here
            let _ = fs::remove_dir(path);
            return Err(FilesystemError::new("set permissions on", path, e));
        }
        debug!(path = %path.display(), mode = %format_args!("{:o}", self.dir_mode), "Prepared directory");
        Ok(())
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), FilesystemError> {
        fs::create_dir_all(path).map_err(|e| FilesystemError::new("create directory", path, e))
    }

    fn write_text(&self, path: &Path, content: &str) -> Result<(), FilesystemError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| FilesystemError::new("create temporary file in", parent, e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| FilesystemError::new("write", path, e))?;
        tmp.persist(path)
            .map_err(|e| FilesystemError::new("write", path, e.error))?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, FilesystemError> {
        fs::read(path).map_err(|e| FilesystemError::new("read", path, e))
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractionError> {
        let unreadable = |source: io::Error| ExtractionError::SourceUnreadable {
            archive: archive.to_path_buf(),
            source,
        };

        let mut file = File::open(archive).map_err(unreadable)?;
        let mut header = [0u8; 4];
        let read = file.read(&mut header).map_err(unreadable)?;
        file.seek(SeekFrom::Start(0)).map_err(unreadable)?;

        let format = ArchiveFormat::detect(&header[..read]).ok_or_else(|| {
            ExtractionError::UnsupportedFormat {
                archive: archive.to_path_buf(),
            }
        })?;

        // Probe before unpacking anything
        tempfile::tempfile_in(dest).map_err(|source| ExtractionError::DestinationNotWritable {
            dest: dest.to_path_buf(),
            source,
        })?;

        info!(archive = %archive.display(), dest = %dest.display(), ?format, "Extracting package");

        match format {
            ArchiveFormat::Zip => self.extract_zip(file, archive, dest),
            ArchiveFormat::TarGz => self.extract_tar_gz(file, archive, dest),
        }
    }

    fn remove_all(&self, path: &Path) -> Result<(), FilesystemError> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(FilesystemError::new("remove", path, e)),
        };

        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "Removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FilesystemError::new("remove", path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default().unix_permissions(0o755))
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(ArchiveFormat::detect(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(b"Rar!"), None);
        assert_eq!(ArchiveFormat::detect(b""), None);
    }

    #[test]
    fn test_prepare_directory_sets_mode() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("work/pkgA");

        LocalStager::new().prepare_directory(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, DEFAULT_DIR_MODE);
    }

    #[test]
    fn test_prepare_directory_collides_with_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("taken");
        fs::write(&path, "file").unwrap();

        let err = LocalStager::new().prepare_directory(&path).unwrap_err();
        assert_eq!(err.op, "create directory");
    }

    #[test]
    fn test_prepare_directory_refuses_existing_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("stage");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        let err = LocalStager::new().prepare_directory(&dir).unwrap_err();

        assert_eq!(err.source.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(dir.join("notes.txt")).unwrap(), "keep me");
    }

    #[test]
    fn test_ensure_directory_keeps_existing() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("orch/doc-1");
        let stager = LocalStager::new();

        stager.ensure_directory(&dir).unwrap();
        fs::write(dir.join("result.json"), "{}").unwrap();
        stager.ensure_directory(&dir).unwrap();

        assert!(dir.join("result.json").exists());
    }

    #[test]
    fn test_write_text_replaces_atomically() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("result.json");
        let stager = LocalStager::new();

        stager.write_text(&path, "first").unwrap();
        stager.write_text(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_text_missing_parent() {
        let temp = tempdir().unwrap();
        let err = LocalStager::new()
            .write_text(&temp.path().join("nope/result.json"), "x")
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_extract_zip() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("pkg.zip");
        let dest = temp.path().join("stage");
        write_zip(
            &archive,
            &[("install.json", "{}"), ("bin/install.sh", "#!/bin/sh\n")],
        );

        let stager = LocalStager::new();
        stager.prepare_directory(&dest).unwrap();
        stager.extract(&archive, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("install.json")).unwrap(), "{}");
        let mode = fs::metadata(dest.join("bin/install.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("pkg.tar.gz");
        let dest = temp.path().join("stage");
        write_tar_gz(&archive, &[("install.json", "{}"), ("lib/a.txt", "a")]);

        let stager = LocalStager::new();
        stager.prepare_directory(&dest).unwrap();
        stager.extract(&archive, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("lib/a.txt")).unwrap(), "a");
    }

    #[test]
    fn test_extract_rejects_zip_slip() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("evil.zip");
        let dest = temp.path().join("stage");
        write_zip(&archive, &[("../evil.txt", "gotcha")]);

        let stager = LocalStager::new();
        stager.prepare_directory(&dest).unwrap();
        let err = stager.extract(&archive, &dest).unwrap_err();

        assert!(matches!(err, ExtractionError::Corrupt { .. }));
        assert!(!temp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("broken.zip");
        let dest = temp.path().join("stage");
        fs::write(&archive, b"PK\x03\x04 definitely not a zip").unwrap();

        let stager = LocalStager::new();
        stager.prepare_directory(&dest).unwrap();
        let err = stager.extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, ExtractionError::Corrupt { .. }));
    }

    /// Rewrite the declared uncompressed size of the first central directory
    /// entry, through the zip64 extra field when the entry has one
    fn forge_uncompressed_size(bytes: &mut [u8], size: u64) {
        let cd = bytes
            .windows(4)
            .position(|w| w == b"PK\x01\x02")
            .expect("central directory header");
        let u16_at = |b: &[u8], at: usize| u16::from_le_bytes([b[at], b[at + 1]]) as usize;
        let name_len = u16_at(bytes, cd + 28);
        let extra_len = u16_at(bytes, cd + 30);

        let mut at = cd + 46 + name_len;
        let end = at + extra_len;
        while at + 4 <= end {
            let (id, len) = (u16_at(bytes, at), u16_at(bytes, at + 2));
            if id == 0x0001 && len >= 8 && bytes[cd + 24..cd + 28] == [0xff; 4] {
                bytes[at + 4..at + 12].copy_from_slice(&size.to_le_bytes());
                return;
            }
            at += 4 + len;
        }
        let clamped = size.min(u64::from(u32::MAX - 1)) as u32;
        bytes[cd + 24..cd + 28].copy_from_slice(&clamped.to_le_bytes());
    }

    #[test]
    fn test_extract_zip_with_forged_entry_size() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("forged.zip");
        let dest = temp.path().join("stage");

        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .large_file(true);
        writer.start_file("install.json", options).unwrap();
        writer.write_all(b"{}").unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();
        forge_uncompressed_size(&mut bytes, 1 << 62);
        fs::write(&archive, &bytes).unwrap();

        let stager = LocalStager::new();
        stager.prepare_directory(&dest).unwrap();

        // Either outcome is fine as long as nothing trusts the declared size
        match stager.extract(&archive, &dest) {
            Ok(()) => assert_eq!(fs::read(dest.join("install.json")).unwrap(), b"{}"),
            Err(err) => assert!(matches!(err, ExtractionError::Corrupt { .. }), "{err:?}"),
        }
    }

    #[test]
    fn test_unpack_errors_blame_the_right_side() {
        let (archive, dest) = (Path::new("/pkgs/a.tar.gz"), Path::new("/work/pkgA"));
        let destination_side = [
            io::ErrorKind::PermissionDenied,
            io::ErrorKind::ReadOnlyFilesystem,
            io::ErrorKind::StorageFull,
            io::ErrorKind::QuotaExceeded,
            io::ErrorKind::NotADirectory,
            io::ErrorKind::AlreadyExists,
        ];
        for kind in destination_side {
            let err = classify_unpack_error(kind.into(), archive, dest);
            assert!(matches!(err, ExtractionError::DestinationNotWritable { .. }), "{kind:?}");
        }

        for kind in [io::ErrorKind::UnexpectedEof, io::ErrorKind::InvalidData] {
            let err = classify_unpack_error(kind.into(), archive, dest);
            assert!(matches!(err, ExtractionError::Corrupt { .. }), "{kind:?}");
        }
    }

    #[test]
    fn test_extract_tar_gz_into_read_only_directory() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("pkg.tar.gz");
        let dest = temp.path().join("stage");
        write_tar_gz(&archive, &[("lib/a.txt", "a")]);

        let stager = LocalStager::new();
        stager.prepare_directory(&dest).unwrap();
        fs::create_dir(dest.join("lib")).unwrap();
        fs::set_permissions(dest.join("lib"), fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores directory modes; nothing to check there
        if fs::write(dest.join("lib/probe"), "x").is_ok() {
            return;
        }

        let err = stager.extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, ExtractionError::DestinationNotWritable { .. }), "{err:?}");

        fs::set_permissions(dest.join("lib"), fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_extract_into_read_only_destination() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("pkg.tar.gz");
        let dest = temp.path().join("stage");
        write_tar_gz(&archive, &[("install.json", "{}")]);

        let stager = LocalStager::new().with_dir_mode(0o555);
        stager.prepare_directory(&dest).unwrap();
        if fs::write(dest.join("probe"), "x").is_ok() {
            return;
        }

        let err = stager.extract(&archive, &dest).unwrap_err();
        assert!(matches!(err, ExtractionError::DestinationNotWritable { .. }), "{err:?}");

        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_extract_unsupported_format() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("pkg.rar");
        fs::write(&archive, b"Rar!\x1a\x07").unwrap();

        let err = LocalStager::new().extract(&archive, temp.path()).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_extract_missing_destination() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("pkg.zip");
        write_zip(&archive, &[("install.json", "{}")]);

        let err = LocalStager::new()
            .extract(&archive, &temp.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::DestinationNotWritable { .. }));
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp = tempdir().unwrap();
        let err = LocalStager::new()
            .extract(&temp.path().join("missing.zip"), temp.path())
            .unwrap_err();
        assert!(matches!(err, ExtractionError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_remove_all_is_idempotent() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("stage");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/file"), "x").unwrap();

        let stager = LocalStager::new();
        stager.remove_all(&dir).unwrap();
        stager.remove_all(&dir).unwrap();

        assert!(!dir.exists());
    }
}
