//! Archive extraction (spec.md §4.7 "Archive extraction"): `.zip` on
//! Windows, `.tar.gz` on Unix. Multi-binary: a mandatory primary and
//! zero or more optional helper binaries, each extracted to its own
//! temp file.

use crate::error::{Result, UpdateError};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

pub struct ExtractedBinaries {
    pub primary: PathBuf,
    pub helpers: HashMap<String, PathBuf>,
}

/// Extracts `primary_name` (mandatory) and any of `helper_names` present
/// (optional) from `archive_path` into distinct files under `dest_dir`.
/// Chooses the zip or tar.gz reader by the archive's extension.
pub fn extract(archive_path: &Path, dest_dir: &Path, primary_name: &str, helper_names: &[&str]) -> Result<ExtractedBinaries> {
    let wanted: Vec<&str> = std::iter::once(primary_name).chain(helper_names.iter().copied()).collect();
    let extracted = if archive_path.extension().and_then(|e| e.to_str()) == Some("zip") {
        extract_zip(archive_path, dest_dir, &wanted)?
    } else {
        extract_tar_gz(archive_path, dest_dir, &wanted)?
    };

    let primary = extracted
        .get(primary_name)
        .cloned()
        .ok_or_else(|| UpdateError::MissingPrimaryBinary(primary_name.to_string()))?;
    let mut helpers = extracted;
    helpers.remove(primary_name);

    Ok(ExtractedBinaries { primary, helpers })
}

fn extract_zip(archive_path: &Path, dest_dir: &Path, wanted: &[&str]) -> Result<HashMap<String, PathBuf>> {
    let file = std::fs::File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| anyhow::anyhow!("invalid zip archive: {e}"))?;
    let mut out = HashMap::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| anyhow::anyhow!("bad zip entry: {e}"))?;
        let Some(entry_name) = entry_basename(entry.name()) else { continue };
        if !wanted.contains(&entry_name.as_str()) {
            continue;
        }
        let dest = dest_dir.join(&entry_name);
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut buf)?;
        std::fs::write(&dest, &buf)?;
        set_executable(&dest)?;
        out.insert(entry_name, dest);
    }
    Ok(out)
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path, wanted: &[&str]) -> Result<HashMap<String, PathBuf>> {
    let file = std::fs::File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    let mut out = HashMap::new();

    for entry in tar.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(entry_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !wanted.contains(&entry_name.as_str()) {
            continue;
        }
        let dest = dest_dir.join(&entry_name);
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        std::fs::write(&dest, &buf)?;
        set_executable(&dest)?;
        out.insert(entry_name, dest);
    }
    Ok(out)
}

fn entry_basename(name: &str) -> Option<String> {
    Path::new(name).file_name().and_then(|n| n.to_str()).map(str::to_string)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_tar_gz(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let archive_path = dir.join("archive.tar.gz");
        let file = std::fs::File::create(&archive_path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        archive_path
    }

    fn make_zip(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let archive_path = dir.join("archive.zip");
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
        archive_path
    }

    #[test]
    fn extracts_the_primary_and_an_optional_helper_from_a_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_tar_gz(dir.path(), &[("portunix", b"primary-bytes"), ("ptx-container", b"helper-bytes")]);
        let dest = tempfile::tempdir().unwrap();

        let extracted = extract(&archive, dest.path(), "portunix", &["ptx-container"]).unwrap();
        assert_eq!(std::fs::read(&extracted.primary).unwrap(), b"primary-bytes");
        assert_eq!(std::fs::read(extracted.helpers.get("ptx-container").unwrap()).unwrap(), b"helper-bytes");
    }

    #[test]
    fn missing_primary_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_tar_gz(dir.path(), &[("ptx-container", b"helper-bytes")]);
        let dest = tempfile::tempdir().unwrap();

        let err = extract(&archive, dest.path(), "portunix", &["ptx-container"]).unwrap_err();
        assert!(matches!(err, UpdateError::MissingPrimaryBinary(_)));
    }

    #[test]
    fn absent_helper_binaries_are_simply_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_tar_gz(dir.path(), &[("portunix", b"primary-bytes")]);
        let dest = tempfile::tempdir().unwrap();

        let extracted = extract(&archive, dest.path(), "portunix", &["ptx-container"]).unwrap();
        assert!(extracted.helpers.is_empty());
    }

    #[test]
    fn extracts_from_a_zip_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_zip(dir.path(), &[("portunix.exe", b"primary-bytes")]);
        let dest = tempfile::tempdir().unwrap();

        let extracted = extract(&archive, dest.path(), "portunix.exe", &[]).unwrap();
        assert_eq!(std::fs::read(&extracted.primary).unwrap(), b"primary-bytes");
    }
}
