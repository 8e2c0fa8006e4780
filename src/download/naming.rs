//! Final file names and the move from scratch into a backend directory.

use std::io;
use std::path::{Path, PathBuf};

use crate::core::config;
use crate::download::request::OutputContainer;

/// Name the extracted file gets in its backend directory.
///
/// The scratch-root prefix is stripped; audio output always ends in `.mp3`
/// whatever intermediate extension the extractor reported, video keeps the
/// extractor's extension.
pub fn final_file_name(extracted: &Path, scratch_root: &Path, container: OutputContainer) -> Option<String> {
    let relative = extracted.strip_prefix(scratch_root).unwrap_or(extracted);
    let file_name = relative.file_name()?.to_str()?;
    match container {
        OutputContainer::Video => Some(file_name.to_string()),
        OutputContainer::Audio => {
            let stem = Path::new(file_name).file_stem()?.to_str()?;
            Some(format!("{}.{}", stem, config::download::AUDIO_EXTENSION))
        }
    }
}

/// First free path for `name` inside `dir`: `foo.mp3`, then `foo_1.mp3`, `foo_2.mp3`, ...
pub fn unique_target(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|s| s.to_str());
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Moves `source` into `target_dir` as `name` and returns the final path.
///
/// The directory is created if needed. An existing file is never overwritten:
/// the name gets a numeric suffix instead. When `rename` fails (scratch and
/// backend on different filesystems) the file is copied and the source removed.
pub async fn relocate(source: &Path, target_dir: &Path, name: &str) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(target_dir).await?;
    let target = unique_target(target_dir, name);
    if target.file_name().and_then(|n| n.to_str()) != Some(name) {
        log::warn!("{} already exists, storing as {}", name, target.display());
    }

    match tokio::fs::rename(source, &target).await {
        Ok(()) => Ok(target),
        Err(rename_err) => {
            log::debug!(
                "rename {} -> {} failed ({}), falling back to copy",
                source.display(),
                target.display(),
                rename_err
            );
            if let Err(e) = tokio::fs::copy(source, &target).await {
                let _ = tokio::fs::remove_file(&target).await;
                return Err(e);
            }
            tokio::fs::remove_file(source).await?;
            Ok(target)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_final_name_audio_forces_mp3() {
        let scratch = Path::new("/scratch");
        assert_eq!(
            final_file_name(Path::new("/scratch/foo.webm"), scratch, OutputContainer::Audio).as_deref(),
            Some("foo.mp3")
        );
        assert_eq!(
            final_file_name(Path::new("/scratch/My.Song.m4a"), scratch, OutputContainer::Audio).as_deref(),
            Some("My.Song.mp3")
        );
    }

    #[test]
    fn test_final_name_video_keeps_extension() {
        assert_eq!(
            final_file_name(Path::new("/scratch/foo.webm"), Path::new("/scratch"), OutputContainer::Video).as_deref(),
            Some("foo.webm")
        );
    }

    #[test]
    fn test_final_name_outside_scratch() {
        assert_eq!(
            final_file_name(Path::new("relative/foo.mkv"), Path::new("/scratch"), OutputContainer::Video).as_deref(),
            Some("foo.mkv")
        );
    }

    #[test]
    fn test_unique_target_adds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_target(dir.path(), "foo.mp3"), dir.path().join("foo.mp3"));
        std::fs::write(dir.path().join("foo.mp3"), b"1").unwrap();
        assert_eq!(unique_target(dir.path(), "foo.mp3"), dir.path().join("foo_1.mp3"));
        std::fs::write(dir.path().join("foo_1.mp3"), b"1").unwrap();
        assert_eq!(unique_target(dir.path(), "foo.mp3"), dir.path().join("foo_2.mp3"));
    }

    #[tokio::test]
    async fn test_relocate_moves_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("scratch.mp3");
        std::fs::write(&source, b"audio").unwrap();
        let target_dir = dir.path().join("data/local");

        let target = relocate(&source, &target_dir, "song.mp3").await.unwrap();
        assert_eq!(target, target_dir.join("song.mp3"));
        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"audio");
    }

    #[tokio::test]
    async fn test_relocate_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"old").unwrap();
        let source = dir.path().join("incoming.mp3");
        std::fs::write(&source, b"new").unwrap();

        let target = relocate(&source, dir.path(), "song.mp3").await.unwrap();
        assert_eq!(target, dir.path().join("song_1.mp3"));
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_relocate_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = relocate(&dir.path().join("missing.mp3"), dir.path(), "x.mp3").await;
        assert!(err.is_err());
    }
}
