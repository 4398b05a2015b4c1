use std::io::{self, Write};
use std::path::Path;

/// Create `dir` (and parents). An existing directory is success; anything else,
/// including a non-directory in the way, is returned to the caller.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `path` with `contents` via a sibling temp file and rename, so readers never
/// observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_idempotent() {
        let td = tempfile::tempdir().expect("tmpdir");
        let d = td.path().join("a").join("b");
        ensure_dir(&d).expect("first");
        ensure_dir(&d).expect("second");
        assert!(d.is_dir());
    }

    #[test]
    fn test_ensure_dir_rejects_file_in_the_way() {
        let td = tempfile::tempdir().expect("tmpdir");
        let f = td.path().join("logs");
        std::fs::write(&f, b"x").expect("write");
        assert!(ensure_dir(&f).is_err());
    }

    #[test]
    fn test_write_atomic_replaces() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = td.path().join("gate-local.yml");
        write_atomic(&p, b"one").expect("write one");
        write_atomic(&p, b"two").expect("write two");
        assert_eq!(std::fs::read_to_string(&p).expect("read"), "two");
        let leftovers = std::fs::read_dir(td.path()).expect("ls").count();
        assert_eq!(leftovers, 1);
    }
}
