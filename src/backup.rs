//! Whole-file copies of a ROM, kept next to it as `<rom>.bak`.

use crate::error::{IpsError, Result};
use log::{info, warn};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// `game.sfc` backs up to `game.sfc.bak`.
pub fn backup_path(rom: &Path) -> PathBuf {
    let mut name = OsString::from(rom.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Copies `rom` to its backup path.
///
/// An existing backup is never overwritten; `None` is returned in that case so repeated patching
/// keeps the copy of the unpatched ROM.
pub fn create(rom: &Path) -> Result<Option<PathBuf>> {
    if !rom.is_file() {
        return Err(IpsError::NotFound(rom.to_path_buf()));
    }

    let backup = backup_path(rom);
    if backup.exists() {
        warn!("Keeping existing backup {}", backup.display());
        return Ok(None);
    }

    fs::copy(rom, &backup)?;
    info!("Backed up {} to {}", rom.display(), backup.display());
    Ok(Some(backup))
}

/// Replaces `rom` with its backup. The backup is consumed.
pub fn restore(rom: &Path) -> Result<PathBuf> {
    let backup = backup_path(rom);
    if !backup.is_file() {
        return Err(IpsError::NoBackup(rom.to_path_buf()));
    }

    fs::rename(&backup, rom)?;
    info!("Restored {} from {}", rom.display(), backup.display());
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn suffix_is_appended() {
        assert_eq!(
            backup_path(Path::new("roms/game.sfc")),
            PathBuf::from("roms/game.sfc.bak")
        );
    }

    #[test]
    fn create_then_restore() {
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("game.nes");
        fs::write(&rom, b"original").unwrap();

        let backup = create(&rom).unwrap().unwrap();
        assert_eq!(fs::read(&backup).unwrap(), b"original");

        fs::write(&rom, b"patched!").unwrap();
        assert_eq!(create(&rom).unwrap(), None);
        assert_eq!(fs::read(&backup).unwrap(), b"original");

        restore(&rom).unwrap();
        assert_eq!(fs::read(&rom).unwrap(), b"original");
        assert!(!backup.exists());
    }

    #[test]
    fn restore_without_backup() {
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("game.nes");
        fs::write(&rom, b"data").unwrap();

        assert!(matches!(restore(&rom), Err(IpsError::NoBackup(_))));
        assert_eq!(fs::read(&rom).unwrap(), b"data");
    }

    #[test]
    fn create_needs_a_rom() {
        let dir = TempDir::new().unwrap();
        let rom = dir.path().join("missing.nes");
        assert!(matches!(create(&rom), Err(IpsError::NotFound(_))));
    }
}
