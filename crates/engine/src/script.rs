// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script materialization for multi-command jobs

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// First lines of every generated script.
pub const SCRIPT_HEADER: &str = "#!/bin/bash\nset +x\n\n";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to write script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Write `commands` as an executable bash script at `path`.
///
/// One command per line after [`SCRIPT_HEADER`], in order. An existing file
/// is replaced. The script is written to a sibling `.tmp` file and renamed
/// into place, so `path` never holds a partial script.
pub fn materialize(path: &Path, commands: &[String]) -> Result<PathBuf, ScriptError> {
    let wrap = |source: io::Error| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }

    let tmp_path = path.with_extension("tmp");
    write_script(&tmp_path, commands).map_err(wrap)?;
    set_executable(&tmp_path).map_err(wrap)?;
    fs::rename(&tmp_path, path).map_err(wrap)?;

    Ok(path.to_path_buf())
}

fn write_script(path: &Path, commands: &[String]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(SCRIPT_HEADER.as_bytes())?;
    for command in commands {
        file.write_all(command.as_bytes())?;
        file.write_all(b"\n")?;
    }
    file.sync_all()
}

fn set_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
