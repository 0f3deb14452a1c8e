//! JSON session files

use std::{fs, io, path::Path};

use carton::session::MemorySession;

use crate::cli::CliError;

/// Read a session file; a missing file is an empty session.
pub(crate) fn read(path: &Path) -> Result<MemorySession, CliError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(MemorySession::new()),
        Err(error) => Err(error.into()),
    }
}

pub(crate) fn write(path: &Path, session: &MemorySession) -> Result<(), CliError> {
    let contents = serde_json::to_string_pretty(session)?;

    fs::write(path, contents)?;

    Ok(())
}
