//! Fills `${NAME}` placeholders in a container's configuration files before
//! any command runs, and puts the originals back on exit when asked to.

use std::path::PathBuf;

use anyhow::Result;
use bootchain_common::FileSpec;

use crate::application::ports::ConfigFiles;
use crate::domain::{EnvironmentMap, substitute};

/// Originals of the files marked `restore`, kept until [`Self::restore`].
#[derive(Debug, Default)]
pub struct SubstitutedFiles {
    originals: Vec<(PathBuf, String)>,
}

impl SubstitutedFiles {
    #[must_use]
    pub fn pending_restores(&self) -> usize {
        self.originals.len()
    }

    /// Write every saved original back. All files are attempted; the first
    /// error is returned.
    pub fn restore(self, fs: &impl ConfigFiles) -> Result<()> {
        let mut first_error = None;
        for (path, original) in self.originals {
            match fs.write(&path, &original) {
                Ok(()) => tracing::info!(path = %path.display(), "restored file"),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot restore file");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Substitute every file in `files`. Unknown placeholders are left as
/// written and logged. A file that cannot be read or written fails the whole
/// step, after restoring the files already changed.
pub fn apply(
    fs: &impl ConfigFiles,
    files: &[FileSpec],
    env: &EnvironmentMap,
) -> Result<SubstitutedFiles> {
    let mut done = SubstitutedFiles::default();
    let mut touched: Vec<(PathBuf, String)> = Vec::new();

    for file in files {
        let result = fs.read_to_string(&file.path).and_then(|original| {
            let out = substitute(&original, env);
            for name in &out.unknown {
                tracing::warn!(path = %file.path.display(), placeholder = %name, "no variable for placeholder, left as is");
            }
            if out.changed(&original) {
                fs.write(&file.path, &out.text)?;
            }
            Ok(original)
        });

        match result {
            Ok(original) => {
                tracing::info!(path = %file.path.display(), "substituted file");
                if file.restore {
                    done.originals.push((file.path.clone(), original.clone()));
                }
                touched.push((file.path.clone(), original));
            }
            Err(e) => {
                // Undo earlier files so a failed start leaves no half-configured tree.
                for (path, original) in touched {
                    let _ = fs.write(&path, &original);
                }
                return Err(e.context(format!("substituting {}", file.path.display())));
            }
        }
    }
    Ok(done)
}
