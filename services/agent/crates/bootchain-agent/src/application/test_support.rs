//! Shared fakes for application service tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use bootchain_common::{ReadyProbe, RunStatus};

use crate::application::ports::{
    CommandRunner, ConfigFiles, Exit, ReadinessProbe, RunningProcess, StatusSink,
};
use crate::domain::EnvironmentMap;

/// Ordered record of what the fakes were asked to do.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Commands are named by the last argv element. They exit 0 unless listed
/// in `failing`; main stays up until killed unless `main_exit` is set.
#[derive(Default)]
pub struct FakeRunner {
    pub journal: Journal,
    pub failing: HashMap<String, Exit>,
    pub main_exit: Option<Exit>,
    pub spawn_fails: bool,
    /// Environment passed with each command, by command name.
    pub envs: Mutex<HashMap<String, EnvironmentMap>>,
}

impl FakeRunner {
    pub fn failing(mut self, command: &str) -> Self {
        self.failing
            .insert(command.to_string(), Exit::Failure(Some(1)));
        self
    }

    pub fn env_of(&self, command: &str) -> Option<EnvironmentMap> {
        self.envs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(command)
            .cloned()
    }

    fn record_env(&self, command: &str, env: &EnvironmentMap) {
        self.envs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.to_string(), env.clone());
    }
}

fn name_of(argv: &[String]) -> String {
    argv.last().cloned().unwrap_or_default()
}

pub struct FakeChild {
    pub journal: Journal,
    pub exit: Option<Exit>,
}

impl RunningProcess for FakeChild {
    fn try_wait(&mut self) -> Result<Option<Exit>> {
        Ok(self.exit)
    }

    async fn wait(&mut self) -> Result<Exit> {
        match self.exit {
            Some(exit) => Ok(exit),
            None => std::future::pending().await,
        }
    }

    async fn kill(&mut self) -> Result<()> {
        self.journal.push("kill main");
        self.exit = Some(Exit::Failure(None));
        Ok(())
    }
}

impl CommandRunner for FakeRunner {
    type Child = FakeChild;

    async fn run(
        &self,
        argv: &[String],
        env: &EnvironmentMap,
        _timeout: Option<Duration>,
    ) -> Result<Exit> {
        let command = name_of(argv);
        self.journal.push(format!("run {command}"));
        self.record_env(&command, env);
        Ok(self.failing.get(&command).copied().unwrap_or(Exit::Success))
    }

    fn spawn(&self, argv: &[String], env: &EnvironmentMap) -> Result<FakeChild> {
        if self.spawn_fails {
            anyhow::bail!("no such program");
        }
        let command = name_of(argv);
        self.journal.push(format!("spawn {command}"));
        self.record_env(&command, env);
        Ok(FakeChild {
            journal: self.journal.clone(),
            exit: self.main_exit,
        })
    }
}

pub struct FixedProbe(pub bool);

impl ReadinessProbe for FixedProbe {
    async fn check(&self, _probe: &ReadyProbe, _env: &EnvironmentMap) -> bool {
        self.0
    }
}

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<RunStatus>>);

impl RecordingSink {
    pub fn published(&self) -> Vec<RunStatus> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl StatusSink for RecordingSink {
    async fn publish(&self, status: RunStatus) -> Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status);
        Ok(())
    }
}

/// In-memory `ConfigFiles`.
#[derive(Default)]
pub struct MemFs(Mutex<HashMap<PathBuf, String>>);

impl MemFs {
    pub fn with(files: &[(&str, &str)]) -> Self {
        let fs = Self::default();
        for (path, content) in files {
            let _ = fs.write(Path::new(path), content);
        }
        fs
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(Path::new(path))
            .cloned()
    }
}

impl ConfigFiles for MemFs {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{} not found", path.display()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}
