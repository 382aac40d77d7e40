//! Fake process and filesystem ports shared by the scenarios.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use bootchain_agent::application::ports::{
    CommandRunner, ConfigFiles, Exit, ReadinessProbe, RunningProcess,
};
use bootchain_agent::domain::EnvironmentMap;
use bootchain_common::ReadyProbe;

/// Ordered record of every command started by any agent.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of `entry`; panics when absent so ordering asserts read well.
    pub fn position(&self, entry: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("'{entry}' never happened: {:?}", self.entries()))
    }
}

/// Commands are named by the last argv element. Names in `failing` exit 1
/// or fail to spawn; every other command succeeds and mains run until
/// killed.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    pub journal: Journal,
    pub failing: Arc<HashSet<String>>,
    pub envs: Arc<Mutex<HashMap<String, EnvironmentMap>>>,
}

impl ScriptedRunner {
    pub fn failing(journal: &Journal, names: &[&str]) -> Self {
        Self {
            journal: journal.clone(),
            failing: Arc::new(names.iter().map(ToString::to_string).collect()),
            envs: Arc::default(),
        }
    }

    pub fn env_of(&self, name: &str) -> EnvironmentMap {
        self.envs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("'{name}' never ran"))
    }

    fn record(&self, verb: &str, argv: &[String], env: &EnvironmentMap) -> String {
        let name = argv.last().cloned().unwrap_or_default();
        self.journal.push(format!("{verb} {name}"));
        self.envs.lock().unwrap().insert(name.clone(), env.clone());
        name
    }
}

pub struct ScriptedChild {
    name: String,
    journal: Journal,
    exit: Option<Exit>,
}

impl RunningProcess for ScriptedChild {
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
        self.journal.push(format!("kill {}", self.name));
        self.exit = Some(Exit::Failure(None));
        Ok(())
    }
}

impl CommandRunner for ScriptedRunner {
    type Child = ScriptedChild;

    async fn run(
        &self,
        argv: &[String],
        env: &EnvironmentMap,
        _timeout: Option<Duration>,
    ) -> Result<Exit> {
        let name = self.record("run", argv, env);
        // Let other agents interleave like real processes would.
        tokio::task::yield_now().await;
        Ok(if self.failing.contains(&name) {
            Exit::Failure(Some(1))
        } else {
            Exit::Success
        })
    }

    fn spawn(&self, argv: &[String], env: &EnvironmentMap) -> Result<ScriptedChild> {
        let name = self.record("spawn", argv, env);
        if self.failing.contains(&name) {
            anyhow::bail!("{name}: no such file or directory");
        }
        Ok(ScriptedChild {
            name,
            journal: self.journal.clone(),
            exit: None,
        })
    }
}

pub struct AlwaysReady;

impl ReadinessProbe for AlwaysReady {
    async fn check(&self, _probe: &ReadyProbe, _env: &EnvironmentMap) -> bool {
        true
    }
}

/// `ConfigFiles` with no files; the scenarios declare none.
pub struct NoFiles;

impl ConfigFiles for NoFiles {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        anyhow::bail!("unexpected read of {}", path.display())
    }

    fn write(&self, path: &Path, _content: &str) -> Result<()> {
        anyhow::bail!("unexpected write of {}", path.display())
    }
}
