use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::index::TaskDateIndex;
use crate::task::{NewTask, Task, TaskPatch};

/// Task CRUD as the backend exposes it. Last write wins; there is no
/// version or conflict check.
pub trait TaskService {
    fn create(&self, new_task: NewTask) -> anyhow::Result<Task>;
    fn list(&self) -> anyhow::Result<Vec<Task>>;
    fn update(&self, id: &str, patch: TaskPatch) -> anyhow::Result<Task>;
    fn delete(&self, id: &str) -> anyhow::Result<()>;

    fn toggle_done(&self, id: &str, done: bool) -> anyhow::Result<()> {
        self.update(id, TaskPatch::done(done)).map(|_| ())
    }
}

/// JSON-lines task file standing in for the remote task service.
#[derive(Debug)]
pub struct TaskStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")
                .with_context(|| format!("failed to create {}", tasks_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened task store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    #[tracing::instrument(skip(self, tasks))]
    fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks).context("failed to save tasks.data")
    }

    fn load(&self) -> anyhow::Result<Vec<Task>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }
}

impl TaskService for TaskStore {
    #[tracing::instrument(skip(self, new_task), fields(date = %new_task.date))]
    fn create(&self, new_task: NewTask) -> anyhow::Result<Task> {
        let task = new_task.into_task(Uuid::new_v4().to_string())?;
        let mut tasks = self.load()?;
        tasks.push(task.clone());
        self.save(&tasks)?;
        info!(id = %task.id, "created task");
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    fn list(&self) -> anyhow::Result<Vec<Task>> {
        self.load()
    }

    #[tracing::instrument(skip(self, patch))]
    fn update(&self, id: &str, patch: TaskPatch) -> anyhow::Result<Task> {
        let mut tasks = self.load()?;
        let slot = tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("task not found: {id}"))?;

        let updated = slot.patched(&patch)?;
        *slot = updated.clone();
        self.save(&tasks)?;
        debug!(id, "updated task");
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut tasks = self.load()?;
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() == before {
            return Err(anyhow!("task not found: {id}"));
        }
        self.save(&tasks)?;
        info!(id, "deleted task");
        Ok(())
    }
}

/// The session's copy of the task collection. Replaced wholesale on
/// every reload; whichever reload finishes last wins.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
}

impl TaskCache {
    #[tracing::instrument(skip(self, service))]
    pub fn reload<S: TaskService + ?Sized>(&mut self, service: &S) -> anyhow::Result<()> {
        self.tasks = service.list()?;
        debug!(count = self.tasks.len(), "reloaded task cache");
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn index(&self) -> TaskDateIndex<'_> {
        TaskDateIndex::build(&self.tasks)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        crate::index::lookup_by_id(&self.tasks, id)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
