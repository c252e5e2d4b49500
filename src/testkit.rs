//! Scripted media engine for exercising the lifecycle manager, the session
//! controller and the driver loop without a media framework.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;

use crate::catalog::MediaItem;
use crate::error::LoadError;
use crate::events::{PipelineEvent, PipelineEvents, SurfaceHandle};
use crate::pipeline::{MediaEngine, Pipeline, PipelineTemplate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Build {
        path: PathBuf,
        template: PipelineTemplate,
    },
    Play(PathBuf),
    Pause {
        path: PathBuf,
        paused: bool,
    },
    Attach {
        path: PathBuf,
        surface: SurfaceHandle,
    },
    Shutdown(PathBuf),
}

/// Shared, ordered record of every engine call.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<EngineCall>>>);

impl Journal {
    fn record(&self, call: EngineCall) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Paths whose pipelines were asked to play, in order.
    pub fn played(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Play(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// File names of played items, for compact assertions.
    pub fn played_names(&self) -> Vec<String> {
        self.played()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    /// Pipelines built and not yet shut down.
    pub fn live(&self) -> usize {
        self.calls().iter().fold(0usize, |live, call| match call {
            EngineCall::Build { .. } => live + 1,
            EngineCall::Shutdown(_) => live.saturating_sub(1),
            _ => live,
        })
    }

    /// Largest number of pipelines alive at once over the whole journal.
    pub fn peak_live(&self) -> usize {
        let mut live = 0usize;
        let mut peak = 0usize;
        for call in self.calls() {
            match call {
                EngineCall::Build { .. } => live += 1,
                EngineCall::Shutdown(_) => live = live.saturating_sub(1),
                _ => {}
            }
            peak = peak.max(live);
        }
        peak
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedEngine {
    journal: Journal,
    fail_build: HashSet<PathBuf>,
    fail_start: HashSet<PathBuf>,
    error_on_start: HashSet<PathBuf>,
    eos_on_start: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    #[must_use]
    pub fn fail_build(mut self, path: impl AsRef<Path>) -> Self {
        self.fail_build.insert(path.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn fail_start(mut self, path: impl AsRef<Path>) -> Self {
        self.fail_start.insert(path.as_ref().to_path_buf());
        self
    }

    /// Start succeeds, then the pipeline reports a playback error.
    #[must_use]
    pub fn error_on_start(mut self, path: impl AsRef<Path>) -> Self {
        self.error_on_start.insert(path.as_ref().to_path_buf());
        self
    }

    /// Videos report end-of-stream as soon as they start.
    #[must_use]
    pub fn eos_on_start(mut self) -> Self {
        self.eos_on_start = true;
        self
    }
}

impl MediaEngine for ScriptedEngine {
    type Pipeline = ScriptedPipeline;

    fn build(
        &self,
        template: PipelineTemplate,
        item: &MediaItem,
        events: PipelineEvents,
    ) -> Result<ScriptedPipeline, LoadError> {
        let path = item.path().to_path_buf();
        if self.fail_build.contains(&path) {
            return Err(LoadError::Build(format!("no element for {}", path.display())));
        }
        self.journal.record(EngineCall::Build {
            path: path.clone(),
            template,
        });
        Ok(ScriptedPipeline {
            fail_start: self.fail_start.contains(&path),
            error_on_start: self.error_on_start.contains(&path),
            eos_on_start: self.eos_on_start && item.is_video(),
            journal: self.journal.clone(),
            events,
            path,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedPipeline {
    path: PathBuf,
    journal: Journal,
    events: PipelineEvents,
    fail_start: bool,
    error_on_start: bool,
    eos_on_start: bool,
}

impl Pipeline for ScriptedPipeline {
    fn play(&self) -> Result<(), LoadError> {
        if self.fail_start {
            return Err(LoadError::StartFailed(self.path.display().to_string()));
        }
        self.journal.record(EngineCall::Play(self.path.clone()));
        self.events.emit(PipelineEvent::SurfaceReadyRequest);
        if self.error_on_start {
            self.events.emit(PipelineEvent::Error {
                message: "scripted decode error".into(),
                debug: Some(self.path.display().to_string()),
            });
        }
        if self.eos_on_start {
            self.events.emit(PipelineEvent::EndOfStream);
        }
        Ok(())
    }

    fn set_paused(&self, paused: bool) {
        self.journal.record(EngineCall::Pause {
            path: self.path.clone(),
            paused,
        });
    }

    fn attach_surface(&self, surface: SurfaceHandle) {
        self.journal.record(EngineCall::Attach {
            path: self.path.clone(),
            surface,
        });
    }

    fn shutdown(self) -> Result<()> {
        self.journal.record(EngineCall::Shutdown(self.path));
        Ok(())
    }
}
