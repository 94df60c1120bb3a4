//! Scripted provider fakes shared by the pipeline and handler tests.

use crate::config::AppConfig;
use crate::state::AppState;
use crate::storage::{AudioStore, ScratchAudio};
use crate::summarization::{SummaryError, SummaryResult, Summarizer};
use crate::transcription::{JobStatus, TranscriptionError, TranscriptionJob, Transcriber, Utterance};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// What a fake transcriber answers.
#[derive(Clone)]
pub enum TranscriptionScript {
    Complete { text: String, utterances: Vec<Utterance> },
    ProviderError(String),
    Timeout,
    /// Never answers, like a provider job that stays queued.
    Hang,
}

pub struct FakeTranscriber {
    script: TranscriptionScript,
    /// Scratch paths seen, with whether the file existed at call time.
    pub calls: Mutex<Vec<(PathBuf, bool)>>,
}

impl FakeTranscriber {
    pub fn new(script: TranscriptionScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn two_speakers() -> Arc<Self> {
        Self::new(TranscriptionScript::Complete {
            text: "Bom dia a todos. Bom dia, vamos começar.".to_string(),
            utterances: vec![
                Utterance::from_offsets("A", 0, 1800, "Bom dia a todos."),
                Utterance::from_offsets("B", 2100, 4300, "Bom dia, vamos começar."),
                Utterance::from_offsets("A", 4300, 5200, "Certo."),
            ],
        })
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(path, _)| path.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &ScratchAudio) -> Result<TranscriptionJob, TranscriptionError> {
        let job_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((audio.path().to_path_buf(), audio.path().exists()));
            calls.len()
        };

        match &self.script {
            TranscriptionScript::Complete { text, utterances } => Ok(TranscriptionJob {
                id: format!("fake-job-{}", job_number),
                status: JobStatus::Completed,
                text: text.clone(),
                utterances: utterances.clone(),
                error: None,
            }),
            TranscriptionScript::ProviderError(message) => Err(TranscriptionError::Provider(message.clone())),
            TranscriptionScript::Timeout => Err(TranscriptionError::Timeout {
                attempts: 3,
                elapsed_secs: 6,
            }),
            TranscriptionScript::Hang => std::future::pending().await,
        }
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

/// What a fake summarizer answers.
#[derive(Clone)]
pub enum SummaryScript {
    Reply(SummaryResult),
    Fail(fn() -> SummaryError),
}

pub struct FakeSummarizer {
    script: SummaryScript,
    pub transcripts: Mutex<Vec<String>>,
}

impl FakeSummarizer {
    pub fn new(script: SummaryScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            transcripts: Mutex::new(Vec::new()),
        })
    }

    pub fn five_insights() -> Arc<Self> {
        Self::new(SummaryScript::Reply(SummaryResult {
            summary: "A equipe abriu a reunião.".to_string(),
            insights: (1..=5).map(|i| format!("Próximo passo {}", i)).collect(),
        }))
    }

    pub fn call_count(&self) -> usize {
        self.transcripts.lock().unwrap().len()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<SummaryResult, SummaryError> {
        self.transcripts.lock().unwrap().push(transcript.to_string());
        match &self.script {
            SummaryScript::Reply(result) => Ok(result.clone()),
            SummaryScript::Fail(make_error) => Err(make_error()),
        }
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

/// An `AppState` over a fresh scratch directory and the given fakes.
pub fn state_with(
    transcriber: Arc<FakeTranscriber>,
    summarizer: Arc<FakeSummarizer>,
) -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let store = AudioStore::new(dir.path().join("scratch"), "webm").unwrap();
    let state = AppState::new(AppConfig::default(), store, transcriber, summarizer);
    (dir, state)
}

/// Files currently present in the state's scratch directory.
pub fn scratch_files(state: &AppState) -> Vec<PathBuf> {
    std::fs::read_dir(state.store.dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}
