#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use interview_qa::config::{parse_config, Config};
use interview_qa::embedding::Embedder;
use interview_qa::feedback::FileFeedbackSink;
use interview_qa::generate::Generator;
use interview_qa::models::{Document, MIME_TEXT};
use interview_qa::pipeline::Pipeline;

const VOCAB: &[&str] = &[
    "cache",
    "lru",
    "eviction",
    "distributed",
    "policy",
    "kubernetes",
    "deployed",
    "team",
    "led",
    "rust",
    "python",
    "salary",
    "remote",
    "startup",
    "database",
    "migration",
];

/// Counts vocabulary words. Texts sharing no vocabulary words score zero.
#[derive(Default)]
pub struct VocabEmbedder {
    pub calls: AtomicUsize,
}

impl VocabEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; VOCAB.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if let Some(i) = VOCAB.iter().position(|v| *v == word) {
                v[i] += 1.0;
            }
        }
        v
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab-test"
    }

    fn dims(&self) -> usize {
        VOCAB.len()
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Answers "LRU eviction." when the context mentions it and remembers every
/// prompt it was given.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording-test"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("LRU eviction") {
            Ok("LRU eviction.".to_string())
        } else {
            Ok("I don't know based on the uploaded documents.".to_string())
        }
    }
}

pub struct Harness {
    pub config: Config,
    pub embedder: Arc<VocabEmbedder>,
    pub generator: Arc<RecordingGenerator>,
    pub feedback: Arc<FileFeedbackSink>,
    pub pipeline: Pipeline,
}

/// Pipeline rooted in `root` with a small chunk window (200 / 80) so a
/// sentence of up to 80 characters always lands whole in some chunk.
pub fn harness(root: &Path, top_k: usize) -> Harness {
    let toml = format!(
        r#"[index]
path = "{root}/data/index.sqlite"

[chunking]
chunk_size = 200
overlap = 80

[retrieval]
top_k = {top_k}

[feedback]
path = "{root}/data/feedback.txt"
"#,
        root = root.display(),
        top_k = top_k
    );
    let config = parse_config(&toml).unwrap();

    let embedder = Arc::new(VocabEmbedder::default());
    let generator = Arc::new(RecordingGenerator::default());
    let feedback = Arc::new(FileFeedbackSink::new(config.feedback.path.clone()));
    let pipeline = Pipeline::new(
        &config,
        embedder.clone(),
        generator.clone(),
        feedback.clone(),
    );

    Harness {
        config,
        embedder,
        generator,
        feedback,
        pipeline,
    }
}

pub fn text_doc(name: &str, text: &str) -> Document {
    Document::new(name, MIME_TEXT, text.as_bytes().to_vec())
}

pub fn resume() -> Document {
    text_doc(
        "resume.txt",
        "Jordan Lee, Senior Engineer.\n\n\
         Led a team of five building a payments platform in Rust, deployed on Kubernetes \
         across three regions with blue green releases.\n\n\
         Mentored new hires and ran weekly design reviews for the checkout flow.\n\n\
         The project used a distributed cache with LRU eviction.\n\n\
         Wrote the incident runbooks and the on call rotation guides.\n\n\
         Owned the Postgres database migration from a legacy schema, with zero downtime \
         and nightly verification jobs comparing row counts.\n\n\
         Earlier work at a startup included Python data pipelines and remote collaboration \
         across time zones.",
    )
}

pub fn job_description() -> Document {
    text_doc(
        "job.md",
        "# Staff Engineer\n\nFully remote role. The team runs services on Kubernetes and \
         expects strong Rust experience. Salary range is listed on request.",
    )
}
