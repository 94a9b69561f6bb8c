use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info, warn};

use crate::error::ValidationError;
use crate::models::{ContentKind, GeneratedContent, JobApplication};
use crate::store::{ContentStore, NewContent};

// --- Providers ---

pub trait AIProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// The local `claude` CLI; no API key needed.
    ClaudeCli,
    Anthropic,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

// (short name, aliases, provider, model id)
const MODELS: [(&str, &[&str], ProviderKind, &str); 6] = [
    ("claude-sonnet", &["sonnet"], ProviderKind::ClaudeCli, "claude-sonnet-4-5-20250929"),
    ("claude-haiku", &["haiku"], ProviderKind::ClaudeCli, "claude-haiku-4-5-20251001"),
    ("api-sonnet", &[], ProviderKind::Anthropic, "claude-sonnet-4-5-20250929"),
    ("api-haiku", &[], ProviderKind::Anthropic, "claude-haiku-4-5-20251001"),
    ("gpt-4o", &[], ProviderKind::OpenAI, "gpt-4o"),
    ("gpt-4o-mini", &[], ProviderKind::OpenAI, "gpt-4o-mini"),
];

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let wanted = name.trim().to_lowercase();
    MODELS
        .iter()
        .find(|(short, aliases, _, _)| *short == wanted || aliases.contains(&wanted.as_str()))
        .map(|(short, _, provider, model_id)| ModelSpec {
            provider: *provider,
            model_id: model_id.to_string(),
            short_name: short.to_string(),
        })
        .ok_or_else(|| {
            let available: Vec<_> = MODELS.iter().map(|(short, ..)| *short).collect();
            anyhow!("Unknown model '{}'. Available: {}", name, available.join(", "))
        })
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    let model_id = spec.model_id.clone();
    Ok(match spec.provider {
        ProviderKind::ClaudeCli => Box::new(ClaudeCliProvider::new(model_id)?),
        ProviderKind::Anthropic => Box::new(ApiProvider::new(Api::Anthropic, model_id)?),
        ProviderKind::OpenAI => Box::new(ApiProvider::new(Api::OpenAI, model_id)?),
    })
}

// --- `claude` CLI ---

#[derive(Debug)]
pub struct ClaudeCliProvider {
    model_id: String,
}

impl ClaudeCliProvider {
    pub fn new(model_id: String) -> Result<Self> {
        std::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("The 'claude' CLI is not installed. Pick an api-* or gpt-* model with --model.")?;
        Ok(Self { model_id })
    }
}

impl AIProvider for ClaudeCliProvider {
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        debug!(model = %self.model_id, "running claude cli");
        let output = std::process::Command::new("claude")
            .args(["-p", prompt, "--model", self.model_id.as_str()])
            .output()
            .context("Could not start the 'claude' CLI")?;

        if !output.status.success() {
            return Err(anyhow!(
                "The 'claude' CLI did not finish the draft: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        String::from_utf8(output.stdout).context("The 'claude' CLI produced text that is not UTF-8")
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Hosted APIs ---

#[derive(Debug, Clone, Copy)]
enum Api {
    Anthropic,
    OpenAI,
}

impl Api {
    fn name(self) -> &'static str {
        match self {
            Api::Anthropic => "Anthropic",
            Api::OpenAI => "OpenAI",
        }
    }

    fn key_var(self) -> &'static str {
        match self {
            Api::Anthropic => "ANTHROPIC_API_KEY",
            Api::OpenAI => "OPENAI_API_KEY",
        }
    }

    fn url(self) -> &'static str {
        match self {
            Api::Anthropic => "https://api.anthropic.com/v1/messages",
            Api::OpenAI => "https://api.openai.com/v1/chat/completions",
        }
    }
}

/// Request body both APIs accept for a single user turn.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicReply {
    content: Vec<TextBlock>,
}

#[derive(Debug, Deserialize)]
struct TextBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIReply {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: TextMessage,
}

#[derive(Debug, Deserialize)]
struct TextMessage {
    content: String,
}

#[derive(Debug)]
pub struct ApiProvider {
    api: Api,
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl ApiProvider {
    fn new(api: Api, model_id: String) -> Result<Self> {
        let api_key = env::var(api.key_var()).with_context(|| {
            format!("{} is not set; drafting with {} needs an API key", api.key_var(), model_id)
        })?;
        Ok(Self {
            api,
            api_key,
            model_id,
            client: reqwest::blocking::Client::new(),
        })
    }
}

impl AIProvider for ApiProvider {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let name = self.api.name();
        debug!(api = name, model = %self.model_id, "sending draft request");

        let body = ChatRequest {
            model: &self.model_id,
            max_tokens,
            messages: [ChatMessage { role: "user", content: prompt }],
        };
        let request = self.client.post(self.api.url()).json(&body);
        let request = match self.api {
            Api::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            Api::OpenAI => request.bearer_auth(&self.api_key),
        };
        let response = request
            .send()
            .with_context(|| format!("Could not reach {} to draft content", name))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(anyhow!("{} refused the draft request ({}): {}", name, status, detail));
        }

        let text = match self.api {
            Api::Anthropic => response
                .json::<AnthropicReply>()
                .map(|reply| reply.content.into_iter().next().map(|block| block.text)),
            Api::OpenAI => response
                .json::<OpenAIReply>()
                .map(|reply| reply.choices.into_iter().next().map(|choice| choice.message.content)),
        }
        .with_context(|| format!("Unreadable reply from {}", name))?;
        text.ok_or_else(|| anyhow!("{} sent back no draft text", name))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Content generation ---

/// What the user supplies for one generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationInput {
    pub job: Option<JobApplication>,
    pub job_description: String,
    pub highlights: Option<String>,
    pub resume: Option<String>,
}

/// Serialized alongside the stored record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputData<'a> {
    content_type: ContentKind,
    company: Option<&'a str>,
    role: Option<&'a str>,
    job_description: &'a str,
    highlights: Option<&'a str>,
    has_resume: bool,
}

impl GenerationInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.job.is_none() && self.job_description.trim().is_empty() {
            return Err(ValidationError::MissingField("job or job description"));
        }
        Ok(())
    }

    fn to_json(&self, kind: ContentKind) -> Result<String> {
        let data = InputData {
            content_type: kind,
            company: self.job.as_ref().map(|j| j.company.as_str()),
            role: self.job.as_ref().map(|j| j.role.as_str()),
            job_description: self.job_description.trim(),
            highlights: self.highlights.as_deref(),
            has_resume: self.resume.is_some(),
        };
        Ok(serde_json::to_string(&data)?)
    }
}

fn instructions(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Resume => {
            "Write a complete, ATS-friendly resume in clean markdown tailored to the position. \
             Lead with the most relevant skills, then experience with measurable achievements."
        }
        ContentKind::Email => {
            "Write a short cold email to the hiring manager for this position. \
             Start with a 'Subject:' line, keep the body under 200 words, and end with a clear ask."
        }
        ContentKind::Referral => {
            "Write a friendly message asking a contact at the company for a referral to this position. \
             Keep it brief, mention why the role fits, and make it easy to say yes."
        }
        ContentKind::Linkedin => {
            "Write a LinkedIn connection message to someone at the company about this position. \
             It must fit in 300 characters."
        }
        ContentKind::Cover => {
            "Write a professional cover letter for this position, three to four paragraphs, \
             opening with 'Dear Hiring Manager,' and closing with a sign-off."
        }
    }
}

pub fn build_prompt(kind: ContentKind, input: &GenerationInput) -> String {
    let mut prompt = format!(
        "You are an expert career writer. {}\n\n\
         Stay truthful: only use facts from the material below. Return only the {} text, no commentary.\n\n",
        instructions(kind),
        kind.label().to_lowercase()
    );

    if let Some(job) = &input.job {
        prompt.push_str(&format!("Company: {}\nRole: {}\n\n", job.company, job.role));
    }
    if !input.job_description.trim().is_empty() {
        prompt.push_str(&format!("Job Description:\n{}\n\n", input.job_description.trim()));
    }
    if let Some(highlights) = &input.highlights {
        prompt.push_str(&format!("Strengths to highlight:\n{}\n\n", highlights));
    }
    if let Some(resume) = &input.resume {
        prompt.push_str(&format!("Candidate Resume:\n{}\n\n", resume));
    }
    prompt
}

pub struct ContentGenerator<'a> {
    provider: &'a dyn AIProvider,
    store: &'a dyn ContentStore,
}

impl<'a> ContentGenerator<'a> {
    pub fn new(provider: &'a dyn AIProvider, store: &'a dyn ContentStore) -> Self {
        Self { provider, store }
    }

    /// Calls the provider and stores the result. Nothing is stored unless
    /// the provider returns a non-empty body.
    pub fn generate(&self, kind: ContentKind, input: &GenerationInput) -> Result<GeneratedContent> {
        input.validate()?;
        let prompt = build_prompt(kind, input);
        info!(kind = %kind, model = self.provider.model_name(), "generating content");

        let body = self
            .provider
            .complete(&prompt, 4096)
            .inspect_err(|e| warn!(kind = %kind, error = %e, "generation failed"))
            .context("Content generation failed")?;
        let body = body.trim();
        if body.is_empty() {
            return Err(anyhow!("Content generation failed: provider returned no content"));
        }

        let input_json = input.to_json(kind)?;
        self.store.create_content(&NewContent {
            kind,
            job: input.job.as_ref(),
            input: &input_json,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ContentFilter, JobStatus, NewApplication, User};
    use crate::store::ApplicationStore;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    struct FakeProvider {
        reply: Result<String, String>,
        prompts: RefCell<Vec<String>>,
    }

    impl FakeProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                prompts: RefCell::new(vec![]),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                prompts: RefCell::new(vec![]),
            }
        }
    }

    impl AIProvider for FakeProvider {
        fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(|e| anyhow!(e))
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn setup() -> (Database, User) {
        let db = Database::open_in_memory().unwrap();
        let user = User {
            id: "u1".to_string(),
            name: "Jane".to_string(),
            email: "jane@example.com".to_string(),
        };
        db.insert_user(&user, "hash").unwrap();
        (db, user)
    }

    fn job() -> JobApplication {
        JobApplication {
            id: "j1".to_string(),
            company: "Data Systems".to_string(),
            role: "Full Stack Engineer".to_string(),
            applied_date: NaiveDate::from_ymd_opt(2025, 4, 25).unwrap(),
            status: JobStatus::Applied,
            notes: None,
            resume_attached: true,
        }
    }

    #[test]
    fn test_resolve_model_claude_cli() {
        let spec = resolve_model("sonnet").unwrap();
        assert_eq!(spec.short_name, "claude-sonnet");
        assert_eq!(spec.provider, ProviderKind::ClaudeCli);
        assert_eq!(resolve_model(" Claude-Haiku ").unwrap().short_name, "claude-haiku");
    }

    #[test]
    fn test_resolve_model_api_providers() {
        assert_eq!(resolve_model("api-haiku").unwrap().provider, ProviderKind::Anthropic);
        let spec = resolve_model("gpt-4o").unwrap();
        assert_eq!(spec.model_id, "gpt-4o");
        assert_eq!(spec.provider, ProviderKind::OpenAI);
    }

    #[test]
    fn test_resolve_model_unknown() {
        let err = resolve_model("gpt-3").unwrap_err().to_string();
        assert!(err.contains("gpt-3"));
        assert!(err.contains("claude-sonnet, claude-haiku"));
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let original = env::var("OPENAI_API_KEY").ok();
        unsafe { env::remove_var("OPENAI_API_KEY"); }

        let result = ApiProvider::new(Api::OpenAI, "gpt-4o".to_string());

        if let Some(val) = original {
            unsafe { env::set_var("OPENAI_API_KEY", val); }
        }

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_build_prompt_includes_job_and_kind() {
        let input = GenerationInput {
            job: Some(job()),
            job_description: "Build distributed systems".to_string(),
            highlights: Some("Rust, SQL".to_string()),
            resume: None,
        };
        let prompt = build_prompt(ContentKind::Cover, &input);
        assert!(prompt.contains("Dear Hiring Manager"));
        assert!(prompt.contains("Company: Data Systems"));
        assert!(prompt.contains("Build distributed systems"));
        assert!(prompt.contains("Rust, SQL"));
        assert!(!prompt.contains("Candidate Resume"));
    }

    #[test]
    fn test_generate_stores_result() {
        let (db, user) = setup();
        let ws = db.workspace(&user);
        let created = ws
            .create_application(&NewApplication {
                company: "Data Systems".to_string(),
                role: "Full Stack Engineer".to_string(),
                applied_date: NaiveDate::from_ymd_opt(2025, 4, 25).unwrap(),
                status: JobStatus::Applied,
                notes: None,
                resume_attached: true,
            })
            .unwrap();
        let provider = FakeProvider::replying("  Subject: Full Stack Engineer\n\nHello,  \n");
        let generator = ContentGenerator::new(&provider, &ws);

        let input = GenerationInput {
            job: Some(created.clone()),
            job_description: "Distributed systems".to_string(),
            ..Default::default()
        };
        let content = generator.generate(ContentKind::Email, &input).unwrap();

        assert_eq!(content.body, "Subject: Full Stack Engineer\n\nHello,");
        assert_eq!(content.job_id.as_deref(), Some(created.id.as_str()));
        assert_eq!(content.company.as_deref(), Some("Data Systems"));
        assert!(content.input.contains("\"contentType\":\"email\""));
        assert_eq!(provider.prompts.borrow().len(), 1);
        assert_eq!(ws.list_content(&ContentFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_generate_failure_stores_nothing() {
        let (db, user) = setup();
        let ws = db.workspace(&user);
        let provider = FakeProvider::failing("execution did not complete");
        let generator = ContentGenerator::new(&provider, &ws);

        let input = GenerationInput {
            job_description: "Platform role".to_string(),
            ..Default::default()
        };
        let err = generator.generate(ContentKind::Resume, &input).unwrap_err();
        assert!(format!("{:#}", err).contains("execution did not complete"));
        assert!(ws.list_content(&ContentFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_generate_empty_reply_is_failure() {
        let (db, user) = setup();
        let ws = db.workspace(&user);
        let provider = FakeProvider::replying("   \n");
        let generator = ContentGenerator::new(&provider, &ws);

        let input = GenerationInput {
            job_description: "Platform role".to_string(),
            ..Default::default()
        };
        assert!(generator.generate(ContentKind::Linkedin, &input).is_err());
        assert!(ws.list_content(&ContentFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_generate_requires_job_or_description() {
        let (db, user) = setup();
        let ws = db.workspace(&user);
        let provider = FakeProvider::replying("text");
        let generator = ContentGenerator::new(&provider, &ws);

        assert!(generator
            .generate(ContentKind::Cover, &GenerationInput::default())
            .is_err());
        assert!(provider.prompts.borrow().is_empty());
    }
}
