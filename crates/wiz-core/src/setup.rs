//! First-run setup as a question/answer state machine
//!
//! [`SetupFlow`] knows nothing about terminals: the caller shows
//! [`SetupFlow::current`], feeds the user's line to [`SetupFlow::answer`] and
//! repeats until [`SetupFlow::is_finished`]. Tests drive it with scripted
//! answers.
//!
//! Only settings that are missing are asked for, so re-running setup on a
//! complete environment asks nothing. Changing an existing `wiz.yml` needs an
//! explicit confirmation.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::naming;

/// Default docker registry server for image pull secrets
pub const DEFAULT_REGISTRY: &str = "ghcr.io";

/// Identifies what an answer is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetupKey {
    Context,
    Namespace,
    EnvName,
    Chart,
    ReleaseName,
    /// A `.env` variable required by a binding
    EnvVar(String),
    /// Confirmation to rewrite an existing `wiz.yml`
    ConfirmOverwrite,
    RegistryServer,
    RegistryEmail,
    RegistryUsername,
    RegistryPassword,
}

impl SetupKey {
    /// `wiz.yml` key this answer is stored under, if any
    pub fn spec_field(&self) -> Option<&'static str> {
        match self {
            SetupKey::Context => Some("context"),
            SetupKey::Namespace => Some("namespace"),
            SetupKey::EnvName => Some("envName"),
            SetupKey::Chart => Some("chart"),
            SetupKey::ReleaseName => Some("releaseName"),
            _ => None,
        }
    }
}

/// How an answer is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Any,
    NonEmpty,
    DnsLabel,
    YesNo,
}

impl Validator {
    fn check(&self, answer: &str) -> std::result::Result<(), String> {
        match self {
            Validator::Any => Ok(()),
            Validator::NonEmpty if answer.is_empty() => Err("a value is required".to_string()),
            Validator::NonEmpty => Ok(()),
            Validator::DnsLabel if naming::is_dns_label(answer) => Ok(()),
            Validator::DnsLabel => Err(
                "use at most 63 lowercase letters, digits or '-', starting and ending with a letter or digit"
                    .to_string(),
            ),
            Validator::YesNo => parse_yes_no(answer)
                .map(|_| ())
                .ok_or_else(|| "answer y or n".to_string()),
        }
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// One step of the dialogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub key: SetupKey,
    pub prompt: String,
    pub default: Option<String>,
    pub validator: Validator,
    /// Input should not be echoed
    pub secret: bool,
}

impl Question {
    pub fn new(key: SetupKey, prompt: impl Into<String>, validator: Validator) -> Self {
        Self {
            key,
            prompt: prompt.into(),
            default: None,
            validator,
            secret: false,
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Progress after an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Another question follows
    Next,
    /// All questions answered
    Finished,
    /// The user declined a confirmation
    Aborted,
}

/// Sequential question/answer dialogue
#[derive(Debug, Clone)]
pub struct SetupFlow {
    questions: Vec<Question>,
    position: usize,
    answers: IndexMap<SetupKey, String>,
    aborted: bool,
    /// Chart name used to derive the default release name
    release_prefix: Option<String>,
    /// Environment name already configured
    known_env_name: Option<String>,
    /// Suffix of an image pull secret name to generate
    pull_secret_suffix: Option<String>,
}

impl SetupFlow {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            position: 0,
            answers: IndexMap::new(),
            aborted: false,
            release_prefix: None,
            known_env_name: None,
            pull_secret_suffix: None,
        }
    }

    /// The question to ask next, with its default resolved
    pub fn current(&self) -> Option<Question> {
        if self.aborted {
            return None;
        }
        let mut question = self.questions.get(self.position)?.clone();
        if question.key == SetupKey::ReleaseName && question.default.is_none() {
            question.default = self.default_release_name();
        }
        Some(question)
    }

    /// Feed an answer to the current question
    ///
    /// An empty answer takes the default. An invalid answer leaves the flow
    /// on the same question and returns the reason.
    pub fn answer(&mut self, input: &str) -> std::result::Result<Advance, String> {
        let Some(question) = self.current() else {
            return Ok(if self.aborted { Advance::Aborted } else { Advance::Finished });
        };

        let trimmed = if question.secret { input } else { input.trim() };
        let value = match (trimmed.is_empty(), &question.default) {
            (true, Some(default)) => default.clone(),
            _ => trimmed.to_string(),
        };
        question.validator.check(&value)?;

        if question.validator == Validator::YesNo && parse_yes_no(&value) == Some(false) {
            self.aborted = true;
            return Ok(Advance::Aborted);
        }

        self.answers.insert(question.key, value);
        self.position += 1;
        Ok(if self.position >= self.questions.len() {
            Advance::Finished
        } else {
            Advance::Next
        })
    }

    pub fn is_finished(&self) -> bool {
        self.aborted || self.position >= self.questions.len()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether there is nothing to ask at all
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, key: &SetupKey) -> Option<&str> {
        self.answers.get(key).map(String::as_str)
    }

    pub fn answers(&self) -> impl Iterator<Item = (&SetupKey, &str)> {
        self.answers.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Answered `.env` variables, in question order
    pub fn env_vars(&self) -> Vec<(String, String)> {
        self.answers
            .iter()
            .filter_map(|(key, value)| match key {
                SetupKey::EnvVar(name) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Environment name, answered or already configured
    pub fn env_name(&self) -> Option<&str> {
        self.get(&SetupKey::EnvName)
            .or(self.known_env_name.as_deref())
    }

    /// Image pull secret name this setup adds to `wiz.yml`, if any
    pub fn generated_pull_secret(&self) -> Option<String> {
        let suffix = self.pull_secret_suffix.as_deref()?;
        Some(naming::image_pull_secret_name(self.env_name()?, suffix))
    }

    fn default_release_name(&self) -> Option<String> {
        let prefix = self.release_prefix.as_deref()?;
        Some(naming::release_name(prefix, self.env_name()?))
    }
}

/// Settings already present in the environment directory
#[derive(Debug, Clone, Default)]
pub struct ExistingSetup {
    /// Whether `wiz.yml` exists
    pub spec_exists: bool,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub env_name: Option<String>,
    pub chart: Option<String>,
    pub release_name: Option<String>,
    pub image_pull_secret: Option<String>,
    /// Variables referenced by bindings but absent from `.env`
    pub missing_env_vars: Vec<String>,
}

impl ExistingSetup {
    /// Read known settings from a (possibly partial) `wiz.yml` document
    pub fn from_document(doc: Option<&Mapping>) -> Self {
        let field = |name: &str| {
            doc.and_then(|d| d.get(name))
                .and_then(YamlValue::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Self {
            spec_exists: doc.is_some(),
            context: field("context"),
            namespace: field("namespace"),
            env_name: field("envName"),
            chart: field("chart"),
            release_name: field("releaseName"),
            image_pull_secret: field("imagePullSecret"),
            missing_env_vars: Vec::new(),
        }
    }
}

/// Defaults offered for missing settings
#[derive(Debug, Clone, Default)]
pub struct SetupDefaults {
    /// `--context` or the current kubectl context
    pub context: Option<String>,
    /// `--namespace`, if given
    pub namespace: Option<String>,
    /// Usually the environment directory name
    pub env_name: Option<String>,
    /// Chart path relative to the environment directory
    pub chart: Option<String>,
    /// Chart name from `Chart.yaml`
    pub chart_name: Option<String>,
    /// Random suffix for generating an image pull secret name; `None` skips it
    pub pull_secret_suffix: Option<String>,
}

/// Plan the questions for the `wiz.yml` / `.env` part of setup
pub fn plan_config(existing: &ExistingSetup, defaults: &SetupDefaults) -> SetupFlow {
    let mut questions = Vec::new();

    if existing.context.is_none() {
        questions.push(
            Question::new(SetupKey::Context, "Cluster context", Validator::NonEmpty)
                .with_default(defaults.context.clone()),
        );
    }
    if existing.namespace.is_none() {
        questions.push(
            Question::new(SetupKey::Namespace, "Namespace", Validator::DnsLabel)
                .with_default(defaults.namespace.clone()),
        );
    }
    if existing.env_name.is_none() {
        questions.push(
            Question::new(SetupKey::EnvName, "Env name (e.g., dev, prod)", Validator::DnsLabel)
                .with_default(defaults.env_name.clone()),
        );
    }
    if existing.chart.is_none() {
        questions.push(
            Question::new(SetupKey::Chart, "Chart path or reference", Validator::NonEmpty)
                .with_default(defaults.chart.clone()),
        );
    }
    if existing.release_name.is_none() {
        questions.push(Question::new(
            SetupKey::ReleaseName,
            "Release name",
            Validator::DnsLabel,
        ));
    }

    let generates_pull_secret =
        existing.image_pull_secret.is_none() && defaults.pull_secret_suffix.is_some();

    if existing.spec_exists && (!questions.is_empty() || generates_pull_secret) {
        questions.push(
            Question::new(
                SetupKey::ConfirmOverwrite,
                "wiz.yml already exists. Write the new settings into it? (y/n)",
                Validator::YesNo,
            )
            .with_default(Some("n".to_string())),
        );
    }

    for name in &existing.missing_env_vars {
        questions.push(Question::new(
            SetupKey::EnvVar(name.clone()),
            format!("Value for {} (.env)", name),
            Validator::Any,
        ));
    }

    let mut flow = SetupFlow::new(questions);
    flow.release_prefix = defaults.chart_name.clone();
    flow.known_env_name = existing.env_name.clone();
    if generates_pull_secret {
        flow.pull_secret_suffix = defaults.pull_secret_suffix.clone();
    }
    flow
}

/// Plan the questions for creating a docker-registry image pull secret
pub fn plan_registry() -> SetupFlow {
    SetupFlow::new(vec![
        Question::new(SetupKey::RegistryServer, "Hostname", Validator::NonEmpty)
            .with_default(Some(DEFAULT_REGISTRY.to_string())),
        Question::new(SetupKey::RegistryEmail, "Email", Validator::NonEmpty),
        Question::new(SetupKey::RegistryUsername, "Username", Validator::NonEmpty),
        Question::new(SetupKey::RegistryPassword, "Password", Validator::NonEmpty).secret(),
    ])
}

/// Write answered `wiz.yml` settings into a document, keeping everything else
///
/// Returns whether the document changed.
pub fn apply_to_document(doc: &mut Mapping, flow: &SetupFlow) -> bool {
    let mut changed = false;
    for (key, value) in flow.answers() {
        if let Some(field) = key.spec_field() {
            doc.insert(YamlValue::from(field), YamlValue::from(value));
            changed = true;
        }
    }
    if let Some(name) = flow.generated_pull_secret() {
        doc.insert(YamlValue::from("imagePullSecret"), YamlValue::from(name));
        changed = true;
    }
    changed
}

/// Skeleton `wiz.yml` for a new environment directory
pub fn skeleton_document() -> Mapping {
    let mut wiring = Mapping::new();
    wiring.insert("envSecrets".into(), true.into());
    wiring.insert("secretMounts".into(), true.into());

    let mut doc = Mapping::new();
    doc.insert("wiring".into(), YamlValue::Mapping(wiring));
    doc.insert("values".into(), YamlValue::Mapping(Mapping::new()));
    doc
}
