//! Instruction-aware text preparation for embedding queries and passages.
//!
//! Asymmetric embedding models expect a task prefix in front of the text
//! ("Find the most relevant code snippet given the following query: ...").
//! A profile supplies one prefix for queries and one for stored passages.
//! The active profile comes from an explicit argument, a task-scoped
//! override, or the configured default, in that order.

use std::future::Future;

use crate::config::InstructionConfig;

/// Prefix pair for one instruction profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionProfile {
    pub query: &'static str,
    pub passage: &'static str,
}

/// Which side of the retrieval pair a text is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Query,
    Passage,
}

const PROFILES: [(&str, InstructionProfile); 5] = [
    (
        "nl2code",
        InstructionProfile {
            query: "Find the most relevant code snippet given the following query:\n",
            passage: "Candidate code snippet:\n",
        },
    ),
    (
        "qa",
        InstructionProfile {
            query: "Find the most relevant answer given the following question:\n",
            passage: "Candidate answer:\n",
        },
    ),
    (
        "code2code",
        InstructionProfile {
            query: "Find an equivalent code snippet given the following code snippet:\n",
            passage: "Candidate code snippet:\n",
        },
    ),
    (
        "code2nl",
        InstructionProfile {
            query: "Find the most relevant comment given the following code snippet:\n",
            passage: "Candidate comment:\n",
        },
    ),
    (
        "code2completion",
        InstructionProfile {
            query: "Find the most relevant completion given the following start of code snippet:\n",
            passage: "Candidate completion:\n",
        },
    ),
];

const DISABLED_MODES: [&str; 6] = ["", "off", "false", "0", "disabled", "none"];

tokio::task_local! {
    static ACTIVE_TYPE: &'static str;
}

/// Look up a profile by its canonical name.
#[must_use]
pub fn profile(name: &str) -> Option<InstructionProfile> {
    PROFILES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, p)| *p)
}

/// Canonicalize a profile name; unknown or blank names yield `None`.
#[must_use]
pub fn normalize(instruction_type: Option<&str>) -> Option<&'static str> {
    let lowered = instruction_type?.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }
    PROFILES
        .iter()
        .map(|(n, _)| *n)
        .find(|n| *n == lowered)
}

/// Whether instruction prefixes are applied at all.
#[must_use]
pub fn is_enabled(config: &InstructionConfig) -> bool {
    let mode = config.mode.trim().to_ascii_lowercase();
    !DISABLED_MODES.contains(&mode.as_str())
}

/// Run `fut` with `instruction_type` as the task-scoped profile.
///
/// An unknown profile runs `fut` under whatever scope is already active.
pub async fn instruction_scope<F, T>(instruction_type: Option<&str>, fut: F) -> T
where
    F: Future<Output = T>,
{
    match normalize(instruction_type) {
        Some(name) => ACTIVE_TYPE.scope(name, fut).await,
        None => fut.await,
    }
}

/// Resolve the active profile: explicit, then task scope, then default.
#[must_use]
pub fn active_instruction_type(
    explicit: Option<&str>,
    config: &InstructionConfig,
) -> Option<&'static str> {
    if let Some(name) = normalize(explicit) {
        return Some(name);
    }
    if let Ok(name) = ACTIVE_TYPE.try_with(|n| *n) {
        return Some(name);
    }
    normalize(config.default_type.as_deref())
}

/// Apply query prefixes when instructions are enabled.
pub fn prepare_query_texts<I, S>(
    texts: I,
    explicit: Option<&str>,
    config: &InstructionConfig,
) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    prepare(texts, Role::Query, explicit, config)
}

/// Apply passage prefixes when instructions are enabled.
pub fn prepare_passage_texts<I, S>(
    texts: I,
    explicit: Option<&str>,
    config: &InstructionConfig,
) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    prepare(texts, Role::Passage, explicit, config)
}

/// Supported profile names, sorted.
#[must_use]
pub fn list_instruction_types() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PROFILES.iter().map(|(n, _)| *n).collect();
    names.sort_unstable();
    names
}

fn prepare<I, S>(
    texts: I,
    role: Role,
    explicit: Option<&str>,
    config: &InstructionConfig,
) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let texts = texts.into_iter().map(Into::into);
    if !is_enabled(config) {
        return texts.collect();
    }

    let Some(p) = active_instruction_type(explicit, config).and_then(profile) else {
        return texts.collect();
    };
    let prefix = match role {
        Role::Query => p.query,
        Role::Passage => p.passage,
    };

    texts.map(|t| format!("{prefix}{t}")).collect()
}
