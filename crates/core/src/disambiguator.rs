//! Resolving split neighbor votes with a language model.
//!
//! Both strategies send the same taxonomy prompt and make exactly one call to
//! the model. They differ in how the answer comes back: [`FreeText`] asks for a
//! bare category token and pattern-matches it out of the completion, while
//! [`ToolCall`] offers an `identify_algorithm` function and trusts its
//! `algorithm_name` argument, falling back to the same pattern matching when
//! the model answers in prose instead.

use crate::error::ClassifyError;
use crate::taxonomy::Category;
use crate::vote::QueryResult;
use providers::{ChatMessage, ChatReply, GenerateOptions, LlmProvider, ToolSpec};
use regex::Regex;
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Provenance prefix on labels pulled out of model text.
pub const LLM_TAG: &str = "LLM ";

pub const IDENTIFY_ALGORITHM: &str = "identify_algorithm";

/// Sentinel spelling the prompt asks the model to use for non-crypto code.
const NO_CRYPTO_ANSWER: &str = "NO_CRYPTO";

/// How a disambiguation call was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A known token was found in the model's text.
    Extracted(String),
    /// The model called `identify_algorithm`; the name is taken as given.
    ToolInvoked(String),
    /// Nothing recognizable; the trimmed text is kept.
    Unparsed(String),
}

impl Resolution {
    pub fn label(&self) -> String {
        match self {
            Resolution::Extracted(token) => format!("{}{}", LLM_TAG, token),
            Resolution::ToolInvoked(name) => name.clone(),
            Resolution::Unparsed(text) => text.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait Disambiguator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        llm: &dyn LlmProvider,
        result: &QueryResult,
        opts: GenerateOptions,
    ) -> Result<Resolution, ClassifyError>;
}

/// Single completion, answer extracted from the generated text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeText;

/// Chat call offering `identify_algorithm`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolCall;

#[async_trait::async_trait]
impl Disambiguator for FreeText {
    fn name(&self) -> &'static str {
        "free_text"
    }

    async fn resolve(
        &self,
        llm: &dyn LlmProvider,
        result: &QueryResult,
        opts: GenerateOptions,
    ) -> Result<Resolution, ClassifyError> {
        let mut prompt = taxonomy_prompt(&result.text, &result.distinct_categories());
        prompt.push_str("\nOUTPUT ONLY THE CATEGORY OF THE ALGORITHM AND NOTHING ELSE.\n");
        let answer = llm.generate(&prompt, opts).await?;
        debug!(answer = %answer.trim(), "free-text answer");
        Ok(resolve_text(&answer))
    }
}

#[async_trait::async_trait]
impl Disambiguator for ToolCall {
    fn name(&self) -> &'static str {
        "tool_call"
    }

    async fn resolve(
        &self,
        llm: &dyn LlmProvider,
        result: &QueryResult,
        opts: GenerateOptions,
    ) -> Result<Resolution, ClassifyError> {
        let prompt = taxonomy_prompt(&result.text, &result.distinct_categories());
        let reply = llm
            .chat(&[ChatMessage::user(prompt)], &[identify_algorithm_tool()], opts)
            .await?;
        match reply {
            ChatReply::ToolInvoked { name, arguments } => {
                if name != IDENTIFY_ALGORITHM {
                    return Err(ClassifyError::UnknownTool(name));
                }
                let call = IdentifyAlgorithm::from_arguments(arguments)?;
                info!(
                    algorithm = %call.algorithm_name,
                    explanation = call.explanation.as_deref().unwrap_or(""),
                    "{}", IDENTIFY_ALGORITHM
                );
                Ok(Resolution::ToolInvoked(call.algorithm_name))
            }
            ChatReply::Text { content } => Ok(resolve_text(&content)),
        }
    }
}

/// Arguments of an `identify_algorithm` call after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentifyAlgorithm {
    pub algorithm_name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl IdentifyAlgorithm {
    pub fn from_arguments(
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ClassifyError> {
        serde_json::from_value(serde_json::Value::Object(normalize_tool_arguments(arguments)))
            .map_err(|e| ClassifyError::MalformedToolCall(e.to_string()))
    }
}

/// Some models name the free-text argument `description`; it replaces
/// `explanation` when present.
pub fn normalize_tool_arguments(
    mut arguments: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    if let Some(description) = arguments.remove("description") {
        arguments.insert("explanation".to_string(), description);
    }
    arguments
}

pub fn identify_algorithm_tool() -> ToolSpec {
    ToolSpec::function(
        IDENTIFY_ALGORITHM,
        "This function identifies a given fragment of code by name. It is used to detect cryptographic code.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The code that was identified as with the algorithm_name parameter",
                },
                "algorithm_name": {
                    "type": "string",
                    "description": "The identified algorithm name or NO_CRYPTO if it is not a cryptographic code",
                },
                "explanation": {
                    "type": "string",
                    "description": "An explanation of why the algorithm is identified by that name",
                },
            },
            "required": ["algorithm_name", "code", "explanation"],
        }),
    )
}

/// The shared instruction block: taxonomy grouped by use vs implementation,
/// the snippet, and the categories the neighbor vote split between.
pub fn taxonomy_prompt(snippet: &str, hint: &[&str]) -> String {
    let mut prompt = String::from(
        "You are a machine capable of recognizing algorithms or fragments of use of algorithms.\n\
         Given the following code, identify if it is an implementation of a cryptographic\n\
         algorithm, the use of a cryptographic algorithm, or just general code. Any code that\n\
         hashes a password, digests a message, signs a token, or otherwise calls a\n\
         cryptographic primitive counts as a use.\n\n\
         If the code uses a cryptographic primitive, the possible categories are:\n",
    );
    for c in Category::USES {
        let _ = writeln!(prompt, "- {}: {}", c, use_description(c));
    }
    prompt.push_str("\nIf the code is an implementation, the possible categories are:\n");
    for c in Category::IMPLEMENTATIONS {
        let _ = writeln!(prompt, "- {}", c);
    }
    let _ = write!(
        prompt,
        "\nIf the code neither implements nor uses any cryptographic primitive, the output\n\
         should be {}.\n\nThe code is as follows:\n{}\n",
        NO_CRYPTO_ANSWER, snippet
    );
    if !hint.is_empty() {
        let _ = write!(
            prompt,
            "\nIf useful, a previous model has classified this code as one of these categories:\n{}\n",
            hint.join(", ")
        );
    }
    prompt
}

fn use_description(c: Category) -> &'static str {
    match c {
        Category::UsesAes => "in case the code is using the AES algorithm.",
        Category::PasswordPbkdf2Sha256 => "in case it is using a key derivation algorithm.",
        Category::PasswordBcrypt => "in case it is using the bcrypt algorithm.",
        _ => "",
    }
}

struct ExtractionPatterns {
    /// Canonical names plus the spellings the prompt itself suggests.
    canonical: Regex,
    /// Common digest spellings.
    sha_variant: Regex,
}

static PATTERNS: OnceLock<ExtractionPatterns> = OnceLock::new();

impl ExtractionPatterns {
    fn new() -> Self {
        let tokens: Vec<String> = Category::ALL
            .iter()
            .map(|c| c.as_str())
            .chain([NO_CRYPTO_ANSWER, "bcrypt"])
            .map(regex::escape)
            .collect();
        Self {
            canonical: Regex::new(&format!("({})", tokens.join("|")))
                .expect("canonical category regex must compile"),
            sha_variant: Regex::new(r"SHA-256|SHA256|SHA-1|SHA1|SHA-512|SHA512|SHA-3|SHA3")
                .expect("sha variant regex must compile"),
        }
    }
}

fn patterns() -> &'static ExtractionPatterns {
    PATTERNS.get_or_init(ExtractionPatterns::new)
}

/// Two-stage token search over the trimmed text. Canonical names are tried
/// first; a digest spelling starting at the same offset as a canonical hit
/// (`SHA-256` vs `SHA`) is the more specific answer and wins.
pub fn extract_category(text: &str) -> Option<&str> {
    let text = text.trim();
    let p = patterns();
    if let Some(hit) = p.canonical.find(text) {
        if let Some(variant) = p.sha_variant.find_at(text, hit.start()) {
            if variant.start() == hit.start() && variant.end() > hit.end() {
                return Some(variant.as_str());
            }
        }
        return Some(hit.as_str());
    }
    p.sha_variant.find(text).map(|m| m.as_str())
}

pub fn resolve_text(text: &str) -> Resolution {
    match extract_category(text) {
        Some(token) => Resolution::Extracted(token.to_string()),
        None => {
            let raw = text.trim().to_string();
            warn!(answer = %raw, "model answer matched no known category");
            Resolution::Unparsed(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RawNeighbors;
    use providers::ProviderError;
    use std::sync::Mutex;

    /// Replays one canned answer and records what it was asked.
    struct Scripted {
        generated: String,
        reply: ChatReply,
        prompts: Mutex<Vec<String>>,
        tools_offered: Mutex<Vec<usize>>,
    }

    impl Scripted {
        fn generating(text: &str) -> Self {
            Self::new(text, ChatReply::Text { content: String::new() })
        }

        fn chatting(reply: ChatReply) -> Self {
            Self::new("", reply)
        }

        fn new(generated: &str, reply: ChatReply) -> Self {
            Self {
                generated: generated.to_string(),
                reply,
                prompts: Mutex::new(Vec::new()),
                tools_offered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for Scripted {
        async fn generate(
            &self,
            prompt: &str,
            _opts: GenerateOptions,
        ) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.generated.clone())
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            tools: &[ToolSpec],
            _opts: GenerateOptions,
        ) -> Result<ChatReply, ProviderError> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            self.tools_offered.lock().unwrap().push(tools.len());
            Ok(self.reply.clone())
        }
    }

    fn split_vote() -> QueryResult {
        QueryResult::from_raw(
            "def f(x): return pow(x, e, n)",
            RawNeighbors {
                categories: vec!["RSA".into(), "AES".into(), "DES".into(), "HMAC".into()],
                distances: vec![0.1, 0.2, 0.3, 0.4],
                ids: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            },
        )
        .unwrap()
    }

    fn tool_reply(args: serde_json::Value) -> ChatReply {
        ChatReply::ToolInvoked {
            name: IDENTIFY_ALGORITHM.to_string(),
            arguments: args.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn extracts_canonical_tokens() {
        assert_eq!(extract_category("RSA"), Some("RSA"));
        assert_eq!(extract_category("  The category is RSA.\n"), Some("RSA"));
        assert_eq!(extract_category("USES_AES"), Some("USES_AES"));
        assert_eq!(extract_category("NO_CRYPTO"), Some("NO_CRYPTO"));
        assert_eq!(extract_category("uses bcrypt"), Some("bcrypt"));
        assert_eq!(extract_category("PASSWORD_PBKDF2_SHA256"), Some("PASSWORD_PBKDF2_SHA256"));
    }

    #[test]
    fn digest_spellings_beat_the_bare_family_name() {
        assert_eq!(extract_category("SHA-256"), Some("SHA-256"));
        assert_eq!(extract_category("this is SHA1"), Some("SHA1"));
        assert_eq!(extract_category("SHA"), Some("SHA"));
    }

    #[test]
    fn unknown_text_is_kept_trimmed() {
        assert_eq!(extract_category("looks like a calendar widget"), None);
        assert_eq!(
            resolve_text("  looks like a calendar widget \n"),
            Resolution::Unparsed("looks like a calendar widget".into())
        );
    }

    #[test]
    fn labels_carry_provenance() {
        assert_eq!(Resolution::Extracted("RSA".into()).label(), "LLM RSA");
        assert_eq!(Resolution::ToolInvoked("NO_CRYPTO".into()).label(), "NO_CRYPTO");
        assert_eq!(Resolution::Unparsed("dunno".into()).label(), "dunno");
    }

    #[test]
    fn description_argument_becomes_explanation() {
        let args = serde_json::json!({"algorithm_name": "RSA", "code": "x", "description": "modexp"});
        let call = IdentifyAlgorithm::from_arguments(args.as_object().unwrap().clone()).unwrap();
        assert_eq!(call.explanation.as_deref(), Some("modexp"));

        let normalized = normalize_tool_arguments(args.as_object().unwrap().clone());
        assert!(!normalized.contains_key("description"));
    }

    #[test]
    fn tool_call_without_name_is_malformed() {
        let args = serde_json::json!({"code": "x"});
        assert!(matches!(
            IdentifyAlgorithm::from_arguments(args.as_object().unwrap().clone()),
            Err(ClassifyError::MalformedToolCall(_))
        ));
    }

    #[test]
    fn prompt_lists_taxonomy_and_hint() {
        let prompt = taxonomy_prompt("int main() {}", &["RSA", "AES"]);
        assert!(prompt.contains("- USES_AES: "));
        assert!(prompt.contains("- ElipticCurves\n"));
        assert!(prompt.contains("NO_CRYPTO"));
        assert!(prompt.contains("int main() {}"));
        assert!(prompt.contains("RSA, AES"));
    }

    #[tokio::test]
    async fn free_text_prefixes_extracted_token() {
        let llm = Scripted::generating("NO_CRYPTO\n");
        let res = FreeText
            .resolve(&llm, &split_vote(), GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(res.label(), "LLM NO_CRYPTO");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("RSA, AES, DES, HMAC"));
        assert!(prompts[0].contains("OUTPUT ONLY THE CATEGORY"));
    }

    #[tokio::test]
    async fn free_text_sha_variant() {
        let llm = Scripted::generating("SHA-256");
        let res = FreeText
            .resolve(&llm, &split_vote(), GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(res.label(), "LLM SHA-256");
    }

    #[tokio::test]
    async fn tool_call_trusts_algorithm_name() {
        let llm = Scripted::chatting(tool_reply(serde_json::json!({
            "algorithm_name": "NO_CRYPTO",
            "code": "print(1)",
            "explanation": "no primitives"
        })));
        let res = ToolCall
            .resolve(&llm, &split_vote(), GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(res, Resolution::ToolInvoked("NO_CRYPTO".into()));
        assert_eq!(res.label(), "NO_CRYPTO");
        assert_eq!(*llm.tools_offered.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn tool_call_falls_back_to_text() {
        let llm = Scripted::chatting(ChatReply::Text {
            content: "I think this is AES".into(),
        });
        let res = ToolCall
            .resolve(&llm, &split_vote(), GenerateOptions::default())
            .await
            .unwrap();
        assert_eq!(res.label(), "LLM AES");
    }

    #[tokio::test]
    async fn tool_call_rejects_unknown_tool() {
        let llm = Scripted::chatting(ChatReply::ToolInvoked {
            name: "delete_everything".into(),
            arguments: serde_json::Map::new(),
        });
        let err = ToolCall
            .resolve(&llm, &split_vote(), GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::UnknownTool(n) if n == "delete_everything"));
    }
}
