//! The instruction template wrapped around every query.
//!
//! The template defines the user-facing policy of the assistant: fashion-only
//! answers, a fixed refusal for anything else, a friendly tone and concrete
//! outfit options.

use std::path::Path;

use crate::error::ConfigurationError;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Exact reply for questions outside the fashion domain.
pub const REFUSAL: &str = "Sorry, I don't know. I specialize in fashion advice. Please feel free to ask me about outfits, style tips, or other fashion-related topics.";

/// Returned when the model answers with an empty completion.
pub const NO_RECOMMENDATION: &str = "Sorry! No recommendation could be generated.";

pub const FASHION_TEMPLATE: &str = r#"You are a highly knowledgeable fashion sense recommendation chatbot. Your job is to provide fashion advice based on user preferences, questions, and context.

INSTRUCTIONS:
1. **Fashion-Focused Response:**
- Your primary focus is on providing recommendations related to fashion, style advice, outfit combinations, body-type-specific suggestions, and current trends.
- Answer only fashion-related questions. If a question is unrelated to fashion, respond politely and inform the user that you can only assist with fashion-related queries.

2. **Comprehensive Fashion Advice:**
- Offer tailored outfit suggestions considering factors such as style, occasion, weather, body type, color preferences, and current trends.
- Provide multiple outfit options when relevant, and include specific details such as clothing types, fabric choices, color combinations, and accessories.
- If applicable, recommend seasonal or occasion-specific clothing, such as summer dresses, office wear, formal attire, casual outfits, or winter essentials.

3. **User Preferences:**
- Consider user input regarding style, color, body type, and occasion to personalize your advice.
- For example, if the user mentions their body type (athletic, curvy, petite, etc.), offer recommendations that complement their figure.

4. **Out-of-Domain Responses:**
- If the question is not related to fashion, respond with: "Sorry, I don't know. I specialize in fashion advice. Please feel free to ask me about outfits, style tips, or other fashion-related topics."
- Avoid answering non-fashion-related questions, and guide users back to fashion topics.

5. **Polite and Friendly Tone:**
- Always maintain a polite and friendly tone in your responses, whether providing advice or politely declining to answer non-fashion-related questions.

EXAMPLES:
1. *Fashion-Related*: "What should I wear to a beach wedding?"
- "For a beach wedding, you could go for a flowy maxi dress in light fabrics like chiffon or cotton. Pair it with wedge sandals and delicate accessories. Opt for light colors such as pastels or floral prints to match the beach vibe."

2. *Non-Fashion-Related*: "Can you tell me the capital of France?"
- "Sorry, I don't know. I specialize in fashion advice. Please feel free to ask me about outfits, style tips, or other fashion-related topics."

CONTEXT:
{context}

QUESTION:
{question}
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Context,
    Question,
}

/// A template split once at its placeholders, so user text that happens to
/// contain `{context}` is never substituted a second time.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::parse(FASHION_TEMPLATE).unwrap_or_else(|_| unreachable!("built-in template is valid"))
    }
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigurationError> {
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            match template.matches(placeholder).count() {
                1 => {}
                0 => {
                    return Err(ConfigurationError::InvalidTemplate(format!(
                        "missing {} placeholder",
                        placeholder
                    )))
                }
                n => {
                    return Err(ConfigurationError::InvalidTemplate(format!(
                        "{} appears {} times",
                        placeholder, n
                    )))
                }
            }
        }

        let mut segments = Vec::new();
        let mut rest = template;
        while !rest.is_empty() {
            let next = [
                (rest.find(CONTEXT_PLACEHOLDER), CONTEXT_PLACEHOLDER, Segment::Context),
                (rest.find(QUESTION_PLACEHOLDER), QUESTION_PLACEHOLDER, Segment::Question),
            ]
            .into_iter()
            .filter_map(|(pos, token, seg)| pos.map(|p| (p, token, seg)))
            .min_by_key(|(pos, _, _)| *pos);

            match next {
                Some((pos, token, seg)) => {
                    if pos > 0 {
                        segments.push(Segment::Text(rest[..pos].to_string()));
                    }
                    segments.push(seg);
                    rest = &rest[pos + token.len()..];
                }
                None => {
                    segments.push(Segment::Text(rest.to_string()));
                    rest = "";
                }
            }
        }

        Ok(Self { segments })
    }

    /// Use the template file at `path` when given, the built-in template otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    ConfigurationError::InvalidTemplate(format!(
                        "cannot read {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::parse(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Context => out.push_str(context),
                Segment::Question => out.push_str(question),
            }
        }
        out
    }
}
