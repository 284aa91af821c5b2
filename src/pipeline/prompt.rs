use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::mode::Mode;

// Template wording is load-bearing: the model's answers are tuned to it.
pub const SHOPPING_TEMPLATE: &str = concat!(
    "You are an eco-shopping assistant designed to assist users in making better shopping decisions. \n",
    "The user will enter the name of an item they are looking to purchase. \n",
    "Given the context information and using prior knowledge, precisely provide exactly one simple homemade recipe, as a healthy alternative, for the user to try instead.\n",
    "Precisely provide information about some brands that sell healthier alternatives in India. Derive this information solely from the context. If no valid information is provided in the context, do not include this component in the answer.\n",
    "Avoid formal phrases like \"based on the context information\" or \"from the provided data\", as well as information about the item. Keep your tone friendly and helpful.\n",
    "Context information is below. Each line is a separate document from the internet about a specific topic or person.\n",
    "{context}\n",
    "\n",
    "Question: {question}\n",
    "\n",
    "Answer:",
);

pub const RECYCLING_TEMPLATE: &str = concat!(
    "You are an eco-recycling assistant designed to assist users in making more of their waste. \n",
    "The user will enter the name of an item they are looking to recycle. \n",
    "Given the context information and using prior knowledge, precisely provide exactly one simple method to recycle the item into something innovative.\n",
    "Precisely provide information about how to dispose of the item so that it is environmentally healthy and safe.\n",
    "Avoid formal phrases like \"based on the context information\" or \"from the provided data\", as well as information about the item. Keep your tone friendly and helpful.\n",
    "Context information is below. Each line is a separate document from the internet about a specific topic or person.\n",
    "{context}\n",
    "\n",
    "Question: {question}\n",
    "\n",
    "Answer:",
);

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(context|question)\}").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub shopping: String,
    pub recycling: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            shopping: SHOPPING_TEMPLATE.to_string(),
            recycling: RECYCLING_TEMPLATE.to_string(),
        }
    }
}

/// The three inputs a prompt is rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptRequest<'a> {
    pub mode: Mode,
    pub context: &'a str,
    pub question: &'a str,
}

impl<'a> PromptRequest<'a> {
    pub fn new(mode: Mode, context: &'a str, question: &'a str) -> Self {
        Self {
            mode,
            context,
            question,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: PromptTemplates,
}

impl PromptBuilder {
    pub fn new(templates: PromptTemplates) -> Self {
        Self { templates }
    }

    pub fn template(&self, mode: Mode) -> &str {
        match mode {
            Mode::Shopping => &self.templates.shopping,
            Mode::Recycling => &self.templates.recycling,
        }
    }

    /// Substitutes in one pass, so braces inside the context or question are
    /// never expanded a second time.
    pub fn build(&self, request: &PromptRequest<'_>) -> String {
        PLACEHOLDER
            .replace_all(self.template(request.mode), |caps: &Captures| match &caps[1] {
                "context" => request.context.to_string(),
                _ => request.question.to_string(),
            })
            .into_owned()
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(PromptTemplates::default())
    }
}
