use crate::llm::template::Template;

const DEFAULT_HEADER: &str = "You are an expert text processor and analyzer. Your task is to extract and categorize \
information from an article into specific sections. The sections are as follows: \n\
'Systems' identify and list the systems discussed in the article (e.g., two-dimensional, compositions, structure, etc.). \n\
'Type' Determine if the article is experimental or theoretical. \n\
'Methods' Extract and list the methods used in the study. \n\
'Main Scope' Summarize the main scope or objective of the article. \n\
'Main Results' Summarize the key findings or main results of the article. \n\
'Keywords' List the keywords that best describe the article. \n\
Now, process the provided article content:";

const DEFAULT_INSTRUCTIONS: &str = "Instructions: \n\
Systems: Look for any mention of systems, whether two-dimensional, three-dimensional, structure, space groups, etc., and list them. \n\
Type: identify if the study is experimental (involving practical tests, observations, experiments) or theoretical \
(involving mathematical models, theoretical analysis, simulations). \n\
Methods: Extract any mention of methods, techniques, or procedures used in the study. \n\
Main Scope: Provide a brief summary of the main goal or objective of the study. \n\
Main Results: Provide a concise summary of the main findings or results reported in the article. \n\
Keywords: Provide a short list of keywords. \n\
Answer with a single JSON object and nothing else. \n\n";

/// Fixed role description and extraction instructions sent with every article.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub header: String,
    pub instructions: String,
}

impl Default for Prompt {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl Prompt {
    pub fn new(header: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            instructions: instructions.into(),
        }
    }

    /// Build the single user turn sent to the backend.
    pub fn compose(&self, title: &str, abstract_text: &str, template: &Template) -> String {
        format!(
            "{} \nTitle: {} \nAbstract: {} \n{} \nUse the following template: {}.",
            self.header,
            title,
            abstract_text,
            self.instructions,
            template.to_prompt_json()
        )
    }
}
