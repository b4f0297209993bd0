// SPDX-License-Identifier: MIT

//! Fixed prompt templates, one per completion-backed stage

const QUERY_PLACEHOLDER: &str = "{query}";

const CATEGORIZE: &str = "Categorize the following customer query into one of these categories: \
Technical, Billing, General. Respond with only the category name. Query: {query}";

const SENTIMENT: &str = "Analyze the sentiment of the following customer query. \
Respond with only one word: 'Positive', 'Neutral', or 'Negative'. Query: {query}";

const TECHNICAL: &str = "Provide a technical support response to the following query: {query}";

const BILLING: &str = "Provide a billing support response to the following query: {query}";

const GENERAL: &str = "Provide a general support response to the following query: {query}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    Categorize,
    Sentiment,
    Technical,
    Billing,
    General,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 5] = [
        PromptTemplate::Categorize,
        PromptTemplate::Sentiment,
        PromptTemplate::Technical,
        PromptTemplate::Billing,
        PromptTemplate::General,
    ];

    /// Raw instruction text with a `{query}` placeholder
    pub fn source(&self) -> &'static str {
        match self {
            PromptTemplate::Categorize => CATEGORIZE,
            PromptTemplate::Sentiment => SENTIMENT,
            PromptTemplate::Technical => TECHNICAL,
            PromptTemplate::Billing => BILLING,
            PromptTemplate::General => GENERAL,
        }
    }

    /// Interpolate the query. The query is inserted verbatim, once.
    pub fn render(&self, query: &str) -> String {
        let source = self.source();
        match source.split_once(QUERY_PLACEHOLDER) {
            Some((head, tail)) => {
                let mut prompt = String::with_capacity(source.len() + query.len());
                prompt.push_str(head);
                prompt.push_str(query);
                prompt.push_str(tail);
                prompt
            }
            None => source.to_string(),
        }
    }
}
