//! The tool trait, the registry, and Dinebot's built-in tools.
//!
//! Booking tools are deliberately stubs that return canned confirmations; the
//! point of the system is the approval workflow gating them, not the booking
//! integrations themselves. `answer_question` is the one substantial tool: it
//! retrieves context and delegates composition to the LLM seam.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use dinebot_core::config::RetrievalConfig;

use crate::llm::LlmClient;
use crate::retrieval::{build_context, DocumentRetriever};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Books a cab to the restaurant. Stub: always confirms.
pub struct BookCabTool;

#[async_trait]
impl Tool for BookCabTool {
    fn name(&self) -> &'static str {
        "book_a_cab"
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        Ok(json!({ "confirmation": "Your taxi has been booked." }))
    }
}

/// Books a restaurant table. Stub: always confirms.
pub struct BookTableTool;

#[async_trait]
impl Tool for BookTableTool {
    fn name(&self) -> &'static str {
        "book_a_table"
    }

    async fn execute(&self, _input: Value) -> Result<Value> {
        Ok(json!({ "confirmation": "Your restaurant table has been booked for the requested party." }))
    }
}

/// Answers general questions via retrieval-augmented generation: fetch the
/// top-scoring documents, assemble them into a context block, and ask the LLM
/// to answer strictly from that context.
pub struct AnswerQuestionTool {
    retriever: Arc<dyn DocumentRetriever>,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
}

impl AnswerQuestionTool {
    pub fn new(
        retriever: Arc<dyn DocumentRetriever>,
        llm: Arc<dyn LlmClient>,
        config: &RetrievalConfig,
    ) -> Self {
        Self { retriever, llm, top_k: config.top_k }
    }

    fn compose_prompt(context: &str, question: &str) -> String {
        format!(
            "Use the following context to answer the question at the end. \
             Process the context by removing any special characters that might \
             be from a Markdown or other files. If you don't know the answer, \
             just say that you don't know, don't try to make up an answer.\n\
             Context:\n{context}\n\nQuestion: {question}\nHelpful Answer:"
        )
    }
}

#[async_trait]
impl Tool for AnswerQuestionTool {
    fn name(&self) -> &'static str {
        "answer_question"
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let question = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("answer_question requires a string `query` field"))?;

        let documents = self.retriever.search_with_score(question, self.top_k).await?;
        let context = build_context(documents);
        let prompt = Self::compose_prompt(&context, question);
        let answer = self.llm.complete(&prompt).await?;

        Ok(json!({ "answer": answer }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    use dinebot_core::config::RetrievalConfig;

    use super::{AnswerQuestionTool, BookCabTool, BookTableTool, Tool, ToolRegistry};
    use crate::llm::LlmClient;
    use crate::retrieval::InMemoryRetriever;

    struct CannedLlm {
        prompts: Mutex<Vec<String>>,
    }

    impl CannedLlm {
        fn new() -> Self {
            Self { prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("prompt lock").push(prompt.to_string());
            Ok("The tasting menu changes every Tuesday.".to_string())
        }
    }

    #[tokio::test]
    async fn registry_holds_the_built_in_tools() {
        let mut registry = ToolRegistry::default();
        registry.register(BookCabTool);
        registry.register(BookTableTool);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["book_a_cab", "book_a_table"]);
        assert!(registry.get("book_a_cab").is_some());
        assert!(registry.get("order_dessert").is_none());
    }

    #[tokio::test]
    async fn booking_stubs_return_confirmations() {
        let cab = BookCabTool.execute(json!({})).await.expect("cab");
        assert_eq!(cab["confirmation"], "Your taxi has been booked.");

        let table = BookTableTool.execute(json!({})).await.expect("table");
        assert_eq!(
            table["confirmation"],
            "Your restaurant table has been booked for the requested party."
        );
    }

    #[tokio::test]
    async fn answer_question_grounds_the_prompt_in_retrieved_context() {
        let retriever = Arc::new(InMemoryRetriever::new(vec![
            "The tasting menu changes every Tuesday.".to_string(),
            "Parking is available behind the restaurant.".to_string(),
        ]));
        let llm = Arc::new(CannedLlm::new());
        let tool = AnswerQuestionTool::new(
            retriever,
            Arc::clone(&llm) as Arc<dyn LlmClient>,
            &RetrievalConfig { top_k: 5 },
        );

        let result =
            tool.execute(json!({ "query": "when does the tasting menu change?" })).await.expect("answer");
        assert_eq!(result["answer"], "The tasting menu changes every Tuesday.");

        let prompts = llm.prompts.lock().expect("prompt lock");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Use the following context"));
        assert!(prompts[0].contains("tasting menu changes every Tuesday"));
        assert!(prompts[0].contains("Question: when does the tasting menu change?"));
    }

    #[tokio::test]
    async fn answer_question_rejects_missing_query() {
        let retriever = Arc::new(InMemoryRetriever::default());
        let llm = Arc::new(CannedLlm::new());
        let tool = AnswerQuestionTool::new(retriever, llm, &RetrievalConfig { top_k: 5 });

        let error = tool.execute(json!({})).await.expect_err("missing query");
        assert!(error.to_string().contains("query"));
    }
}
