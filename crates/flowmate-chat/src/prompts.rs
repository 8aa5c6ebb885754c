//! Prompt templates for chat answers and speech reports.

/// Default report request when the caller supplies none.
pub const DEFAULT_REPORT_QUERY: &str =
    "Write a one-minute speech based on the uploaded document, phrased the way buyers would say it.";

/// Context placeholder when retrieval found nothing for a report.
pub const NO_CONTEXT_NOTICE: &str = "No content from the uploaded document could be found.";

/// Chat prompt. `context` is left out entirely when empty.
pub fn chat_prompt(history: &str, context: &str, query: &str) -> String {
    if context.is_empty() {
        format!(
            "You are a friendly and helpful AI assistant. Give accurate, useful answers to the user's questions.\n\
             \n\
             Conversation history:\n\
             {history}\n\
             \n\
             User question: {query}\n\
             \n\
             Answer:"
        )
    } else {
        format!(
            "You are a friendly AI assistant. Answer the user's question using the uploaded document as reference.\n\
             \n\
             Conversation history:\n\
             {history}\n\
             \n\
             Reference documents:\n\
             {context}\n\
             \n\
             User question: {query}\n\
             \n\
             Answer:"
        )
    }
}

/// Prompt asking for a one-minute speech grounded in `context`.
pub fn speech_prompt(context: &str, query: &str) -> String {
    format!(
        "Write a one-minute speech based on the following document.\n\
         \n\
         Reference documents:\n\
         {context}\n\
         \n\
         Request: {query}\n\
         \n\
         Guidelines for a one-minute speech:\n\
         - Write it in the buyers' own voice\n\
         - Roughly 200-250 words\n\
         - A clear topic and conclusion\n\
         - A concise, memorable message\n\
         - An opening that catches the audience's attention\n\
         - A closing that stays with the listener\n\
         \n\
         One-minute speech:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_prompt_without_context_omits_reference_section() {
        let prompt = chat_prompt("", "", "what is on the agenda?");
        assert!(!prompt.contains("Reference documents"));
        assert!(prompt.contains("User question: what is on the agenda?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_chat_prompt_with_context() {
        let prompt = chat_prompt("User: hi\nAssistant: hello", "Q3 revenue grew", "how did Q3 go?");
        assert!(prompt.contains("Reference documents:\nQ3 revenue grew\n"));
        assert!(prompt.contains("Conversation history:\nUser: hi\nAssistant: hello\n"));
    }

    #[test]
    fn test_speech_prompt_embeds_request() {
        let prompt = speech_prompt("ctx", DEFAULT_REPORT_QUERY);
        assert!(prompt.contains("Reference documents:\nctx\n"));
        assert!(prompt.contains(&format!("Request: {}", DEFAULT_REPORT_QUERY)));
    }
}
