//! Prompt assembly for code synthesis.
//!
//! One template with fixed slots plus two optional fragments. Fragments are
//! emitted only when their inputs are present; an absent persona or display
//! name simply leaves its slot empty.

use crate::core_types::{Message, Role};

/// Fragment naming the requesting user, emitted only when a display name is
/// known.
pub fn user_name_fragment(name: &str) -> String {
    format!("User's Name: {name}.\n")
}

/// Fragment injecting persona text into the prompt.
pub fn personality_fragment(persona: &str) -> String {
    format!("Your personality:\n{persona}\n")
}

/// Render prior turns for the prompt. Only user and assistant turns carry
/// synthesis context.
pub fn render_history(history: &[Message]) -> String {
    let mut rendered = String::new();
    for message in history {
        let speaker = match message.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => continue,
        };
        rendered.push_str(speaker);
        rendered.push_str(": ");
        rendered.push_str(&message.content);
        rendered.push('\n');
    }
    rendered
}

pub struct CodePromptArgs<'a> {
    pub current_date: &'a str,
    pub query: &'a str,
    pub chat_history: &'a str,
    pub context: &'a str,
    pub location: &'a str,
    pub username: &'a str,
    pub personality: &'a str,
}

/// Build the full code-generation prompt. The model is asked to reply with a
/// JSON object holding `code`, `input_files` and `input_links`.
pub fn code_generation_prompt(args: &CodePromptArgs<'_>) -> String {
    format!(
        "You are a Python programmer helping an AI assistant answer a user's query. \
Write a standalone Python program that computes, analyzes or visualizes whatever \
the query needs. The program runs in an isolated sandbox with the standard \
library available; any of the user's files you list under input_files are placed \
in the working directory before it runs.\n\
{personality}\
Current Date: {current_date}\n\
User's Location: {location}\n\
{username}\n\
Chat History:\n{chat_history}\n\
Context:\n{context}\n\
\n\
Respond with a JSON object containing exactly these keys:\n\
- \"code\": the Python program to run, as a single string\n\
- \"input_files\": names of the user's files the program reads (empty list if none)\n\
- \"input_links\": URLs the program fetches (empty list if none)\n\
\n\
Query: {query}\n",
        personality = args.personality,
        current_date = args.current_date,
        location = args.location,
        username = args.username,
        chat_history = args.chat_history,
        context = args.context,
        query = args.query,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_history_skips_system_turns() {
        let history = vec![
            Message {
                role: Role::System,
                content: "setup".to_string(),
            },
            Message::user("hello"),
            Message::assistant("hi there"),
        ];
        let rendered = render_history(&history);
        assert_eq!(rendered, "User: hello\nAssistant: hi there\n");
    }

    #[test]
    fn test_prompt_contains_all_slots() {
        let prompt = code_generation_prompt(&CodePromptArgs {
            current_date: "2025-06-01",
            query: "plot my spending",
            chat_history: "User: hi\n",
            context: "notes about budgets",
            location: "Lyon, France",
            username: "User's Name: Ada.\n",
            personality: "",
        });
        assert!(prompt.contains("2025-06-01"));
        assert!(prompt.contains("plot my spending"));
        assert!(prompt.contains("Lyon, France"));
        assert!(prompt.contains("Ada"));
        assert!(prompt.contains("input_files"));
    }
}
