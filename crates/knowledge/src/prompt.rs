//! System prompt rendering.

/// Persona used when a message is not tied to any integration.
pub const DEFAULT_PERSONA: &str = "You are HelpMate AI, a helpful customer service assistant. \
                                  Provide concise, accurate, and friendly responses to customer \
                                  queries.";

/// Assistant persona for `domain`, grounded in `context` when it is non-empty.
pub fn system_prompt(domain: &str, context: &str) -> String {
    let mut prompt =
        format!("You are a helpful customer service assistant for the website {domain}.");

    let context = context.trim();
    if !context.is_empty() {
        prompt.push_str(" Use the following information to answer questions accurately:\n\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    } else {
        prompt.push(' ');
    }

    prompt.push_str(
        "Always provide accurate and helpful responses to customer inquiries. \
If you don't know the answer, suggest the customer reaches out to a human agent.",
    );
    prompt
}
