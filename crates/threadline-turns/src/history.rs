use threadline_llm::ChatMessage;
use threadline_persist::Turn;

/// Reconstruct the conversation sent to the provider.
///
/// `prior` must already be the thread's completed turns in creation order.
/// Each contributes its prompt and, when non-empty, its response; the
/// current prompt always comes last.
pub fn build_history(
    system_prompt: Option<&str>,
    prior: &[Turn],
    current_prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(prior.len() * 2 + 2);

    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::system(system));
    }

    for turn in prior {
        messages.push(ChatMessage::user(turn.user_prompt.clone()));
        if let Some(response) = turn.response() {
            messages.push(ChatMessage::assistant(response));
        }
    }

    messages.push(ChatMessage::user(current_prompt));
    messages
}
