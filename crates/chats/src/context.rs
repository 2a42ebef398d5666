use helpmate_database::{Integration, IntegrationRepository, MessageRole, StoredMessage};
use helpmate_knowledge::{KnowledgeBase, KnowledgeDocumentInput};
use helpmate_orchestrator::ChatMessage;

use crate::error::ChatResult;

/// The integration's knowledge base. URLs and documents are only loaded when it is enabled.
pub(crate) async fn load_knowledge(
    repository: &IntegrationRepository,
    integration: &Integration,
) -> ChatResult<KnowledgeBase> {
    if !integration.knowledge_enabled {
        return Ok(KnowledgeBase::default());
    }

    let urls = repository.list_urls(integration.id).await?;
    let documents = repository
        .list_documents(integration.id)
        .await?
        .into_iter()
        .map(|document| KnowledgeDocumentInput {
            name: document.name,
            content: document.content,
        })
        .collect();

    Ok(KnowledgeBase {
        enabled: true,
        urls,
        documents,
    })
}

/// The last `max` user/assistant turns of a stored transcript, as prompt messages.
pub(crate) fn transcript_history(messages: Vec<StoredMessage>, max: usize) -> Vec<ChatMessage> {
    let turns: Vec<ChatMessage> = messages
        .into_iter()
        .filter_map(|message| match message.role {
            MessageRole::User => Some(ChatMessage::user(message.content)),
            MessageRole::Assistant => Some(ChatMessage::assistant(message.content)),
            MessageRole::System => None,
        })
        .collect();

    let skip = turns.len().saturating_sub(max);
    turns.into_iter().skip(skip).collect()
}
