use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use helpmate_config::{AppConfig, KnowledgeConfig, SessionConfig};
use helpmate_database::{
    format_timestamp, new_public_id, timestamp, ChatRepository, Integration,
    IntegrationRepository, NewIntegration, NewSubscription, PaymentCycle, Plan,
    SubscriptionRepository, SubscriptionStatus, WidgetPosition, MIGRATOR,
};
use helpmate_chats::{
    AnalyticsQuery, ChatError, ChatHistory, ChatService, ConversationStore, ExternalChatRequest,
    ExternalChatService, FeedbackRequest, SendMessageRequest, SubscriptionService,
    ESCALATION_NOTICE,
};
use helpmate_knowledge::{ContextAssembler, KnowledgeError, PageFetcher, DEFAULT_PERSONA};
use helpmate_orchestrator::test_support::ScriptedProvider;
use helpmate_orchestrator::{Orchestrator, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct OfflineFetcher;

#[async_trait]
impl PageFetcher for OfflineFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, KnowledgeError> {
        Err(KnowledgeError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

struct TestContext {
    pool: SqlitePool,
    provider: ScriptedProvider,
    external: ExternalChatService,
    dashboard: ChatService,
    store: ConversationStore,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_url = format!("sqlite://{}", temp_dir.path().join("chats.sqlite").display());
        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;

        let provider = ScriptedProvider::new("Happy to help.");
        let orchestrator = Arc::new(
            Orchestrator::new(&AppConfig::default()).with_provider(Arc::new(provider.clone())),
        );
        let assembler = Arc::new(ContextAssembler::new(
            KnowledgeConfig {
                summarize_overflow: false,
                ..KnowledgeConfig::default()
            },
            Arc::new(OfflineFetcher),
        ));
        let sessions = SessionConfig::default();
        let store = ConversationStore::new(Duration::from_secs(sessions.ttl_seconds), 4);

        Ok(Self {
            external: ExternalChatService::new(
                pool.clone(),
                orchestrator.clone(),
                assembler.clone(),
                store.clone(),
            ),
            dashboard: ChatService::new(pool.clone(), orchestrator, assembler, store.clone()),
            pool,
            provider,
            store,
            _temp_dir: temp_dir,
        })
    }

    async fn user(&self, email: &str) -> TestResult<i64> {
        let now = timestamp();
        let id = sqlx::query(
            "INSERT INTO users (public_id, name, email, created_at, updated_at) VALUES (?, ?, ?,
                ?, ?)",
        )
        .bind(new_public_id())
        .bind("Owner")
        .bind(email)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    async fn integration(&self, user_id: i64, api_key: &str) -> TestResult<Integration> {
        let integration = IntegrationRepository::new(self.pool.clone())
            .create(&NewIntegration {
                user_id,
                name: "Shop".into(),
                domain: "shop.example.com".into(),
                api_key: api_key.into(),
                primary_color: "#4f46e5".into(),
                position: WidgetPosition::BottomRight,
                welcome_message: "Hi!".into(),
                chat_title: "Support".into(),
                knowledge_enabled: false,
                allow_file_attachments: false,
            })
            .await?;
        Ok(integration)
    }

    async fn basic_plan(&self, user_id: i64, chat_limit: i64) -> TestResult {
        let now = Utc::now();
        SubscriptionRepository::new(self.pool.clone())
            .upsert(&NewSubscription {
                user_id,
                plan: Plan::Basic,
                payment_cycle: PaymentCycle::Monthly,
                status: SubscriptionStatus::Active,
                start_date: format_timestamp(now),
                end_date: Some(format_timestamp(now + chrono::Duration::days(30))),
                chat_limit: Some(chat_limit),
                had_trial: false,
            })
            .await?;
        Ok(())
    }
}

fn widget_request(api_key: &str, message: &str, chat_id: Option<&str>) -> ExternalChatRequest {
    ExternalChatRequest {
        api_key: Some(api_key.into()),
        message: Some(message.into()),
        chat_id: chat_id.map(str::to_string),
        visitor_id: Some("visitor-1".into()),
        metadata: None,
    }
}

#[tokio::test]
async fn widget_chat_starts_session_and_persists_transcript() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    ctx.integration(owner, "key-1").await?;

    ctx.provider.push_reply("We ship worldwide.");
    let reply = ctx
        .external
        .process(widget_request("key-1", "Do you ship abroad?", None))
        .await?;
    assert_eq!(reply.response, "We ship worldwide.");
    let chat_id = reply.chat_id.ok_or("missing chat id")?;

    let requests = ctx.provider.requests();
    let prompt = &requests[0].messages;
    assert_eq!(prompt[0].role, Role::System);
    assert!(prompt[0].content.contains("shop.example.com"));
    assert_eq!(prompt.last().map(|m| m.content.as_str()), Some("Do you ship abroad?"));

    let history = ctx.dashboard.history(owner, Some(&chat_id)).await?;
    let ChatHistory::Single(transcript) = history else {
        panic!("expected a single transcript");
    };
    assert_eq!(transcript.chat.title, "Website Chat - shop.example.com");
    assert_eq!(transcript.chat.visitor_id.as_deref(), Some("visitor-1"));
    assert_eq!(transcript.messages.len(), 2);
    Ok(())
}

#[tokio::test]
async fn widget_follow_up_carries_history() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    ctx.integration(owner, "key-1").await?;

    let first = ctx.external.process(widget_request("key-1", "Hello", None)).await?;
    let chat_id = first.chat_id.ok_or("missing chat id")?;
    let second = ctx
        .external
        .process(widget_request("key-1", "What about returns?", Some(&chat_id)))
        .await?;
    assert_eq!(second.chat_id.as_deref(), Some(chat_id.as_str()));

    let requests = ctx.provider.requests();
    let contents: Vec<&str> = requests[1]
        .messages
        .iter()
        .skip(1)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["Hello", "Happy to help.", "What about returns?"]);
    Ok(())
}

#[tokio::test]
async fn expired_session_is_rehydrated_from_the_transcript() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    ctx.integration(owner, "key-1").await?;

    let first = ctx.external.process(widget_request("key-1", "Hello", None)).await?;
    let chat_id = first.chat_id.ok_or("missing chat id")?;
    assert!(ctx.store.remove(&chat_id).await);

    let second = ctx
        .external
        .process(widget_request("key-1", "Still there?", Some(&chat_id)))
        .await?;
    assert_eq!(second.chat_id.as_deref(), Some(chat_id.as_str()));
    assert_eq!(ctx.provider.requests()[1].messages.len(), 4);
    Ok(())
}

#[tokio::test]
async fn foreign_chat_id_starts_a_new_conversation() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    let other = ctx.user("other@example.com").await?;
    ctx.integration(owner, "key-1").await?;
    ctx.integration(other, "key-2").await?;

    let theirs = ctx.external.process(widget_request("key-2", "Hi", None)).await?;
    let theirs = theirs.chat_id.ok_or("missing chat id")?;

    let mine = ctx.external.process(widget_request("key-1", "Hi", Some(&theirs))).await?;
    assert_ne!(mine.chat_id.as_deref(), Some(theirs.as_str()));
    assert_eq!(ctx.provider.requests()[1].messages.len(), 2);
    Ok(())
}

#[tokio::test]
async fn widget_rejects_missing_fields_and_unknown_keys() -> TestResult {
    let ctx = TestContext::new().await?;

    let missing = ctx
        .external
        .process(ExternalChatRequest {
            api_key: Some("key-1".into()),
            ..Default::default()
        })
        .await;
    assert!(matches!(missing, Err(ChatError::Validation { .. })));

    let unknown = ctx.external.process(widget_request("nope", "Hello", None)).await;
    assert!(matches!(unknown, Err(ChatError::InvalidApiKey)));
    assert!(ctx.provider.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn widget_traffic_counts_against_the_owner_quota() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    ctx.integration(owner, "key-1").await?;
    ctx.basic_plan(owner, 1).await?;

    ctx.external.process(widget_request("key-1", "One", None)).await?;
    let second = ctx.external.process(widget_request("key-1", "Two", None)).await;
    assert!(matches!(second, Err(ChatError::QuotaExceeded)));

    let subscription = SubscriptionService::new(ctx.pool.clone()).current(owner).await?;
    assert_eq!(subscription.chats_used, 1);
    Ok(())
}

#[tokio::test]
async fn provider_failure_surfaces_and_stores_nothing() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;

    ctx.provider.push_failure("upstream unavailable");
    let result = ctx
        .dashboard
        .send_message(
            Some(owner),
            SendMessageRequest {
                message: Some("Hello".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(ChatError::Completion(_))));

    ctx.integration(owner, "key-1").await?;
    ctx.provider.push_failure("upstream unavailable");
    let widget = ctx.external.process(widget_request("key-1", "Hello", None)).await;
    assert!(matches!(widget, Err(ChatError::Completion(_))));

    let ChatHistory::List(chats) = ctx.dashboard.history(owner, None).await? else {
        panic!("expected a chat list");
    };
    assert!(chats.is_empty());
    let analytics = ctx.dashboard.analytics(owner, &AnalyticsQuery::default()).await?;
    assert_eq!(analytics.total_chats, 0);
    assert!(ctx.store.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn deleting_a_chat_closes_its_widget_session() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    ctx.integration(owner, "key-1").await?;

    let first = ctx.external.process(widget_request("key-1", "Hello", None)).await?;
    let chat_id = first.chat_id.ok_or("missing chat id")?;
    assert_eq!(ctx.store.len().await, 1);

    ctx.dashboard.delete_chat(owner, &chat_id).await?;
    assert!(ctx.store.is_empty().await);

    let second = ctx
        .external
        .process(widget_request("key-1", "Anyone there?", Some(&chat_id)))
        .await?;
    let fresh = second.chat_id.ok_or("missing chat id")?;
    assert_ne!(fresh, chat_id);
    assert_eq!(ctx.provider.requests()[1].messages.len(), 2);

    let ChatHistory::List(chats) = ctx.dashboard.history(owner, None).await? else {
        panic!("expected a chat list");
    };
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].id, fresh);
    assert_eq!(chats[0].message_count, 2);
    Ok(())
}

#[tokio::test]
async fn session_without_a_transcript_starts_a_new_chat() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    ctx.integration(owner, "key-1").await?;

    let first = ctx.external.process(widget_request("key-1", "Hello", None)).await?;
    let chat_id = first.chat_id.ok_or("missing chat id")?;

    let chats = ChatRepository::new(ctx.pool.clone());
    let row = chats.find_by_public_id(&chat_id).await?.ok_or("missing chat row")?;
    assert!(chats.delete(row.id).await?);

    let second = ctx
        .external
        .process(widget_request("key-1", "Still open?", Some(&chat_id)))
        .await?;
    let fresh = second.chat_id.ok_or("missing chat id")?;
    assert_ne!(fresh, chat_id);
    assert_eq!(ctx.store.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn dashboard_chat_is_created_and_titled() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;

    ctx.provider.push_reply("Sure, here is how refunds work.");
    ctx.provider.push_reply("\"Refund Questions\"");
    let reply = ctx
        .dashboard
        .send_message(
            Some(owner),
            SendMessageRequest {
                message: Some("How do refunds work?".into()),
                ..Default::default()
            },
        )
        .await?;
    let chat_id = reply.chat_id.ok_or("missing chat id")?;

    let requests = ctx.provider.requests();
    assert_eq!(requests[0].messages[0].content, DEFAULT_PERSONA);

    let ChatHistory::List(chats) = ctx.dashboard.history(owner, None).await? else {
        panic!("expected a chat list");
    };
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].id, chat_id);
    assert_eq!(chats[0].title, "Refund Questions");
    assert_eq!(chats[0].message_count, 2);
    Ok(())
}

#[tokio::test]
async fn guest_messages_are_not_persisted() -> TestResult {
    let ctx = TestContext::new().await?;

    let reply = ctx
        .dashboard
        .send_message(
            None,
            SendMessageRequest {
                message: Some("Hello".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(reply.response, "Happy to help.");
    assert!(reply.chat_id.is_none());
    Ok(())
}

#[tokio::test]
async fn other_users_chats_are_not_visible() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    let stranger = ctx.user("stranger@example.com").await?;

    let reply = ctx
        .dashboard
        .send_message(
            Some(owner),
            SendMessageRequest {
                message: Some("Hello".into()),
                ..Default::default()
            },
        )
        .await?;
    let chat_id = reply.chat_id.ok_or("missing chat id")?;

    assert!(matches!(
        ctx.dashboard.history(stranger, Some(&chat_id)).await,
        Err(ChatError::ChatNotFound)
    ));
    assert!(matches!(
        ctx.dashboard.delete_chat(stranger, &chat_id).await,
        Err(ChatError::ChatNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn feedback_escalation_and_analytics() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;

    let mut chat_ids = Vec::new();
    for message in ["First question", "Second question"] {
        let reply = ctx
            .dashboard
            .send_message(
                Some(owner),
                SendMessageRequest {
                    message: Some(message.into()),
                    ..Default::default()
                },
            )
            .await?;
        chat_ids.push(reply.chat_id.ok_or("missing chat id")?);
    }

    let invalid = ctx
        .dashboard
        .submit_feedback(
            owner,
            FeedbackRequest {
                chat_id: Some(chat_ids[0].clone()),
                rating: Some(6),
                comment: None,
            },
        )
        .await;
    assert!(matches!(invalid, Err(ChatError::Validation { .. })));

    ctx.dashboard
        .submit_feedback(
            owner,
            FeedbackRequest {
                chat_id: Some(chat_ids[0].clone()),
                rating: Some(4),
                comment: Some("Quick answer".into()),
            },
        )
        .await?;
    ctx.dashboard.escalate(owner, Some(&chat_ids[1])).await?;

    let history = ctx.dashboard.history(owner, Some(&chat_ids[1])).await?;
    let ChatHistory::Single(escalated) = history else {
        panic!("expected a single transcript");
    };
    assert!(escalated.chat.escalated_to_human);
    assert_eq!(
        escalated.messages.last().map(|m| m.content.as_str()),
        Some(ESCALATION_NOTICE)
    );

    let analytics = ctx.dashboard.analytics(owner, &AnalyticsQuery::default()).await?;
    assert_eq!(analytics.total_chats, 2);
    assert_eq!(analytics.escalated_chats, 1);
    assert_eq!(analytics.escalation_rate, 50.0);
    assert_eq!(analytics.rated_chats, 1);
    assert_eq!(analytics.average_rating, 4.0);
    assert_eq!(analytics.total_messages, 5);
    assert_eq!(analytics.messages_per_chat, 2.5);
    assert_eq!(analytics.chats_by_day.iter().map(|d| d.count).sum::<i64>(), 2);

    ctx.dashboard.delete_chat(owner, &chat_ids[0]).await?;
    let ChatHistory::List(chats) = ctx.dashboard.history(owner, None).await? else {
        panic!("expected a chat list");
    };
    assert_eq!(chats.len(), 1);
    Ok(())
}

#[tokio::test]
async fn trial_is_granted_once() -> TestResult {
    let ctx = TestContext::new().await?;
    let owner = ctx.user("owner@example.com").await?;
    let subscriptions = SubscriptionService::new(ctx.pool.clone());

    assert!(matches!(
        subscriptions.current(owner).await,
        Err(ChatError::SubscriptionNotFound)
    ));

    let trial = subscriptions.start_trial(owner).await?;
    assert_eq!(trial.status, SubscriptionStatus::Trial);
    assert_eq!(trial.chat_limit, Some(500));

    subscriptions.cancel(owner).await?;
    assert!(matches!(
        subscriptions.start_trial(owner).await,
        Err(ChatError::TrialAlreadyUsed)
    ));
    Ok(())
}
