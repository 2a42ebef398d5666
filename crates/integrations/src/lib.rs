//! Tenant website integrations: branding, API keys, knowledge base and the
//! embeddable widget snippet.

mod error;
mod service;
pub mod validation;
pub mod widget;

pub use error::{IntegrationError, IntegrationResult};
pub use service::{
    generate_api_key, CreateIntegration, DocumentView, IntegrationService, IntegrationView,
    KnowledgeBaseInput, KnowledgeBaseView, NewDocument, UpdateIntegration, WidgetSettingsInput,
    WidgetSettingsView,
};
pub use widget::{escape_js, widget_code};
