//! worker_push, worker_notification_click and worker_sync tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::worker::{Notification, NotificationId, Platform};

use crate::tools::{ToolContext, json_result};

/// Parameters for the worker_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Raw push message body, normally a JSON object `{title, body, icon, url}`.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Output from the worker_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PushOutput {
    /// Id of the notification shown, if the payload produced one.
    pub notification_id: Option<NotificationId>,
    pub notification: Option<Notification>,
}

/// Parameters for the worker_notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    pub notification_id: NotificationId,

    /// `open` opens the notification URL; anything else just closes it.
    #[serde(default)]
    pub action: Option<String>,
}

/// Output from the worker_notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickOutput {
    pub closed: NotificationId,
    /// Every window opened so far.
    pub opened_windows: Vec<String>,
}

/// Parameters for the worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncParams {
    pub tag: String,
}

/// Output from the worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncOutput {
    pub tag: String,
    pub handled: bool,
}

pub async fn push_impl(ctx: &ToolContext, params: PushParams) -> Result<CallToolResult, McpError> {
    let notification_id = ctx.worker().handle_push(params.payload.as_deref().map(str::as_bytes)).await?;
    let notification = match notification_id {
        Some(id) => ctx.platform.notification(id).await?,
        None => None,
    };
    json_result(&PushOutput { notification_id, notification })
}

pub async fn notification_click_impl(
    ctx: &ToolContext, params: NotificationClickParams,
) -> Result<CallToolResult, McpError> {
    ctx.worker().handle_notification_click(params.notification_id, params.action).await?;
    json_result(&NotificationClickOutput {
        closed: params.notification_id,
        opened_windows: ctx.platform.opened_windows(),
    })
}

pub async fn sync_impl(ctx: &ToolContext, params: SyncParams) -> Result<CallToolResult, McpError> {
    let handled = ctx.worker().handle_sync(&params.tag).await?;
    json_result(&SyncOutput { tag: params.tag, handled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{context, output};

    #[tokio::test]
    async fn test_push_with_payload() {
        let (ctx, _) = context().await;
        let params = PushParams { payload: Some(r#"{"body":"New case study","url":"https://example.com/work"}"#.into()) };

        let out = output(&push_impl(&ctx, params).await.unwrap());

        assert_eq!(out["notification_id"], 1);
        assert_eq!(out["notification"]["title"], "SentientLabs");
        assert_eq!(out["notification"]["body"], "New case study");
        assert_eq!(out["notification"]["data"], "https://example.com/work");
    }

    #[tokio::test]
    async fn test_push_without_payload() {
        let (ctx, _) = context().await;

        let out = output(&push_impl(&ctx, PushParams { payload: None }).await.unwrap());
        assert!(out["notification_id"].is_null());

        let out = output(&push_impl(&ctx, PushParams { payload: Some("plain text".into()) }).await.unwrap());
        assert!(out["notification_id"].is_null());
        assert!(ctx.platform.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_click_open() {
        let (ctx, _) = context().await;
        let id = ctx.worker().handle_push(Some(br#"{"url":"https://example.com/work"}"#)).await.unwrap().unwrap();

        let params = NotificationClickParams { notification_id: id, action: Some("open".into()) };
        let out = output(&notification_click_impl(&ctx, params).await.unwrap());

        assert_eq!(out["opened_windows"][0], "https://example.com/work");
        assert!(ctx.platform.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_click_unknown_notification() {
        let (ctx, _) = context().await;
        let params = NotificationClickParams { notification_id: 7, action: None };

        let err = notification_click_impl(&ctx, params).await.unwrap_err();
        assert!(err.message.starts_with("NOTIFICATION_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_sync() {
        let (ctx, _) = context().await;

        let out = output(&sync_impl(&ctx, SyncParams { tag: "background-sync".into() }).await.unwrap());
        assert_eq!(out["handled"], true);

        let out = output(&sync_impl(&ctx, SyncParams { tag: "other".into() }).await.unwrap());
        assert_eq!(out["handled"], false);
    }
}
