//! WebSocket 网关
//!
//! 每个连接一个会话：入站 query 启动任务（事件转发为出站消息），入站 toolResponse
//! 喂给该连接的挂起表。同一连接同一时刻只允许一个在途任务；线路成帧之外的语义
//! 全部在核心层。

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::config::AppConfig;
use crate::core::OrchestratorEvent;
use crate::gateway::message::{ClientMessage, ServerMessage};
use crate::gateway::pending::PendingResponses;
use crate::llm::LlmClient;
use crate::runtime::build_gateway_orchestrator;
use crate::tools::DatabaseBackend;

/// 网关共享状态：跨连接共享 LLM / 目标库 / 检查点存储
pub struct GatewayState {
    pub cfg: AppConfig,
    pub llm: Arc<dyn LlmClient>,
    pub db: Arc<dyn DatabaseBackend>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 出站转发：序列化失败的消息丢弃并记录
    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "outbound serialization failed");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let pending = Arc::new(PendingResponses::new(
        out_tx.clone(),
        state.cfg.gateway.tool_response_timeout_secs,
    ));
    let orchestrator = Arc::new(build_gateway_orchestrator(
        &state.cfg,
        state.llm.clone(),
        state.db.clone(),
        state.checkpoints.clone(),
        pending.clone(),
    ));
    // 连接内任务串行：try_lock 失败即拒绝新任务
    let in_flight = Arc::new(tokio::sync::Mutex::new(()));
    let cancel_token = CancellationToken::new();

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Query { task, thread_id }) => {
                let Ok(guard) = in_flight.clone().try_lock_owned() else {
                    let _ = out_tx.send(ServerMessage::Error {
                        text: "a task is already in flight on this thread".to_string(),
                    });
                    continue;
                };

                let orchestrator = orchestrator.clone();
                let out_tx = out_tx.clone();
                let cancel_token = cancel_token.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<OrchestratorEvent>();
                    let forward_tx = out_tx.clone();
                    let forward = tokio::spawn(async move {
                        while let Some(ev) = event_rx.recv().await {
                            let _ = forward_tx.send(ServerMessage::from(ev));
                        }
                    });

                    if let Err(e) = orchestrator
                        .run_task(&thread_id, &task, Some(&event_tx), cancel_token)
                        .await
                    {
                        let _ = out_tx.send(ServerMessage::Error { text: e.to_string() });
                    }
                    drop(event_tx);
                    let _ = forward.await;
                });
            }
            Ok(ClientMessage::ToolResponse { response }) => {
                pending.resolve(&response.name, response.content);
            }
            Err(e) => {
                let _ = out_tx.send(ServerMessage::Error {
                    text: format!("malformed message: {e}"),
                });
            }
        }
    }

    // 连接断开：取消在途任务，停止出站转发
    cancel_token.cancel();
    send_task.abort();
}
