//! Inbound named operations executed against the host.
//!
//! Each operation reads its arguments from the request payload and merges
//! its result into the `CallBack` reply. `RPC_CALL` is not part of the table:
//! the client routes it to the RPC executor and replies on its own.

use std::collections::BTreeMap;

use bridgewire_core::models::{Segment, SyncSettings};
use bridgewire_core::protocol::operations::inbound;
use bridgewire_core::{BridgeError, Envelope};
use bridgewire_events::EventBus;
use bridgewire_rpc::RpcRouter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{error, info};

use crate::behavior::BridgeBehavior;
use crate::profile::ClientProfile;

/// Operation handled inline on the inbound path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET_SERVER_INFO`
    ServerInfo,
    /// `UN_BIND_NOTIFY`
    UnbindNotify,
    /// `BIND_SUCCESS_NOTIFY`
    BindSuccessNotify,
    /// `PLACEHOLDER_API_QUERY`
    PlaceholderQuery,
    /// `RUN_COMMAND`
    RunCommand,
    /// `SEND_TO_CHAT`
    SendToChat,
    /// `SYNC_SETTINGS_UPDATED`
    SyncSettingsUpdated,
    /// `PLAYER_LIST`
    PlayerList,
    /// `GET_EXTENSIONS`
    GetExtensions,
}

impl Operation {
    /// Every inline operation.
    pub const ALL: [Self; 9] = [
        Self::ServerInfo,
        Self::UnbindNotify,
        Self::BindSuccessNotify,
        Self::PlaceholderQuery,
        Self::RunCommand,
        Self::SendToChat,
        Self::SyncSettingsUpdated,
        Self::PlayerList,
        Self::GetExtensions,
    ];

    /// Look up an operation by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ServerInfo => inbound::GET_SERVER_INFO,
            Self::UnbindNotify => inbound::UN_BIND_NOTIFY,
            Self::BindSuccessNotify => inbound::BIND_SUCCESS_NOTIFY,
            Self::PlaceholderQuery => inbound::PLACEHOLDER_API_QUERY,
            Self::RunCommand => inbound::RUN_COMMAND,
            Self::SendToChat => inbound::SEND_TO_CHAT,
            Self::SyncSettingsUpdated => inbound::SYNC_SETTINGS_UPDATED,
            Self::PlayerList => inbound::PLAYER_LIST,
            Self::GetExtensions => inbound::GET_EXTENSIONS,
        }
    }
}

/// What an operation may touch.
pub(crate) struct OperationContext<'a> {
    pub behavior: &'a dyn BridgeBehavior,
    pub profile: &'a RwLock<ClientProfile>,
    pub events: &'a EventBus,
    pub router: &'a RpcRouter,
}

// ── Request payloads ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UnbindNotify {
    player_name: String,
    kick_message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BindSuccessNotify {
    player_name: String,
    account_id: String,
    account_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaceholderQuery {
    player_name: String,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunCommand {
    player_name: String,
    command: String,
    enable_papi: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendToChat {
    text: String,
    extra: Option<Vec<Value>>,
}

/// Arguments of an inbound `RPC_CALL`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RpcCallRequest {
    pub identifier: String,
    pub method: String,
    pub body: Value,
}

#[derive(Debug, Serialize)]
struct TextResult {
    success: bool,
    text: String,
}

// ── Execution ───────────────────────────────────────────────────────────────

impl Operation {
    /// Run against `request`, merging results into `reply`.
    pub(crate) async fn execute(
        self,
        ctx: &OperationContext<'_>,
        request: &Envelope,
        reply: &mut Envelope,
    ) -> Result<(), BridgeError> {
        let fail = |message: String| BridgeError::operation(self.name(), message);
        match self {
            Self::ServerInfo => {
                let info = ctx.behavior.server_info().await.map_err(|e| fail(e.0))?;
                reply.merge(&info)?;
            }
            Self::UnbindNotify => {
                let args: UnbindNotify = request.payload_as()?;
                ctx.behavior
                    .kick_player(&args.player_name, &args.kick_message)
                    .await
                    .map_err(|e| fail(e.0))?;
            }
            Self::BindSuccessNotify => {
                let args: BindSuccessNotify = request.payload_as()?;
                ctx.behavior
                    .bind_success_broadcast(&args.player_name, &args.account_id, &args.account_name)
                    .await
                    .map_err(|e| fail(e.0))?;
            }
            Self::PlaceholderQuery => {
                let args: PlaceholderQuery = request.payload_as()?;
                let outcome = ctx.behavior.placeholder_query(&args.player_name, &args.text).await;
                reply.merge(&self.text_result(outcome.map_err(|e| e.0)))?;
            }
            Self::RunCommand => {
                let args: RunCommand = request.payload_as()?;
                let outcome = ctx
                    .behavior
                    .run_command(&args.player_name, &args.command, args.enable_papi)
                    .await;
                reply.merge(&self.text_result(outcome.map_err(|e| e.0)))?;
            }
            Self::SendToChat => {
                let args: SendToChat = request.payload_as()?;
                let outcome = match args.extra {
                    None => ctx.behavior.broadcast_chat(&args.text).await,
                    Some(extra) => {
                        let segments = Segment::parse_all(&extra);
                        ctx.behavior.broadcast_rich_chat(&segments, &args.text).await
                    }
                };
                outcome.map_err(|e| fail(e.0))?;
            }
            Self::SyncSettingsUpdated => {
                let sync: SyncSettings = request.payload_as()?;
                ctx.profile.write().sync = sync;
                info!(sync_mode = sync.sync_mode, sync_money = sync.sync_money, "chat sync settings updated");
            }
            Self::PlayerList => {
                let list = ctx.behavior.player_list().await.map_err(|e| fail(e.0))?;
                reply.merge(&json!({ "list": list }))?;
            }
            Self::GetExtensions => {
                reply.merge(&json!({ "extensions": extensions_listing(ctx) }))?;
            }
        }
        Ok(())
    }

    fn text_result(self, outcome: Result<String, String>) -> TextResult {
        match outcome {
            Ok(text) => TextResult { success: true, text },
            Err(message) => {
                error!(operation = self.name(), error = %message, "host action failed");
                TextResult {
                    success: false,
                    text: message,
                }
            }
        }
    }
}

/// `{id: {name, description, author, version, required_plugins, identifier, rpc?}}`
/// over every extension known to the event bus or the RPC router.
fn extensions_listing(ctx: &OperationContext<'_>) -> Value {
    let mut listing: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

    let describe = |info: &bridgewire_core::ExtensionInfo| {
        let mut entry = Map::new();
        let _ = entry.insert("name".into(), json!(info.name));
        let _ = entry.insert("description".into(), json!(info.description));
        let _ = entry.insert("author".into(), json!(info.author));
        let _ = entry.insert("version".into(), json!(info.version));
        let _ = entry.insert("required_plugins".into(), json!(info.required_extensions));
        let _ = entry.insert("identifier".into(), json!(info.id));
        entry
    };

    for info in ctx.events.list_extensions() {
        let _ = listing.insert(info.id.clone(), describe(&info));
    }
    for caps in ctx.router.list_capabilities() {
        let entry = listing
            .entry(caps.info.id.clone())
            .or_insert_with(|| describe(&caps.info));
        let rpc: Map<String, Value> = caps
            .methods
            .iter()
            .map(|m| (m.method.clone(), serde_json::to_value(m).unwrap_or(Value::Null)))
            .collect();
        let _ = entry.insert("rpc".into(), Value::Object(rpc));
    }

    Value::Object(
        listing
            .into_iter()
            .map(|(id, entry)| (id, Value::Object(entry)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorError, BehaviorResult};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use bridgewire_core::ExtensionInfo;
    use bridgewire_core::models::{PlayerInfo, SegmentKind, ServerInfo};
    use bridgewire_events::{EventKind, Listener, Priority};
    use bridgewire_rpc::{MethodInfo, RpcRequest, rpc_fn};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn record(&self, call: String) -> BehaviorResult<()> {
            self.calls.lock().push(call);
            if self.fail {
                Err(BehaviorError::new("host refused"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl BridgeBehavior for Recorder {
        async fn run_command(&self, player_name: &str, command: &str, enable_papi: bool) -> BehaviorResult<String> {
            self.record(format!("run {player_name} {command} {enable_papi}"))?;
            Ok(format!("ran {command}"))
        }
        async fn placeholder_query(&self, player_name: &str, text: &str) -> BehaviorResult<String> {
            self.record(format!("papi {player_name} {text}"))?;
            Ok(text.replace("%player%", player_name))
        }
        async fn server_info(&self) -> BehaviorResult<ServerInfo> {
            self.record("info".into())?;
            Ok(ServerInfo {
                server_name: "Paper".into(),
                server_version: "1.21".into(),
                ..ServerInfo::default()
            })
        }
        async fn broadcast_chat(&self, text: &str) -> BehaviorResult<()> {
            self.record(format!("chat {text}"))
        }
        async fn broadcast_rich_chat(&self, segments: &[Segment], text: &str) -> BehaviorResult<()> {
            self.record(format!("rich {} {text}", segments.len()))
        }
        async fn bind_success_broadcast(&self, player_name: &str, account_id: &str, account_name: &str) -> BehaviorResult<()> {
            self.record(format!("bind {player_name} {account_id} {account_name}"))
        }
        async fn kick_player(&self, player_name: &str, message: &str) -> BehaviorResult<()> {
            self.record(format!("kick {player_name} {message}"))
        }
        async fn player_list(&self) -> BehaviorResult<Vec<PlayerInfo>> {
            self.record("list".into())?;
            Ok(vec![PlayerInfo::new("alice", "u-1")])
        }
    }

    struct Fixture {
        behavior: Recorder,
        profile: RwLock<ClientProfile>,
        events: EventBus,
        router: RpcRouter,
    }

    impl Fixture {
        fn new(behavior: Recorder) -> Self {
            Self {
                behavior,
                profile: RwLock::new(ClientProfile::default()),
                events: EventBus::default(),
                router: RpcRouter::new(),
            }
        }

        async fn run(&self, request: Envelope) -> (Result<(), BridgeError>, Envelope) {
            let ctx = OperationContext {
                behavior: &self.behavior,
                profile: &self.profile,
                events: &self.events,
                router: &self.router,
            };
            let op = Operation::from_name(request.operation.as_deref().unwrap_or_default()).unwrap();
            let mut reply = Envelope::callback_reply(&request);
            let result = op.execute(&ctx, &request, &mut reply).await;
            (result, reply)
        }

        fn calls(&self) -> Vec<String> {
            self.behavior.calls.lock().clone()
        }
    }

    fn request(operation: &str) -> Envelope {
        Envelope::packet(operation).with_callback_id("cb-1")
    }

    #[test]
    fn names_resolve_both_ways() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name(inbound::RPC_CALL), None);
        assert_eq!(Operation::from_name("NOPE"), None);
    }

    #[tokio::test]
    async fn server_info_is_merged_into_reply() {
        let fx = Fixture::new(Recorder::default());
        let (result, reply) = fx.run(request("GET_SERVER_INFO")).await;
        result.unwrap();
        assert_eq!(reply.str_field("server_name"), Some("Paper"));
        assert_eq!(reply.str_field("exec_op"), Some("GET_SERVER_INFO"));
    }

    #[tokio::test]
    async fn run_command_reports_success_and_failure_in_reply() {
        let fx = Fixture::new(Recorder::default());
        let req = request("RUN_COMMAND")
            .with_field("player_name", "alice")
            .with_field("command", "list")
            .with_field("enable_papi", true);
        let (result, reply) = fx.run(req.clone()).await;
        result.unwrap();
        assert_eq!(reply.field("success"), Some(&json!(true)));
        assert_eq!(reply.str_field("text"), Some("ran list"));
        assert_eq!(fx.calls(), vec!["run alice list true"]);

        let fx = Fixture::new(Recorder::failing());
        let (result, reply) = fx.run(req).await;
        result.unwrap();
        assert_eq!(reply.field("success"), Some(&json!(false)));
        assert_eq!(reply.str_field("text"), Some("host refused"));
    }

    #[tokio::test]
    async fn placeholder_query_returns_text() {
        let fx = Fixture::new(Recorder::default());
        let req = request("PLACEHOLDER_API_QUERY")
            .with_field("player_name", "bob")
            .with_field("text", "hi %player%");
        let (result, reply) = fx.run(req).await;
        result.unwrap();
        assert_eq!(reply.str_field("text"), Some("hi bob"));
    }

    #[tokio::test]
    async fn unbind_kicks_and_failure_is_an_operation_error() {
        let req = request("UN_BIND_NOTIFY")
            .with_field("player_name", "eve")
            .with_field("kick_message", "unbound");
        let fx = Fixture::new(Recorder::default());
        fx.run(req.clone()).await.0.unwrap();
        assert_eq!(fx.calls(), vec!["kick eve unbound"]);

        let fx = Fixture::new(Recorder::failing());
        let err = fx.run(req).await.0.unwrap_err();
        assert_matches!(err, BridgeError::Operation { ref operation, ref message } if operation == "UN_BIND_NOTIFY" && message == "host refused");
    }

    #[tokio::test]
    async fn bind_success_is_broadcast() {
        let fx = Fixture::new(Recorder::default());
        let req = request("BIND_SUCCESS_NOTIFY")
            .with_field("player_name", "eve")
            .with_field("account_id", "42")
            .with_field("account_name", "Eve");
        fx.run(req).await.0.unwrap();
        assert_eq!(fx.calls(), vec!["bind eve 42 Eve"]);
    }

    #[tokio::test]
    async fn send_to_chat_plain_and_rich() {
        let fx = Fixture::new(Recorder::default());
        fx.run(request("SEND_TO_CHAT").with_field("text", "hello")).await.0.unwrap();

        let extra = json!([
            {"type": SegmentKind::Text.code(), "text": "hi "},
            {"type": 99, "text": "dropped"},
            {"type": SegmentKind::At.code(), "text": "@bob", "at_user_id": "7"}
        ]);
        fx.run(request("SEND_TO_CHAT").with_field("text", "hi @bob").with_field("extra", extra))
            .await
            .0
            .unwrap();
        assert_eq!(fx.calls(), vec!["chat hello", "rich 2 hi @bob"]);
    }

    #[tokio::test]
    async fn null_extra_is_plain_chat() {
        let fx = Fixture::new(Recorder::default());
        fx.run(request("SEND_TO_CHAT").with_field("text", "x").with_field("extra", Value::Null))
            .await
            .0
            .unwrap();
        assert_eq!(fx.calls(), vec!["chat x"]);
    }

    #[tokio::test]
    async fn sync_settings_update_profile() {
        let fx = Fixture::new(Recorder::default());
        let req = request("SYNC_SETTINGS_UPDATED")
            .with_field("sync_mode", 2)
            .with_field("sync_money", 10);
        fx.run(req).await.0.unwrap();
        assert_eq!(
            fx.profile.read().sync,
            SyncSettings {
                sync_mode: 2,
                sync_money: 10
            }
        );
    }

    #[tokio::test]
    async fn player_list_is_wrapped() {
        let fx = Fixture::new(Recorder::default());
        let (result, reply) = fx.run(request("PLAYER_LIST")).await;
        result.unwrap();
        let list = reply.field("list").unwrap().as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["player_name"], "alice");
    }

    #[tokio::test]
    async fn extensions_union_bus_and_router() {
        let fx = Fixture::new(Recorder::default());
        let listener_only = ExtensionInfo::new("ext:events", "Events").with_author("a");
        let _ = fx.events.subscribe(
            listener_only,
            Listener::new().on(EventKind::Online, Priority::Normal, "on_online", |_| Ok(())),
        );
        let rpc_ext = ExtensionInfo::new("ext:rpc", "Rpc").with_version("2.0");
        let _ = fx.router.register(
            &rpc_ext,
            "ping",
            MethodInfo::new("Ping", "answers pong"),
            rpc_fn(|_req: RpcRequest| async move { Ok(json!("pong")) }),
        );

        let (result, reply) = fx.run(request("GET_EXTENSIONS")).await;
        result.unwrap();
        let extensions = reply.field("extensions").unwrap();
        assert_eq!(extensions["ext:events"]["author"], "a");
        assert!(extensions["ext:events"].get("rpc").is_none());
        assert_eq!(extensions["ext:rpc"]["version"], "2.0");
        assert_eq!(
            extensions["ext:rpc"]["rpc"]["ping"],
            json!({"identifier": "ext:rpc", "method": "ping", "description": "answers pong", "displayName": "Ping"})
        );
    }
}
