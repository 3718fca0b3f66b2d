//! End-to-end session flows against stub chat, execution and clipboard services

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use bota_cli::clipboard::ClipboardSink;
use bota_cli::config::Config;
use bota_cli::controller::{BlockTarget, Intent, SessionController, SessionEvent, CHAT_ERROR_NOTICE};
use bota_cli::core::errors::ClipboardError;
use bota_cli::core::transcript::{EmptyReplyPolicy, ReplyOutcome};
use bota_cli::core::types::{BlockRef, CodeBlockState, Role};
use bota_cli::llm::{ChatBackend, ChatRequest, FragmentStream, TransportError};
use bota_cli::sandbox::{ExecutionBackend, ExecutionRequest, ExecutionResponse};

type Fragment = Result<String, TransportError>;

enum Reply {
    Fragments(Vec<String>),
    Fail(TransportError),
    Held(mpsc::UnboundedReceiver<Fragment>),
}

#[derive(Default)]
struct ScriptedChat {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Queue a reply whose fragments the test feeds by hand
    fn hold(&self) -> mpsc::UnboundedSender<Fragment> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Reply::Held(rx));
        tx
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self, request: ChatRequest) -> Result<FragmentStream, TransportError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Fragments(fragments)) => {
                Ok(futures::stream::iter(fragments.into_iter().map(Ok)).boxed())
            }
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Held(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            None => Ok(futures::stream::empty().boxed()),
        }
    }
}

struct FixedExecutor {
    reply: Result<ExecutionResponse, TransportError>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

#[async_trait]
impl ExecutionBackend for FixedExecutor {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone()
    }
}

/// Holds each execution until its code's gate is opened
#[derive(Default)]
struct GatedExecutor {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl GatedExecutor {
    fn gate(&self, code: &str) -> Arc<Notify> {
        self.gates
            .lock()
            .unwrap()
            .entry(code.to_string())
            .or_default()
            .clone()
    }

    fn open(&self, code: &str) {
        self.gate(code).notify_one();
    }
}

#[async_trait]
impl ExecutionBackend for GatedExecutor {
    fn name(&self) -> &str {
        "gated"
    }

    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResponse, TransportError> {
        let code = request.code.trim().to_string();
        self.gate(&code).notified().await;
        ran(&format!("ran {}", code))
    }
}

#[derive(Clone, Default)]
struct MemoryClipboard {
    contents: Arc<Mutex<Vec<String>>>,
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.contents.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn record(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({"choices": [{"delta": {"content": text}}]})
    )
}

fn ran(output: &str) -> Result<ExecutionResponse, TransportError> {
    Ok(ExecutionResponse {
        success: true,
        output: Some(output.to_string()),
        error: None,
    })
}

struct Harness<E = FixedExecutor> {
    intents: mpsc::UnboundedSender<Intent>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    handle: JoinHandle<SessionController>,
    chat: Arc<ScriptedChat>,
    executor: Arc<E>,
    clipboard: MemoryClipboard,
}

impl Harness {
    fn start(config: Config, execution: Result<ExecutionResponse, TransportError>) -> Self {
        Self::with_executor(
            config,
            Arc::new(FixedExecutor {
                reply: execution,
                requests: Mutex::new(Vec::new()),
            }),
        )
    }
}

impl<E: ExecutionBackend + 'static> Harness<E> {
    fn with_executor(config: Config, executor: Arc<E>) -> Self {
        let chat = Arc::new(ScriptedChat::default());
        let clipboard = MemoryClipboard::default();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (intents, intent_rx) = mpsc::unbounded_channel();

        let controller = SessionController::new(
            &config,
            chat.clone(),
            executor.clone() as Arc<dyn ExecutionBackend>,
            Box::new(clipboard.clone()),
            event_tx,
        );
        let handle = tokio::spawn(controller.run(intent_rx));

        Self {
            intents,
            events,
            handle,
            chat,
            executor,
            clipboard,
        }
    }

    fn send(&self, intent: Intent) {
        self.intents.send(intent).unwrap();
    }

    /// Skip events until `pick` matches one
    async fn wait_for<T>(&mut self, mut pick: impl FnMut(&SessionEvent) -> Option<T>) -> T {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(30), self.events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("controller stopped");
            if let Some(found) = pick(&event) {
                return found;
            }
        }
    }

    async fn settled(&mut self) -> ReplyOutcome {
        self.wait_for(|e| match e {
            SessionEvent::ExchangeSettled { reply, .. } => Some(*reply),
            _ => None,
        })
        .await
    }

    async fn finish(self) -> SessionController {
        self.intents.send(Intent::Quit).unwrap();
        self.handle.await.unwrap()
    }

    /// Wait for the controller to stop on its own
    async fn stopped(self) -> SessionController {
        tokio::time::timeout(Duration::from_secs(30), self.handle)
            .await
            .expect("controller did not stop")
            .unwrap()
    }
}

const CODE_REPLY: &str = "Printing one:\n\n```python\nprint(1)\n```\n";

#[tokio::test]
async fn test_send_streams_and_finalizes() {
    let mut harness = Harness::start(Config::default(), ran("1"));
    harness.chat.push(Reply::Fragments(vec![
        record("Printing one:\n\n```py"),
        record("thon\nprint(1)\n```\n"),
        "data: [DONE]\n".to_string(),
    ]));

    harness.send(Intent::Send("  print one  ".into()));

    let user = harness
        .wait_for(|e| match e {
            SessionEvent::UserMessage { text, .. } => Some(text.clone()),
            _ => None,
        })
        .await;
    assert_eq!(user, "print one");

    let (tree, blocks) = harness
        .wait_for(|e| match e {
            SessionEvent::Finalized { tree, blocks, .. } => Some((tree.clone(), blocks.clone())),
            _ => None,
        })
        .await;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].source, "print(1)\n");
    assert_eq!(blocks[0].lang.as_deref(), Some("python"));
    assert!(tree.code_nodes().all(|n| n.affordance.is_some()));
    assert_eq!(harness.settled().await, ReplyOutcome::Kept);

    let controller = harness.finish().await;
    let messages = controller.session().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].content, "print one");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, CODE_REPLY);
    assert!(!controller.session().is_in_flight());
}

#[tokio::test]
async fn test_second_send_waits_for_first_exchange() {
    let mut harness = Harness::start(Config::default(), ran(""));
    let first = harness.chat.hold();
    harness.chat.push(Reply::Fragments(vec![record("two")]));

    harness.send(Intent::Send("first".into()));
    harness.send(Intent::Send("second".into()));

    let position = harness
        .wait_for(|e| match e {
            SessionEvent::Queued { text, position } if text == "second" => Some(*position),
            _ => None,
        })
        .await;
    assert_eq!(position, 1);
    assert!(harness.chat.requests().len() <= 1);

    first.send(Ok(record("one"))).unwrap();
    drop(first);

    assert_eq!(harness.settled().await, ReplyOutcome::Kept);
    assert_eq!(harness.settled().await, ReplyOutcome::Kept);

    let requests = harness.chat.requests();
    assert_eq!(requests.len(), 2);
    let roles: Vec<&str> = requests[0].messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["system", "user"]);
    let second: Vec<(&str, &str)> = requests[1]
        .messages
        .iter()
        .map(|m| (m.role.as_str(), m.content.as_str()))
        .collect();
    assert_eq!(&second[1..], &[("user", "first"), ("assistant", "one"), ("user", "second")]);

    let controller = harness.finish().await;
    let contents: Vec<&str> = controller
        .session()
        .messages()
        .iter()
        .skip(1)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "one", "second", "two"]);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let mut harness = Harness::start(Config::default(), ran(""));
    harness.chat.push(Reply::Fragments(vec![record("hi")]));

    harness.send(Intent::Send("   ".into()));
    harness.send(Intent::Send("hello".into()));

    let user = harness
        .wait_for(|e| match e {
            SessionEvent::UserMessage { text, .. } => Some(text.clone()),
            _ => None,
        })
        .await;
    assert_eq!(user, "hello");
    harness.settled().await;

    assert_eq!(harness.chat.requests().len(), 1);
}

#[tokio::test]
async fn test_failure_before_content_discards_placeholder() {
    let mut harness = Harness::start(Config::default(), ran(""));
    harness
        .chat
        .push(Reply::Fail(TransportError::Network("connection refused".into())));

    harness.send(Intent::Send("hello".into()));

    assert_eq!(harness.settled().await, ReplyOutcome::Discarded);
    let notice = harness
        .wait_for(|e| match e {
            SessionEvent::Notice { text, .. } => Some(text.clone()),
            _ => None,
        })
        .await;
    assert_eq!(notice, CHAT_ERROR_NOTICE);

    let controller = harness.finish().await;
    let roles: Vec<Role> = controller.session().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User]);
    assert!(!controller.session().is_in_flight());
}

#[tokio::test]
async fn test_failure_after_partial_content_keeps_it() {
    let mut harness = Harness::start(Config::default(), ran(""));
    let stream = harness.chat.hold();

    harness.send(Intent::Send("hello".into()));
    stream.send(Ok(record("partial "))).unwrap();
    stream.send(Ok(record("answer"))).unwrap();
    stream
        .send(Err(TransportError::Stream("connection reset".into())))
        .unwrap();

    let tree = harness
        .wait_for(|e| match e {
            SessionEvent::Finalized { tree, .. } => Some(tree.clone()),
            _ => None,
        })
        .await;
    assert_eq!(tree.plain_text(), "partial answer");
    assert_eq!(harness.settled().await, ReplyOutcome::Kept);
    harness
        .wait_for(|e| matches!(e, SessionEvent::Notice { .. }).then_some(()))
        .await;

    let controller = harness.finish().await;
    let last = controller.session().messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert_eq!(last.content, "partial answer");
}

#[tokio::test]
async fn test_queued_send_runs_after_failure() {
    let mut harness = Harness::start(Config::default(), ran(""));
    harness
        .chat
        .push(Reply::Fail(TransportError::Status {
            status: 502,
            body: String::new(),
        }));
    harness.chat.push(Reply::Fragments(vec![record("ok")]));

    harness.send(Intent::Send("first".into()));
    harness.send(Intent::Send("second".into()));

    let mut outcomes = Vec::new();
    outcomes.push(harness.settled().await);
    outcomes.push(harness.settled().await);
    assert_eq!(outcomes, vec![ReplyOutcome::Discarded, ReplyOutcome::Kept]);

    let requests = harness.chat.requests();
    let contents: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(&contents[1..], &["first", "second"]);
}

#[tokio::test]
async fn test_empty_reply_is_kept_by_default() {
    let mut harness = Harness::start(Config::default(), ran(""));
    harness
        .chat
        .push(Reply::Fragments(vec!["data: [DONE]\n".to_string()]));

    harness.send(Intent::Send("hello".into()));

    let blocks = harness
        .wait_for(|e| match e {
            SessionEvent::Finalized { blocks, .. } => Some(blocks.len()),
            _ => None,
        })
        .await;
    assert_eq!(blocks, 0);
    assert_eq!(harness.settled().await, ReplyOutcome::Kept);

    let controller = harness.finish().await;
    let last = controller.session().messages().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.is_empty());
}

#[tokio::test]
async fn test_empty_reply_can_be_suppressed() {
    let mut config = Config::default();
    config.chat.empty_reply = EmptyReplyPolicy::Suppress;
    let mut harness = Harness::start(config, ran(""));

    harness.send(Intent::Send("hello".into()));
    assert_eq!(harness.settled().await, ReplyOutcome::Discarded);

    let controller = harness.finish().await;
    assert_eq!(controller.session().history_len(), 2);
}

#[tokio::test]
async fn test_instance_is_forwarded() {
    let mut config = Config::default();
    config.chat.instance = Some("dev_instance_2".into());
    let mut harness = Harness::start(config, ran(""));

    harness.send(Intent::Send("hello".into()));
    harness.settled().await;

    let requests = harness.chat.requests();
    assert_eq!(requests[0].instance.as_deref(), Some("dev_instance_2"));
}

#[tokio::test]
async fn test_upstream_error_record_raises_notice() {
    let mut harness = Harness::start(Config::default(), ran(""));
    harness.chat.push(Reply::Fragments(vec![
        "data: {\"error\": \"model overloaded\"}\n".to_string(),
    ]));

    harness.send(Intent::Send("hello".into()));
    harness.settled().await;
    let notice = harness
        .wait_for(|e| match e {
            SessionEvent::Notice { text, .. } => Some(text.clone()),
            _ => None,
        })
        .await;
    assert_eq!(notice, CHAT_ERROR_NOTICE);
}

async fn finalized_code_reply<E: ExecutionBackend + 'static>(harness: &mut Harness<E>) -> BlockRef {
    harness.chat.push(Reply::Fragments(vec![record(CODE_REPLY)]));
    harness.send(Intent::Send("print one".into()));
    harness
        .wait_for(|e| match e {
            SessionEvent::Finalized { id, .. } => Some(BlockRef::new(*id, 0)),
            _ => None,
        })
        .await
}

#[tokio::test]
async fn test_execute_success_is_not_history() {
    let mut harness = Harness::start(Config::default(), ran("1\n"));
    let block = finalized_code_reply(&mut harness).await;

    harness.send(Intent::Execute(BlockTarget::Latest(0)));

    let running = harness
        .wait_for(|e| match e {
            SessionEvent::BlockState { block, state } => Some((*block, *state)),
            _ => None,
        })
        .await;
    assert_eq!(running, (block, CodeBlockState::Running));

    let (success, tree) = harness
        .wait_for(|e| match e {
            SessionEvent::ExecutionResult { success, tree, .. } => Some((*success, tree.clone())),
            _ => None,
        })
        .await;
    assert!(success);
    assert_eq!(tree.plain_text(), "Execution result:\n1");

    assert_eq!(
        *harness.executor.requests.lock().unwrap(),
        vec![ExecutionRequest {
            code: "print(1)".into()
        }]
    );

    let controller = harness.finish().await;
    assert_eq!(controller.session().history_len(), 3);
    assert_eq!(
        controller.pipeline().block(block).unwrap().state,
        CodeBlockState::Succeeded
    );
}

#[tokio::test]
async fn test_execute_failure_marks_block_failed() {
    let mut harness = Harness::start(
        Config::default(),
        Ok(ExecutionResponse {
            success: false,
            output: None,
            error: Some("boom".into()),
        }),
    );
    let block = finalized_code_reply(&mut harness).await;

    harness.send(Intent::Execute(BlockTarget::Exact(block)));

    let (success, tree) = harness
        .wait_for(|e| match e {
            SessionEvent::ExecutionResult { success, tree, .. } => Some((*success, tree.clone())),
            _ => None,
        })
        .await;
    assert!(!success);
    assert!(tree.plain_text().contains("boom"));

    let controller = harness.finish().await;
    assert_eq!(
        controller.pipeline().block(block).unwrap().state,
        CodeBlockState::Failed
    );
    assert_eq!(controller.session().history_len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_copy_feedback_reverts_after_delay() {
    let mut harness = Harness::start(Config::default(), ran(""));
    let block = finalized_code_reply(&mut harness).await;

    let copied_at = tokio::time::Instant::now();
    harness.send(Intent::Copy(BlockTarget::Latest(0)));

    let state = harness
        .wait_for(|e| match e {
            SessionEvent::BlockState { state, .. } => Some(*state),
            _ => None,
        })
        .await;
    assert_eq!(state, CodeBlockState::Copied);
    assert_eq!(
        *harness.clipboard.contents.lock().unwrap(),
        vec!["print(1)".to_string()]
    );

    let (reverted, state) = harness
        .wait_for(|e| match e {
            SessionEvent::BlockState { block, state } => Some((*block, *state)),
            _ => None,
        })
        .await;
    assert_eq!((reverted, state), (block, CodeBlockState::Idle));
    assert!(copied_at.elapsed() >= Duration::from_millis(2000));

    let controller = harness.finish().await;
    assert_eq!(controller.session().history_len(), 3);
}

#[tokio::test]
async fn test_copy_before_any_reply_reports_error() {
    let mut harness = Harness::start(Config::default(), ran(""));

    harness.send(Intent::Copy(BlockTarget::Latest(0)));

    let error = harness
        .wait_for(|e| match e {
            SessionEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
        .await;
    assert_eq!(error, "No finalized message to address");
    assert!(harness.clipboard.contents.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_block_index_reports_error() {
    let mut harness = Harness::start(Config::default(), ran(""));
    let block = finalized_code_reply(&mut harness).await;

    harness.send(Intent::Execute(BlockTarget::in_message(block.message, 4)));

    let error = harness
        .wait_for(|e| match e {
            SessionEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
        .await;
    assert!(error.contains("no code block 4"));
    assert!(harness.executor.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_intent_returns_raw_transcript() {
    let mut harness = Harness::start(Config::default(), ran(""));
    finalized_code_reply(&mut harness).await;
    harness.settled().await;

    harness.send(Intent::History);

    let messages = harness
        .wait_for(|e| match e {
            SessionEvent::History(messages) => Some(messages.clone()),
            _ => None,
        })
        .await;
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(messages[2].content, CODE_REPLY);
}

#[tokio::test]
async fn test_quit_when_idle_drains_queue_first() {
    let mut harness = Harness::start(Config::default(), ran(""));
    let first = harness.chat.hold();
    harness.chat.push(Reply::Fragments(vec![record("two")]));

    harness.send(Intent::Send("first".into()));
    harness.send(Intent::Send("second".into()));
    harness.send(Intent::QuitWhenIdle);

    harness
        .wait_for(|e| matches!(e, SessionEvent::Queued { .. }).then_some(()))
        .await;
    assert!(!harness.handle.is_finished());

    first.send(Ok(record("one"))).unwrap();
    drop(first);

    let controller = harness.stopped().await;
    let contents: Vec<&str> = controller
        .session()
        .messages()
        .iter()
        .skip(1)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "one", "second", "two"]);
    assert!(controller.is_idle());
}

#[tokio::test]
async fn test_quit_when_idle_waits_for_running_execution() {
    let executor = Arc::new(GatedExecutor::default());
    let mut harness = Harness::with_executor(Config::default(), executor.clone());
    let block = finalized_code_reply(&mut harness).await;
    harness.settled().await;

    harness.send(Intent::Execute(BlockTarget::Exact(block)));
    harness.send(Intent::QuitWhenIdle);
    harness
        .wait_for(|e| match e {
            SessionEvent::BlockState { state, .. } => (*state == CodeBlockState::Running).then_some(()),
            _ => None,
        })
        .await;
    tokio::task::yield_now().await;
    assert!(!harness.handle.is_finished());

    executor.open("print(1)");

    let controller = harness.stopped().await;
    assert_eq!(
        controller.pipeline().block(block).unwrap().state,
        CodeBlockState::Succeeded
    );
}

const TWO_BLOCK_REPLY: &str =
    "Two steps:\n\n```python\nprint(0)\n```\n\n```python\nprint(1)\n```\n";

#[tokio::test]
async fn test_executions_settle_independently_during_exchange() {
    let executor = Arc::new(GatedExecutor::default());
    let mut harness = Harness::with_executor(Config::default(), executor.clone());
    harness.chat.push(Reply::Fragments(vec![record(TWO_BLOCK_REPLY)]));
    harness.send(Intent::Send("two steps".into()));
    let reply = harness
        .wait_for(|e| match e {
            SessionEvent::Finalized { id, blocks, .. } => Some((*id, blocks.len())),
            _ => None,
        })
        .await;
    assert_eq!(reply.1, 2);
    harness.settled().await;
    let first = BlockRef::new(reply.0, 0);
    let second = BlockRef::new(reply.0, 1);

    // a second exchange stays open while both blocks run
    let stream = harness.chat.hold();
    harness.send(Intent::Send("and then?".into()));
    harness.send(Intent::Execute(BlockTarget::Exact(first)));
    harness.send(Intent::Execute(BlockTarget::Exact(second)));

    let mut running = Vec::new();
    while running.len() < 2 {
        let block = harness
            .wait_for(|e| match e {
                SessionEvent::BlockState { block, state } if *state == CodeBlockState::Running => {
                    Some(*block)
                }
                _ => None,
            })
            .await;
        running.push(block);
    }
    assert_eq!(running, vec![first, second]);

    executor.open("print(1)");
    let (done, tree) = harness
        .wait_for(|e| match e {
            SessionEvent::BlockState { block, .. } if *block == first => {
                panic!("block 0 changed before its execution finished")
            }
            SessionEvent::ExecutionResult { block, tree, .. } => Some((*block, tree.clone())),
            _ => None,
        })
        .await;
    assert_eq!(done, second);
    assert_eq!(tree.plain_text(), "Execution result:\nran print(1)");

    stream.send(Ok(record("Run them in order."))).unwrap();
    let delta = harness
        .wait_for(|e| match e {
            SessionEvent::Delta { text, .. } => Some(text.clone()),
            _ => None,
        })
        .await;
    assert_eq!(delta, "Run them in order.");

    executor.open("print(0)");
    let done = harness
        .wait_for(|e| match e {
            SessionEvent::ExecutionResult { block, .. } => Some(*block),
            _ => None,
        })
        .await;
    assert_eq!(done, first);

    drop(stream);
    assert_eq!(harness.settled().await, ReplyOutcome::Kept);

    let controller = harness.finish().await;
    assert_eq!(controller.session().history_len(), 5);
    for block in [first, second] {
        assert_eq!(
            controller.pipeline().block(block).unwrap().state,
            CodeBlockState::Succeeded
        );
    }
    assert_eq!(
        controller.session().messages().last().unwrap().content,
        "Run them in order."
    );
}

#[tokio::test(start_paused = true)]
async fn test_copy_during_execution_reverts_to_running() {
    let executor = Arc::new(GatedExecutor::default());
    let mut harness = Harness::with_executor(Config::default(), executor.clone());
    let block = finalized_code_reply(&mut harness).await;

    harness.send(Intent::Execute(BlockTarget::Exact(block)));
    harness.send(Intent::Copy(BlockTarget::Exact(block)));

    let mut states = Vec::new();
    while states.len() < 3 {
        let state = harness
            .wait_for(|e| match e {
                SessionEvent::BlockState { state, .. } => Some(*state),
                _ => None,
            })
            .await;
        states.push(state);
    }
    assert_eq!(
        states,
        vec![
            CodeBlockState::Running,
            CodeBlockState::Copied,
            CodeBlockState::Running
        ]
    );

    executor.open("print(1)");
    harness
        .wait_for(|e| matches!(e, SessionEvent::ExecutionResult { .. }).then_some(()))
        .await;

    let controller = harness.finish().await;
    assert_eq!(
        controller.pipeline().block(block).unwrap().state,
        CodeBlockState::Succeeded
    );
}
