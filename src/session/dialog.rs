//! 对话引擎：一问一答，带超时与取消
//!
//! 每个挂起点（等待回答）同时监听会话的取消令牌，抢占后旧脚本在下一次接收时立即得到
//! [`BotError::Cancelled`]。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::registry::{SessionId, SessionRegistry};
use crate::core::{BotError, ChatId};
use crate::outbox::OutputSink;

/// 回答超时后发给用户的致歉
pub const TIMEOUT_APOLOGY: &str = "Przepraszam, czas na odpowiedź minął. Spróbuj ponownie.";

/// 等待一条回答。
///
/// 取消优先于已缓冲的回答；通道关闭视同取消；`timeout` 内既无回答也无取消则返回超时。
pub async fn get_answer(
    rx: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<String, BotError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BotError::Cancelled),
        msg = rx.recv() => msg.ok_or(BotError::Cancelled),
        _ = tokio::time::sleep(timeout) => Err(BotError::Timeout),
    }
}

/// 脚本持有的会话句柄；丢弃时自动从注册表注销
pub struct DialogSession {
    chat_id: ChatId,
    id: SessionId,
    rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    sink: OutputSink,
    timeout: Duration,
    max_attempts: usize,
    registry: Arc<SessionRegistry>,
}

impl DialogSession {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        chat_id: ChatId,
        id: SessionId,
        rx: mpsc::UnboundedReceiver<String>,
        cancel: CancellationToken,
        sink: OutputSink,
        timeout: Duration,
        max_attempts: usize,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            chat_id,
            id,
            rx,
            cancel,
            sink,
            timeout,
            max_attempts,
            registry,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// 单向发送
    pub fn say(&self, text: impl Into<String>) {
        self.sink.send(self.chat_id, text);
    }

    /// 不发提示，直接等待下一条输入
    pub async fn recv(&mut self) -> Result<String, BotError> {
        get_answer(&mut self.rx, &self.cancel, self.timeout).await
    }

    /// 发出提示并等待回答；超时时先向用户致歉再返回错误
    pub async fn ask(&mut self, prompt: &str) -> Result<String, BotError> {
        if self.cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }
        self.say(prompt);
        match self.recv().await {
            Err(BotError::Timeout) => {
                self.say(TIMEOUT_APOLOGY);
                Err(BotError::Timeout)
            }
            other => other,
        }
    }

    /// 带格式校验的提问：解析失败时说明问题并重问，最多 `max_attempts` 次
    pub async fn ask_parsed<T, P>(&mut self, prompt: &str, parse: P) -> Result<T, BotError>
    where
        P: Fn(&str) -> Result<T, String>,
    {
        let mut problem = String::new();
        for attempt in 1..=self.max_attempts {
            let answer = self.ask(prompt).await?;
            match parse(answer.trim()) {
                Ok(value) => return Ok(value),
                Err(p) => {
                    tracing::debug!(chat_id = %self.chat_id, attempt, problem = %p, "Invalid answer");
                    if attempt < self.max_attempts {
                        self.say(format!("{}, spróbuj jeszcze raz", p));
                    }
                    problem = p;
                }
            }
        }
        Err(BotError::Validation(problem))
    }
}

impl Drop for DialogSession {
    fn drop(&mut self) {
        self.registry.end(self.chat_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::OutgoingMessage;

    #[tokio::test(start_paused = true)]
    async fn test_get_answer_times_out() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<String>();
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        let result = get_answer(&mut rx, &cancel, Duration::from_secs(600)).await;
        assert_eq!(result, Err(BotError::Timeout));
        assert!(started.elapsed() >= Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_answer_returns_value_before_timeout() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let cancel = CancellationToken::new();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(599)).await;
            let _ = tx.send("tak".to_string());
        });

        let result = get_answer(&mut rx, &cancel, Duration::from_secs(600)).await;
        assert_eq!(result, Ok("tak".to_string()));
    }

    #[tokio::test]
    async fn test_get_answer_cancelled() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<String>();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = get_answer(&mut rx, &cancel, Duration::from_secs(600)).await;
        assert_eq!(result, Err(BotError::Cancelled));
    }

    #[tokio::test]
    async fn test_get_answer_closed_channel_is_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        drop(tx);
        let cancel = CancellationToken::new();
        let result = get_answer(&mut rx, &cancel, Duration::from_secs(600)).await;
        assert_eq!(result, Err(BotError::Cancelled));
    }

    fn setup(max_attempts: usize) -> (Arc<SessionRegistry>, mpsc::UnboundedReceiver<OutgoingMessage>) {
        let (sink, out) = OutputSink::channel();
        (
            Arc::new(SessionRegistry::new(sink, Duration::from_secs(600), max_attempts)),
            out,
        )
    }

    fn drain(out: &mut mpsc::UnboundedReceiver<OutgoingMessage>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(msg) = out.try_recv() {
            texts.push(msg.text);
        }
        texts
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_timeout_sends_apology() {
        let (registry, mut out) = setup(3);
        let mut session = registry.open(ChatId(1));

        let result = session.ask("Podaj temat").await;
        assert_eq!(result, Err(BotError::Timeout));
        assert_eq!(drain(&mut out), vec!["Podaj temat", TIMEOUT_APOLOGY]);
    }

    #[tokio::test]
    async fn test_ask_cancelled_sends_no_apology() {
        let (registry, mut out) = setup(3);
        let mut session = registry.open(ChatId(1));
        let _successor = registry.open(ChatId(1));

        assert_eq!(session.ask("Podaj temat").await, Err(BotError::Cancelled));
        assert!(drain(&mut out).is_empty());
    }

    #[tokio::test]
    async fn test_ask_parsed_retries_then_succeeds() {
        let (registry, mut out) = setup(3);
        let chat = ChatId(4);
        let mut session = registry.open(chat);
        registry.deliver(chat, "dużo");
        registry.deliver(chat, " 7 ");

        let n = session
            .ask_parsed("Podaj liczbe", |s| s.parse::<u32>().map_err(|_| "Musisz podac liczbe".to_string()))
            .await;
        assert_eq!(n, Ok(7));
        assert_eq!(
            drain(&mut out),
            vec!["Podaj liczbe", "Musisz podac liczbe, spróbuj jeszcze raz", "Podaj liczbe"]
        );
    }

    #[tokio::test]
    async fn test_ask_parsed_gives_up_after_limit() {
        let (registry, _out) = setup(2);
        let chat = ChatId(5);
        let mut session = registry.open(chat);
        registry.deliver(chat, "a");
        registry.deliver(chat, "b");
        registry.deliver(chat, "3");

        let n = session
            .ask_parsed("Podaj liczbe", |s| s.parse::<u32>().map_err(|_| "Musisz podac liczbe".to_string()))
            .await;
        assert_eq!(n, Err(BotError::validation("Musisz podac liczbe")));
    }
}
