//! 端到端：入站消息 → 分发循环 → 对话脚本 → 传输层

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use studybot::core::PERSISTENCE_WARNING;
use studybot::features::flashcards::FLASHCARD_MISSING;
use studybot::features::schedule::CLASS_MISSING;
use studybot::integrations::{InboundMessage, Transport};
use studybot::outbox::OutputSink;
use studybot::reminders::{ReminderPolicy, ReminderScheduler, SystemClock};
use studybot::session::{SessionRegistry, TIMEOUT_APOLOGY};
use studybot::store::{BotData, MemoryBackend, FLASHCARDS_DOCUMENT, SCHEDULES_DOCUMENT};
use studybot::{Bot, ChatId};

/// 记录所有发出的消息
struct RecordingTransport {
    tx: mpsc::UnboundedSender<(ChatId, String)>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()> {
        self.tx.send((chat_id, text.to_string()))?;
        Ok(())
    }
}

struct Harness {
    inbound: mpsc::Sender<InboundMessage>,
    sent: mpsc::UnboundedReceiver<(ChatId, String)>,
    backend: Arc<MemoryBackend>,
    shutdown: CancellationToken,
}

impl Harness {
    async fn start(answer_timeout: Duration) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let (data, _writer) = BotData::load(backend.clone()).await.unwrap();

        let (tx, sent) = mpsc::unbounded_channel();
        let (sink, _drain) = OutputSink::spawn(Arc::new(RecordingTransport { tx }));

        let shutdown = CancellationToken::new();
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&data.reminders),
            sink.clone(),
            Arc::new(SystemClock),
            ReminderPolicy::default(),
            shutdown.clone(),
        ));
        let registry = Arc::new(SessionRegistry::new(sink, answer_timeout, 3));
        let bot = Bot::new(registry, data, scheduler);

        let (inbound, rx) = mpsc::channel(32);
        let token = shutdown.clone();
        tokio::spawn(async move { bot.run(rx, token).await });

        Self {
            inbound,
            sent,
            backend,
            shutdown,
        }
    }

    async fn say(&self, chat: i64, text: &str) {
        self.inbound.send(InboundMessage::new(chat, text)).await.unwrap();
    }

    async fn expect(&mut self, chat: i64, text: &str) {
        let (to, got) = self.sent.recv().await.unwrap();
        assert_eq!((to, got.as_str()), (ChatId(chat), text));
    }

    async fn next(&mut self) -> (ChatId, String) {
        self.sent.recv().await.unwrap()
    }

    /// 发出命令，并在每个提示之后依次回答
    async fn dialog(&mut self, chat: i64, command: &str, answers: &[&str]) {
        self.say(chat, command).await;
        for answer in answers {
            self.next().await;
            self.say(chat, answer).await;
        }
    }

    fn document(&self, name: &str) -> serde_json::Value {
        self.backend.snapshot(name).unwrap()
    }
}

#[tokio::test]
async fn test_flashcard_add_then_display() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.say(1, "/dodajfiszke").await;
    h.expect(1, "Podaj temat").await;
    h.say(1, "Biologia").await;
    h.expect(1, "Podaj pojecie").await;
    h.say(1, "Komórka").await;
    h.expect(1, "Podaj definicje").await;
    h.say(1, "podstawowa jednostka życia").await;
    h.expect(1, "Dodano fiszke").await;

    h.say(1, "/fiszka Komórka").await;
    let (_, text) = h.next().await;
    assert!(text.contains("biologia"));
    assert!(text.contains("podstawowa jednostka życia"));

    let persisted = h.backend.snapshot(FLASHCARDS_DOCUMENT).unwrap();
    assert_eq!(persisted["1"]["biologia"]["komórka"], "podstawowa jednostka życia");
}

#[tokio::test]
async fn test_chats_are_isolated() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.say(1, "/dodajfiszke").await;
    h.expect(1, "Podaj temat").await;
    h.say(2, "/fiszka komórka").await;
    h.expect(2, "Nie znaleziono pojecia").await;
    h.say(1, "biologia").await;
    h.expect(1, "Podaj pojecie").await;
}

#[tokio::test]
async fn test_knowledge_test_scores_answers() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    for (term, definition) in [("atom", "najmniejsza część pierwiastka"), ("jon", "atom z ładunkiem")] {
        h.say(5, "/dodajfiszke").await;
        for answer in ["chemia", term, definition] {
            h.next().await;
            h.say(5, answer).await;
        }
        h.expect(5, "Dodano fiszke").await;
    }

    h.say(5, "/test").await;
    h.next().await;
    h.say(5, "Chemia").await;
    h.expect(5, "Podaj ilosc pytan, maksymalna ilosc dla tego tematu: 2").await;
    h.say(5, "2").await;

    h.expect(5, "Co to jest? najmniejsza część pierwiastka").await;
    h.say(5, "ATOM").await;
    h.expect(5, "Poprawna odpowiedz").await;
    h.expect(5, "Co to jest? atom z ładunkiem").await;
    h.say(5, "kation").await;
    h.expect(5, "Bledna odpowiedz, poprawna to: jon").await;
    h.expect(5, "Odpowiedziales poprawnie na 1 z 2").await;
}

#[tokio::test]
async fn test_schedule_add_and_show() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.say(3, "/dodajzajecia").await;
    for answer in ["poniedziałek", "10:00", "11:30", "Analiza"] {
        h.next().await;
        h.say(3, answer).await;
    }
    h.expect(3, "Dodano zajęcia").await;

    h.say(3, "/plan").await;
    let (_, text) = h.next().await;
    assert!(text.contains("10:00 - 11:30 - Analiza"));
    assert!(h.backend.snapshot(SCHEDULES_DOCUMENT).unwrap()["3"].is_object());
}

#[tokio::test]
async fn test_flashcard_edit_and_delete() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.dialog(7, "/edytujfiszke", &["biologia", "komórka"]).await;
    h.expect(7, FLASHCARD_MISSING).await;
    h.dialog(7, "/usunfiszke", &["biologia", "komórka"]).await;
    h.expect(7, FLASHCARD_MISSING).await;

    h.dialog(7, "/dodajfiszke", &["biologia", "komórka", "stara"]).await;
    h.expect(7, "Dodano fiszke").await;
    h.dialog(7, "/edytujfiszke", &["Biologia", "KOMÓRKA", "podstawowa jednostka życia"]).await;
    h.expect(7, "Edytowano fiszke").await;
    assert_eq!(
        h.document(FLASHCARDS_DOCUMENT)["7"]["biologia"]["komórka"],
        "podstawowa jednostka życia"
    );

    h.dialog(7, "/usunfiszke", &["biologia", "komórka"]).await;
    h.expect(7, "Usunieto fiszke").await;
    assert_eq!(h.document(FLASHCARDS_DOCUMENT), serde_json::json!({}));
    h.say(7, "/fiszka komórka").await;
    h.expect(7, "Nie znaleziono pojecia").await;
}

#[tokio::test]
async fn test_schedule_edit_and_delete_class() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.dialog(3, "/edytujzajecia", &["wtorek", "Fizyka"]).await;
    h.expect(3, CLASS_MISSING).await;

    h.dialog(3, "/dodajzajecia", &["poniedziałek", "10:00", "11:30", "Analiza"]).await;
    h.expect(3, "Dodano zajęcia").await;
    h.dialog(3, "/edytujzajecia", &["poniedziałek", "analiza", "12:00", "13:00", "Algebra"]).await;
    h.expect(3, "Edytowano zajęcia").await;
    let schedules = h.document(SCHEDULES_DOCUMENT);
    let monday = &schedules["3"]["monday"];
    assert_eq!(monday.as_array().unwrap().len(), 1);
    assert_eq!(monday[0]["name"], "Algebra");
    assert_eq!(monday[0]["start"], "12:00:00");

    h.dialog(3, "/usunzajecia", &["poniedziałek", "Analiza"]).await;
    h.expect(3, CLASS_MISSING).await;
    h.dialog(3, "/usunzajecia", &["poniedziałek", "Algebra"]).await;
    h.expect(3, "Usunięto zajęcia").await;
    assert_eq!(h.document(SCHEDULES_DOCUMENT), serde_json::json!({}));
}

#[tokio::test]
async fn test_delete_schedule_requires_confirmation() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.dialog(9, "/dodajzajecia", &["piątek", "08:00", "09:00", "Chemia"]).await;
    h.expect(9, "Dodano zajęcia").await;

    h.dialog(9, "/usunplan", &["tak"]).await;
    h.expect(9, "Ok, nie usuwamy").await;
    assert_eq!(h.document(SCHEDULES_DOCUMENT)["9"]["friday"][0]["name"], "Chemia");

    h.dialog(9, "/usunplan", &["TAK"]).await;
    h.expect(9, "Usunięto plan").await;
    assert_eq!(h.document(SCHEDULES_DOCUMENT), serde_json::json!({}));
    h.say(9, "/plan").await;
    h.expect(9, "Brak zajęć :/").await;
}

#[tokio::test]
async fn test_persistence_failure_is_soft() {
    let mut h = Harness::start(Duration::from_secs(600)).await;
    h.backend.set_fail_writes(true);

    h.say(4, "/dodajfiszke").await;
    for answer in ["fizyka", "siła", "wektor"] {
        h.next().await;
        h.say(4, answer).await;
    }
    h.expect(4, PERSISTENCE_WARNING).await;
    h.expect(4, "Dodano fiszke").await;

    h.say(4, "/fiszka siła").await;
    h.expect(4, "fizyka, siła - wektor").await;
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_dialog_times_out() {
    let mut h = Harness::start(Duration::from_secs(600)).await;

    h.say(6, "/dodajfiszke").await;
    h.expect(6, "Podaj temat").await;
    h.expect(6, TIMEOUT_APOLOGY).await;

    // 会话已结束，后续文本被丢弃
    h.say(6, "biologia").await;
    h.say(6, "/version").await;
    let (_, text) = h.next().await;
    assert!(text.starts_with("v "));
}

#[tokio::test]
async fn test_shutdown_stops_dispatch() {
    let h = Harness::start(Duration::from_secs(600)).await;
    h.shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.inbound.send(InboundMessage::new(1, "/help")).await.is_err());
}
