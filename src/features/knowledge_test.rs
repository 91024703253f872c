//! 知识测验：按主题出题，用户根据定义回答术语

use std::sync::Arc;

use super::flashcards::{normalize, FlashcardBook};
use crate::core::{BotError, ChatId};
use crate::session::DialogSession;
use crate::store::Document;

const INTRO: &str = "Test twojej wiedzy. Bede podawal definicje roznych pojec, a ty odpowiedz nazwa pojecia. Na poczatek podaj temat, z ktorego chcesz zostac przepytany.";

pub const TOPIC_MISSING: &str = "Temat nie istnieje";

/// 题目数量：1..=max
pub fn parse_question_count(answer: &str, max: usize) -> Result<usize, String> {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        Ok(_) => Err(format!("Podaj liczbe od 1 do {}", max)),
        Err(_) => Err("Musisz podac liczbe".to_string()),
    }
}

/// 取出某主题的前 `count` 张卡片 (术语, 定义)
pub fn pick_questions(book: &FlashcardBook, chat_id: ChatId, topic: &str, count: usize) -> Vec<(String, String)> {
    book.deck(chat_id, topic)
        .map(|deck| {
            deck.iter()
                .take(count)
                .map(|(t, d)| (t.clone(), d.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// `/test`
pub async fn knowledge_test(mut session: DialogSession, book: Arc<Document<FlashcardBook>>) -> Result<(), BotError> {
    let chat_id = session.chat_id();
    let topic = normalize(&session.ask(INTRO).await?);
    let available = book
        .read(|b| b.deck(chat_id, &topic).map(|deck| deck.len()))
        .await
        .ok_or_else(|| BotError::validation(TOPIC_MISSING))?;

    let prompt = format!(
        "Podaj ilosc pytan, maksymalna ilosc dla tego tematu: {}",
        available
    );
    let count = session
        .ask_parsed(&prompt, |a| parse_question_count(a, available))
        .await?;

    let questions = book
        .read(|b| pick_questions(b, chat_id, &topic, count))
        .await;

    let mut correct = 0;
    for (term, definition) in &questions {
        let answer = session.ask(&format!("Co to jest? {}", definition)).await?;
        if normalize(&answer) == *term {
            correct += 1;
            session.say("Poprawna odpowiedz");
        } else {
            session.say(format!("Bledna odpowiedz, poprawna to: {}", term));
        }
    }

    session.say(format!(
        "Odpowiedziales poprawnie na {} z {}",
        correct,
        questions.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_question_count() {
        assert_eq!(parse_question_count("3", 5), Ok(3));
        assert_eq!(parse_question_count(" 5 ", 5), Ok(5));
        assert!(parse_question_count("0", 5).is_err());
        assert!(parse_question_count("6", 5).is_err());
        assert_eq!(
            parse_question_count("trzy", 5),
            Err("Musisz podac liczbe".to_string())
        );
    }

    #[test]
    fn test_pick_questions_takes_exact_count() {
        let mut book = FlashcardBook::default();
        let chat = ChatId(1);
        for (term, def) in [("a", "1"), ("b", "2"), ("c", "3")] {
            book.add(chat, "alfabet", term, def).unwrap();
        }
        assert_eq!(pick_questions(&book, chat, "alfabet", 2).len(), 2);
        assert_eq!(pick_questions(&book, chat, "alfabet", 10).len(), 3);
        assert!(pick_questions(&book, chat, "brak", 2).is_empty());
    }
}
