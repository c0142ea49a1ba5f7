mod common;

use tempfile::TempDir;

use voice_agent::core::AgentError;
use voice_agent::llm::{ChatResponse, Message, Role};
use voice_agent::session::{connect, ConversationSession, SessionMetadata};

use common::{processor, run_command, ScriptedModel};

fn open(conn: &str, id: &str) -> ConversationSession {
    let store = connect(conn).unwrap();
    ConversationSession::open(store, SessionMetadata::new(id)).unwrap()
}

async fn one_turn(conn: &str, id: &str, text: &str, reply: &str) -> usize {
    let mut session = open(conn, id);
    let turn = processor(ScriptedModel::new(vec![ChatResponse::text(reply)]));
    turn.process_turn(&mut session, text).await.unwrap();
    session.len()
}

async fn survives_reopen(conn: &str) {
    assert_eq!(one_turn(conn, "3", "hello", "hi").await, 2);
    assert_eq!(one_turn(conn, "3", "again", "welcome back").await, 4);

    let reopened = open(conn, "3");
    assert_eq!(
        reopened.messages(),
        &[
            Message::user("hello"),
            Message::assistant("hi"),
            Message::user("again"),
            Message::assistant("welcome back"),
        ]
    );

    // other ids are independent
    assert!(open(conn, "4").is_empty());
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    survives_reopen(&dir.path().join("sessions").display().to_string()).await;
}

#[tokio::test]
async fn sqlite_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("sessions.db");
    survives_reopen(&format!("sqlite://{}", db.display())).await;
}

#[tokio::test]
async fn rejected_turn_persists_only_the_user_message() {
    let dir = TempDir::new().unwrap();
    let conn = dir.path().display().to_string();

    let mut session = open(&conn, "fatal");
    let turn = processor(ScriptedModel::new(vec![ChatResponse::with_tool_calls(
        "",
        vec![run_command("a", "ls"), run_command("b", "ls")],
    )]));
    let err = turn.process_turn(&mut session, "two at once").await.unwrap_err();
    assert!(matches!(err, AgentError::MultipleToolCalls { .. }));

    assert_eq!(open(&conn, "fatal").messages(), &[Message::user("two at once")]);
}

#[cfg(unix)]
#[tokio::test]
async fn tool_turn_is_deterministic() {
    let script = || {
        ScriptedModel::new(vec![
            ChatResponse::with_tool_calls("", vec![run_command("call_1", "echo hi")]),
            ChatResponse::text("It printed hi."),
        ])
    };
    let prior = [Message::user("earlier"), Message::assistant("noted")];

    let mut appended = Vec::new();
    for _ in 0..2 {
        let mut session = open("sqlite::memory:", "det");
        for m in &prior {
            session.append(m.clone()).unwrap();
        }
        processor(script())
            .process_turn(&mut session, "say hi")
            .await
            .unwrap();
        appended.push(session.messages()[prior.len()..].to_vec());
    }

    assert_eq!(appended[0], appended[1]);
    let roles: Vec<Role> = appended[0].iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(appended[0][2].content, "0");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_still_completes_the_turn() {
    let mut session = open("sqlite::memory:", "exit");
    let turn = processor(ScriptedModel::new(vec![
        ChatResponse::with_tool_calls("", vec![run_command("c", "false")]),
        ChatResponse::text("That failed."),
    ]));

    let reply = turn.process_turn(&mut session, "run false").await.unwrap();
    assert_eq!(reply.content, "That failed.");
    assert_eq!(session.messages()[2].content, "1");
    assert!(!session.messages()[2].is_error);
}
