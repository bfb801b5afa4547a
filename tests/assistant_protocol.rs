use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;

use mlb_voice::assistant::{
    AskEnvelope, AssistantClient, AssistantTransport, ConnectionState, ExplainPlayEnvelope, Inbound,
    parse_inbound,
};
use mlb_voice::game::GameState;

struct Replay {
    inbound: VecDeque<String>,
    sent: Rc<RefCell<Vec<String>>>,
}

impl Replay {
    fn new(lines: &[&str]) -> Self {
        Self {
            inbound: lines.iter().map(|l| l.to_string()).collect(),
            sent: Rc::default(),
        }
    }
}

impl AssistantTransport for Replay {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.sent.borrow_mut().push(text);
        Ok(())
    }

    fn recv_text(&mut self) -> Result<Option<String>> {
        Ok(self.inbound.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn inbound_lines() -> Vec<&'static str> {
    include_str!("fixtures/assistant_inbound.jsonl")
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect()
}

fn game() -> GameState {
    serde_json::from_str(include_str!("fixtures/game_state_mid_inning.json")).unwrap()
}

#[test]
fn inbound_fixture_parses_every_kind() {
    let parsed: Vec<Inbound> = inbound_lines()
        .into_iter()
        .map(|l| parse_inbound(l).unwrap())
        .collect();
    assert_eq!(
        parsed,
        vec![
            Inbound::Text {
                content: "The Yankees lead 4-1 after Judge's homer.".to_string()
            },
            Inbound::Explanation {
                content: "*Power Surge* Judge sat on the fastball.".to_string()
            },
            Inbound::Error {
                content: "Model overloaded".to_string()
            },
            Inbound::Unknown,
            Inbound::Text {
                content: String::new()
            },
        ]
    );
}

#[test]
fn garbage_frame_is_an_error() {
    assert!(parse_inbound("not json").is_err());
}

#[test]
fn ask_sends_question_with_full_game_context() {
    let game = game();
    let transport = Replay::new(&[inbound_lines()[0]]);
    let sent = Rc::clone(&transport.sent);
    let mut client = AssistantClient::from_transport(transport);
    let reply = client.ask("who's winning?", &game).unwrap();
    assert_eq!(reply, "The Yankees lead 4-1 after Judge's homer.");

    let sent = sent.borrow();
    assert_eq!(sent.len(), 1);
    let envelope: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(envelope["content"], "who's winning?");
    let context: GameState = serde_json::from_value(envelope["gameContext"].clone()).unwrap();
    assert_eq!(context, game);
}

#[test]
fn ask_envelope_shape_matches_server() {
    let game = game();
    let sent = serde_json::to_value(AskEnvelope {
        content: "what's the count?",
        game_context: &game,
    })
    .unwrap();
    assert_eq!(sent["content"], "what's the count?");
    assert_eq!(sent["gameContext"]["gamePk"], 747061);
    assert_eq!(sent["gameContext"]["currentPlay"]["inningHalf"], "bottom");
    assert_eq!(sent["gameContext"]["plays"][0]["type"], "home_run");
}

#[test]
fn explain_play_envelope_carries_play_type() {
    let game = game();
    let play = &game.plays[0];
    let json = serde_json::to_value(ExplainPlayEnvelope::new(play)).unwrap();
    assert_eq!(json["type"], "explain_play");
    assert_eq!(json["play_type"], "home_run");
    assert_eq!(json["content"], play.description.as_str());
}

#[test]
fn server_error_surfaces_and_unknown_frames_are_skipped() {
    let lines = inbound_lines();
    let mut client = AssistantClient::from_transport(Replay::new(&[lines[3], lines[2]]));
    let err = client.ask("anything?", &game()).unwrap_err();
    assert!(err.to_string().contains("Model overloaded"));
    assert_eq!(client.state(), ConnectionState::Open);
}

#[test]
fn closed_stream_marks_client_closed() {
    let mut client = AssistantClient::from_transport(Replay::new(&[]));
    assert!(client.ask("hello?", &game()).is_err());
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.close().is_ok());
}
