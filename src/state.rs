use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::assistant::ConnectionState;
use crate::error::StateResult;
use crate::game::{CurrentPlay, GameState, GameStatus, Teams, Venue};
use crate::plays::{self, Scenario};

const MAX_LOGS: usize = 200;
const MAX_TRANSCRIPT: usize = 100;

/// Top-level shallow patch. Each `Some` field replaces the whole sub-object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamePatch {
    pub status: Option<GameStatus>,
    pub teams: Option<Teams>,
    pub venue: Option<Venue>,
    pub current_play: Option<CurrentPlay>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Patch(GamePatch),
    Scenario(Scenario),
    AddOut,
    AddBall,
    AddStrike,
    AdvanceHalfInning,
    /// One scheduler beat: closes out a two-out half, then plays a random scenario.
    SimulateTick,
    Reset(Box<GameState>),
}

pub fn reduce(state: &GameState, action: &Action, rng: &mut impl Rng) -> StateResult<GameState> {
    match action {
        Action::Patch(patch) => {
            let next = merge_patch(state, patch);
            plays::validate_current_play(&next.current_play)?;
            Ok(next)
        }
        Action::Scenario(scenario) => plays::apply_scenario(state, *scenario, rng),
        Action::AddOut => with_current_play(state, plays::add_outs(&state.current_play, 1)?),
        Action::AddBall => with_current_play(state, plays::add_ball(&state.current_play)?),
        Action::AddStrike => with_current_play(state, plays::add_strike(&state.current_play)?),
        Action::AdvanceHalfInning => {
            with_current_play(state, plays::advance_half_inning(&state.current_play)?)
        }
        Action::SimulateTick => {
            let base = if state.current_play.outs == 2 {
                with_current_play(state, plays::advance_half_inning(&state.current_play)?)?
            } else {
                state.clone()
            };
            let scenario = plays::pick_scenario(rng);
            plays::apply_scenario(&base, scenario, rng)
        }
        Action::Reset(fresh) => {
            plays::validate_current_play(&fresh.current_play)?;
            Ok(fresh.as_ref().clone())
        }
    }
}

fn merge_patch(state: &GameState, patch: &GamePatch) -> GameState {
    let mut next = state.clone();
    if let Some(status) = &patch.status {
        next.status = status.clone();
    }
    if let Some(teams) = &patch.teams {
        next.teams = teams.clone();
    }
    if let Some(venue) = &patch.venue {
        next.venue = venue.clone();
    }
    if let Some(current_play) = &patch.current_play {
        next.current_play = current_play.clone();
    }
    next
}

fn with_current_play(state: &GameState, current_play: CurrentPlay) -> StateResult<GameState> {
    let mut next = state.clone();
    next.current_play = current_play;
    Ok(next)
}

/// Owner of the one live `GameState`. Every write runs the reducer against the
/// latest snapshot and swaps in the result; readers hold `Arc` snapshots that
/// never change underneath them.
pub struct GameStore {
    state: Arc<GameState>,
    rng: Box<dyn RngCore>,
}

impl GameStore {
    pub fn new(initial: GameState) -> Self {
        Self::with_rng(initial, StdRng::from_entropy())
    }

    pub fn with_rng(initial: GameState, rng: impl RngCore + 'static) -> Self {
        Self {
            state: Arc::new(initial),
            rng: Box::new(rng),
        }
    }

    pub fn snapshot(&self) -> Arc<GameState> {
        Arc::clone(&self.state)
    }

    pub fn dispatch(&mut self, action: &Action) -> StateResult<Arc<GameState>> {
        let next = reduce(&self.state, action, &mut self.rng)?;
        self.state = Arc::new(next);
        Ok(self.snapshot())
    }

    pub fn apply_partial_update(&mut self, patch: GamePatch) -> StateResult<Arc<GameState>> {
        self.dispatch(&Action::Patch(patch))
    }

    pub fn apply_scenario(&mut self, scenario_id: &str) -> StateResult<Arc<GameState>> {
        let scenario = scenario_id.parse::<Scenario>()?;
        self.dispatch(&Action::Scenario(scenario))
    }

    pub fn add_out(&mut self) -> StateResult<Arc<GameState>> {
        self.dispatch(&Action::AddOut)
    }

    pub fn add_ball(&mut self) -> StateResult<Arc<GameState>> {
        self.dispatch(&Action::AddBall)
    }

    pub fn add_strike(&mut self) -> StateResult<Arc<GameState>> {
        self.dispatch(&Action::AddStrike)
    }

    pub fn advance_half_inning(&mut self) -> StateResult<Arc<GameState>> {
        self.dispatch(&Action::AdvanceHalfInning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Fan,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Question,
}

#[derive(Debug, Clone)]
pub enum Delta {
    Dispatch(Action),
    AssistantReply(String),
    AssistantConnection(ConnectionState),
    SpeechSaved(String),
    Log(String),
}

pub struct AppState {
    pub store: GameStore,
    pub logs: VecDeque<String>,
    pub transcript: VecDeque<ChatMessage>,
    pub connection: ConnectionState,
    pub input_mode: InputMode,
    pub input: String,
    pub speak_replies: bool,
    pub scheduler_paused: bool,
    pub help_overlay: bool,
}

impl AppState {
    pub fn new(store: GameStore) -> Self {
        Self {
            store,
            logs: VecDeque::new(),
            transcript: VecDeque::new(),
            connection: ConnectionState::Closed,
            input_mode: InputMode::Normal,
            input: String::new(),
            speak_replies: false,
            scheduler_paused: false,
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn push_message(&mut self, speaker: Speaker, content: impl Into<String>) {
        self.transcript.push_back(ChatMessage {
            speaker,
            content: content.into(),
        });
        while self.transcript.len() > MAX_TRANSCRIPT {
            self.transcript.pop_front();
        }
    }

    pub fn take_question(&mut self) -> Option<String> {
        let question = std::mem::take(&mut self.input);
        self.input_mode = InputMode::Normal;
        let question = question.trim().to_string();
        if question.is_empty() {
            return None;
        }
        self.push_message(Speaker::Fan, question.clone());
        Some(question)
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Dispatch(action) => {
            let before = state.store.snapshot().plays.len();
            match state.store.dispatch(&action) {
                Ok(snapshot) => {
                    if let Action::Reset(_) = action {
                        state.push_log(format!(
                            "[INFO] Game reset: {} at {}",
                            snapshot.score_line(),
                            snapshot.venue.name
                        ));
                    } else if snapshot.plays.len() > before {
                        if let Some(play) = snapshot.latest_play() {
                            state.push_log(format!(
                                "[PLAY] {} {}: {}",
                                play.inning_half, play.inning, play.description
                            ));
                        }
                    }
                }
                Err(err) => state.push_log(format!("[WARN] {err}")),
            }
        }
        Delta::AssistantReply(text) => state.push_message(Speaker::Assistant, text),
        Delta::AssistantConnection(connection) => {
            if connection != state.connection {
                state.push_log(format!("[INFO] Assistant channel {}", connection.label()));
            }
            state.connection = connection;
        }
        Delta::SpeechSaved(path) => state.push_log(format!("[INFO] Speech saved to {path}")),
        Delta::Log(msg) => state.push_log(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use crate::fixtures;

    fn store() -> GameStore {
        GameStore::with_rng(fixtures::opening_game(), StdRng::seed_from_u64(3))
    }

    #[test]
    fn patch_replaces_whole_sub_objects_only() {
        let mut store = store();
        let before = store.snapshot();
        let play = CurrentPlay {
            balls: 2,
            ..before.current_play.clone()
        };
        store
            .apply_partial_update(GamePatch {
                current_play: Some(play),
                ..GamePatch::default()
            })
            .unwrap();
        let after = store.snapshot();
        assert_eq!(after.current_play.balls, 2);
        assert_eq!(after.teams, before.teams);
        assert_eq!(before.current_play.balls, 0);
    }

    #[test]
    fn unknown_scenario_leaves_state_untouched() {
        let mut store = store();
        let before = store.snapshot();
        let err = store.apply_scenario("grandSlam").unwrap_err();
        assert_eq!(err, StateError::UnknownScenario("grandSlam".to_string()));
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn simulate_tick_closes_a_two_out_half_first() {
        let mut store = store();
        store.add_out().unwrap();
        store.add_out().unwrap();
        let snapshot = store.dispatch(&Action::SimulateTick).unwrap();
        let play = snapshot.latest_play().unwrap();
        assert_eq!(play.inning, 1);
        assert_eq!(play.inning_half, crate::game::InningHalf::Bottom);
    }

    #[test]
    fn log_ring_is_bounded() {
        let mut app = AppState::new(store());
        for i in 0..(MAX_LOGS + 25) {
            app.push_log(format!("[INFO] {i}"));
        }
        assert_eq!(app.logs.len(), MAX_LOGS);
        assert_eq!(app.logs.front().map(String::as_str), Some("[INFO] 25"));
    }

    #[test]
    fn dispatch_delta_logs_new_plays_and_errors() {
        let mut app = AppState::new(store());
        apply_delta(&mut app, Delta::Dispatch(Action::Scenario(Scenario::Single)));
        assert!(app.logs.back().is_some_and(|l| l.starts_with("[PLAY] top 1")));

        let mut bad = fixtures::opening_game();
        bad.current_play.inning = 0;
        apply_delta(&mut app, Delta::Dispatch(Action::Reset(Box::new(bad))));
        assert!(app.logs.back().is_some_and(|l| l.starts_with("[WARN]")));
        assert_eq!(app.store.snapshot().current_play.inning, 1);
    }

    #[test]
    fn reset_is_logged_only_once_applied() {
        let mut app = AppState::new(store());
        let mut bad = fixtures::exciting_moment();
        bad.current_play.outs = 3;
        apply_delta(&mut app, Delta::Dispatch(Action::Reset(Box::new(bad))));
        assert_eq!(app.logs.len(), 1);
        assert!(app.logs.iter().all(|l| !l.contains("Game reset")));

        apply_delta(
            &mut app,
            Delta::Dispatch(Action::Reset(Box::new(fixtures::exciting_moment()))),
        );
        assert_eq!(
            app.logs.back().map(String::as_str),
            Some("[INFO] Game reset: Los Angeles Angels 3 - Baltimore Orioles 2 at Oriole Park at Camden Yards")
        );
    }

    #[test]
    fn blank_question_is_not_recorded() {
        let mut app = AppState::new(store());
        app.input = "   ".to_string();
        assert!(app.take_question().is_none());
        app.input = " what is a balk? ".to_string();
        assert_eq!(app.take_question().as_deref(), Some("what is a balk?"));
        assert_eq!(app.transcript.len(), 1);
    }
}
