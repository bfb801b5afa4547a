//! Prompt text for the generative API, built from a game snapshot.

use crate::game::GameState;

const RECENT_PLAYS: usize = 3;

pub const ASSISTANT_PERSONA: &str = "You are an MLB Voice Assistant. You help fans understand \
baseball by providing real-time insights, explanations, and context during live games. Keep \
responses concise and conversational. Focus on making complex baseball concepts accessible to \
new fans.";

/// Short situation block: inning, count, outs and score.
pub fn situation(state: &GameState) -> String {
    let play = &state.current_play;
    format!(
        "Current Game State:\n- Inning: {}\n- Count: {}\n- Outs: {}\n- Score: {}",
        play.inning_label(),
        state.count_label(),
        play.outs,
        state.score_line()
    )
}

pub fn game_prompt(state: &GameState, question: &str) -> String {
    let play = &state.current_play;
    let latest = state
        .latest_play()
        .map(|p| p.description.as_str())
        .unwrap_or("No plays yet");
    let history = if state.plays.is_empty() {
        "No plays yet".to_string()
    } else {
        state
            .plays
            .iter()
            .take(RECENT_PLAYS)
            .map(|p| format!("- {}", p.description))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{ASSISTANT_PERSONA}\n\n\
Current game situation:\n\
- Home Team: {home}\n\
- Away Team: {away}\n\
- Home Score: {home_score}\n\
- Away Score: {away_score}\n\
- Inning: {inning} {half}\n\
- Outs: {outs}\n\
- Count: {count}\n\n\
Latest Play: {latest}\n\n\
Recent Play History:\n{history}\n\n\
The fan asks: {question}\n\n\
If the fan is asking what just happened or about the current game situation, give a brief \
1-2 sentence response. If the fan is asking to explain a baseball concept or term, provide a \
beginner-friendly explanation with examples. For casual conversation, respond naturally. \
Always use fan-friendly language.",
        home = state.teams.home.team.name,
        away = state.teams.away.team.name,
        home_score = state.teams.home.score,
        away_score = state.teams.away.score,
        inning = play.inning,
        half = play.inning_half,
        outs = play.outs,
        count = state.count_label(),
        question = question.trim(),
    )
}

pub fn explain_play_prompt(description: &str) -> String {
    format!(
        "You are a real-time baseball analyst. Start with a brief title in italics (e.g. \
*Strategic Move*) followed by 2-3 insightful sentences on strategy, player tendencies, and \
game impact.\n\nAnalyze this play: {description}"
    )
}

/// Splits `*emphasis*` markers into (emphasized, text) runs.
pub fn emphasis_runs(text: &str) -> Vec<(bool, &str)> {
    text.split('*')
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(i, part)| (i % 2 == 1, part))
        .collect()
}
