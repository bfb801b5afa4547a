//! Scenario transforms: each one reads the current snapshot, draws a player
//! and a line of flavor text, and returns the next snapshot with the new play
//! at the head of the timeline.

use std::str::FromStr;

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{StateError, StateResult};
use crate::fixtures::{self, Roster};
use crate::game::{
    CurrentPlay, GameState, InningHalf, MAX_BALLS, MAX_STRIKES, OUTS_PER_HALF, Play, PlayKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    Single,
    Strikeout,
    HomeRun,
    DoublePlay,
    Groundout,
}

impl Scenario {
    /// Registered set the scheduler draws from.
    pub const ALL: [Scenario; 5] = [
        Scenario::Single,
        Scenario::Strikeout,
        Scenario::HomeRun,
        Scenario::DoublePlay,
        Scenario::Groundout,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Scenario::Single => "single",
            Scenario::Strikeout => "strikeout",
            Scenario::HomeRun => "homeRun",
            Scenario::DoublePlay => "doublePlay",
            Scenario::Groundout => "groundout",
        }
    }

    pub fn play_kind(self) -> PlayKind {
        match self {
            Scenario::Single => PlayKind::Single,
            Scenario::Strikeout => PlayKind::Strikeout,
            Scenario::HomeRun => PlayKind::HomeRun,
            Scenario::DoublePlay => PlayKind::DoublePlay,
            Scenario::Groundout => PlayKind::Groundout,
        }
    }

    fn templates(self) -> &'static [&'static str] {
        match self {
            Scenario::Single => fixtures::SINGLE_TEMPLATES,
            Scenario::Strikeout => fixtures::STRIKEOUT_TEMPLATES,
            Scenario::HomeRun => fixtures::HOME_RUN_TEMPLATES,
            Scenario::DoublePlay => fixtures::DOUBLE_PLAY_TEMPLATES,
            Scenario::Groundout => fixtures::GROUNDOUT_TEMPLATES,
        }
    }

    /// Strikeouts go to the pitcher, double plays to a fielder; everything
    /// else is credited to the batter.
    fn credits_defense(self) -> bool {
        matches!(self, Scenario::Strikeout | Scenario::DoublePlay)
    }
}

impl FromStr for Scenario {
    type Err = StateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Scenario::ALL
            .into_iter()
            .find(|s| s.id() == trimmed || s.play_kind().label() == trimmed)
            .ok_or_else(|| StateError::UnknownScenario(trimmed.to_string()))
    }
}

pub fn pick_scenario(rng: &mut impl Rng) -> Scenario {
    Scenario::ALL[rng.gen_range(0..Scenario::ALL.len())]
}

pub fn apply_scenario(
    state: &GameState,
    scenario: Scenario,
    rng: &mut impl Rng,
) -> StateResult<GameState> {
    validate_current_play(&state.current_play)?;

    let half = state.current_play.inning_half;
    let acting = if scenario.credits_defense() {
        state.fielding()
    } else {
        state.batting()
    };
    let roster = fixtures::roster_for(acting.team.id);
    let player = pick_player(&roster, scenario, rng);
    let template = scenario
        .templates()
        .choose(rng)
        .copied()
        .unwrap_or("{player} makes a play.");

    let mut next = state.clone();
    let mut runs = 0;
    match scenario {
        Scenario::Single => {}
        Scenario::Strikeout | Scenario::Groundout => {
            next.current_play = add_outs(&state.current_play, 1)?;
            next.current_play.balls = 0;
            next.current_play.strikes = 0;
        }
        Scenario::HomeRun => {
            runs = rng.gen_range(1..=3);
            let side = next.teams.side_mut(half);
            side.score += runs;
            side.team.score = side.score;
        }
        Scenario::DoublePlay => {
            next.current_play = add_outs(&state.current_play, 2)?;
        }
    }

    let description = template
        .replace("{player}", &player)
        .replace("{runs}", &runs.to_string());
    let play = Play {
        kind: scenario.play_kind(),
        description,
        player,
        inning: state.current_play.inning,
        inning_half: half,
        timestamp: Utc::now(),
    };
    next.plays.insert(0, play);
    Ok(next)
}

fn pick_player(roster: &Roster, scenario: Scenario, rng: &mut impl Rng) -> String {
    let pool = if scenario == Scenario::Strikeout {
        roster.pitchers
    } else {
        roster.batters
    };
    pool.choose(rng)
        .map(|name| name.to_string())
        .unwrap_or_else(|| "Unknown player".to_string())
}

/// Adds `n` outs. Reaching three ends the half inning instead of being stored.
pub fn add_outs(play: &CurrentPlay, n: u8) -> StateResult<CurrentPlay> {
    validate_current_play(play)?;
    let outs = play.outs.saturating_add(n).min(OUTS_PER_HALF);
    if outs >= OUTS_PER_HALF {
        return advance_half_inning(play);
    }
    Ok(CurrentPlay {
        outs,
        ..play.clone()
    })
}

/// Clears outs and count, then moves to the next half (bottom rolls into the
/// next inning).
pub fn advance_half_inning(play: &CurrentPlay) -> StateResult<CurrentPlay> {
    if play.inning == 0 {
        return Err(StateError::InvalidStateTransition(
            "inning must start at 1".to_string(),
        ));
    }
    let inning = match play.inning_half {
        InningHalf::Top => play.inning,
        InningHalf::Bottom => play.inning + 1,
    };
    Ok(CurrentPlay {
        inning,
        inning_half: play.inning_half.flipped(),
        outs: 0,
        balls: 0,
        strikes: 0,
        description: None,
    })
}

pub fn add_ball(play: &CurrentPlay) -> StateResult<CurrentPlay> {
    validate_current_play(play)?;
    Ok(CurrentPlay {
        balls: play.balls.saturating_add(1).min(MAX_BALLS),
        ..play.clone()
    })
}

pub fn add_strike(play: &CurrentPlay) -> StateResult<CurrentPlay> {
    validate_current_play(play)?;
    Ok(CurrentPlay {
        strikes: play.strikes.saturating_add(1).min(MAX_STRIKES),
        ..play.clone()
    })
}

pub fn validate_current_play(play: &CurrentPlay) -> StateResult<()> {
    if play.inning == 0 {
        return Err(StateError::InvalidStateTransition(
            "inning must start at 1".to_string(),
        ));
    }
    if play.outs >= OUTS_PER_HALF {
        return Err(StateError::InvalidStateTransition(format!(
            "{} outs at rest",
            play.outs
        )));
    }
    if play.balls > MAX_BALLS || play.strikes > MAX_STRIKES {
        return Err(StateError::InvalidStateTransition(format!(
            "count {}-{} out of range",
            play.balls, play.strikes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::fixtures;

    fn at(inning: u32, half: InningHalf, outs: u8) -> CurrentPlay {
        CurrentPlay {
            inning,
            inning_half: half,
            outs,
            ..CurrentPlay::opening()
        }
    }

    #[test]
    fn scenario_ids_round_trip_through_from_str() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.id().parse::<Scenario>(), Ok(scenario));
        }
        assert_eq!("home_run".parse::<Scenario>(), Ok(Scenario::HomeRun));
        assert_eq!(
            "walkOff".parse::<Scenario>(),
            Err(StateError::UnknownScenario("walkOff".to_string()))
        );
    }

    #[test]
    fn third_out_in_the_top_moves_to_the_bottom() {
        let next = add_outs(&at(5, InningHalf::Top, 2), 1).unwrap();
        assert_eq!(next.inning, 5);
        assert_eq!(next.inning_half, InningHalf::Bottom);
        assert_eq!(next.outs, 0);
    }

    #[test]
    fn third_out_in_the_bottom_starts_next_inning() {
        let next = add_outs(&at(5, InningHalf::Bottom, 2), 1).unwrap();
        assert_eq!(next.inning, 6);
        assert_eq!(next.inning_half, InningHalf::Top);
    }

    #[test]
    fn count_clamps_at_its_limits() {
        let mut play = CurrentPlay::opening();
        for _ in 0..10 {
            play = add_ball(&play).unwrap();
            play = add_strike(&play).unwrap();
        }
        assert_eq!(play.balls, MAX_BALLS);
        assert_eq!(play.strikes, MAX_STRIKES);
    }

    #[test]
    fn malformed_current_play_is_rejected() {
        let bad = at(0, InningHalf::Top, 0);
        assert!(matches!(
            add_outs(&bad, 1),
            Err(StateError::InvalidStateTransition(_))
        ));
        let bad = at(2, InningHalf::Top, 3);
        assert!(validate_current_play(&bad).is_err());
    }

    #[test]
    fn strikeout_credits_the_pitching_side() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = fixtures::opening_game();
        let next = apply_scenario(&state, Scenario::Strikeout, &mut rng).unwrap();
        let pitchers = fixtures::roster_for(fixtures::YANKEES_ID).pitchers;
        assert!(pitchers.contains(&next.plays[0].player.as_str()));
        assert!(next.plays[0].description.contains(&next.plays[0].player));
    }

    #[test]
    fn input_snapshot_is_left_untouched() {
        let mut rng = StdRng::seed_from_u64(11);
        let state = fixtures::opening_game();
        let before = state.clone();
        let _ = apply_scenario(&state, Scenario::HomeRun, &mut rng).unwrap();
        assert_eq!(state, before);
    }
}
