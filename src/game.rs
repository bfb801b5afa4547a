use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_BALLS: u8 = 4;
pub const MAX_STRIKES: u8 = 3;
pub const OUTS_PER_HALF: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbstractGameState {
    Preview,
    Live,
    Final,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub abstract_game_state: AbstractGameState,
    pub detailed_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueRecord {
    pub wins: u32,
    pub losses: u32,
    pub pct: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league_record: Option<LeagueRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSide {
    pub team: Team,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_winner: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub away: TeamSide,
    pub home: TeamSide,
}

impl Teams {
    pub fn side(&self, half: InningHalf) -> &TeamSide {
        match half {
            InningHalf::Top => &self.away,
            InningHalf::Bottom => &self.home,
        }
    }

    pub fn side_mut(&mut self, half: InningHalf) -> &mut TeamSide {
        match half {
            InningHalf::Top => &mut self.away,
            InningHalf::Bottom => &mut self.home,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InningHalf {
    Top,
    Bottom,
}

impl InningHalf {
    /// The opposite half. Inning bookkeeping lives in `plays::advance_half_inning`.
    pub fn flipped(self) -> Self {
        match self {
            InningHalf::Top => InningHalf::Bottom,
            InningHalf::Bottom => InningHalf::Top,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InningHalf::Top => "top",
            InningHalf::Bottom => "bottom",
        }
    }
}

impl fmt::Display for InningHalf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPlay {
    pub inning: u32,
    pub inning_half: InningHalf,
    pub outs: u8,
    pub balls: u8,
    pub strikes: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CurrentPlay {
    pub fn opening() -> Self {
        Self {
            inning: 1,
            inning_half: InningHalf::Top,
            outs: 0,
            balls: 0,
            strikes: 0,
            description: None,
        }
    }

    pub fn inning_label(&self) -> String {
        format!("{} {}", self.inning_half, self.inning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayKind {
    Single,
    Strikeout,
    HomeRun,
    DoublePlay,
    Groundout,
}

impl PlayKind {
    pub fn label(self) -> &'static str {
        match self {
            PlayKind::Single => "single",
            PlayKind::Strikeout => "strikeout",
            PlayKind::HomeRun => "home_run",
            PlayKind::DoublePlay => "double_play",
            PlayKind::Groundout => "groundout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Play {
    #[serde(rename = "type")]
    pub kind: PlayKind,
    pub description: String,
    pub player: String,
    pub inning: u32,
    pub inning_half: InningHalf,
    pub timestamp: DateTime<Utc>,
}

/// Full game snapshot. Serializes to the same shape the assistant server
/// reads as `gameContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(rename = "gamePk")]
    pub game_id: u64,
    pub game_date: DateTime<Utc>,
    pub status: GameStatus,
    pub teams: Teams,
    pub venue: Venue,
    pub current_play: CurrentPlay,
    #[serde(default)]
    pub plays: Vec<Play>,
}

impl GameState {
    pub fn batting(&self) -> &TeamSide {
        self.teams.side(self.current_play.inning_half)
    }

    pub fn fielding(&self) -> &TeamSide {
        self.teams.side(self.current_play.inning_half.flipped())
    }

    pub fn latest_play(&self) -> Option<&Play> {
        self.plays.first()
    }

    pub fn score_line(&self) -> String {
        format!(
            "{} {} - {} {}",
            self.teams.away.team.name,
            self.teams.away.score,
            self.teams.home.team.name,
            self.teams.home.score
        )
    }

    pub fn count_label(&self) -> String {
        format!("{}-{}", self.current_play.balls, self.current_play.strikes)
    }
}
