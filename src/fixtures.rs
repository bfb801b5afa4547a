use chrono::{DateTime, TimeZone, Utc};

use crate::game::{
    AbstractGameState, CurrentPlay, GameState, GameStatus, InningHalf, LeagueRecord, Team,
    TeamSide, Teams, Venue,
};

pub const RED_SOX_ID: u32 = 111;
pub const YANKEES_ID: u32 = 147;
pub const ANGELS_ID: u32 = 108;
pub const ORIOLES_ID: u32 = 110;

/// Batters and pitchers a scenario may credit for a team.
#[derive(Debug, Clone, Copy)]
pub struct Roster {
    pub batters: &'static [&'static str],
    pub pitchers: &'static [&'static str],
}

const RED_SOX: Roster = Roster {
    batters: &[
        "Rafael Devers",
        "Masataka Yoshida",
        "Triston Casas",
        "Jarren Duran",
        "Trevor Story",
    ],
    pitchers: &["Brayan Bello", "Chris Sale", "Kenley Jansen"],
};

const YANKEES: Roster = Roster {
    batters: &[
        "Aaron Judge",
        "Juan Soto",
        "Gleyber Torres",
        "Anthony Rizzo",
        "Giancarlo Stanton",
    ],
    pitchers: &["Gerrit Cole", "Carlos Rodon", "Clay Holmes"],
};

const ANGELS: Roster = Roster {
    batters: &["Mike Trout", "Taylor Ward", "Logan O'Hoppe", "Zach Neto"],
    pitchers: &["Patrick Sandoval", "Reid Detmers", "Carlos Estevez"],
};

const ORIOLES: Roster = Roster {
    batters: &[
        "Gunnar Henderson",
        "Adley Rutschman",
        "Anthony Santander",
        "Ryan Mountcastle",
    ],
    pitchers: &["Corbin Burnes", "Grayson Rodriguez", "Craig Kimbrel"],
};

const GENERIC: Roster = Roster {
    batters: &["the leadoff hitter", "the cleanup hitter", "the number-nine hitter"],
    pitchers: &["the starter", "the reliever"],
};

pub fn roster_for(team_id: u32) -> Roster {
    match team_id {
        RED_SOX_ID => RED_SOX,
        YANKEES_ID => YANKEES,
        ANGELS_ID => ANGELS,
        ORIOLES_ID => ORIOLES,
        _ => GENERIC,
    }
}

pub const SINGLE_TEMPLATES: &[&str] = &[
    "{player} lines a single into left field.",
    "{player} slaps a grounder through the right side for a base hit.",
    "{player} bloops one into shallow center for a single.",
];

pub const STRIKEOUT_TEMPLATES: &[&str] = &[
    "{player} strikes him out swinging!",
    "{player} paints the corner, called strike three!",
    "{player} gets the whiff on a high fastball for the strikeout.",
];

pub const HOME_RUN_TEMPLATES: &[&str] = &[
    "{player} hits a {runs}-run home run to deep center field!",
    "{player} crushes a {runs}-run shot into the second deck!",
    "{player} wraps a {runs}-run homer around the foul pole!",
];

pub const DOUBLE_PLAY_TEMPLATES: &[&str] = &[
    "{player} fields it cleanly and starts the double play!",
    "{player} turns two with a quick flip to second!",
    "{player} snags the liner and doubles off the runner!",
];

pub const GROUNDOUT_TEMPLATES: &[&str] = &[
    "{player} grounds out to short.",
    "{player} chops one to third and is thrown out at first.",
    "{player} rolls over on a changeup, easy groundout to second.",
];

pub fn opening_game() -> GameState {
    opening_game_at(Utc::now())
}

/// The default session: Red Sox at Yankees, first pitch pending.
pub fn opening_game_at(game_date: DateTime<Utc>) -> GameState {
    GameState {
        game_id: 1,
        game_date,
        status: live_status("In Progress"),
        teams: Teams {
            away: side(team(RED_SOX_ID, "Red Sox", 0, Some(record(76, 60, ".559"))), 0),
            home: side(team(YANKEES_ID, "Yankees", 0, Some(record(70, 66, ".515"))), 0),
        },
        venue: Venue {
            id: 3313,
            name: "Yankee Stadium".to_string(),
        },
        current_play: CurrentPlay::opening(),
        plays: Vec::new(),
    }
}

pub fn game_start() -> GameState {
    GameState {
        game_id: 747060,
        game_date: opening_day(),
        status: live_status("In Progress"),
        teams: Teams {
            away: side(team(ANGELS_ID, "Los Angeles Angels", 0, None), 0),
            home: side(team(ORIOLES_ID, "Baltimore Orioles", 0, None), 0),
        },
        venue: camden_yards(),
        current_play: CurrentPlay {
            description: Some("Game is about to begin at Camden Yards".to_string()),
            ..CurrentPlay::opening()
        },
        plays: Vec::new(),
    }
}

/// Late-inning pressure spot used to demo the assistant.
pub fn exciting_moment() -> GameState {
    GameState {
        game_id: 747060,
        game_date: opening_day(),
        status: live_status("In Progress"),
        teams: Teams {
            away: side(team(ANGELS_ID, "Los Angeles Angels", 3, None), 3),
            home: side(team(ORIOLES_ID, "Baltimore Orioles", 2, None), 2),
        },
        venue: camden_yards(),
        current_play: CurrentPlay {
            inning: 7,
            inning_half: InningHalf::Bottom,
            outs: 2,
            balls: 3,
            strikes: 2,
            description: Some(
                "Full count, runners on second and third, Orioles down by one".to_string(),
            ),
        },
        plays: Vec::new(),
    }
}

fn opening_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 28, 19, 5, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn camden_yards() -> Venue {
    Venue {
        id: 2,
        name: "Oriole Park at Camden Yards".to_string(),
    }
}

fn live_status(detail: &str) -> GameStatus {
    GameStatus {
        abstract_game_state: AbstractGameState::Live,
        detailed_state: detail.to_string(),
    }
}

fn team(id: u32, name: &str, score: u32, league_record: Option<LeagueRecord>) -> Team {
    Team {
        id,
        name: name.to_string(),
        score,
        league_record,
    }
}

fn side(team: Team, score: u32) -> TeamSide {
    TeamSide {
        team,
        score,
        is_winner: Some(false),
    }
}

fn record(wins: u32, losses: u32, pct: &str) -> LeagueRecord {
    LeagueRecord {
        wins,
        losses,
        pct: pct.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_names_the_player() {
        for list in [
            SINGLE_TEMPLATES,
            STRIKEOUT_TEMPLATES,
            HOME_RUN_TEMPLATES,
            DOUBLE_PLAY_TEMPLATES,
            GROUNDOUT_TEMPLATES,
        ] {
            assert!(!list.is_empty());
            assert!(list.iter().all(|t| t.contains("{player}")));
        }
        assert!(HOME_RUN_TEMPLATES.iter().all(|t| t.contains("{runs}")));
    }

    #[test]
    fn unknown_team_gets_generic_roster() {
        let roster = roster_for(9999);
        assert!(!roster.batters.is_empty());
        assert!(!roster.pitchers.is_empty());
        assert_eq!(roster_for(YANKEES_ID).pitchers[0], "Gerrit Cole");
    }

    #[test]
    fn exciting_moment_is_a_full_count_with_two_outs() {
        let state = exciting_moment();
        assert_eq!(state.current_play.outs, 2);
        assert_eq!(state.count_label(), "3-2");
        assert_eq!(state.teams.away.score, 3);
    }
}
