use std::env;

use anyhow::{Context, bail};

use mlb_voice::commentary;
use mlb_voice::config::Config;
use mlb_voice::fixtures;
use mlb_voice::game::GameState;
use mlb_voice::logging;
use mlb_voice::provider::Backends;
use mlb_voice::speech;

const USAGE: &str = "usage: ask [--speak] [--game opening|start|exciting] <question...>";

fn fixture(name: &str) -> anyhow::Result<GameState> {
    match name {
        "opening" => Ok(fixtures::opening_game()),
        "start" => Ok(fixtures::game_start()),
        "exciting" => Ok(fixtures::exciting_moment()),
        other => bail!("unknown game fixture '{other}'\n{USAGE}"),
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::load();
    if let Err(err) = logging::init_stderr_tracing() {
        eprintln!("warning: {err:#}");
    }

    let mut speak = false;
    let mut game = fixtures::opening_game();
    let mut words = Vec::new();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--speak" => speak = true,
            "--game" => {
                let name = args.next().context(USAGE)?;
                game = fixture(&name)?;
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ => words.push(arg),
        }
    }
    let question = words.join(" ");
    if question.trim().is_empty() {
        bail!("{USAGE}");
    }

    let backends = Backends::from_config(&config);
    let Some(text_api) = backends.text.as_ref() else {
        bail!("set GEMINI_API_KEY or PROXY_URL to ask questions");
    };

    eprintln!("{}", commentary::situation(&game));
    let reply = text_api.generate(&commentary::game_prompt(&game, &question))?;
    println!("{}", reply.text);

    if speak {
        let audio = match reply.audio {
            Some(audio) => audio,
            None => match backends.speech.as_ref() {
                Some(client) => client.synthesize(&reply.text)?,
                None => bail!("speech needs GEMINI_API_KEY"),
            },
        };
        let path = speech::save_audio(&backends.audio_dir, &audio)?;
        eprintln!("saved {}", path.display());
    }

    Ok(())
}
