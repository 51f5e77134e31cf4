use std::{
    io,
    path::PathBuf,
    sync::{Arc, LazyLock, RwLock},
};

use anyhow::{Result, anyhow};
use app::{App, AppMessage};
use clap::Parser;
use common::{logging, network::NetworkClient};
use iced::Theme;
use settings::keymap::Config;
use tracing::debug;

mod app;
mod grid;
mod icons;
mod settings;

const DARK_THEME: Theme = Theme::TokyoNight;
const LIGHT_THEME: Theme = Theme::Light;

static CONFIG: LazyLock<RwLock<Config>> = LazyLock::new(|| RwLock::new(Config::default()));

#[derive(Parser, Debug)]
#[command(
    version,
    name = "Scan Console",
    about = "Browse scans and scanners and issue batch commands against a scan-management server."
)]
struct Args {
    #[arg(long, short)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    logging::init("common=info,scan_console=info", io::stdout)?;

    let args = Args::parse();
    if let Some(p) = args.config {
        let mut c = CONFIG.write().map_err(|_| anyhow!("config lock poisoned"))?;
        *c = Config::from_path(&p)?;
        debug!("Loaded config from {}", p.display());
    }

    let (network, page_len) = {
        let c = CONFIG.read().map_err(|_| anyhow!("config lock poisoned"))?;
        (Arc::new(NetworkClient::new(&c.settings)?), c.settings.page_length)
    };

    iced::application(
        move || {
            (
                App::new(network.clone(), page_len),
                iced::Task::done(AppMessage::Refresh),
            )
        },
        App::update,
        App::view,
    )
    .antialiasing(true)
    .window_size((1400.0, 800.0))
    .theme(theme)
    .subscription(App::subscription)
    .title("Scan Console")
    .run()?;
    Ok(())
}

pub fn theme(app: &App) -> Theme {
    match app.dark_mode {
        true => DARK_THEME,
        false => LIGHT_THEME,
    }
}
