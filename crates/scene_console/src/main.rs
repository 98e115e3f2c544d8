use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scene_core::{CallbackEvent, InboundEvent, SceneStorage, TextEvent, Transport, UserId};
use scene_manager::{Router, SceneManager, SceneRegistry};
use scene_storage::FileSceneStorage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;
mod console_transport;
mod demo;
mod logging;

use config::ConsoleConfig;
use console_transport::ConsoleTransport;
use demo::{demo_definition, DEMO_SCENE};
use logging::init_logging;

#[derive(Parser, Debug, Clone)]
#[command(name = "scene-console")]
#[command(about = "Play the demo scene in the terminal")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// TOML config file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory of the stored scenes
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// User to play as
    #[arg(long)]
    user: Option<UserId>,

    /// Show raw callback data next to buttons
    #[arg(long)]
    show_callbacks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Start,
    End,
    User(UserId),
    Help,
    Quit,
    Tap(usize),
    Text(String),
    Invalid(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let input = match line.split_once(' ') {
        Some(("/user", id)) => match id.trim().parse() {
            Ok(id) => Input::User(id),
            Err(_) => Input::Invalid(format!("not a user id: {}", id.trim())),
        },
        _ => match line {
            "/start" => Input::Start,
            "/end" => Input::End,
            "/help" => Input::Help,
            "/quit" | "/exit" => Input::Quit,
            "/user" => Input::Invalid("usage: /user <id>".to_string()),
            _ => match line.parse::<usize>() {
                Ok(index) => Input::Tap(index),
                Err(_) => Input::Text(line.to_string()),
            },
        },
    };
    Some(input)
}

fn print_help() {
    println!("Commands:");
    println!("  <n>          tap button number n");
    println!("  /start       start the demo scene (again)");
    println!("  /user <id>   play as another user");
    println!("  /end         end the current scene");
    println!("  /quit        leave");
    println!("Anything else is sent as a text message.");
}

struct Session {
    user_id: UserId,
    manager: SceneManager,
    console: Arc<ConsoleTransport>,
    events: mpsc::Sender<InboundEvent>,
    taps: u64,
}

impl Session {
    fn transport(&self) -> Arc<dyn Transport> {
        self.console.clone()
    }

    /// Returns `false` when the console should stop.
    async fn handle(&mut self, input: Input) -> anyhow::Result<bool> {
        match input {
            Input::Start => self.start().await,
            Input::End => match self.manager.get_scene(self.user_id) {
                Some(scene) => scene.end().await?,
                None => println!("User {} has no scene", self.user_id),
            },
            Input::User(user_id) => {
                self.user_id = user_id;
                println!("Now playing as user {}", user_id);
                if let Some(scene) = self.manager.get_scene(user_id) {
                    if let Err(e) = scene.update_message().await {
                        warn!(user_id, "could not show scene: {}", e);
                    }
                }
            }
            Input::Help => print_help(),
            Input::Quit => return Ok(false),
            Input::Tap(index) => match self.console.button(self.user_id, index) {
                Some((message_id, button)) => {
                    self.taps += 1;
                    let event = CallbackEvent {
                        id: format!("{}-{}", self.user_id, self.taps),
                        user_id: self.user_id,
                        message_id: Some(message_id),
                        data: button.data,
                    };
                    self.send(InboundEvent::Callback(event)).await?;
                }
                None => println!("No button {}", index),
            },
            Input::Text(text) => {
                let event = TextEvent {
                    user_id: self.user_id,
                    message_id: self.console.current_message(self.user_id).unwrap_or(0),
                    text,
                };
                self.send(InboundEvent::Text(event)).await?;
            }
            Input::Invalid(reason) => println!("{}", reason),
        }
        Ok(true)
    }

    async fn start(&self) {
        if let Some(previous) = self.manager.get_scene(self.user_id) {
            if let Err(e) = previous.end().await {
                warn!(user_id = self.user_id, "could not end previous scene: {}", e);
            }
        }
        let started = match self
            .manager
            .create_scene(self.user_id, DEMO_SCENE, self.transport())
        {
            Ok(scene) => scene.start(None).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            warn!(user_id = self.user_id, "could not start scene: {}", e);
        }
    }

    async fn send(&self, event: InboundEvent) -> anyhow::Result<()> {
        self.events
            .send(event)
            .await
            .context("router is no longer running")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = ConsoleConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(user) = cli.user {
        config.user_id = user;
    }
    if cli.show_callbacks {
        config.show_callbacks = true;
    }
    info!(
        data_dir = %config.data_dir.display(),
        user_id = config.user_id,
        admins = ?config.admin_ids,
        "starting scene console"
    );

    let storage: Arc<dyn SceneStorage> = Arc::new(FileSceneStorage::new(&config.data_dir));
    let mut registry = SceneRegistry::new();
    registry.register(demo_definition(storage, &config)?)?;
    let manager = SceneManager::new(registry);

    let console = ConsoleTransport::new(config.show_callbacks);
    let transport: Arc<dyn Transport> = console.clone();
    manager.restore_all(Arc::clone(&transport)).await?;

    let router = Arc::new(Router::new(manager.clone(), transport));
    let (events, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let router_task = tokio::spawn(Arc::clone(&router).run(rx, cancel.clone()));

    print_help();
    let mut session = Session {
        user_id: config.user_id,
        manager,
        console,
        events,
        taps: 0,
    };
    session.handle(Input::User(config.user_id)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(input) = parse_input(&line) else { continue };
                if !session.handle(input).await? {
                    break;
                }
            }
        }
    }

    info!("shutting down");
    cancel.cancel();
    drop(session);
    router_task.await?;
    Ok(())
}
