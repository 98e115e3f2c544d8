//! The `demo` scene played in the console

use std::sync::Arc;

use async_trait::async_trait;
use scene_core::{ButtonSpec, CallbackEvent, SceneStorage, TextEvent, UserId};
use scene_manager::{
    ButtonDecorator, CorrelationKey, HandlerTable, Page, PageGuard, Result, Scene,
    SceneDefinition, TextInput, TextKind,
};
use tracing::info;

use crate::config::ConsoleConfig;

pub const DEMO_SCENE: &str = "demo";
pub const TEAMS: [&str; 3] = ["red", "blue", "green"];

fn back(scene: &Scene) -> Result<ButtonSpec> {
    scene
        .navigate_button("⬅ Back", MainPage::NAME)
        .map(ButtonSpec::alone)
}

pub struct MainPage;

#[async_trait]
impl Page for MainPage {
    const NAME: &'static str = "main-page";

    fn row_width(&self) -> usize {
        2
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        let name: Option<String> = scene.get_key_as(NamePage::NAME, "name").await;
        let team: Option<String> = scene.get_key_as(TeamPage::NAME, "team").await;
        let bet: i64 = scene.get_key_as(BetPage::NAME, "bet").await.unwrap_or(0);
        Ok(format!(
            "🏠 Main\nName: {}\nTeam: {}\nBet: {}",
            name.as_deref().unwrap_or("-"),
            team.as_deref().unwrap_or("-"),
            bet
        ))
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![
            scene.navigate_button("✏️ Name", NamePage::NAME)?,
            scene.navigate_button("🎲 Bet", BetPage::NAME)?,
            scene.navigate_button("🚩 Team", TeamPage::NAME)?,
            scene.navigate_button("🗺 Map", MapPage::NAME)?,
            scene.navigate_button("🛒 Market", MarketPage::NAME)?.on_next_line(),
        ])
    }
}

pub struct NamePage;

impl NamePage {
    async fn on_name(&self, scene: &Scene, _event: &TextEvent, input: TextInput) -> Result<()> {
        let name = input.as_text().trim().to_string();
        if name.is_empty() {
            return scene.update_message().await;
        }
        scene.update_key(Self::NAME, "name", name).await?;
        scene.update_page(MainPage::NAME).await.map(|_| ())
    }
}

#[async_trait]
impl Page for NamePage {
    const NAME: &'static str = "name-page";

    fn template(&self) -> &str {
        "✏️ Send your name"
    }

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers.on_text(TextKind::Str, |page, scene, event, input| {
            Box::pin(page.on_name(scene, event, input))
        })?;
        Ok(())
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![back(scene)?])
    }
}

pub struct BetPage;

impl BetPage {
    async fn place(&self, scene: &Scene, amount: i64) -> Result<()> {
        if amount <= 0 {
            return self.reject(scene, "Bet must be positive").await;
        }
        scene.update_key(Self::NAME, "bet", amount).await?;
        scene
            .update_key(Self::NAME, "error", serde_json::Value::Null)
            .await?;
        scene.update_message().await
    }

    /// Keep the current bet and show `reason`.
    async fn reject(&self, scene: &Scene, reason: &str) -> Result<()> {
        scene.update_key(Self::NAME, "error", reason).await?;
        scene.update_message().await
    }

    async fn on_amount(&self, scene: &Scene, _event: &TextEvent, input: TextInput) -> Result<()> {
        match input.as_int() {
            Some(amount) => self.place(scene, amount).await,
            None => Ok(()),
        }
    }

    async fn add(&self, scene: &Scene, _event: &CallbackEvent, args: &[String]) -> Result<()> {
        let Some(step) = args.first().and_then(|arg| arg.parse::<i64>().ok()) else {
            return Ok(());
        };
        let bet: i64 = scene.get_key_as(Self::NAME, "bet").await.unwrap_or(0);
        match bet.checked_add(step) {
            Some(amount) => self.place(scene, amount).await,
            None => self.reject(scene, "Bet is too large").await,
        }
    }
}

#[async_trait]
impl Page for BetPage {
    const NAME: &'static str = "bet-page";

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers
            .on_text(TextKind::Int, |page, scene, event, input| {
                Box::pin(page.on_amount(scene, event, input))
            })?
            .on_callback("add", |page, scene, event, args| {
                Box::pin(page.add(scene, event, args))
            })?;
        Ok(())
    }

    async fn prepare_data(&self, scene: &Scene) -> Result<()> {
        if scene.get_key(Self::NAME, "bet").await.is_none() {
            scene.update_key(Self::NAME, "bet", 0).await?;
        }
        Ok(())
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        let bet: i64 = scene.get_key_as(Self::NAME, "bet").await.unwrap_or(0);
        let mut content = format!("🎲 Your bet: {}\nSend a positive number", bet);
        if let Some(error) = scene.get_key_as::<String>(Self::NAME, "error").await {
            content.push_str(&format!("\n⚠️ {}", error));
        }
        Ok(content)
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![
            ButtonSpec::new("+10", scene.callback("add", &[10])?),
            ButtonSpec::new("+50", scene.callback("add", &[50])?),
            back(scene)?,
        ])
    }
}

pub struct TeamPage;

impl TeamPage {
    async fn join(&self, scene: &Scene, _event: &CallbackEvent, args: &[String]) -> Result<()> {
        let Some(team) = args.first().filter(|team| TEAMS.contains(&team.as_str())) else {
            return scene.update_message().await;
        };
        info!(user_id = scene.user_id(), team = %team, "joined team");
        scene.update_key(Self::NAME, "team", team).await?;
        scene.update_page(MainPage::NAME).await.map(|_| ())
    }

    async fn leave(&self, scene: &Scene, _event: &CallbackEvent, _args: &[String]) -> Result<()> {
        scene
            .update_key(Self::NAME, "team", serde_json::Value::Null)
            .await?;
        scene.update_message().await
    }
}

#[async_trait]
impl Page for TeamPage {
    const NAME: &'static str = "team-page";

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers
            .on_callback("join", |page, scene, event, args| {
                Box::pin(page.join(scene, event, args))
            })?
            .on_callback("leave", |page, scene, event, args| {
                Box::pin(page.leave(scene, event, args))
            })?;
        Ok(())
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        let team: Option<String> = scene.get_key_as(Self::NAME, "team").await;
        Ok(match team {
            Some(team) => format!("🚩 You are in team {}", team),
            None => "🚩 Pick a team".to_string(),
        })
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        let mut buttons = TEAMS
            .iter()
            .map(|team| -> Result<ButtonSpec> {
                Ok(ButtonSpec::new(*team, scene.callback("join", &[team])?))
            })
            .collect::<Result<Vec<_>>>()?;
        buttons.push(ButtonSpec::new("Leave", scene.callback::<&str>("leave", &[])?).on_next_line());
        buttons.push(back(scene)?);
        Ok(buttons)
    }
}

fn team_guard() -> PageGuard {
    PageGuard::new(CorrelationKey::new(TeamPage::NAME, "team"))
}

/// One member per team may look at the map, and not while a teammate shops.
pub struct MapPage;

#[async_trait]
impl Page for MapPage {
    const NAME: &'static str = "map-page";

    fn template(&self) -> &str {
        "🗺 The map"
    }

    fn image(&self) -> Option<String> {
        Some("map.png".to_string())
    }

    fn guard(&self) -> Option<PageGuard> {
        Some(
            team_guard()
                .blocked_with([MarketPage::NAME])
                .with_denial("⛔ A teammate is using the map or the market"),
        )
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![back(scene)?])
    }
}

pub struct MarketPage;

impl MarketPage {
    async fn buy(&self, scene: &Scene, _event: &CallbackEvent, _args: &[String]) -> Result<()> {
        let purchases: i64 = scene.get_key_as(Self::NAME, "purchases").await.unwrap_or(0);
        scene
            .update_key(Self::NAME, "purchases", purchases.saturating_add(1))
            .await?;
        scene.update_message().await
    }
}

#[async_trait]
impl Page for MarketPage {
    const NAME: &'static str = "market-page";

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers.on_callback("buy", |page, scene, event, args| {
            Box::pin(page.buy(scene, event, args))
        })?;
        Ok(())
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        let purchases: i64 = scene.get_key_as(Self::NAME, "purchases").await.unwrap_or(0);
        Ok(format!("🛒 Market\nItems bought: {}", purchases))
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![
            ButtonSpec::new("Buy", scene.callback::<&str>("buy", &[])?),
            back(scene)?,
        ])
    }
}

/// Overview of every demo scene, for admins only.
pub struct AdminPage {
    admins: Arc<Vec<UserId>>,
}

impl AdminPage {
    fn allowed(&self, scene: &Scene) -> bool {
        self.admins.contains(&scene.user_id())
    }

    async fn clear_map(&self, scene: &Scene, _event: &CallbackEvent, _args: &[String]) -> Result<()> {
        if !self.allowed(scene) {
            return Ok(());
        }
        if let Some(manager) = scene.manager() {
            let moved = manager
                .move_page(DEMO_SCENE, MapPage::NAME, MainPage::NAME)
                .await?;
            scene
                .update_key(Self::NAME, "last_action", format!("moved {} off the map", moved))
                .await?;
        }
        scene.update_message().await
    }

    async fn refresh(&self, scene: &Scene, _event: &CallbackEvent, _args: &[String]) -> Result<()> {
        if !self.allowed(scene) {
            return Ok(());
        }
        if let Some(manager) = scene.manager() {
            let refreshed = manager.refresh_page(DEMO_SCENE, MainPage::NAME).await?;
            scene
                .update_key(Self::NAME, "last_action", format!("refreshed {} screens", refreshed))
                .await?;
        }
        scene.update_message().await
    }
}

#[async_trait]
impl Page for AdminPage {
    const NAME: &'static str = "admin-page";

    fn row_width(&self) -> usize {
        1
    }

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers
            .on_callback("clear_map", |page, scene, event, args| {
                Box::pin(page.clear_map(scene, event, args))
            })?
            .on_callback("refresh", |page, scene, event, args| {
                Box::pin(page.refresh(scene, event, args))
            })?;
        Ok(())
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        if !self.allowed(scene) {
            return Ok("🚫 Admins only".to_string());
        }
        let Some(manager) = scene.manager() else {
            return Ok("🛠 Admin".to_string());
        };

        let mut content = format!("🛠 Admin\nActive scenes: {}", manager.len());
        for page in scene.definition().page_names() {
            let count = manager.get_for_params(DEMO_SCENE, page).await.len();
            content.push_str(&format!("\n{}: {}", page, count));
        }
        if let Some(action) = scene.get_key_as::<String>(Self::NAME, "last_action").await {
            content.push_str(&format!("\nLast action: {}", action));
        }
        Ok(content)
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        let mut buttons = Vec::new();
        if self.allowed(scene) {
            buttons.push(ButtonSpec::new(
                "Everyone off the map",
                scene.callback::<&str>("clear_map", &[])?,
            ));
            buttons.push(ButtonSpec::new(
                "Refresh main screens",
                scene.callback::<&str>("refresh", &[])?,
            ));
        }
        buttons.push(back(scene)?);
        Ok(buttons)
    }
}

/// Puts the admin button on every page of admin users.
pub struct AdminButton {
    admins: Arc<Vec<UserId>>,
}

#[async_trait]
impl ButtonDecorator for AdminButton {
    async fn decorate(&self, scene: &Scene, page: &str, buttons: &mut Vec<ButtonSpec>) -> Result<()> {
        if page != AdminPage::NAME && self.admins.contains(&scene.user_id()) {
            buttons.push(scene.navigate_button("🛠 Admin", AdminPage::NAME)?.alone());
        }
        Ok(())
    }
}

pub fn demo_definition(
    storage: Arc<dyn SceneStorage>,
    config: &ConsoleConfig,
) -> Result<Arc<SceneDefinition>> {
    let admins = Arc::new(config.admin_ids.clone());
    let page_admins = Arc::clone(&admins);

    SceneDefinition::builder(DEMO_SCENE, storage)
        .page(|| MainPage)
        .page(|| NamePage)
        .page(|| BetPage)
        .page(|| TeamPage)
        .page(|| MapPage)
        .page(|| MarketPage)
        .page(move || AdminPage {
            admins: Arc::clone(&page_admins),
        })
        .callback_limit(config.callback_limit)
        .decorator(Arc::new(AdminButton { admins }))
        .build()
}
