//! Bot initialization and command registration

use reqwest::ClientBuilder;
use teloxide::prelude::Requester;
use teloxide::types::{ButtonRequest, KeyboardButton, KeyboardMarkup, WebAppInfo};
use teloxide::utils::command::BotCommands;
use url::Url;

use super::Bot;
use crate::core::config;

/// Button label that starts the chat order flow.
pub const NEW_ORDER_BUTTON: &str = "🟢 رفع طلبية";
/// Button label that opens the order web form.
pub const WEB_FORM_BUTTON: &str = "🖥️ واجهة الطلبات";

/// Public bot commands.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "الأوامر المتاحة:")]
pub enum Command {
    #[command(description = "القائمة الرئيسية")]
    Start,
}

/// Creates the bot instance from `TELOXIDE_TOKEN` with the shared request
/// timeout.
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::from_env_with_client(client))
}

/// Registers the command list in the Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![BotCommand::new("start", "القائمة الرئيسية")]).await?;
    Ok(())
}

/// Builds the persistent reply keyboard. The web form button only appears
/// when a web app URL is configured.
pub fn main_keyboard(web_app_url: Option<&Url>) -> KeyboardMarkup {
    let mut row = vec![KeyboardButton::new(NEW_ORDER_BUTTON)];
    if let Some(url) = web_app_url {
        row.push(KeyboardButton::new(WEB_FORM_BUTTON).request(ButtonRequest::WebApp(WebAppInfo { url: url.clone() })));
    }

    let mut markup = KeyboardMarkup::new(vec![row]);
    markup.resize_keyboard = true;
    markup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyboard_without_web_app() {
        let markup = main_keyboard(None);
        assert_eq!(markup.keyboard.len(), 1);
        assert_eq!(markup.keyboard[0].len(), 1);
        assert_eq!(markup.keyboard[0][0].text, NEW_ORDER_BUTTON);
    }

    #[test]
    fn test_keyboard_with_web_app() {
        let url = Url::parse("https://orders.example.com").unwrap();
        let markup = main_keyboard(Some(&url));
        assert_eq!(markup.keyboard[0].len(), 2);
        assert_eq!(markup.keyboard[0][1].text, WEB_FORM_BUTTON);
    }
}
