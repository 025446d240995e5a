//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{
    handle_filter_command, handle_start_command, handle_status_command, handle_track_command, handle_update_command,
};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::auth::ACCESS_DENIED_MESSAGE;
use crate::telegram::bot::{Command, NEW_ORDER_BUTTON};
use crate::telegram::scene::{self, SceneAction};
use crate::telegram::webapp;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the bot.
///
/// Returns a handler tree for teloxide's Dispatcher. The auth gates come
/// first so nothing below them ever sees an unknown user; the same schema
/// is used in production and in tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_msg_gate = deps.clone();
    let deps_cb_gate = deps.clone();
    let deps_webapp = deps.clone();
    let deps_track = deps.clone();
    let deps_update = deps.clone();
    let deps_status = deps.clone();
    let deps_filter = deps.clone();
    let deps_commands = deps.clone();
    let deps_new_order = deps.clone();
    let deps_scene_text = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Auth gates must be first
        .branch(message_auth_gate(deps_msg_gate))
        .branch(callback_auth_gate(deps_cb_gate))
        // Web form results
        .branch(web_app_data_handler(deps_webapp))
        // Hidden tracking commands (not in Command enum)
        .branch(prefix_handler("/track", deps_track, |bot, chat, deps, text| {
            Box::pin(async move { handle_track_command(&bot, chat, &deps, &text).await })
        }))
        .branch(prefix_handler("/update", deps_update, |bot, chat, deps, text| {
            Box::pin(async move { handle_update_command(&bot, chat, &deps, &text).await })
        }))
        .branch(prefix_handler("/status", deps_status, |bot, chat, deps, text| {
            Box::pin(async move { handle_status_command(&bot, chat, &deps, &text).await })
        }))
        .branch(prefix_handler("/filter", deps_filter, |bot, chat, deps, text| {
            Box::pin(async move { handle_filter_command(&bot, chat, &deps, &text).await })
        }))
        // Registered commands
        .branch(command_handler(deps_commands))
        // Reply keyboard entry point for the order flow
        .branch(new_order_handler(deps_new_order))
        // Free text while an order session is active
        .branch(scene_text_handler(deps_scene_text))
        // Inline keyboard actions
        .branch(callback_handler(deps_callback))
}

fn permitted(deps: &HandlerDeps, msg: &Message) -> bool {
    msg.from.as_ref().is_some_and(|u| deps.allow_list.permits(u.id))
}

/// Refuses messages from users outside the allow-list.
fn message_auth_gate(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(move |msg: Message| !permitted(&deps, &msg))
        .endpoint(move |bot: Bot, msg: Message| async move {
            log::warn!(
                "Rejected message from unauthorized user {:?}",
                msg.from.as_ref().map(|u| u.id)
            );
            bot.send_message(msg.chat.id, ACCESS_DENIED_MESSAGE).await?;
            Ok(())
        })
}

/// Refuses callback queries from users outside the allow-list.
fn callback_auth_gate(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query()
        .filter(move |q: CallbackQuery| !deps.allow_list.permits(q.from.id))
        .endpoint(move |bot: Bot, q: CallbackQuery| async move {
            log::warn!("Rejected callback from unauthorized user {}", q.from.id);
            bot.answer_callback_query(q.id.clone()).await?;
            if let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) {
                bot.send_message(chat_id, ACCESS_DENIED_MESSAGE).await?;
            }
            Ok(())
        })
}

/// Handles order payloads arriving from the web form.
fn web_app_data_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.web_app_data().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let Some(data) = msg.web_app_data() else {
                    return Ok(());
                };
                log::info!("Received web app payload from chat {}", msg.chat.id);

                match webapp::parse_web_app_payload(&data.data) {
                    Ok(order) => {
                        scene::enter_scene(&bot, msg.chat.id, &deps, Some(order)).await?;
                    }
                    Err(e) => {
                        log::warn!("Rejected web app payload from chat {}: {}", msg.chat.id, e);
                        bot.send_message(msg.chat.id, format!("⚠️ {}", e.user_message())).await?;
                    }
                }
                Ok(())
            }
        })
}

type PrefixFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), HandlerError>> + Send>>;

/// Builds a handler for a hidden `/cmd args` text command.
fn prefix_handler(
    prefix: &'static str,
    deps: HandlerDeps,
    run: fn(Bot, ChatId, HandlerDeps, String) -> PrefixFuture,
) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(move |msg: Message| msg.text().map(|text| text.starts_with(prefix)).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            let text = msg.text().unwrap_or_default().to_string();
            run(bot, msg.chat.id, deps, text)
        })
}

/// Handles commands registered in the Telegram UI.
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                match cmd {
                    Command::Start => handle_start_command(&bot, msg.chat.id, &deps).await,
                }
            }
        })
}

/// Starts the chat order flow from the reply keyboard button.
fn new_order_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text() == Some(NEW_ORDER_BUTTON))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { scene::enter_scene(&bot, msg.chat.id, &deps, None).await }
        })
}

/// Routes free text into the active order session.
fn scene_text_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_filter = deps.clone();
    Update::filter_message()
        .filter(move |msg: Message| {
            msg.text().is_some() && deps_filter.sessions.step(msg.chat.id).is_some()
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            let text = msg.text().unwrap_or_default().to_string();
            async move { scene::handle_scene_text(&bot, msg.chat.id, &deps, &text).await }
        })
}

/// Handles inline keyboard actions of the order flow.
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            bot.answer_callback_query(q.id.clone()).await?;

            let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
                return Ok(());
            };
            let Some(action) = q.data.as_deref().and_then(SceneAction::parse) else {
                log::debug!("Unrecognized callback data: {:?}", q.data);
                return Ok(());
            };

            scene::handle_scene_action(&bot, chat_id, &deps, action).await
        }
    })
}
