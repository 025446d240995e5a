//! User allow-list
//!
//! The bot is a private back-office tool; anyone not on the configured id
//! list gets a refusal and nothing else.

use std::collections::HashSet;

use teloxide::types::UserId;

/// Refusal sent to unknown users.
pub const ACCESS_DENIED_MESSAGE: &str = "⛔ هذا البوت خاص. لا يمكنك استخدامه";

/// Allowed Telegram user ids. An empty list means the bot is open.
pub struct AllowList {
    ids: HashSet<u64>,
}

impl AllowList {
    pub fn new(ids: HashSet<u64>) -> Self {
        Self { ids }
    }

    /// Whether `user_id` may use the bot.
    pub fn permits(&self, user_id: UserId) -> bool {
        self.ids.is_empty() || self.ids.contains(&user_id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_open() {
        let list = AllowList::new(HashSet::new());
        assert!(list.permits(UserId(1)));
    }

    #[test]
    fn test_nonempty_list_filters() {
        let list = AllowList::new(HashSet::from([10, 20]));
        assert!(list.permits(UserId(10)));
        assert!(!list.permits(UserId(30)));
    }
}
