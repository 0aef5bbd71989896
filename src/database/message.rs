use chrono::Utc;
use diesel::prelude::*;

use super::{DbResult, get_connection};
use crate::controller::BaseError;
use crate::{db_execute, db_object};

// The conversation/message store is owned by the chat service; this adapter
// only mirrors a finished generation's result URL onto the linked message row.
db_object! {
    #[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
    #[diesel(table_name = chat_message)]
    pub struct ChatMessage {
        pub id: String,
        pub conversation_id: Option<String>,
        pub media_url: Option<String>,
        pub created_at: i64,
        pub updated_at: i64,
    }
}

impl ChatMessage {
    /// Best-effort mirror of a generation result onto a chat message. Returns
    /// the number of rows touched; 0 when the message does not exist here.
    pub fn attach_media_url(message_id: &str, url: &str) -> DbResult<usize> {
        let conn = &mut get_connection();
        let current_time = Utc::now().timestamp_millis();
        db_execute!(conn, {
            diesel::update(chat_message::table.find(message_id.to_string()))
                .set((
                    chat_message::dsl::media_url.eq(url.to_string()),
                    chat_message::dsl::updated_at.eq(current_time),
                ))
                .execute(conn)
                .map_err(|e| {
                    BaseError::DatabaseFatal(Some(format!(
                        "Failed to attach media url to message {}: {}",
                        message_id, e
                    )))
                })
        })
    }
}
