//! Batch grouping rule: consecutive messages from the same
//! author within 5 minutes, up to 10 messages, become a single embedding
//! row keyed by the first message's id.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::models::Message;

const MAX_GAP_SECS: i64 = 5 * 60;
const MAX_GROUP_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct MessageGroup {
    pub chat_id: i64,
    pub first_message_id: i64,
    pub author_label: String,
    pub from_user_id: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bodies: Vec<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub message_ids: Vec<i64>,
}

impl MessageGroup {
    pub fn keyed_message_id(&self) -> i64 {
        self.first_message_id
    }

    /// `"{author}\n{body1}\n{body2}..."` for a multi-message group, or the
    /// plain `"{author}: {text}"` form for a lone message.
    pub fn embedding_text(&self) -> String {
        if self.bodies.len() == 1 {
            format!("{}: {}", self.author_label, self.bodies[0])
        } else {
            let mut text = self.author_label.clone();
            for body in &self.bodies {
                text.push('\n');
                text.push_str(body);
            }
            text
        }
    }

    pub fn metadata_json(&self) -> Value {
        let mut metadata = json!({
            "Username": self.username,
            "DisplayName": self.display_name,
            "FromUserId": self.from_user_id,
            "DateUtc": self.start_date,
        });
        if self.bodies.len() > 1 {
            metadata["StartDate"] = json!(self.start_date);
            metadata["EndDate"] = json!(self.end_date);
            metadata["MessageCount"] = json!(self.bodies.len());
            metadata["MessageIds"] = json!(self.message_ids);
        }
        metadata
    }
}

pub fn group_consecutive_messages(messages: &[Message]) -> Vec<MessageGroup> {
    let mut groups: Vec<MessageGroup> = Vec::new();

    for message in messages {
        let text = message.text.clone().unwrap_or_default();
        let author_label = message.author_label();

        let can_extend = groups.last().is_some_and(|g| {
            g.chat_id == message.chat_id
                && g.from_user_id == message.from_user_id
                && g.bodies.len() < MAX_GROUP_SIZE
                && (message.date_utc - g.end_date).num_seconds() <= MAX_GAP_SECS
        });

        if can_extend {
            let group = groups.last_mut().unwrap();
            group.bodies.push(text);
            group.end_date = message.date_utc;
            group.message_ids.push(message.id);
        } else {
            groups.push(MessageGroup {
                chat_id: message.chat_id,
                first_message_id: message.id,
                author_label,
                from_user_id: message.from_user_id,
                username: message.username.clone(),
                display_name: message.display_name.clone(),
                bodies: vec![text],
                start_date: message.date_utc,
                end_date: message.date_utc,
                message_ids: vec![message.id],
            });
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn msg(id: i64, user: i64, minute_offset: i64, text: &str) -> Message {
        Message {
            chat_id: 1,
            id,
            from_user_id: user,
            username: Some(format!("user{user}")),
            display_name: None,
            text: Some(text.to_string()),
            date_utc: Utc::now() + Duration::minutes(minute_offset),
            is_forwarded: false,
            forward_origin_type: None,
            forward_from_name: None,
        }
    }

    #[test]
    fn groups_consecutive_same_author_within_gap() {
        let messages = vec![msg(1, 10, 0, "hi"), msg(2, 10, 2, "there"), msg(3, 20, 3, "hello")];
        let groups = group_consecutive_messages(&messages);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].message_ids, vec![1, 2]);
        assert_eq!(groups[0].keyed_message_id(), 1);
        assert_eq!(groups[1].message_ids, vec![3]);
    }

    #[test]
    fn splits_on_time_gap_even_same_author() {
        let messages = vec![msg(1, 10, 0, "hi"), msg(2, 10, 10, "later")];
        let groups = group_consecutive_messages(&messages);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn caps_group_at_ten_messages() {
        let messages: Vec<Message> = (0..12).map(|i| msg(i, 10, i, "x")).collect();
        let groups = group_consecutive_messages(&messages);
        assert_eq!(groups[0].bodies.len(), 10);
        assert_eq!(groups[1].bodies.len(), 2);
    }
}
