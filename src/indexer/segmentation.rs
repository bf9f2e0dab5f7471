//! Dialog segmentation: three boundary rules, applied in
//! order, each creating a new dialog.

use lazy_static::lazy_static;

use crate::models::Message;

const TIME_GAP_MINUTES: i64 = 30;
const TOPIC_SHIFT_MIN_DIALOG_LEN: usize = 5;
const MONOLOGUE_MIN_DIALOG_LEN: usize = 8;
const MONOLOGUE_RUN: usize = 5;

lazy_static! {
    static ref TOPIC_SHIFT_MARKERS: [&'static str; 4] = ["кстати", "btw", "другая тема", "offtop"];
}

fn has_topic_shift_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    TOPIC_SHIFT_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn is_monologue_tail(dialog: &[Message]) -> bool {
    if dialog.len() < MONOLOGUE_RUN {
        return false;
    }
    let tail = &dialog[dialog.len() - MONOLOGUE_RUN..];
    let first_author = tail[0].from_user_id;
    tail.iter().all(|m| m.from_user_id == first_author)
}

/// Segments a chronological stream into dialogs.
pub fn segment_into_dialogs(messages: &[Message]) -> Vec<Vec<Message>> {
    let mut dialogs: Vec<Vec<Message>> = Vec::new();

    for message in messages {
        let starts_new = match dialogs.last() {
            None => true,
            Some(dialog) => {
                let last = dialog.last().unwrap();
                let gap_minutes = (message.date_utc - last.date_utc).num_minutes();

                let time_gap = gap_minutes > TIME_GAP_MINUTES;
                let topic_shift = dialog.len() >= TOPIC_SHIFT_MIN_DIALOG_LEN
                    && has_topic_shift_marker(message.text.as_deref().unwrap_or(""));
                let monologue_shift = dialog.len() >= MONOLOGUE_MIN_DIALOG_LEN
                    && is_monologue_tail(dialog)
                    && message.from_user_id != last.from_user_id;

                time_gap || topic_shift || monologue_shift
            }
        };

        if starts_new {
            dialogs.push(vec![message.clone()]);
        } else {
            dialogs.last_mut().unwrap().push(message.clone());
        }
    }

    dialogs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: i64, minute: i64, user: i64, text: &str) -> Message {
        Message {
            chat_id: 1,
            id,
            from_user_id: user,
            username: None,
            display_name: None,
            text: Some(text.to_string()),
            date_utc: Utc.timestamp_opt(0, 0).unwrap() + chrono::Duration::minutes(minute),
            is_forwarded: false,
            forward_origin_type: None,
            forward_from_name: None,
        }
    }

    #[test]
    fn scenario_d_window_segmentation_by_gap() {
        let minutes = [0, 1, 2, 35, 36, 37, 38, 39];
        let messages: Vec<Message> =
            minutes.iter().enumerate().map(|(i, &m)| msg(i as i64, m, 1, "hi")).collect();
        let dialogs = segment_into_dialogs(&messages);
        assert_eq!(dialogs.len(), 2);
        assert_eq!(dialogs[0].len(), 3);
        assert_eq!(dialogs[1].len(), 5);
    }

    #[test]
    fn splits_on_topic_marker_only_after_five_messages() {
        let mut messages: Vec<Message> = (0..4).map(|i| msg(i, i, 1, "ok")).collect();
        messages.push(msg(4, 4, 1, "кстати о другом"));
        let dialogs = segment_into_dialogs(&messages);
        assert_eq!(dialogs.len(), 1, "marker should not split before dialog reaches 5 messages");

        let mut messages: Vec<Message> = (0..5).map(|i| msg(i, i, 1, "ok")).collect();
        messages.push(msg(5, 5, 1, "кстати о другом"));
        let dialogs = segment_into_dialogs(&messages);
        assert_eq!(dialogs.len(), 2);
    }

    #[test]
    fn splits_on_monologue_pattern_shift() {
        let mut messages: Vec<Message> = (0..8).map(|i| msg(i, i, 1, "solo")).collect();
        messages.push(msg(8, 8, 2, "someone else"));
        let dialogs = segment_into_dialogs(&messages);
        assert_eq!(dialogs.len(), 2);
        assert_eq!(dialogs[1][0].from_user_id, 2);
    }
}
