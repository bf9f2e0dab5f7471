//! Sliding-window construction within a single dialog.

use crate::models::Message;

const MIN_WHOLE_DIALOG: usize = 5;
const MAX_WHOLE_DIALOG: usize = 15;
const SLIDE_WIDTH: usize = 15;
const SLIDE_STRIDE: usize = 3;
const TRAILING_TAIL_MIN: usize = 5;

#[derive(Debug, Clone)]
pub struct DialogWindow {
    pub start_id: i64,
    pub end_id: i64,
    pub center_id: i64,
    pub message_ids: Vec<i64>,
    pub text: String,
}

fn to_window(members: &[Message]) -> DialogWindow {
    let message_ids: Vec<i64> = members.iter().map(|m| m.id).collect();
    let center_id = message_ids[message_ids.len() / 2];
    let text = members
        .iter()
        .map(|m| format!("{}: {}", m.author_label(), m.text.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n");

    DialogWindow {
        start_id: message_ids[0],
        end_id: *message_ids.last().unwrap(),
        center_id,
        message_ids,
        text,
    }
}

/// Builds windows for a single dialog per the fixed length rules below.
pub fn build_windows(dialog: &[Message]) -> Vec<DialogWindow> {
    let l = dialog.len();

    if l < MIN_WHOLE_DIALOG {
        return Vec::new();
    }

    if l <= MAX_WHOLE_DIALOG {
        return vec![to_window(dialog)];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start + SLIDE_WIDTH <= l {
        windows.push(to_window(&dialog[start..start + SLIDE_WIDTH]));
        start += SLIDE_STRIDE;
    }

    let last_window_start = ((l - SLIDE_WIDTH) / SLIDE_STRIDE) * SLIDE_STRIDE;
    let residual = l - (last_window_start + SLIDE_WIDTH);
    if residual >= TRAILING_TAIL_MIN {
        windows.push(to_window(&dialog[l - SLIDE_WIDTH..l]));
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(id: i64) -> Message {
        Message {
            chat_id: 1,
            id,
            from_user_id: 1,
            username: None,
            display_name: Some("Ann".into()),
            text: Some(format!("msg{id}")),
            date_utc: Utc::now(),
            is_forwarded: false,
            forward_origin_type: None,
            forward_from_name: None,
        }
    }

    #[test]
    fn short_dialog_produces_no_window() {
        let dialog: Vec<Message> = (0..4).map(msg).collect();
        assert!(build_windows(&dialog).is_empty());
    }

    #[test]
    fn medium_dialog_produces_one_window_with_median_center() {
        let dialog: Vec<Message> = (0..7).map(msg).collect();
        let windows = build_windows(&dialog);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_id, 0);
        assert_eq!(windows[0].end_id, 6);
        assert_eq!(windows[0].center_id, 3);
    }

    #[test]
    fn long_dialog_slides_with_stride_three() {
        let dialog: Vec<Message> = (0..20).map(msg).collect();
        let windows = build_windows(&dialog);
        assert!(windows.len() > 1);
        for w in &windows {
            assert!(w.message_ids.len() >= TRAILING_TAIL_MIN && w.message_ids.len() <= SLIDE_WIDTH);
        }
    }

    #[test]
    fn every_window_id_list_is_bounded_5_to_15() {
        for len in 5..=40 {
            let dialog: Vec<Message> = (0..len).map(msg).collect();
            for w in build_windows(&dialog) {
                assert!(w.message_ids.len() >= 5 && w.message_ids.len() <= 15);
                assert_eq!(w.message_ids[0], w.start_id);
                assert_eq!(*w.message_ids.last().unwrap(), w.end_id);
            }
        }
    }
}
