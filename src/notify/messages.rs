//! Notice texts.

use crate::moderation::state::ModerationAction;
use crate::moderation::token::ActionToken;
use crate::notify::{Notice, NoticeButton};
use crate::protocol::models::ModerationOutcome;
use crate::store::records::{SpotRecord, SpotStatus};
use crate::SpotwardenError;

/// Moderator notice for a freshly submitted spot, with signed action buttons.
pub fn moderation_request(
    moderator_id: u64,
    spot: &SpotRecord,
    approval_bonus: u64,
    bot_token: &str,
) -> Result<Notice, SpotwardenError> {
    let mut text = format!(
        "New spot for moderation:\nID: {}\nTitle: {}\nAuthor: {}\nCoordinates: {}, {}\nTutorial: {}",
        spot.id, spot.title, spot.author_handle, spot.lat, spot.lon, spot.unlock_target
    );
    if let Some(danger) = &spot.danger {
        text.push_str(&format!("\nDanger: {}", danger));
    }

    let approve_label = if approval_bonus > 0 {
        format!("Approve (+{})", approval_bonus)
    } else {
        "Approve".to_string()
    };

    Ok(Notice {
        chat_id: moderator_id,
        text,
        buttons: vec![
            NoticeButton {
                label: approve_label,
                callback_data: ActionToken::new(ModerationAction::Approve, spot.id)
                    .encode(bot_token)?,
            },
            NoticeButton {
                label: "Reject".to_string(),
                callback_data: ActionToken::new(ModerationAction::Reject, spot.id)
                    .encode(bot_token)?,
            },
        ],
    })
}

/// Author notice after a moderator decision.
pub fn moderation_result(outcome: &ModerationOutcome, spot: &SpotRecord) -> Notice {
    let text = match (outcome.status, outcome.bonus_credited) {
        (SpotStatus::Approved, Some(bonus)) => format!(
            "Your spot \"{}\" was approved and is now on the map. You received +{}.",
            spot.title, bonus
        ),
        (SpotStatus::Approved, None) => format!(
            "Your spot \"{}\" was approved and is now on the map.",
            spot.title
        ),
        _ => format!("Your spot \"{}\" was rejected by the moderator.", spot.title),
    };

    Notice {
        chat_id: outcome.author_id,
        text,
        buttons: Vec::new(),
    }
}
