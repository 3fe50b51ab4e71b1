//! Rendering of chat events into outbound display text.
//!
//! Non-broadcast messages are prefixed with their author in bold, then pass
//! through a fixed sanitization pipeline: an ordered table of known in-game
//! icon markers is mapped to Discord emoji references, and any leftover
//! angle-bracket tag is stripped. Broadcast messages bypass all of it.

use once_cell::sync::Lazy;
use regex::Regex;

use super::event::ChatEvent;

/// Ordered marker substitutions, applied before tag stripping.
///
/// Each pair replaces the first occurrence of its marker in the rendered
/// text. The markers are the game's inline chat-badge icons; the
/// replacements are the emoji the sink knows them as.
pub const MARKER_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("<img=0>", "<:Player_moderator_emblem:1082981033340833804>"),
    ("<img=2>", "<:Ironman_chat_badge:1082980848200065034>"),
    ("<img=3>", "<:Hardcore_group_ironman_chat_badg:1082981031315001344>"),
    ("<img=4>", "<:Ultimate_ironman_chat_badge:1082980849571602532>"),
];

/// Matches any leftover angle-bracket tag that is not an emoji reference.
///
/// Emoji references take the `<:name:id>` form, so only tags whose first
/// character is not `:` are stripped. This keeps the substitutions above
/// intact while removing markup the table does not recognize.
static UNKNOWN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^:>][^>]*>|<>").expect("tag pattern is valid"));

/// Renders a chat event into the text posted to the sink.
///
/// Called only for events already determined non-duplicate.
pub fn render(event: &ChatEvent) -> String {
    if event.broadcast {
        return event.content.clone();
    }

    let author = event.author.as_deref().unwrap_or("");
    let mut text = format!("**{}**: {}", author, event.content);

    for (marker, replacement) in MARKER_SUBSTITUTIONS {
        text = text.replacen(marker, replacement, 1);
    }

    UNKNOWN_TAG.replace_all(&text, "").into_owned()
}
