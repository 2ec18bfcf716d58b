//! Menu tables and token validation
//!
//! Keyboards, help text and parsing are all generated from
//! [`OPERATION_MENU`] and the size catalog, so they cannot drift apart.

use crate::error::{BotError, MenuKind};
use crate::imaging::{Operation, OutputFormat, SizeOption};
use crate::transport::Keyboard;

/// One entry of the operation menu
#[derive(Debug, Clone, Copy)]
pub struct MenuEntry {
    /// Token shown on the keyboard
    pub token: &'static str,
    /// Description used in help text
    pub title: &'static str,
    pub operation: Operation,
}

/// Operation menu in display order
pub const OPERATION_MENU: &[MenuEntry] = &[
    MenuEntry {
        token: "1",
        title: "Convert to PNG",
        operation: Operation::ConvertTo(OutputFormat::Png),
    },
    MenuEntry {
        token: "2",
        title: "Convert to JPG",
        operation: Operation::ConvertTo(OutputFormat::Jpeg),
    },
    MenuEntry {
        token: "3",
        title: "Convert to WEBP",
        operation: Operation::ConvertTo(OutputFormat::Webp),
    },
    MenuEntry {
        token: "4",
        title: "Remove Background",
        operation: Operation::RemoveBackground,
    },
];

/// Prompt shown with the operation keyboard
pub const OPERATION_PROMPT: &str = "🔧 Choose operation:";
/// Prompt shown with the size keyboard
pub const SIZE_PROMPT: &str = "📐 Choose output resolution:";
/// Progress notice shown while an upload is fetched
pub const PROGRESS_NOTICE: &str = "⏳ Processing your image...";
/// Reply to text when no image is pending
pub const UPLOAD_HINT: &str = "📤 Send me an image to get started. Use /help to see what I can do.";
/// Reply to `/cancel`
pub const CANCELLED: &str = "🛑 Cancelled. Send a new image whenever you're ready.";
/// Reply to `/cancel` with nothing pending
pub const NOTHING_TO_CANCEL: &str = "ℹ️ Nothing to cancel.";
/// Reply to an unrecognized command
pub const UNKNOWN_COMMAND: &str = "❓ Unknown command. Use /help to see available commands.";

/// Parse the user's operation choice
///
/// Accepts the menu number or the entry title, ignoring case and surrounding
/// whitespace.
///
/// # Errors
///
/// Returns [`BotError::InvalidChoice`] for anything else.
///
/// # Examples
///
/// ```
/// use image_utility_bot::bot::menu::parse_operation;
/// use image_utility_bot::imaging::{Operation, OutputFormat};
///
/// assert_eq!(parse_operation(" 2 ").unwrap(), Operation::ConvertTo(OutputFormat::Jpeg));
/// assert_eq!(parse_operation("remove background").unwrap(), Operation::RemoveBackground);
/// assert!(parse_operation("5").is_err());
/// ```
pub fn parse_operation(token: &str) -> Result<Operation, BotError> {
    let trimmed = token.trim();
    OPERATION_MENU
        .iter()
        .find(|entry| entry.token == trimmed || entry.title.eq_ignore_ascii_case(trimmed))
        .map(|entry| entry.operation)
        .ok_or_else(|| BotError::InvalidChoice {
            menu: MenuKind::Operation,
            token: token.to_string(),
        })
}

/// Parse the user's size choice against the catalog labels
///
/// # Errors
///
/// Returns [`BotError::InvalidChoice`] when no catalog label matches.
pub fn parse_size(token: &str) -> Result<SizeOption, BotError> {
    SizeOption::from_label(token).ok_or_else(|| BotError::InvalidChoice {
        menu: MenuKind::Size,
        token: token.to_string(),
    })
}

pub fn operation_keyboard() -> Keyboard {
    Keyboard::single_column(OPERATION_MENU.iter().map(|entry| entry.token))
}

pub fn size_keyboard() -> Keyboard {
    Keyboard::single_column(SizeOption::all().map(|size| size.label()))
}

pub fn welcome_message() -> String {
    [
        "🖼️ Welcome to Image Utility Bot!",
        "Send me an image and choose an operation:",
        "• Convert between formats (PNG/JPG/WEBP)",
        "• Remove background",
        "• Resize to common resolutions",
    ]
    .join("\n")
}

/// Help text listing commands, operations and resolutions
pub fn help_message() -> String {
    let mut lines = vec![
        "📚 Available commands:".to_string(),
        "/start - Begin interaction".to_string(),
        "/help - Show this help".to_string(),
        "/cancel - Discard the current image".to_string(),
        String::new(),
        "Supported operations:".to_string(),
    ];
    lines.extend(
        OPERATION_MENU
            .iter()
            .map(|entry| format!("{}. {}", entry.token, entry.title)),
    );
    lines.push(String::new());
    lines.push("Supported resolutions:".to_string());
    lines.extend(SizeOption::all().map(|size| format!("• {}", size.description())));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_menu_token_parses() {
        for entry in OPERATION_MENU {
            assert_eq!(parse_operation(entry.token).unwrap(), entry.operation);
        }
    }

    #[test]
    fn test_invalid_operation_token() {
        for bad in ["", "0", "5", "png please", "１"] {
            let err = parse_operation(bad).unwrap_err();
            assert!(matches!(
                err,
                BotError::InvalidChoice {
                    menu: MenuKind::Operation,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_parse_size_tokens() {
        assert_eq!(parse_size("1080p").unwrap(), SizeOption::Medium);
        assert_eq!(parse_size("Original").unwrap(), SizeOption::Original);
        let err = parse_size("4k").unwrap_err();
        assert!(matches!(
            err,
            BotError::InvalidChoice {
                menu: MenuKind::Size,
                ref token
            } if token == "4k"
        ));
    }

    #[test]
    fn test_keyboards_follow_tables() {
        assert_eq!(operation_keyboard().options(), vec!["1", "2", "3", "4"]);
        assert_eq!(
            size_keyboard().options(),
            vec!["original", "720p", "1080p", "1440p"]
        );
    }

    #[test]
    fn test_help_lists_everything() {
        let help = help_message();
        assert!(help.contains("4. Remove Background"));
        assert!(help.contains("• Original size"));
        assert!(help.contains("• 1440p (2560x1440)"));
        assert!(help.contains("/cancel"));
    }

    #[test]
    fn test_welcome_message() {
        assert!(welcome_message().starts_with("🖼️ Welcome to Image Utility Bot!"));
    }
}
