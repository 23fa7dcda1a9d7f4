//! Help-text fallback parser
//!
//! Plugins that don't implement `--describe` are expected to print a block
//! like this from `--help`:
//!
//! ```text
//! Available commands:
//!   deploy      Deploy an application
//!   rollback    Roll back a deployment
//!
//! Examples:
//!   cli.py deploy --app-name web
//! ```

const SECTION_HEADER: &str = "Available commands:";
const COMMAND_INDENT: &str = "  ";

/// Extract command names from the `Available commands:` section of help output.
///
/// Only lines indented by exactly two spaces count; the section ends at the
/// first blank line or an `Examples` line.
pub fn parse_commands_from_help(help_text: &str) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();
    let mut in_section = false;

    for line in help_text.lines() {
        let trimmed = line.trim();

        if !in_section {
            in_section = trimmed.starts_with(SECTION_HEADER);
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with("Examples") {
            break;
        }

        let Some(rest) = line.strip_prefix(COMMAND_INDENT) else {
            continue;
        };
        if rest.starts_with(char::is_whitespace) {
            continue;
        }

        if let Some(name) = rest.split_whitespace().next() {
            if !commands.iter().any(|c| c == name) {
                commands.push(name.to_string());
            }
        }
    }

    commands
}
