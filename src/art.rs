/// Boxed banner printed when the shell starts
pub fn welcome_message(name: &str) -> String {
    let title = format!("Welcome to {} v{}", name, env!("CARGO_PKG_VERSION"));
    let hint = "Type 'help' for commands, end statements with ';' or a newline";
    let width = title.len().max(hint.len()) + 2;
    let rule = "═".repeat(width);
    format!(
        "╔{rule}╗\n║ {title:<inner$} ║\n║ {hint:<inner$} ║\n╚{rule}╝",
        rule = rule,
        title = title,
        hint = hint,
        inner = width - 2
    )
}
