//! Terminal formatting utilities using termimad for rich markdown rendering

use crate::agent::AgentOutput;
use serde_json::to_string;
use std::cell::Cell;
use termimad::*;

thread_local! {
    /// Override for terminal detection in tests
    static FORCE_PLAIN_TEXT: Cell<bool> = Cell::new(false);
}

/// Force plain text output (for testing)
/// Available for both unit and integration tests
pub fn set_plain_text_mode(enabled: bool) {
    FORCE_PLAIN_TEXT.with(|f| f.set(enabled));
}

/// Initialize a custom MadSkin with the DataBot color scheme
pub fn create_skin() -> MadSkin {
    let mut skin = MadSkin::default();

    // Headers - cyan with bold
    let mut header_style = CompoundStyle::with_fg(termimad::crossterm::style::Color::Cyan);
    header_style.add_attr(termimad::crossterm::style::Attribute::Bold);
    skin.headers[0].compound_style = header_style;
    skin.headers[1].compound_style =
        CompoundStyle::with_fg(termimad::crossterm::style::Color::Cyan);

    skin.bold.set_fg(termimad::crossterm::style::Color::White);
    skin.italic.set_fg(termimad::crossterm::style::Color::Grey);
    skin.inline_code
        .set_fg(termimad::crossterm::style::Color::Yellow);
    skin.code_block
        .set_fg(termimad::crossterm::style::Color::White);

    skin.bullet = StyledChar::from_fg_char(termimad::crossterm::style::Color::Green, '▸');
    skin.paragraph.compound_style =
        CompoundStyle::with_fg(termimad::crossterm::style::Color::White);

    skin.quote_mark
        .set_fg(termimad::crossterm::style::Color::DarkCyan);
    skin.quote_mark.set_char('┃');

    skin
}

/// Check if we're in a TTY (terminal) or if output is piped/redirected
pub fn is_terminal() -> bool {
    // Check for test override first
    if FORCE_PLAIN_TEXT.with(|f| f.get()) {
        return false;
    }

    // Use terminal_size as a proxy for TTY detection
    terminal_size::terminal_size().is_some()
}

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Render markdown text with the DataBot skin
/// Falls back to plain text if not in a terminal
pub fn render_markdown(text: &str) -> String {
    if !is_terminal() {
        return text.to_string();
    }

    create_skin().text(text, Some(terminal_width())).to_string()
}

/// Render the assistant's reply with markdown formatting
pub fn render_agent_response(name: &str, content: &str) -> String {
    if !is_terminal() {
        return format!("🤖 {}: {}", name, content);
    }

    let formatted = format!("**🤖 {}:**\n\n{}", name, content);
    create_skin()
        .text(&formatted, Some(terminal_width()))
        .to_string()
}

/// Render run metadata (tools, token usage)
pub fn render_run_stats(output: &AgentOutput) -> Option<String> {
    let mut sections = Vec::new();

    if !output.tool_invocations.is_empty() {
        let mut section = String::from("## Herramientas\n");
        for inv in &output.tool_invocations {
            section.push_str(&format!(
                "- **{}** [{}]",
                inv.name,
                if inv.success { "ok" } else { "error" }
            ));
            let args = to_string(&inv.arguments).unwrap_or_else(|_| "{}".to_string());
            section.push_str(&format!(" args: `{}`", args));

            if let Some(err) = &inv.error {
                section.push_str(&format!(" (error: {})", err));
            }

            section.push('\n');
        }
        if output.ignored_tool_calls > 0 {
            section.push_str(&format!(
                "- {} solicitud(es) ignorada(s) por el límite de rondas\n",
                output.ignored_tool_calls
            ));
        }
        sections.push(section);
    }

    if let Some(usage) = &output.token_usage {
        sections.push(format!(
            "## Tokens\n- Prompt: {}\n- Completion: {}\n- Total: {}\n- Llamadas al modelo: {}\n",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens, output.model_calls
        ));
    }

    if sections.is_empty() {
        return None;
    }

    let markdown = format!("---\n\n# Detalles\n\n{}", sections.join("\n"));
    Some(render_markdown(&markdown))
}

/// Render help text with rich markdown formatting
pub fn render_help() -> String {
    let help_text = r#"
# Comandos de DataBot

## Sesiones
- **`/session`** — Muestra el ID de la sesión actual
- **`/new`** — Empieza una nueva conversación
- **`/resume <uuid>`** — Continúa una sesión existente
- **`/sessions`** — Lista las sesiones guardadas

## Historial y herramientas
- **`/history [N]`** — Muestra los últimos N mensajes (por defecto 10)
- **`/tools`** — Lista las herramientas disponibles
- **`/config`** — Muestra la configuración actual

## General
- **`/help`** — Muestra esta ayuda
- **`salir`**, **`exit`**, **`quit`** o **`/quit`** — Termina la conversación

---

Escribe tu pregunta para conversar con DataBot.
"#;

    render_markdown(help_text)
}

/// Format history display with role-based labels
pub fn render_history(messages: Vec<(String, String)>) -> String {
    if !is_terminal() {
        // Plain text fallback
        let mut output = String::new();
        for (role, content) in messages {
            output.push_str(&format!("{}: {}\n", role, content));
        }
        return output;
    }

    let mut formatted = String::from("# Historial\n\n");

    for (role, content) in messages {
        let role_formatted = match role.as_str() {
            "user" => "**👤 Tú:**".to_string(),
            "assistant" => "**🤖 DataBot:**".to_string(),
            other => format!("**{}:**", other),
        };

        formatted.push_str(&format!("{}\n{}\n\n---\n\n", role_formatted, content));
    }

    create_skin()
        .text(&formatted, Some(terminal_width()))
        .to_string()
}

/// Format configuration display
pub fn render_config(config_text: &str) -> String {
    if !is_terminal() {
        return config_text.to_string();
    }

    let formatted = format!("# Configuración actual\n\n```\n{}\n```", config_text);
    create_skin()
        .text(&formatted, Some(terminal_width()))
        .to_string()
}

/// Render a formatted list with custom bullet styling
pub fn render_list(title: &str, items: Vec<String>) -> String {
    if !is_terminal() {
        let mut output = format!("{}:\n", title);
        for item in items {
            output.push_str(&format!("  - {}\n", item));
        }
        return output;
    }

    let mut formatted = format!("## {}\n\n", title);
    for item in items {
        formatted.push_str(&format!("- {}\n", item));
    }

    create_skin()
        .text(&formatted, Some(terminal_width()))
        .to_string()
}

/// Startup banner listing the offered tools
pub fn render_banner(tools: &[&str]) -> String {
    let mut banner = String::new();
    banner.push_str(&"=".repeat(60));
    banner.push_str("\n🤖 DataBot - Agente con herramientas y memoria persistente\n");
    banner.push_str(&"=".repeat(60));
    banner.push_str("\n🔧 Herramientas disponibles:\n");
    if tools.is_empty() {
        banner.push_str("   (ninguna)\n");
    }
    for tool in tools {
        banner.push_str(&format!("   - {}\n", tool));
    }
    banner.push_str("💾 Historial: DuckDB\n");
    banner
}

/// Shown when a session starts
pub fn render_session_started(session_id: &str) -> String {
    format!(
        "\n📝 Session ID: {}\n   (Guarda este ID para continuar después)\nEscribe 'salir' para terminar o /help para ver los comandos.\n",
        session_id
    )
}

/// Shown on exit
pub fn render_farewell(session_id: &str) -> String {
    format!(
        "\n💾 Tu sesión está guardada.\n   UUID: {}\n👋 ¡Hasta luego!\n",
        session_id
    )
}

pub fn render_error(message: &str) -> String {
    format!("\n❌ Error: {}\n", message)
}
