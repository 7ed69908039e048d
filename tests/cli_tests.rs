use databot::cli::formatting::set_plain_text_mode;
use databot::cli::{choose_session, select_session, CliArgs, CliState};
use databot::config::AppConfig;
use databot::session::{SessionId, SessionManager};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.model.provider = "mock".to_string();
    config.tools.enabled.clear();
    config.database.path = dir.path().join("cli.duckdb");
    config
}

fn new_state(dir: &TempDir) -> CliState {
    set_plain_text_mode(true);
    CliState::new_with_config(test_config(dir), SessionId::generate()).unwrap()
}

#[tokio::test]
async fn message_is_answered_and_stored() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);

    let out = cli.handle_line("Hola").await.unwrap().unwrap();
    assert!(out.starts_with("🤖 DataBot: "));

    let history = cli.handle_line("/history").await.unwrap().unwrap();
    assert!(history.contains("user: Hola"));
    assert!(history.contains("assistant: "));
}

#[tokio::test]
async fn empty_history_message() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);

    let out = cli.handle_line("/history 5").await.unwrap().unwrap();
    assert_eq!(out, "No hay mensajes en esta sesión.");
    assert!(cli.handle_line("   ").await.unwrap().is_none());
}

#[tokio::test]
async fn new_session_starts_clean() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);
    let first = *cli.agent.session_id();

    cli.handle_line("Hola").await.unwrap();
    let out = cli.handle_line("/new").await.unwrap().unwrap();

    let second = *cli.agent.session_id();
    assert_ne!(first, second);
    assert!(out.contains(&second.to_string()));
    assert!(cli.agent.history().unwrap().is_empty());
}

#[tokio::test]
async fn resume_switches_back_and_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);
    let first = *cli.agent.session_id();
    cli.handle_line("Hola").await.unwrap();
    cli.handle_line("/new").await.unwrap();

    cli.handle_line(&format!("/resume {}", first)).await.unwrap();
    assert_eq!(cli.agent.session_id(), &first);
    assert_eq!(cli.agent.history().unwrap().len(), 2);

    let out = cli.handle_line("/resume no-es-un-uuid").await.unwrap().unwrap();
    assert!(out.contains("UUID inválido"));
    assert_ne!(cli.agent.session_id(), &first);
    assert!(cli.agent.history().unwrap().is_empty());
}

#[tokio::test]
async fn sessions_and_tools_listing() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);

    let out = cli.handle_line("/sessions").await.unwrap().unwrap();
    assert_eq!(out, "No hay sesiones guardadas.");

    cli.handle_line("Hola").await.unwrap();
    let sid = cli.agent.session_id().to_string();
    let out = cli.handle_line("/sessions").await.unwrap().unwrap();
    assert!(out.contains(&sid));

    let out = cli.handle_line("/tools").await.unwrap().unwrap();
    assert_eq!(out, "No hay herramientas habilitadas.");

    let out = cli.handle_line("/session").await.unwrap().unwrap();
    assert_eq!(out, format!("📝 Session ID: {}", sid));
}

#[tokio::test]
async fn config_and_help_render() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);

    let out = cli.handle_line("/config").await.unwrap().unwrap();
    assert!(out.contains("Model Provider: mock"));
    assert!(out.contains("Tools: (none)"));

    let out = cli.handle_line("/help").await.unwrap().unwrap();
    assert!(out.contains("/resume"));
}

#[tokio::test]
async fn repl_runs_until_exit_keyword() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);
    let sid = cli.agent.session_id().to_string();

    let mut input: &[u8] = b"hola\n\nSALIR\nnunca se lee\n";
    let mut output: Vec<u8> = Vec::new();
    cli.run_repl(&mut input, &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains(&format!("📝 Session ID: {}", sid)));
    assert!(text.contains("🤖 DataBot: "));
    assert!(text.contains(&format!("UUID: {}", sid)));
    assert!(text.contains("¡Hasta luego!"));
    assert_eq!(cli.persistence.count_messages(&sid).unwrap(), 2);
}

#[tokio::test]
async fn repl_ends_on_end_of_input() {
    let dir = TempDir::new().unwrap();
    let mut cli = new_state(&dir);

    let mut input: &[u8] = b"";
    let mut output: Vec<u8> = Vec::new();
    cli.run_repl(&mut input, &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("¡Hasta luego!"));
}

#[tokio::test]
async fn menu_new_conversation() {
    let manager = SessionManager::new();
    let mut input: &[u8] = b"1\n";
    let mut output: Vec<u8> = Vec::new();

    let selection = select_session(&mut input, &mut output, &manager)
        .await
        .unwrap();
    assert!(!selection.resumed);
    assert!(String::from_utf8(output).unwrap().contains("Nueva conversación"));
}

#[tokio::test]
async fn menu_resume_valid_and_invalid() {
    let manager = SessionManager::new();
    let existing = manager.new_session();

    let script = format!("2\n{}\n", existing);
    let mut input: &[u8] = script.as_bytes();
    let mut output: Vec<u8> = Vec::new();
    let selection = select_session(&mut input, &mut output, &manager)
        .await
        .unwrap();
    assert!(selection.resumed);
    assert_eq!(selection.id, existing);

    let mut input: &[u8] = b"2\nsesion-rota\n";
    let mut output: Vec<u8> = Vec::new();
    let selection = select_session(&mut input, &mut output, &manager)
        .await
        .unwrap();
    assert!(!selection.resumed);
    assert_ne!(selection.id, existing);
    assert!(String::from_utf8(output)
        .unwrap()
        .contains("UUID inválido. Creando nueva sesión"));
}

#[tokio::test]
async fn flags_skip_the_menu() {
    let manager = SessionManager::new();
    let existing = manager.new_session();
    let args = CliArgs {
        session: Some(existing.to_string()),
        ..CliArgs::default()
    };

    let mut input: &[u8] = b"";
    let mut output: Vec<u8> = Vec::new();
    let selection = choose_session(&args, &mut input, &mut output, &manager)
        .await
        .unwrap();
    assert_eq!(selection.id, existing);
    assert!(output.is_empty());
}
