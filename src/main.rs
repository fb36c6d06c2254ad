use clarity_assist::app::Assistant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let assistant = Assistant::from_env()?;

    eprintln!("✨ Clarity Assist v{}", env!("CARGO_PKG_VERSION"));
    if let Some(session) = assistant.store.active_session() {
        eprintln!("   Persona: {} / Language: {}\n", session.persona, session.language);
    }

    assistant.into_repl().run().await?;

    tracing::info!("Goodbye");
    Ok(())
}
