//! AI backend command implementations

use anyhow::{Context, Result};
use zaman_core::ai::{AIBackend, AIClient, ChatMessage};

const DEFAULT_TEST_MESSAGE: &str = "Ответь одним словом: работает?";

/// Test the AI backend connection and a single chat completion
pub async fn cmd_ai_test(message: Option<&str>) -> Result<()> {
    println!("🔍 Testing AI backend connection...\n");

    let Some(client) = AIClient::from_env() else {
        println!("  ⚠️  No AI backend configured\n");
        println!("To configure an OpenAI-compatible backend:");
        println!("  export OPENAI_COMPATIBLE_HOST=https://api.openai.com");
        println!("  export OPENAI_COMPATIBLE_API_KEY=sk-...");
        println!("  export OPENAI_COMPATIBLE_MODEL=gpt-4o-mini");
        return Ok(());
    };

    println!("  Host:  {}", client.host());
    println!("  Model: {}\n", client.model());

    print!("Checking availability... ");
    if client.health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  Could not reach {}", client.host());
        return Ok(());
    }

    let message = message.unwrap_or(DEFAULT_TEST_MESSAGE);
    println!("\n💬 Sending: {}", message);

    let start = std::time::Instant::now();
    let reply = client
        .chat(&[ChatMessage::user(message)], 0.0)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "AI test chat failed"))
        .context("Chat completion failed")?;

    println!("   Reply ({} ms): {}", start.elapsed().as_millis(), reply.trim());
    println!("\n✅ AI backend is working");
    Ok(())
}
