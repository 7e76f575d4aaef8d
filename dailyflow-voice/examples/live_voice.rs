//! 实时语音对话演示
//!
//! 打开默认麦克风和扬声器，与 Gemini Live API 进行语音对话。
//! 需要设置 GEMINI_API_KEY 环境变量，或在配置文件中填写 api_key。
//!
//! 运行: cargo run --example live_voice
//! 按 Ctrl+C 结束会话

use dailyflow_voice::audio::{list_input_devices, list_output_devices};
use dailyflow_voice::session::VoiceAssistant;
use dailyflow_voice::state::{ConfigManager, StateChangeEvent};
use dailyflow_voice::utils::logging::init_logging;
use dailyflow_voice::utils::AppError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    println!("=== DailyFlow 实时语音演示 ===\n");

    // 1. 加载配置
    println!("1. 加载配置");
    println!("{}", "-".repeat(40));

    let config = ConfigManager::load()?;
    println!("  配置文件: {}", ConfigManager::config_path()?.display());
    println!("  模型: {}", config.api.model);
    println!("  音色: {}", config.api.voice_name.as_deref().unwrap_or("(默认)"));

    if config.api.resolved_api_key().is_empty() {
        println!("\n  未找到 API 密钥，请设置 GEMINI_API_KEY 环境变量");
        return Ok(());
    }
    println!();

    // 2. 音频设备
    println!("2. 音频设备");
    println!("{}", "-".repeat(40));

    for device in list_input_devices().unwrap_or_default() {
        let marker = if device.is_default { "*" } else { " " };
        println!("  {} 麦克风: {}", marker, device.name);
    }
    for device in list_output_devices().unwrap_or_default() {
        let marker = if device.is_default { "*" } else { " " };
        println!("  {} 扬声器: {}", marker, device.name);
    }
    println!();

    // 3. 打开会话
    println!("3. 打开会话");
    println!("{}", "-".repeat(40));

    let assistant = VoiceAssistant::from_config(&config)?;
    let mut states = assistant.subscribe();

    tokio::spawn(async move {
        while let Some(state) = states.recv().await {
            let event = StateChangeEvent::from(&state);
            match event.error_message {
                Some(message) => println!("  [{}] {}", event.label, message),
                None => println!("  [{}]", event.label),
            }
        }
    });

    if let Err(e) = assistant.open().await {
        let err = AppError::from(e);
        println!("\n  {}", err.user_message());
        if let Some(hint) = err.recovery_hint() {
            println!("  提示: {}", hint);
        }
        assistant.shutdown();
        return Ok(());
    }

    println!("  会话已打开，开始说话吧（Ctrl+C 结束）\n");
    tokio::signal::ctrl_c().await?;

    // 4. 关闭会话
    println!("\n4. 关闭会话");
    println!("{}", "-".repeat(40));

    assistant.close()?;
    assistant.shutdown();
    println!("  已关闭");

    Ok(())
}
