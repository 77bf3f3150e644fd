
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, OpenAiConfig, PineconeConfig, ServerConfig};
use crate::answer::RelevancePolicy;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🛶 PaddlePrompt Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Server").bold().yellow());
    configure_server(&mut config.server)?;

    eprintln!();
    eprintln!("{}", style("OpenAI").bold().yellow());
    eprintln!("The API key is read from OPENAI_API_KEY and never written to this file.");
    configure_openai(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Pinecone").bold().yellow());
    eprintln!("The API key is read from PINECONE_API_KEY and never written to this file.");
    configure_pinecone(&mut config.pinecone)?;

    eprintln!();
    eprintln!("{}", style("Answering").bold().yellow());
    config.prompt.policy = select_policy(config.prompt.policy)?;

    eprintln!();
    report_api_keys();

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Server:").bold().yellow());
    eprintln!("  Address: {}", style(config.server.bind_address()).cyan());
    eprintln!("  Production: {}", style(config.server.production).cyan());
    eprintln!(
        "  Allowed origins: {}",
        style(config.server.allowed_origins.join(", ")).cyan()
    );
    eprintln!(
        "  Max question words: {}",
        style(config.server.max_question_words).cyan()
    );

    eprintln!();
    eprintln!("{}", style("OpenAI:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
    eprintln!("  Chat model: {}", style(&config.openai.chat_model).cyan());
    eprintln!(
        "  Embedding model: {}",
        style(&config.openai.embedding_model).cyan()
    );
    eprintln!("  Temperature: {}", style(config.openai.temperature).cyan());

    eprintln!();
    eprintln!("{}", style("Pinecone:").bold().yellow());
    eprintln!("  Index: {}", style(&config.pinecone.index_name).cyan());
    eprintln!(
        "  Host: {}",
        style(
            config
                .pinecone
                .index_host
                .as_deref()
                .unwrap_or("(resolved at startup)")
        )
        .cyan()
    );
    eprintln!("  Namespace: {:?}", config.pinecone.namespace);
    eprintln!(
        "  Dimension / metric: {} / {}",
        style(config.pinecone.dimension).cyan(),
        style(&config.pinecone.metric).cyan()
    );
    eprintln!("  Top-k: {}", style(config.pinecone.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Sessions & chunking:").bold().yellow());
    eprintln!(
        "  History turns: {}, max sessions: {}, keep: {}",
        config.session.max_history_turns, config.session.max_sessions, config.session.keep
    );
    eprintln!(
        "  Chunk size: {} tokens ({})",
        config.chunking.chunk_size, config.chunking.encoding
    );
    eprintln!("  Relevance policy: {:?}", config.prompt.policy);

    eprintln!();
    report_api_keys();

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn report_api_keys() {
    for (name, present) in [
        ("OPENAI_API_KEY", Config::openai_api_key().is_ok()),
        ("PINECONE_API_KEY", Config::pinecone_api_key().is_ok()),
    ] {
        if present {
            eprintln!("{} {}", style("✓").green(), name);
        } else {
            eprintln!("{} {} is not set", style("⚠").yellow(), name);
        }
    }
}

fn configure_server(server: &mut ServerConfig) -> Result<()> {
    let host: String = Input::new()
        .with_prompt("Listen host")
        .default(server.host.clone())
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Listen port")
        .default(server.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let production = Confirm::new()
        .with_prompt("Production mode (restrict CORS to allowed origins)?")
        .default(server.production)
        .interact()?;

    let candidate = ServerConfig {
        host,
        port,
        production,
        ..server.clone()
    };
    candidate.validate()?;
    *server = candidate;
    Ok(())
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(|input: &String| non_empty(input))
        .interact_text()?;

    let candidate = OpenAiConfig {
        chat_model,
        embedding_model,
        ..openai.clone()
    };
    candidate.validate()?;
    *openai = candidate;
    Ok(())
}

fn configure_pinecone(pinecone: &mut PineconeConfig) -> Result<()> {
    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(pinecone.index_name.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            PineconeConfig {
                index_name: input.clone(),
                ..PineconeConfig::default()
            }
            .validate()
        })
        .interact_text()?;

    let namespace: String = Input::new()
        .with_prompt("Namespace (empty for the default)")
        .default(pinecone.namespace.clone())
        .allow_empty(true)
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(pinecone.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Top-k must be between 1 and 100")
            }
        })
        .interact_text()?;

    let candidate = PineconeConfig {
        index_name,
        namespace,
        top_k,
        ..pinecone.clone()
    };
    candidate.validate()?;
    *pinecone = candidate;
    Ok(())
}

fn select_policy(current: RelevancePolicy) -> Result<RelevancePolicy> {
    let policies = [RelevancePolicy::Permissive, RelevancePolicy::Strict];
    let labels = &[
        "permissive (best effort on related topics)",
        "strict (documents only)",
    ];
    let default_index = policies.iter().position(|p| *p == current).unwrap_or(0);

    let selected = Select::new()
        .with_prompt("Relevance policy")
        .default(default_index)
        .items(labels)
        .interact()?;

    Ok(policies.get(selected).copied().unwrap_or_default())
}

fn non_empty(input: &str) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}
