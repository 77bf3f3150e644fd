use super::*;
use serial_test::serial;
use tempfile::TempDir;

fn set_env(key: &str, value: &str) {
    // SAFETY: env tests run under #[serial] so no other thread reads the environment concurrently
    unsafe { env::set_var(key, value) };
}

fn clear_env(key: &str) {
    // SAFETY: env tests run under #[serial] so no other thread reads the environment concurrently
    unsafe { env::remove_var(key) };
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 5000);
    assert!(!config.server.production);
    assert_eq!(config.server.max_question_words, 500);
    assert!(!config.server.expose_error_details);
    assert_eq!(config.openai.chat_model, "gpt-3.5-turbo");
    assert_eq!(config.openai.embedding_model, "text-embedding-ada-002");
    assert!(config.openai.temperature.abs() < f32::EPSILON);
    assert_eq!(config.openai.retry_attempts, 1);
    assert_eq!(config.pinecone.index_name, "text-analyzer");
    assert_eq!(config.pinecone.dimension, 1536);
    assert_eq!(config.pinecone.metric, "cosine");
    assert_eq!(config.pinecone.top_k, 4);
    assert_eq!(config.session.max_history_turns, 10);
    assert_eq!(config.session.max_sessions, 100);
    assert_eq!(config.session.keep, 50);
    assert_eq!(config.chunking.chunk_size, 800);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid = config.clone();
    invalid.server.port = 0;
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidPort(_))));

    let mut invalid = config.clone();
    invalid.openai.temperature = 3.0;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));

    let mut invalid = config.clone();
    invalid.openai.chat_model = "  ".to_string();
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidModel(_))));

    let mut invalid = config.clone();
    invalid.openai.retry_attempts = 0;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidRetryAttempts(0))
    ));

    let mut invalid = config.clone();
    invalid.pinecone.index_name = "Text_Analyzer".to_string();
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidIndexName(_))
    ));

    let mut invalid = config.clone();
    invalid.pinecone.metric = "manhattan".to_string();
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidMetric(_))));

    let mut invalid = config.clone();
    invalid.pinecone.top_k = 0;
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidTopK(0))));

    let mut invalid = config.clone();
    invalid.session.keep = 150;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidSessionLimits { .. })
    ));

    let mut invalid = config.clone();
    invalid.chunking.encoding = "o200k_harmony".to_string();
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::UnsupportedEncoding(_))
    ));

    let mut invalid = config;
    invalid.chunking.chunk_size = 10;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidChunkSize(10))
    ));
}

#[test]
fn prompt_template_validation() {
    let mut config = Config::default();
    config.prompt.system_template = Some("No placeholders here".to_string());
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPromptTemplate(_))
    ));

    config.prompt.system_template = Some("Use this: {context}".to_string());
    assert!(config.validate().is_ok());

    config.prompt.human_template = "Question".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPromptTemplate(_))
    ));
}

#[test]
fn origins_must_be_urls() {
    let mut config = Config::default();
    config.server.allowed_origins = vec!["*".to_string(), "https://paddle.example".to_string()];
    assert!(config.validate().is_ok());

    config.server.allowed_origins.push("not an origin".to_string());
    assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_fills_defaults() {
    let config: Config = toml::from_str(
        r#"
            [server]
            port = 8080

            [pinecone]
            index_name = "manuals"
            index_host = "manuals-abc.svc.pinecone.io"
        "#,
    )
    .expect("partial toml should parse");

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.pinecone.index_name, "manuals");
    assert_eq!(
        config.pinecone.index_host.as_deref(),
        Some("manuals-abc.svc.pinecone.io")
    );
    assert_eq!(config.openai, OpenAiConfig::default());
    assert_eq!(config.session, SessionConfig::default());
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("missing config should load defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.server, ServerConfig::default());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.server.port = 7000;
    config.prompt.topics = vec!["bridges".to_string()];

    config.save().expect("config should save");
    assert!(config.config_file_path().exists());

    let loaded = Config::load(temp_dir.path().join("nested")).expect("config should load");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join(CONFIG_FILE_NAME),
        "[session]\nmax_sessions = 10\nkeep = 20\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn env_overrides_port_and_production() {
    set_env(PORT_VAR, "8123");
    set_env(APP_ENV_VAR, "production");

    let mut config = Config::default();
    let result = config.apply_env_overrides();

    clear_env(PORT_VAR);
    clear_env(APP_ENV_VAR);

    assert!(result.is_ok());
    assert_eq!(config.server.port, 8123);
    assert!(config.server.production);
}

#[test]
#[serial]
fn env_overrides_reject_bad_port() {
    set_env(PORT_VAR, "eighty");
    clear_env(APP_ENV_VAR);

    let mut config = Config::default();
    let result = config.apply_env_overrides();

    clear_env(PORT_VAR);

    assert!(matches!(result, Err(ConfigError::InvalidPort(ref p)) if p == "eighty"));
    assert!(!config.server.production);
}

#[test]
#[serial]
fn api_keys_come_from_env() {
    set_env(OPENAI_API_KEY_VAR, "  sk-live  ");
    clear_env(PINECONE_API_KEY_VAR);

    let openai = Config::openai_api_key();
    let pinecone = Config::pinecone_api_key();

    clear_env(OPENAI_API_KEY_VAR);

    assert_eq!(openai.expect("openai key should be read"), "sk-live");
    assert!(matches!(
        pinecone,
        Err(ConfigError::MissingApiKey(PINECONE_API_KEY_VAR))
    ));
}

#[test]
#[serial]
fn blank_api_key_is_missing() {
    set_env(PINECONE_API_KEY_VAR, "   ");

    let result = Config::pinecone_api_key();

    clear_env(PINECONE_API_KEY_VAR);

    assert!(matches!(result, Err(ConfigError::MissingApiKey(_))));
}

#[test]
fn bind_address_joins_host_and_port() {
    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 5050,
        ..ServerConfig::default()
    };
    assert_eq!(server.bind_address(), "127.0.0.1:5050");
}
