use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;

use domain::tokenizer::{TOKENIZER_AES, TOKENIZER_AGE, TOKENIZER_SIMPLE};

/// Configuration of the szmaterlok server, read from command line
/// flags and `S8K_*` environment variables. A `.env` file in the
/// working directory is loaded first when present.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// The address and port to listen on for incoming TCP/IP connections.
    #[arg(long, env = "S8K_ADDR", default_value = "0.0.0.0:8080")]
    pub address: String,

    /// Secret password used to encrypt and decrypt session state tokens.
    /// Remember to change this value for production deployments!
    #[arg(long, env = "S8K_SESSION_SECRET", default_value = "secret_password")]
    pub session_secret: String,

    /// Name of the session tokenizer backend.
    #[arg(
        long,
        env = "S8K_TOKENIZER",
        default_value = TOKENIZER_SIMPLE,
        value_parser = clap::builder::PossibleValuesParser::new([
            TOKENIZER_SIMPLE, TOKENIZER_AGE, TOKENIZER_AES,
        ]),
    )]
    pub tokenizer: String,

    /// Filepath of the sqlite event archive database.
    #[arg(long, env = "S8K_DB", default_value = "szmaterlok.sqlite3")]
    pub database: String,

    /// Maximal number of messages kept in the last messages buffer,
    /// replayed to users when they join the chat.
    #[arg(long, env = "S8K_LAST_MSG_BUFFER_SIZE", default_value_t = 10)]
    pub last_messages_buffer_size: usize,

    /// Maximum size of a single message in bytes.
    #[arg(long, env = "S8K_MAX_MSG_SIZE", default_value_t = 255)]
    pub max_message_size: usize,

    /// Log level verbosity threshold controlling console output.
    #[arg(
        long,
        env = "S8K_LOG_LEVEL",
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new([
            "OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE",
        ])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
    )]
    pub log_level_filter: LevelFilter,
}

impl Config {
    pub fn new() -> Self {
        // Load the .env file first, then parse command line
        // parameters and flags on top of the environment.
        dotenv().ok();
        Config::parse()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::parse_from(["szmaterlok"]);

        assert_eq!(config.address, "0.0.0.0:8080");
        assert_eq!(config.session_secret, "secret_password");
        assert_eq!(config.tokenizer, TOKENIZER_SIMPLE);
        assert_eq!(config.database, "szmaterlok.sqlite3");
        assert_eq!(config.last_messages_buffer_size, 10);
        assert_eq!(config.max_message_size, 255);
        assert_eq!(config.log_level_filter, LevelFilter::Info);
    }

    #[test]
    fn unknown_tokenizer_name_is_rejected() {
        let result = Config::try_parse_from(["szmaterlok", "--tokenizer", "jwt"]);
        assert!(result.is_err());
    }
}
