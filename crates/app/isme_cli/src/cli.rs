use clap::{Parser, Subcommand};

/// isme operator tooling.
#[derive(Parser, Debug)]
#[command(name = "isme_cli", version, about = "isme session lifecycle tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Encrypt an application secret for storage under a context tag.
    EncryptSecret {
        /// Context tag the ciphertext is bound to (e.g. `authen`).
        #[arg(long = "ctx")]
        ctx_info: String,

        /// Cipher passphrase.
        #[arg(long, env = "AES_SECRET", hide_env_values = true)]
        aes_secret: String,

        plaintext: String,
    },

    /// Decrypt a stored application secret.
    DecryptSecret {
        #[arg(long = "ctx")]
        ctx_info: String,

        #[arg(long, env = "AES_SECRET", hide_env_values = true)]
        aes_secret: String,

        ciphertext: String,
    },

    /// Verify an access token and print its claims as JSON.
    InspectToken {
        /// RS256 public key (PEM). Literal `\n` escapes are expanded.
        #[arg(long, env = "AUTH_ACCESS_TOKEN_PUBLIC_KEY", hide_env_values = true)]
        public_key: String,

        token: String,
    },

    /// Run the complete handoff flow against in-memory storage.
    Demo,
}
