// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};

mod cli;
mod commands;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::EncryptSecret {
            ctx_info,
            aes_secret,
            plaintext,
        } => commands::encrypt_secret(plaintext, aes_secret, ctx_info)?,
        Commands::DecryptSecret {
            ctx_info,
            aes_secret,
            ciphertext,
        } => commands::decrypt_secret(ciphertext, aes_secret, ctx_info)?,
        Commands::InspectToken { public_key, token } => {
            commands::inspect_token(token, public_key)?
        }
        Commands::Demo => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(commands::demo())?;
        }
    }

    Ok(())
}
