use clap::{Parser, Subcommand};

/// Auther: token issuance with password + TOTP authentication
#[derive(Parser)]
#[command(name = "auther", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to AUTHER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the current one-time code for a base32 secret
    Otp { secret: String },

    /// Hash a password for the accounts table
    HashPassword { password: String },

    /// Generate a TOTP secret and its enrollment URI
    NewOtpSecret {
        username: String,
        #[arg(long, default_value = "Auther")]
        issuer: String,
    },
}
