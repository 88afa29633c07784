use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "copilot-gateway", about = "OpenAI-compatible gateway over the Copilot API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway.
    Serve {
        /// Listening port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Obtain a credential via the device-authorization flow and print it.
    Login,
}
