//! CLI command handlers.

mod files;
mod search;
mod upload;

use anyhow::Result;
use docvault_core::{ApiClient, ClientConfig};

use crate::cli::Command;

pub use files::{
    run_delete_command, run_has_text_command, run_link_command, run_list_command,
    run_login_command, run_logout_command, run_text_command,
};
pub use search::run_search_command;
pub use upload::run_upload_command;

/// Shared state handed to every command that talks to the API.
#[derive(Debug)]
pub struct Context {
    pub client: ApiClient,
    pub config: ClientConfig,
    pub quiet: bool,
}

/// Runs one network command. `login` and `logout` are handled before a
/// client exists.
pub async fn dispatch(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Upload(args) => run_upload_command(ctx, &args).await,
        Command::List(args) => run_list_command(ctx, &args).await,
        Command::Delete { id } => run_delete_command(ctx, id).await,
        Command::DownloadLink { id } => {
            run_link_command(ctx, docvault_core::LinkKind::Download, id).await
        }
        Command::PreviewLink { id } => {
            run_link_command(ctx, docvault_core::LinkKind::Preview, id).await
        }
        Command::Search(args) => run_search_command(ctx, &args).await,
        Command::HasText { id } => run_has_text_command(ctx, id).await,
        Command::Text { id } => run_text_command(ctx, id).await,
        Command::Login { .. } | Command::Logout => Ok(()),
    }
}
