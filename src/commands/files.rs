//! File listing, deletion, links, text probes and credential commands.

use anyhow::{Context as _, Result, anyhow};
use docvault_core::files::TextAvailability;
use docvault_core::{FileCatalog, FilesApi, LinkKind, LinkResolver, SearchEngine, Session};
use tracing::info;

use super::Context;
use crate::cli::ListArgs;

pub async fn run_list_command(ctx: &Context, args: &ListArgs) -> Result<()> {
    let files = FilesApi::new(ctx.client.clone());
    let page = files
        .list(args.page, args.size)
        .await
        .context("Failed to list files")?;

    if page.files.is_empty() {
        println!("No files on page {}.", page.current_page);
        return Ok(());
    }

    for file in &page.files {
        println!(
            "{:>8}  {:>10}  {:<28}  {}",
            file.id,
            format_size(file.size_bytes),
            file.media_type,
            file.display_name
        );
    }
    println!(
        "Page {} of {} ({} files total)",
        page.current_page.saturating_add(1),
        page.total_pages.max(1),
        page.total_elements
    );
    Ok(())
}

pub async fn run_delete_command(ctx: &Context, id: i64) -> Result<()> {
    FilesApi::new(ctx.client.clone())
        .delete(id)
        .await
        .with_context(|| format!("Failed to delete file {id}"))?;
    println!("Deleted file {id}");
    Ok(())
}

pub async fn run_link_command(ctx: &Context, kind: LinkKind, id: i64) -> Result<()> {
    let resolver = LinkResolver::new(ctx.client.clone());
    let link = match kind {
        LinkKind::Download => resolver.resolve_download_link(id).await,
        LinkKind::Preview => resolver.resolve_preview_link(id).await,
    }
    .with_context(|| format!("Failed to resolve {kind} link for file {id}"))?;

    // Printed raw so the output can be piped into another tool.
    println!("{}", link.url);
    Ok(())
}

pub async fn run_has_text_command(ctx: &Context, id: i64) -> Result<()> {
    let availability = FilesApi::new(ctx.client.clone())
        .text_availability(id)
        .await
        .with_context(|| format!("Failed to probe text for file {id}"))?;
    println!("{}", describe_availability(id, &availability));
    Ok(())
}

pub async fn run_text_command(ctx: &Context, id: i64) -> Result<()> {
    let text = SearchEngine::new(ctx.client.clone())
        .file_text(id)
        .await
        .with_context(|| format!("Failed to fetch text for file {id}"))?;
    if text.text.is_empty() {
        info!(file_id = id, filename = %text.filename, "No extracted text yet");
        return Ok(());
    }
    if let Some(confidence) = text.ocr_confidence {
        info!(
            file_id = id,
            confidence = %format!("{:.0}%", f64::from(confidence) * 100.0),
            "Text extracted by OCR"
        );
    }
    println!("{}", text.text);
    Ok(())
}

pub fn run_login_command(session: &Session, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(anyhow!("Token must not be empty"));
    }
    session
        .login(token, true)
        .context("Failed to save token")?;
    println!("Token saved.");
    Ok(())
}

pub fn run_logout_command(session: &Session) {
    session.logout();
    println!("Signed out.");
}

fn describe_availability(id: i64, availability: &TextAvailability) -> String {
    if availability.has_text {
        format!(
            "File {id}: text available ({} characters)",
            availability.text_length
        )
    } else {
        format!("File {id}: no extracted text")
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
