//! Search command handler: ranked full-text search over extracted text.

use anyhow::{Context as _, Result};
use docvault_core::{SearchEngine, SearchPage, SearchPager};
use tracing::{debug, info};

use super::Context;
use crate::cli::SearchArgs;

pub async fn run_search_command(ctx: &Context, args: &SearchArgs) -> Result<()> {
    let query = args.query.join(" ");
    let page_size = args.limit.unwrap_or(ctx.config.search_page_size);
    let mut pager = SearchPager::new(SearchEngine::new(ctx.client.clone()), page_size);

    let first = pager
        .search(&query)
        .await
        .with_context(|| format!("Search for '{query}' failed"))?;
    if first.results.is_empty() {
        println!("No results for '{}'.", query.trim());
        return Ok(());
    }
    print_page(1, first);

    for _ in 1..args.pages {
        let page_number = pager.page_number() + 1;
        let Some(page) = pager
            .next_page()
            .await
            .with_context(|| format!("Fetching page {page_number} failed"))?
        else {
            debug!("no further pages");
            break;
        };
        print_page(page_number, page);
    }

    if pager.has_next() {
        info!(
            "More results available; pass --pages {} to see them",
            pager.page_number() + 1
        );
    }
    Ok(())
}

fn print_page(number: usize, page: &SearchPage) {
    println!("-- page {number} ({} results) --", page.count);
    for result in &page.results {
        println!("{:>8.3}  #{:<6}  {}", result.rank, result.file_id, result.filename);
        if !result.snippet.is_empty() {
            println!("          {}", render_snippet(&result.snippet));
        }
    }
}

/// Turns a sanitized snippet into terminal text: highlights become
/// `[...]` and escaped characters are restored.
fn render_snippet(snippet: &str) -> String {
    snippet
        .replace("<mark>", "[")
        .replace("</mark>", "]")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
