//! Interactive session: parses commands, drives queries, renders text.
//!
//! Presentation only; every data decision lives in the cache, query, and
//! mutation layers.

use std::time::Duration;

use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::api::cached_client::CachedClient;
use crate::api::client::HttpGateway;
use crate::api::types::{ListFilters, ListQuery, ListResult, StockMove};
use crate::cache::Cacheable;
use crate::commands;
use crate::config::Config;
use crate::query::{Query, QueryState};
use crate::session::SessionStore;

/// The list view currently on screen, if any.
struct ListView {
  params: ListQuery,
  query: Query<ListResult>,
}

/// Main application state
pub struct App {
  config: Config,
  session: SessionStore,
  client: CachedClient<HttpGateway>,
  list: Option<ListView>,
  detail: Option<Query<StockMove>>,
}

impl App {
  pub fn new(config: Config, session: SessionStore) -> Result<Self> {
    let gateway = HttpGateway::new(&config, session.clone())?;
    Ok(Self {
      config,
      session,
      client: CachedClient::new(gateway),
      list: None,
      detail: None,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    if !self.session.is_authenticated() {
      println!("Not logged in. Run `kardex login <username>` first.");
      return Ok(());
    }

    info!("interactive session started");
    println!("kardex - stock moves. Type `help` for commands.");

    use std::io::Write;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
      print!("kardex> ");
      std::io::stdout().flush().ok();

      let Some(line) = lines.next_line().await? else {
        break;
      };
      let line = line.trim();
      if line.is_empty() {
        continue;
      }

      let mut words = line.split_whitespace();
      let head = words.next().unwrap_or_default();
      let args: Vec<&str> = words.collect();

      match commands::resolve(head).map(|c| c.name) {
        Some("list") => self.cmd_list(&args).await,
        Some("next") => self.cmd_page_step(1).await,
        Some("prev") => self.cmd_page_step(-1).await,
        Some("show") => self.cmd_show(&args).await,
        Some("set-ref") => self.cmd_set_ref(&args).await,
        Some("refresh") => self.cmd_refresh().await,
        Some("help") => render_help(),
        Some("quit") => break,
        _ => {
          let suggestions = commands::get_suggestions(head);
          match suggestions.first() {
            Some(cmd) => println!("Unknown command `{}`. Did you mean `{}`?", head, cmd.name),
            None => println!("Unknown command `{}`. Type `help` for commands.", head),
          }
        }
      }
    }

    Ok(())
  }

  async fn cmd_list(&mut self, args: &[&str]) {
    let mut params = ListQuery::new(1, self.config.page_size, ListFilters::default());
    for arg in args {
      if let Ok(page) = arg.parse::<u32>() {
        params.page = page.max(1);
      } else if let Some(value) = arg.strip_prefix("page=") {
        params.page = value.parse().unwrap_or(1).max(1);
      } else if let Some(value) = arg.strip_prefix("size=") {
        params.page_size = value.parse().unwrap_or(self.config.page_size).max(1);
      } else if let Some(value) = arg.strip_prefix("product=") {
        params.filters.product = Some(value.to_string());
      } else if let Some(value) = arg.strip_prefix("warehouse=") {
        params.filters.warehouse = Some(value.to_string());
      } else if let Some(value) = arg.strip_prefix("type=") {
        match value.parse() {
          Ok(kind) => params.filters.kind = Some(kind),
          Err(e) => {
            println!("{}", e);
            return;
          }
        }
      } else {
        println!("Unrecognized list argument: {}", arg);
        return;
      }
    }
    self.open_list(params).await;
  }

  async fn cmd_page_step(&mut self, step: i64) {
    let Some(view) = &self.list else {
      println!("No list open. Use `list` first.");
      return;
    };
    let page = (view.params.page as i64 + step).max(1) as u32;
    let mut params = view.params.clone();
    params.page = page;
    self.open_list(params).await;
  }

  async fn open_list(&mut self, params: ListQuery) {
    let mut query = self.client.list_query(params.clone());
    query.fetch();
    drive(&mut query).await;
    match query.state() {
      QueryState::Error(e) => println!("Error: {}", e),
      _ => {
        if let Some(page) = query.data() {
          render_page(page);
        }
      }
    }
    self.list = Some(ListView { params, query });
  }

  async fn cmd_show(&mut self, args: &[&str]) {
    let Some(id) = args.first() else {
      println!("Usage: show <id>");
      return;
    };
    let mut query = self.client.detail_query(id);
    query.fetch();
    drive(&mut query).await;
    match query.state() {
      QueryState::Error(e) => println!("Error: {}", e),
      _ => {
        if let Some(m) = query.data() {
          render_move(m);
        }
      }
    }
    self.detail = Some(query);
  }

  async fn cmd_set_ref(&mut self, args: &[&str]) {
    let Some((id, rest)) = args.split_first() else {
      println!("Usage: set-ref <id> <text>");
      return;
    };
    if rest.is_empty() {
      println!("Usage: set-ref <id> <text>");
      return;
    }
    let text = rest.join(" ");

    match self.client.set_reference(id, &text).await {
      Ok(outcome) => {
        println!("{}", outcome.notice);
        // Settlement marked the affected entries stale; polling the open
        // views refetches and re-renders the reconciled rows.
        self.reconcile_views().await;
      }
      Err(e) => println!("Error: {}", e),
    }
  }

  async fn cmd_refresh(&mut self) {
    let Some(view) = &mut self.list else {
      println!("No list open. Use `list` first.");
      return;
    };
    view.query.refetch();
    drive(&mut view.query).await;
    match view.query.state() {
      QueryState::Error(e) => println!("Error: {}", e),
      _ => {
        if let Some(page) = view.query.data() {
          render_page(page);
        }
      }
    }
  }

  async fn reconcile_views(&mut self) {
    if let Some(view) = &mut self.list {
      drive(&mut view.query).await;
      if let Some(page) = view.query.data() {
        render_page(page);
      }
    }
    if let Some(query) = &mut self.detail {
      drive(query).await;
      if let Some(m) = query.data() {
        render_move(m);
      }
    }
  }
}

/// Poll a query until its pending fetch (if any) settles.
async fn drive<T: Cacheable>(query: &mut Query<T>) {
  loop {
    query.poll();
    if !query.is_fetching() {
      return;
    }
    tokio::time::sleep(Duration::from_millis(25)).await;
  }
}

fn render_page(page: &ListResult) {
  println!(
    "{:<6} {:<12} {:<20} {:<14} {:<8} {:>8}  {}",
    "ID", "DATE", "PRODUCT", "WAREHOUSE", "TYPE", "QTY", "REFERENCE"
  );
  for m in &page.items {
    println!(
      "{:<6} {:<12} {:<20} {:<14} {:<8} {:>8}  {}",
      m.id,
      m.date.to_string(),
      m.product,
      m.warehouse,
      m.kind,
      m.quantity,
      m.reference
    );
  }
  println!(
    "page {} of {} ({} total)",
    page.page,
    page_count(page.total, page.page_size),
    page.total
  );
}

/// Total page count, rounding up. A zero page size (a degenerate server echo
/// or config value) counts as one item per page.
fn page_count(total: u64, page_size: u32) -> u64 {
  let per_page = u64::from(page_size.max(1));
  if total == 0 {
    1
  } else {
    (total + per_page - 1) / per_page
  }
}

fn render_move(m: &StockMove) {
  println!("Move {}", m.id);
  println!("  date:      {}", m.date);
  println!("  product:   {}", m.product);
  println!("  warehouse: {}", m.warehouse);
  println!("  type:      {}", m.kind);
  println!("  quantity:  {}", m.quantity);
  println!("  reference: {}", m.reference);
}

fn render_help() {
  for cmd in commands::COMMANDS {
    let aliases = cmd.aliases.join(", ");
    println!("{:<10} ({:<12}) {}", cmd.name, aliases, cmd.description);
  }
}
