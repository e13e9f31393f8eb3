#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use blogdesk::api::articles::Ranking;
use blogdesk::api::types::{Article, ArticleCondition, Category, Page, PageParams};
use blogdesk::api::{articles, auth, categories, comments, files, notifications, replies};
use blogdesk::{ApiClient, ApiRequest, ClientConfig, ClientError, DurableStorage, FileStorage, SessionStore, StorageError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("server returned HTTP {status}")]
    Status { status: u16 },
    #[error("not logged in; run `blogdesk login` first")]
    NotLoggedIn,
}

#[derive(Parser, Debug)]
#[command(name = "blogdesk", about = "Blog API client with a persisted login session")]
struct Cli {
    /// Overrides BLOG_BASE_URL from the environment or `.env`.
    #[arg(long, env = "BLOG_BASE_URL")]
    base_url: Option<String>,

    /// Overrides BLOG_STORAGE_PATH.
    #[arg(long, env = "BLOG_STORAGE_PATH")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "BLOG_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Print the stored user; `--remote` asks the server instead.
    Whoami {
        #[arg(long, default_value_t = false)]
        remote: bool,
    },
    Article(ArticleCommand),
    Comment(CommentCommand),
    Reply(ReplyCommand),
    Notification(NotificationCommand),
    Category(CategoryCommand),
    Upload {
        path: PathBuf,
    },
    /// Send an arbitrary request through the authenticated client.
    Request {
        method: String,
        path: String,
        #[arg(long, help = "JSON request body")]
        data: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ArticleCommand {
    #[command(subcommand)]
    command: ArticleSubcommand,
}

#[derive(Subcommand, Debug)]
enum ArticleSubcommand {
    List(PageArgs),
    Search {
        #[arg(long, default_value = "")]
        tag: String,
        #[arg(long, default_value_t = 0)]
        category_id: i64,
        #[arg(long, default_value = "")]
        title: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Articles written by the logged-in user.
    Mine(PageArgs),
    /// Articles the logged-in user liked.
    Liked(PageArgs),
    Ranking {
        #[arg(long, value_enum, default_value_t = RankingArg::Likes)]
        by: RankingArg,
    },
    Tags,
    Read {
        id: i64,
    },
    Publish {
        #[arg(long, help = "Article as JSON; id 0 creates, anything else edits")]
        data: String,
    },
    Delete {
        id: i64,
    },
    Like {
        id: i64,
    },
}

#[derive(Args, Debug)]
struct CommentCommand {
    #[command(subcommand)]
    command: CommentSubcommand,
}

#[derive(Subcommand, Debug)]
enum CommentSubcommand {
    List {
        article_id: i64,
        #[command(flatten)]
        page: PageArgs,
    },
    Add {
        article_id: i64,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        author: String,
    },
    Like {
        comment_id: i64,
    },
    /// Comments written by the logged-in user.
    Mine(PageArgs),
}

#[derive(Args, Debug)]
struct ReplyCommand {
    #[command(subcommand)]
    command: ReplySubcommand,
}

#[derive(Subcommand, Debug)]
enum ReplySubcommand {
    List {
        comment_id: i64,
    },
    Add {
        comment_id: i64,
        #[arg(long)]
        content: String,
        #[arg(long, default_value_t = 0)]
        to_uid: i64,
    },
    Like {
        reply_id: i64,
    },
}

#[derive(Args, Debug)]
struct NotificationCommand {
    #[command(subcommand)]
    command: NotificationSubcommand,
}

#[derive(Subcommand, Debug)]
enum NotificationSubcommand {
    Count,
    List(PageArgs),
    Read { id: i64 },
    ReadAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RankingArg {
    Likes,
    Reads,
}

impl From<RankingArg> for Ranking {
    fn from(arg: RankingArg) -> Self {
        match arg {
            RankingArg::Likes => Ranking::Likes,
            RankingArg::Reads => Ranking::Reads,
        }
    }
}

#[derive(Args, Debug)]
struct CategoryCommand {
    #[command(subcommand)]
    command: CategorySubcommand,
}

#[derive(Subcommand, Debug)]
enum CategorySubcommand {
    Tree {
        /// One line per node, depth first, instead of nested JSON.
        #[arg(long, default_value_t = false)]
        flat: bool,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 0)]
        parent_id: i64,
        #[arg(long, default_value_t = 0)]
        sort: i64,
    },
    Delete {
        id: i64,
        #[arg(long, default_value_t = 1)]
        mode: i64,
    },
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: i64,
    #[arg(long, default_value_t = 10)]
    rows: i64,
    #[arg(long, default_value = "")]
    keyword: String,
}

impl PageArgs {
    fn params(&self) -> PageParams {
        PageParams { keyword: self.keyword.clone(), ..PageParams::new(self.page, self.rows) }.normalized()
    }
}

struct CliContext {
    client: ApiClient,
    store: SessionStore,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(path) = cli.storage {
        config.storage_path = path;
    }
    tracing::debug!(base_url = %config.base_url, storage = %config.storage_path.display(), "client configured");

    let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::open(&config.storage_path)?);
    let client = ApiClient::new(&config, storage.clone())?;
    let store = SessionStore::open(storage, config.store_key.as_str());
    let mut ctx = CliContext { client, store };

    match cli.command {
        Command::Login { username, password } => {
            let user = auth::login(&ctx.client, &mut ctx.store, &username, &password).await?;
            println!("logged in as {}", user.username);
            Ok(())
        }
        Command::Logout => {
            auth::logout(&ctx.client, &mut ctx.store).await?;
            println!("logged out");
            Ok(())
        }
        Command::Whoami { remote } => run_whoami(&ctx, remote).await,
        Command::Article(article) => run_article(&ctx, article).await,
        Command::Comment(comment) => run_comment(&ctx, comment).await,
        Command::Reply(reply) => run_reply(&ctx, reply).await,
        Command::Notification(notification) => run_notification(&ctx, notification).await,
        Command::Category(category) => run_category(&ctx, category).await,
        Command::Upload { path } => run_upload(&ctx, &path).await,
        Command::Request { method, path, data } => run_request(&ctx, &method, &path, data.as_deref()).await,
    }
}

async fn run_whoami(ctx: &CliContext, remote: bool) -> Result<(), CliError> {
    if remote {
        let user = auth::current_user(&ctx.client).await?;
        return print_json(&serde_json::to_value(user)?);
    }
    let user = ctx.store.user().ok_or(CliError::NotLoggedIn)?;
    print_json(user)
}

async fn run_article(ctx: &CliContext, article: ArticleCommand) -> Result<(), CliError> {
    match article.command {
        ArticleSubcommand::List(page) => {
            let page = articles::page(&ctx.client, &page.params()).await?;
            print_page(&page)
        }
        ArticleSubcommand::Search { tag, category_id, title, page } => {
            let condition = ArticleCondition { tag, category_id, title, ..ArticleCondition::default() };
            let page = articles::search(&ctx.client, &page.params(), &condition).await?;
            print_page(&page)
        }
        ArticleSubcommand::Mine(page) => print_page(&articles::mine(&ctx.client, &page.params()).await?),
        ArticleSubcommand::Liked(page) => print_page(&articles::liked(&ctx.client, &page.params()).await?),
        ArticleSubcommand::Ranking { by } => {
            let ranked = articles::ranking(&ctx.client, by.into()).await?;
            print_json(&serde_json::to_value(ranked)?)
        }
        ArticleSubcommand::Tags => print_json(&serde_json::to_value(articles::tags(&ctx.client).await?)?),
        ArticleSubcommand::Read { id } => {
            let article = articles::detail(&ctx.client, id).await?;
            print_json(&serde_json::to_value(article)?)
        }
        ArticleSubcommand::Publish { data } => {
            let article = serde_json::from_str::<Article>(&data)?;
            print_message(&articles::publish(&ctx.client, &article).await?);
            Ok(())
        }
        ArticleSubcommand::Delete { id } => {
            articles::delete(&ctx.client, id).await?;
            println!("deleted article {id}");
            Ok(())
        }
        ArticleSubcommand::Like { id } => {
            print_message(&articles::like(&ctx.client, id).await?);
            Ok(())
        }
    }
}

async fn run_comment(ctx: &CliContext, comment: CommentCommand) -> Result<(), CliError> {
    match comment.command {
        CommentSubcommand::List { article_id, page } => {
            let page = comments::page_for_article(&ctx.client, article_id, &page.params()).await?;
            print_page(&page)
        }
        CommentSubcommand::Add { article_id, content, author } => {
            let comment = comments::insert(&ctx.client, article_id, &content, &author).await?;
            print_json(&serde_json::to_value(comment)?)
        }
        CommentSubcommand::Like { comment_id } => {
            print_message(&comments::like(&ctx.client, comment_id).await?);
            Ok(())
        }
        CommentSubcommand::Mine(page) => print_page(&comments::mine(&ctx.client, &page.params()).await?),
    }
}

async fn run_reply(ctx: &CliContext, reply: ReplyCommand) -> Result<(), CliError> {
    match reply.command {
        ReplySubcommand::List { comment_id } => {
            let list = replies::list(&ctx.client, comment_id).await?;
            print_json(&serde_json::to_value(list)?)
        }
        ReplySubcommand::Add { comment_id, content, to_uid } => {
            print_message(&replies::insert(&ctx.client, comment_id, &content, to_uid).await?);
            Ok(())
        }
        ReplySubcommand::Like { reply_id } => {
            print_message(&replies::like(&ctx.client, reply_id).await?);
            Ok(())
        }
    }
}

async fn run_notification(ctx: &CliContext, notification: NotificationCommand) -> Result<(), CliError> {
    match notification.command {
        NotificationSubcommand::Count => {
            println!("{}", notifications::unread_count(&ctx.client).await?);
            Ok(())
        }
        NotificationSubcommand::List(page) => print_page(&notifications::page(&ctx.client, &page.params()).await?),
        NotificationSubcommand::Read { id } => {
            print_message(&notifications::mark_read(&ctx.client, id).await?);
            Ok(())
        }
        NotificationSubcommand::ReadAll => {
            print_message(&notifications::mark_all_read(&ctx.client).await?);
            Ok(())
        }
    }
}

async fn run_category(ctx: &CliContext, category: CategoryCommand) -> Result<(), CliError> {
    match category.command {
        CategorySubcommand::Tree { flat } => {
            let tree = categories::tree(&ctx.client).await?;
            if flat {
                for line in flat_lines(&tree) {
                    println!("{line}");
                }
                Ok(())
            } else {
                print_json(&serde_json::to_value(tree)?)
            }
        }
        CategorySubcommand::Add { name, parent_id, sort } => {
            let category = Category { name, parent_id, sort, ..Category::default() };
            print_message(&categories::add(&ctx.client, &category).await?);
            Ok(())
        }
        CategorySubcommand::Delete { id, mode } => {
            print_message(&categories::delete(&ctx.client, id, mode).await?);
            Ok(())
        }
    }
}

async fn run_upload(ctx: &CliContext, path: &Path) -> Result<(), CliError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CliError::ReadFile { path: path.to_path_buf(), source })?;
    let file_name = path.file_name().map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
    let url = files::upload(&ctx.client, &file_name, bytes).await?;
    println!("{url}");
    Ok(())
}

async fn run_request(ctx: &CliContext, method: &str, path: &str, data: Option<&str>) -> Result<(), CliError> {
    let mut request = ApiRequest::new(parse_method(method)?, path);
    if let Some(body) = parse_data(data)? {
        request = request.json(body);
    }

    let response = ctx.client.send(request).await?;
    let status = response.status();
    let text = response.text().await.map_err(ClientError::Transport)?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => print_json(&json)?,
        Err(_) => println!("{text}"),
    }
    if !status.is_success() {
        return Err(CliError::Status { status: status.as_u16() });
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<reqwest::Method, CliError> {
    reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::InvalidMethod(method.to_owned()))
}

fn parse_data(data: Option<&str>) -> Result<Option<Value>, CliError> {
    match data.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
    }
}

/// `id<TAB>parent<TAB>name` per node, roots and their subtrees in order.
fn flat_lines(tree: &[Category]) -> Vec<String> {
    let mut nodes = Vec::new();
    for root in tree {
        root.walk(&mut nodes);
    }
    nodes
        .into_iter()
        .map(|node| format!("{}\t{}\t{}", node.id, node.parent_id, node.name))
        .collect()
}

fn print_page<T: serde::Serialize>(page: &Page<T>) -> Result<(), CliError> {
    print_json(&json!({ "items": page.items, "total": page.total }))
}

fn print_message(message: &str) {
    if message.is_empty() {
        println!("ok");
    } else {
        println!("{message}");
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
