use std::fmt;
use std::path::Path;

use chrono::{Datelike, Local, NaiveDate};
use log::{error, info};
use serde::Serialize;

use postdesk::config::Config;
use postdesk::domain::calendar::{bucket_by_day, posts_today};
use postdesk::domain::campaigns::{GroupingRule, group_into_campaigns, reconstruct_campaign};
use postdesk::domain::composer::AuthoredPost;
use postdesk::domain::fanout::{ComposeError, Composer, campaign_for_post, delete_campaign};
use postdesk::logging;
use postdesk::models::{UploadFile, parse_timestamp};
use postdesk::services::api::{ApiClient, PostBackend, PostFilter};
use postdesk::services::error::ApiError;
use postdesk::session::Session;

const USAGE: &str = "usage: postdesk <command>

commands:
  campaigns                                   list inferred campaigns
  calendar YYYY-MM                            posts per day of a month
  today                                       posts due today
  show <post_id>                              campaign around one post
  delete <post_id>                            delete the campaign containing a post
  upload <path>                               upload a file to the media library
  publish <page_id,...> <content> [scheduled_at]";

#[derive(Debug)]
enum CommandError {
    Usage(String),
    Api(ApiError),
    Compose(ComposeError),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Usage(msg) => write!(f, "{msg}\n\n{USAGE}"),
            CommandError::Api(err) => write!(f, "{err}"),
            CommandError::Compose(err) => write!(f, "{}", err.notice()),
            CommandError::Io(err) => write!(f, "io error: {err}"),
            CommandError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl From<ApiError> for CommandError {
    fn from(value: ApiError) -> Self {
        CommandError::Api(value)
    }
}

impl From<ComposeError> for CommandError {
    fn from(value: ComposeError) -> Self {
        CommandError::Compose(value)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(value: std::io::Error) -> Self {
        CommandError::Io(value)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(value: serde_json::Error) -> Self {
        CommandError::Json(value)
    }
}

fn usage(msg: impl Into<String>) -> CommandError {
    CommandError::Usage(msg.into())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_post_id(arg: Option<&String>) -> Result<i64, CommandError> {
    let raw = arg.ok_or_else(|| usage("missing post id"))?;
    raw.parse()
        .map_err(|_| usage(format!("invalid post id: {raw}")))
}

fn parse_month(arg: Option<&String>) -> Result<NaiveDate, CommandError> {
    let raw = arg.ok_or_else(|| usage("missing month"))?;
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .map_err(|_| usage(format!("invalid month, expected YYYY-MM: {raw}")))
}

fn parse_page_ids(raw: &str) -> Result<Vec<i64>, CommandError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse()
                .map_err(|_| usage(format!("invalid page id: {id}")))
        })
        .collect()
}

async fn run(client: ApiClient, session: Session, args: &[String]) -> Result<(), CommandError> {
    let command = args.first().map(String::as_str);

    match command {
        Some("campaigns") => {
            let posts = client.list_posts(&session, &PostFilter::default()).await?;
            let campaigns = group_into_campaigns(&posts);
            info!(
                "{} posts grouped into {} campaigns",
                posts.len(),
                campaigns.len()
            );
            print_json(&campaigns)
        }
        Some("calendar") => {
            let month = parse_month(args.get(1))?;
            let posts = client.list_posts(&session, &PostFilter::default()).await?;
            print_json(&bucket_by_day(&posts, month.year(), month.month(), &Local))
        }
        Some("today") => {
            let posts = client.list_posts(&session, &PostFilter::default()).await?;
            print_json(&posts_today(&posts, &Local::now()))
        }
        Some("show") => {
            let post_id = parse_post_id(args.get(1))?;
            let anchor = client.get_post(&session, post_id).await?;
            let posts = client.list_posts(&session, &PostFilter::default()).await?;
            let campaign = reconstruct_campaign(&anchor, &posts, &GroupingRule::detail_view());
            print_json(&campaign)
        }
        Some("delete") => {
            let post_id = parse_post_id(args.get(1))?;
            let campaign = campaign_for_post(&client, &session, post_id).await?;
            let outcome = delete_campaign(&client, &session, &campaign).await;
            println!("{}", outcome.notice());
            Ok(())
        }
        Some("upload") => {
            let path = args.get(1).ok_or_else(|| usage("missing file path"))?;
            let file = UploadFile::from_path(Path::new(path)).await?;
            let uploaded = client.upload_media(&session, &file).await?;
            print_json(&uploaded)
        }
        Some("publish") => {
            let page_ids = parse_page_ids(args.get(1).ok_or_else(|| usage("missing page ids"))?)?;
            let content = args.get(2).ok_or_else(|| usage("missing content"))?;

            let mut post = AuthoredPost::new(content.as_str());
            if let Some(raw) = args.get(3) {
                let at = parse_timestamp(raw)
                    .ok_or_else(|| usage(format!("invalid scheduled_at: {raw}")))?;
                post = post.scheduled(Some(at));
            }

            let composer = Composer::new(client);
            let mut outcome = composer.submit_to_pages(&session, &post, &page_ids).await?;

            for result in outcome.results.iter().filter(|r| !r.succeeded) {
                println!(
                    "  page {} ({}): {}",
                    result.page_id,
                    result.platform,
                    result.error.as_deref().unwrap_or("failed")
                );
            }
            println!("{}", outcome.notice());

            if let Some(usage_task) = outcome.take_template_usage() {
                let _ = usage_task.await;
            }
            Ok(())
        }
        Some(other) => Err(usage(format!("unknown command: {other}"))),
        None => Err(usage("missing command")),
    }
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = Config::from_env();
    let session = config.session();
    let client = match ApiClient::new(&config) {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to build API client: {}", err);
            std::process::exit(1);
        }
    };

    info!("Using API at {}", client.base_url());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(client, session, &args).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
