//! Purpose: Hold top-level CLI command dispatch for `yuyu`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Protected commands pass the navigation guard before any request.
//! Invariants: Stdout carries command results only; notices and progress use stderr.

use super::*;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use yuyu::api::{
    ApiClient, FEED_COST, Page, ProfileUpdate, ProgressFn, RegisterRequest, SortBy, UploadRequest,
    VideoSummary, VideoUpdate,
};
use yuyu::core::credentials::CredentialFile;
use yuyu::core::nav::{self, NavOutcome, Route};
use yuyu::core::notifications::{Notification, NotificationEvent, NotificationStore};
use yuyu::core::session::{Profile, SessionStore};

pub(super) fn dispatch_command(
    command: Command,
    state_dir: &Path,
    api_url: &str,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    if let Command::Completion { shell } = &command {
        use clap::CommandFactory;
        let mut cmd = Cli::command();
        clap_complete::aot::generate(*shell, &mut cmd, "yuyu", &mut io::stdout());
        return Ok(RunOutcome::ok());
    }

    let credentials = CredentialFile::new(config_paths::credential_path(state_dir));
    let session = SessionStore::load(credentials)?;
    let client = ApiClient::new(api_url, session)?
        .with_notice_sink(Arc::new(CliNotices { color_mode }));

    match command {
        Command::Completion { .. } => Ok(RunOutcome::ok()),
        Command::Register {
            username,
            email,
            password,
            code,
        } => {
            let request = RegisterRequest {
                username: username.clone(),
                password,
                email,
                verification_code: code,
            };
            client.users().register(&request)?;
            println!("account {username} created, log in with `yuyu login {username} <password>`");
            Ok(RunOutcome::ok())
        }
        Command::Login { username, password } => {
            let response = client.users().login(&username, &password)?;
            client.session().set_token(response.token)?;
            let profile = match response.user {
                Some(profile) => profile,
                None => client.users().me()?,
            };
            client.session().set_profile(profile.clone());
            let display = profile.username.as_deref().unwrap_or(&username);
            println!(
                "logged in as {display} (fish balance: {})",
                profile.fish_balance
            );
            Ok(RunOutcome::ok())
        }
        Command::Logout => {
            client.session().logout()?;
            println!("logged out");
            Ok(RunOutcome::ok())
        }
        Command::Whoami { json } => {
            require_route(&client, Route::Profile)?;
            let profile = client.users().me()?;
            client.session().set_profile(profile.clone());
            if json {
                emit_json(&profile)?;
            } else {
                emit_profile_human(&profile);
            }
            Ok(RunOutcome::ok())
        }
        Command::Claim => {
            require_route(&client, Route::Profile)?;
            let profile = client.users().me()?;
            client.session().set_profile(profile);
            let claim = client.users().claim_daily()?;
            client.session().record_daily_claim(claim.new_balance);
            println!(
                "daily reward claimed, fish balance is now {}",
                claim.new_balance
            );
            Ok(RunOutcome::ok())
        }
        Command::SendCode { email } => {
            client.users().send_verification_code(&email)?;
            println!("verification code sent to {email}");
            Ok(RunOutcome::ok())
        }
        Command::Passwd { old, new } => {
            require_route(&client, Route::Profile)?;
            client.users().change_password(&old, &new)?;
            println!("password changed");
            Ok(RunOutcome::ok())
        }
        Command::Profile { nickname, bio } => {
            require_route(&client, Route::Profile)?;
            if nickname.is_none() && bio.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("nothing to update")
                    .with_hint("Pass --nickname and/or --bio."));
            }
            let profile = client.users().update_me(&ProfileUpdate { nickname, bio })?;
            client.session().set_profile(profile.clone());
            emit_profile_human(&profile);
            Ok(RunOutcome::ok())
        }
        Command::Avatar { image } => {
            require_route(&client, Route::Profile)?;
            let profile = client.users().update_avatar(&image, upload_progress())?;
            client.session().set_profile(profile);
            println!("avatar updated");
            Ok(RunOutcome::ok())
        }
        Command::User { command } => dispatch_user(command, &client),
        Command::Video { command } => dispatch_video(command, &client),
        Command::Comment { command } => dispatch_comment(command, &client),
        Command::Notify { command } => dispatch_notify(command, &client),
    }
}

fn dispatch_user(command: UserCommand, client: &ApiClient) -> Result<RunOutcome, Error> {
    match command {
        UserCommand::Show { username, json } => {
            let profile = client.users().profile(&username)?;
            if json {
                emit_json(&profile)?;
            } else {
                emit_profile_human(&profile);
                println!("web: {}", web_link(client, &Route::UserPage(username)));
            }
            Ok(RunOutcome::ok())
        }
        UserCommand::Videos {
            user_id,
            page,
            size,
            json,
        } => {
            let videos = client.users().videos(user_id, page, size)?;
            if json {
                emit_json(&videos)?;
            } else {
                emit_video_page(&videos);
            }
            Ok(RunOutcome::ok())
        }
        UserCommand::Search {
            query,
            page,
            size,
            json,
        } => {
            let users = client.users().search(&query, page, size)?;
            if json {
                emit_json(&users)?;
            } else {
                emit_user_page(&users);
            }
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_video(command: VideoCommand, client: &ApiClient) -> Result<RunOutcome, Error> {
    match command {
        VideoCommand::List {
            page,
            size,
            sort,
            json,
        } => {
            let videos = client.videos().list(page, size, sort.into())?;
            if json {
                emit_json(&videos)?;
            } else {
                emit_video_page(&videos);
            }
            Ok(RunOutcome::ok())
        }
        VideoCommand::Search {
            query,
            page,
            size,
            json,
        } => {
            let videos = client.videos().search(&query, page, size)?;
            if json {
                emit_json(&videos)?;
            } else {
                emit_video_page(&videos);
            }
            Ok(RunOutcome::ok())
        }
        VideoCommand::Show { id, json } => {
            let video = client.videos().detail(id)?;
            if json {
                emit_json(&video)?;
            } else {
                println!("title: {}", video.title);
                if let Some(author) = &video.author {
                    println!("author: {}", author.username);
                }
                println!("views: {}  fish: {}", video.views, video.fish_count);
                if !video.description.is_empty() {
                    println!("description: {}", video.description);
                }
                if let Some(video_url) = &video.video_url {
                    println!("stream: {video_url}");
                }
                println!("web: {}", web_link(client, &Route::VideoDetail(id)));
            }
            Ok(RunOutcome::ok())
        }
        VideoCommand::Upload {
            title,
            description,
            file,
            cover,
        } => {
            require_route(client, Route::Upload)?;
            let request = UploadRequest {
                title,
                description,
                file,
                cover,
            };
            let video = client.videos().upload(&request, upload_progress())?;
            println!(
                "uploaded video {} ({})",
                video.id,
                web_link(client, &Route::VideoDetail(video.id))
            );
            Ok(RunOutcome::ok())
        }
        VideoCommand::Edit {
            id,
            title,
            description,
        } => {
            require_route(client, Route::VideoEdit(id))?;
            if title.is_none() && description.is_none() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("nothing to update")
                    .with_hint("Pass --title and/or --description."));
            }
            client
                .videos()
                .update(id, &VideoUpdate { title, description })?;
            println!("updated video {id}");
            Ok(RunOutcome::ok())
        }
        VideoCommand::Delete { id } => {
            client.videos().delete(id)?;
            println!("deleted video {id}");
            Ok(RunOutcome::ok())
        }
        VideoCommand::Feed { id } => {
            let response = client.videos().feed(id)?;
            client.session().record_spend(FEED_COST);
            println!("fed a fish, video now has {} fish", response.fish_count);
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_comment(command: CommentCommand, client: &ApiClient) -> Result<RunOutcome, Error> {
    match command {
        CommentCommand::List { video_id, json } => {
            let comments = client.comments().list(video_id)?;
            if json {
                emit_json(&comments)?;
            } else if comments.is_empty() {
                println!("no comments");
            } else {
                for comment in &comments {
                    let author = comment
                        .author
                        .as_ref()
                        .map(|author| author.username.as_str())
                        .unwrap_or("-");
                    println!("[{}] {author}: {}", comment.id, comment.content);
                }
            }
            Ok(RunOutcome::ok())
        }
        CommentCommand::Post { video_id, content } => {
            let comment = client.comments().post(video_id, &content)?;
            println!("comment {} posted", comment.id);
            Ok(RunOutcome::ok())
        }
        CommentCommand::Delete { comment_id } => {
            client.comments().delete(comment_id)?;
            println!("comment {comment_id} deleted");
            Ok(RunOutcome::ok())
        }
    }
}

fn dispatch_notify(command: NotifyCommand, client: &ApiClient) -> Result<RunOutcome, Error> {
    require_route(client, Route::Notifications)?;
    match command {
        NotifyCommand::List { json } => {
            let store = NotificationStore::new();
            store.merge(client.notifications().list()?);
            if json {
                emit_json(&store.items())?;
            } else {
                emit_notification_rows(&store.items());
                println!("{} unread", store.unread_count());
            }
            Ok(RunOutcome::ok())
        }
        NotifyCommand::Read { id } => {
            let store = NotificationStore::new();
            store.merge(client.notifications().list()?);
            store.mark_as_read(client, id);
            println!("{} unread", store.unread_count());
            Ok(RunOutcome::ok())
        }
        NotifyCommand::ReadAll => {
            let store = NotificationStore::new();
            store.merge(client.notifications().list()?);
            store.mark_all_as_read(client);
            println!("{} unread", store.unread_count());
            Ok(RunOutcome::ok())
        }
        NotifyCommand::Watch { interval } => {
            let store = NotificationStore::new();
            store.subscribe(|event| match event {
                NotificationEvent::Added(notification) => {
                    let line = serde_json::to_string(&json!({ "notification": notification }))
                        .unwrap_or_default();
                    println!("{line}");
                }
                NotificationEvent::ReadState { id, is_read } => {
                    let line = serde_json::to_string(
                        &json!({ "readState": { "id": id, "isRead": is_read } }),
                    )
                    .unwrap_or_default();
                    println!("{line}");
                }
                NotificationEvent::Cleared => {}
            });

            let stop = Arc::new(AtomicBool::new(false));
            for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
                signal_hook::flag::register(signal, Arc::clone(&stop)).map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to install signal handler")
                        .with_source(err)
                })?;
            }

            let interval = interval.max(1);
            store.start_polling(client, Duration::from_secs(interval));
            eprintln!("watching notifications every {interval}s (ctrl-c to stop)");
            while !stop.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(150));
            }
            store.stop_polling();
            eprintln!("stopped");
            Ok(RunOutcome::ok())
        }
    }
}

impl From<SortArg> for SortBy {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Latest => SortBy::Latest,
            SortArg::Views => SortBy::Views,
            SortArg::Popularity => SortBy::Popularity,
        }
    }
}

fn require_route(client: &ApiClient, route: Route) -> Result<(), Error> {
    match nav::guard(route, client.session().is_logged_in()) {
        NavOutcome::Allow(_) => Ok(()),
        NavOutcome::Redirect(_) => Err(Error::new(ErrorKind::Usage)
            .with_message("login required")
            .with_hint("Run `yuyu login <username> <password>` first.")),
    }
}

/// Shareable site link for a route, derived from the API base url's origin.
fn web_link(client: &ApiClient, route: &Route) -> String {
    let mut url = client.base_url().clone();
    url.set_path("");
    let origin = url.as_str().trim_end_matches('/').to_string();
    format!("{origin}{}", route.path())
}

fn upload_progress() -> Option<ProgressFn> {
    if !io::stderr().is_terminal() {
        return None;
    }
    Some(Box::new(|sent, total| {
        let percent = if total == 0 {
            100
        } else {
            sent.saturating_mul(100) / total
        };
        eprint!("\ruploading: {percent:>3}%");
        if sent >= total {
            eprintln!();
        }
    }))
}

fn emit_json(value: &impl serde::Serialize) -> Result<(), Error> {
    let json = serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output json")
            .with_source(err)
    })?;
    println!("{json}");
    Ok(())
}

fn emit_profile_human(profile: &Profile) {
    println!("username: {}", profile.username.as_deref().unwrap_or("-"));
    if let Some(nickname) = &profile.nickname {
        println!("nickname: {nickname}");
    }
    if let Some(email) = &profile.email {
        println!("email: {email}");
    }
    if let Some(bio) = &profile.bio {
        println!("bio: {bio}");
    }
    println!("fish balance: {}", profile.fish_balance);
    println!(
        "daily claim: {}",
        if profile.can_claim_daily {
            "available"
        } else {
            "not available"
        }
    );
}

fn emit_video_page(page: &Page<VideoSummary>) {
    if page.items.is_empty() {
        println!("no videos");
        return;
    }
    for video in &page.items {
        let author = video
            .author
            .as_ref()
            .map(|author| author.username.as_str())
            .unwrap_or("-");
        println!(
            "{:>6}  {:>8} views  {:>5} fish  {author}  {}",
            video.id, video.views, video.fish_count, video.title
        );
    }
    if page.total > 0 {
        println!("page {} ({} total)", page.page, page.total);
    }
}

fn emit_user_page(page: &Page<Profile>) {
    if page.items.is_empty() {
        println!("no users");
        return;
    }
    for profile in &page.items {
        let username = profile.username.as_deref().unwrap_or("-");
        match &profile.nickname {
            Some(nickname) => println!("{username}  ({nickname})"),
            None => println!("{username}"),
        }
    }
    if page.total > 0 {
        println!("page {} ({} total)", page.page, page.total);
    }
}

fn emit_notification_rows(items: &[Notification]) {
    if items.is_empty() {
        println!("no notifications");
        return;
    }
    for item in items {
        let marker = if item.is_read { ' ' } else { '*' };
        println!(
            "{marker} {:>5}  {:<10}  {}  {}",
            item.id, item.kind, item.created_at, item.content
        );
    }
}
