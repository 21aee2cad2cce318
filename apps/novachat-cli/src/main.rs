mod auth_profile;
mod command;
mod config;
mod logging;
mod screen;

use std::{
    collections::HashSet,
    process::ExitCode,
    sync::Arc,
    time::{Duration, Instant},
};

use auth_profile::{AuthProfile, LastConversation};
use client_core::{
    ChannelAddress, ChannelUpdate, ChatKind, ClientError, ClientErrorCategory, Conversation,
    ConversationHandlers, ConversationTarget, Credential, Event, EventRouter, MessageId,
    OutboundEvent, Presence, ReplyMeta, RoomId, TimelineItem, TimelineOp, TypingEmitter, UserId,
    build_content, edit_content, mutation_patch, normalize_history, parse_content,
};
use client_platform::{
    InMemorySecretStore, SecretStore, SecretStoreError, SessionState, SessionStore,
};
use client_remote::{Channel, ConversationPreferences, RestClient, WebSocketConnector};
use command::{Command, HELP};
use config::{CliConfig, LoginMethod};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, error, info, warn};

const SECRET_SERVICE: &str = "dev.novachat.cli";
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// A composer line ending with this continues the draft on the next line.
const DRAFT_CONTINUATION: char = '\\';

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    info!("starting novachat");

    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            eprintln!("novachat: {err}");
            return ExitCode::FAILURE;
        }
    };
    debug!(api_url = %config.api_url, ws_base = %config.ws_base, "configuration loaded");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "novachat stopped");
            eprintln!("novachat: {}", err.message);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: CliConfig) -> Result<(), ClientError> {
    let rest = RestClient::new(&config.api_url)?;
    let sessions = SessionStore::new(
        InMemorySecretStore::default(),
        SECRET_SERVICE,
        &config.api_url,
    );

    let credential = sign_in(&rest, config.login.as_ref()).await?;
    sessions.login(&credential).map_err(session_error)?;
    let me = rest.me(&credential).await?;
    info!(user_id = me.id, username = %me.username, "signed in");

    let profile_path = config.profile_path();
    let remembered = auth_profile::load_profile(&profile_path).unwrap_or_else(|err| {
        warn!(error = %err, "ignoring unreadable profile");
        None
    });
    let target = config
        .target
        .clone()
        .or_else(|| {
            remembered
                .filter(|profile| profile.api_url == config.api_url && profile.user_id == me.id)
                .and_then(|profile| profile.last_conversation)
                .map(ConversationTarget::from)
        })
        .ok_or_else(|| {
            ClientError::new(
                ClientErrorCategory::Request,
                "missing_conversation",
                "no conversation selected, set NOVACHAT_DM or NOVACHAT_ROOM",
            )
        })?;

    let profile = AuthProfile {
        api_url: config.api_url.clone(),
        user_id: me.id,
        username: me.username.clone(),
        last_conversation: Some(LastConversation::from(&target)),
    };
    if let Err(err) = auth_profile::save_profile(&profile_path, &profile) {
        warn!(error = %err, "failed saving profile");
    }

    let typing = match config.typing_idle_timeout {
        Some(timeout) => TypingEmitter::with_idle_timeout(timeout),
        None => TypingEmitter::new(),
    };
    let conversation = Conversation::new(me.id, target, config.timeline_max_items);
    let mut screen = ConversationScreen {
        rest,
        sessions,
        ws_base: config.ws_base.clone(),
        channel: Channel::spawn(Arc::new(WebSocketConnector), None),
        router: EventRouter::new(conversation),
        typing,
        draft: String::new(),
        reported_seen: HashSet::new(),
        peer_blocked: false,
        last_status: String::new(),
    };
    let outcome = screen.run().await;
    if matches!(outcome, Ok(Flow::Logout)) {
        if let Err(err) = auth_profile::clear_profile(&profile_path) {
            warn!(error = %err, "failed clearing profile");
        }
    }
    outcome.map(|_| ())
}

async fn sign_in(
    rest: &RestClient,
    login: Option<&LoginMethod>,
) -> Result<Credential, ClientError> {
    match login {
        Some(LoginMethod::Token(token)) => Ok(Credential::new(token.clone())),
        Some(LoginMethod::Password { email, password }) => {
            let token = rest.login(email, password).await?;
            Ok(token.credential())
        }
        None => Err(ClientError::new(
            ClientErrorCategory::Auth,
            "missing_credentials",
            "set NOVACHAT_TOKEN, or NOVACHAT_EMAIL and NOVACHAT_PASSWORD",
        )),
    }
}

fn session_error(err: SecretStoreError) -> ClientError {
    ClientError::new(
        ClientErrorCategory::Storage,
        "session_store_error",
        err.to_string(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
    Logout,
}

struct ConversationScreen<S: SecretStore> {
    rest: RestClient,
    sessions: SessionStore<S>,
    ws_base: String,
    channel: Channel,
    router: EventRouter<Conversation>,
    typing: TypingEmitter,
    draft: String,
    /// Message ids already acknowledged to the peer.
    reported_seen: HashSet<MessageId>,
    /// The direct peer is on the caller's block list.
    peer_blocked: bool,
    last_status: String,
}

impl<S: SecretStore> ConversationScreen<S> {
    async fn run(&mut self) -> Result<Flow, ClientError> {
        self.print_header().await;
        self.load_history().await;
        self.print_timeline();

        let credential = self.credential()?;
        let address = ChannelAddress::new(
            self.ws_base.clone(),
            self.conversation().target().clone(),
            credential,
        );
        let mut updates = self.channel.subscribe();
        self.channel
            .set_address(Some(address))
            .await
            .map_err(channel_error)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut idle = tokio::time::interval(IDLE_POLL_INTERVAL);
        let flow = loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Ok(update) => self.on_update(update).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "channel updates lagged, resyncing");
                        updates = self.channel.subscribe();
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("channel stopped");
                        break Flow::Quit;
                    }
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let flow = self.on_line(&line).await;
                        if flow != Flow::Continue {
                            break flow;
                        }
                    }
                    Ok(None) => break Flow::Quit,
                    Err(err) => {
                        warn!(error = %err, "stdin closed");
                        break Flow::Quit;
                    }
                },
                _ = idle.tick() => {
                    if let Some(event) = self.typing.poll_idle(Instant::now()) {
                        self.send(event).await;
                    }
                }
            }
            self.flush_notices();
        };

        if let Some(event) = self.typing.on_sent() {
            self.send(event).await;
        }
        if let Err(err) = self.channel.shutdown().await {
            debug!(error = %err, "channel already stopped");
        }
        if flow == Flow::Logout {
            self.sessions.logout().map_err(session_error)?;
            println!("logged out");
        }
        Ok(flow)
    }

    fn conversation(&self) -> &Conversation {
        self.router.handlers()
    }

    fn conversation_mut(&mut self) -> &mut Conversation {
        self.router.handlers_mut()
    }

    fn peer_id(&self) -> Option<UserId> {
        match self.conversation().target() {
            ConversationTarget::Direct { peer_id } => Some(*peer_id),
            ConversationTarget::Room { .. } => None,
        }
    }

    fn room_id(&self) -> Option<RoomId> {
        match self.conversation().target() {
            ConversationTarget::Direct { .. } => None,
            ConversationTarget::Room { room_id } => Some(room_id.clone()),
        }
    }

    /// Current session credential; every REST call and the channel get it from here.
    fn credential(&self) -> Result<Credential, ClientError> {
        match self.sessions.state().map_err(session_error)? {
            SessionState::Present(credential) => Ok(credential),
            SessionState::Absent => Err(ClientError::new(
                ClientErrorCategory::Auth,
                "session_absent",
                "not signed in",
            )),
        }
    }

    async fn print_header(&mut self) {
        let header = match self.conversation().target().clone() {
            ConversationTarget::Direct { peer_id } => {
                let peer = match self.credential() {
                    Ok(credential) => self.rest.get_user(&credential, peer_id).await,
                    Err(err) => Err(err),
                };
                match peer {
                    Ok(peer) => {
                        format!("direct chat with {} (@{})", peer.nickname, peer.username)
                    }
                    Err(err) => {
                        self.notice(err);
                        format!("direct chat with user {peer_id}")
                    }
                }
            }
            ConversationTarget::Room { room_id } => {
                let room = match self.credential() {
                    Ok(credential) => self.rest.get_room(&credential, &room_id).await,
                    Err(err) => Err(err),
                };
                match room {
                    Ok(room) => {
                        let name = room.get("name").and_then(Value::as_str).unwrap_or(&room_id);
                        format!("room {name}")
                    }
                    Err(err) => {
                        self.notice(err);
                        format!("room {room_id}")
                    }
                }
            }
        };
        println!("== {header} ==  (/help for commands)");
        self.flush_notices();
    }

    /// Fetch history (and the online set for rooms) into the conversation.
    async fn load_history(&mut self) {
        let credential = match self.credential() {
            Ok(credential) => credential,
            Err(err) => return self.notice(err),
        };

        let history = match self.conversation().target().clone() {
            ConversationTarget::Direct { peer_id } => {
                match self.rest.blocked_users(&credential).await {
                    Ok(blocked) => {
                        self.peer_blocked = blocked.iter().any(|entry| entry.blocked_id == peer_id)
                    }
                    Err(err) => debug!(error = %err, "block list unavailable"),
                }
                self.rest
                    .dm_history(&credential, peer_id)
                    .await
                    .map(|rows| normalize_history(rows, ChatKind::Dm))
            }
            ConversationTarget::Room { room_id } => {
                if let Err(err) = self.rest.join_room(&credential, &room_id).await {
                    debug!(error = %err, %room_id, "join before loading room failed");
                }
                match self.rest.room_online(&credential, &room_id).await {
                    Ok(online_user_ids) => self
                        .conversation_mut()
                        .on_presence(&Presence::Snapshot { online_user_ids }),
                    Err(err) => debug!(error = %err, %room_id, "online list unavailable"),
                }
                self.rest
                    .room_history(&credential, &room_id)
                    .await
                    .map(|rows| normalize_history(rows, ChatKind::Room))
            }
        };

        match history {
            Ok(items) => self.conversation_mut().load_history(items),
            Err(err) => self.notice(err),
        }
        self.flush_notices();
    }

    fn print_timeline(&self) {
        let conversation = self.conversation();
        for item in conversation.timeline().items() {
            println!("{}", screen::render_item(conversation, item));
        }
    }

    /// Refetch history and route the live buffer on top of it.
    async fn resync(&mut self) {
        self.router.sync(&self.channel.state());
        self.reported_seen.clear();
        self.load_history().await;
        let state = self.channel.state();
        let routed = self.router.replay(&state);
        debug!(generation = state.generation, routed, "live events routed over history");
        self.print_timeline();
        self.print_status(true);
        self.acknowledge_seen().await;
    }

    async fn on_update(&mut self, update: ChannelUpdate) {
        let resets = self.router.resets();
        self.router.apply_update(&update);
        match update {
            _ if self.router.resets() != resets => {
                println!("-- conversation reset --");
                self.resync().await;
            }
            ChannelUpdate::Reset => {}
            ChannelUpdate::Connected(connected) => {
                self.print_status(true);
                if connected {
                    self.acknowledge_seen().await;
                }
            }
            ChannelUpdate::Event {
                event: Event::Chat { kind, message },
                ..
            } => {
                match message.id {
                    Some(id) => self.print_message(id),
                    None => {
                        let item = TimelineItem::new(kind, message);
                        println!("{}", screen::render_item(self.conversation(), &item));
                    }
                }
                self.acknowledge_seen().await;
            }
            ChannelUpdate::Event {
                event: Event::Typing(_) | Event::Presence(_),
                ..
            } => self.print_status(false),
            ChannelUpdate::Event {
                event: Event::Seen(receipt),
                ..
            } => {
                for id in receipt.message_ids {
                    self.print_message(id);
                }
            }
            ChannelUpdate::Event {
                event: Event::Unknown { kind, .. },
                ..
            } => {
                debug!(%kind, "ignoring unknown event");
            }
        }
    }

    /// Tell the peer which of its messages were displayed.
    async fn acknowledge_seen(&mut self) {
        if !self.channel.connected() {
            return;
        }
        let message_ids: Vec<MessageId> = self
            .conversation()
            .unseen_from_peer()
            .into_iter()
            .filter(|id| !self.reported_seen.contains(id))
            .collect();
        if message_ids.is_empty() {
            return;
        }
        self.reported_seen.extend(message_ids.iter().copied());
        self.send(OutboundEvent::Seen { message_ids }).await;
    }

    async fn on_line(&mut self, line: &str) -> Flow {
        if let Some(partial) = line.strip_suffix(DRAFT_CONTINUATION) {
            self.draft.push_str(partial);
            self.draft.push('\n');
            if let Some(event) = self.typing.on_input(&self.draft, Instant::now()) {
                self.send(event).await;
            }
            return Flow::Continue;
        }

        let input = if self.draft.is_empty() {
            line.to_owned()
        } else {
            let mut draft = std::mem::take(&mut self.draft);
            draft.push_str(line);
            draft
        };

        let command = match command::parse(&input) {
            Ok(Some(command)) => command,
            Ok(None) => {
                if let Some(event) = self.typing.on_input("", Instant::now()) {
                    self.send(event).await;
                }
                return Flow::Continue;
            }
            Err(err) => {
                println!("! {err}");
                return Flow::Continue;
            }
        };
        self.execute(command).await
    }

    async fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Say(body) => self.say(build_content(&body, None)).await,
            Command::Reply { id, body } => match self.reply_meta(id) {
                Some(reply) => self.say(build_content(&body, Some(&reply))).await,
                None => println!("! no message #{id} in this conversation"),
            },
            Command::Edit { id, body } => self.edit(id, &body).await,
            Command::Delete { id, for_me_only } => self.delete(id, for_me_only).await,
            Command::React { id, emoji } => self.react(id, &emoji).await,
            Command::Pin { id } => self.pin(id).await,
            Command::Forward { id, to } => self.forward(id, &to).await,
            Command::Search(query) => {
                let conversation = self.conversation();
                let hits = conversation.timeline().search(&query);
                println!("-- {} match(es) for '{query}' --", hits.len());
                for item in hits {
                    println!("{}", screen::render_item(conversation, item));
                }
            }
            Command::Clear => self.clear().await,
            Command::Block => self.set_blocked(true).await,
            Command::Unblock => self.set_blocked(false).await,
            Command::Mute(muted) => {
                self.set_preferences(ConversationPreferences {
                    is_muted: Some(muted),
                    ..ConversationPreferences::default()
                })
                .await
            }
            Command::Archive(archived) => {
                self.set_preferences(ConversationPreferences {
                    is_archived: Some(archived),
                    ..ConversationPreferences::default()
                })
                .await
            }
            Command::AddMember(username) => self.add_member(&username).await,
            Command::Kick(user_id) => self.kick(user_id).await,
            Command::Leave => return self.close_room(Command::Leave).await,
            Command::EndRoom => return self.close_room(Command::EndRoom).await,
            Command::DeleteRoom => return self.close_room(Command::DeleteRoom).await,
            Command::Who => {
                self.print_status(true);
                let online: Vec<String> = self
                    .conversation()
                    .online_users()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!("online: {}", online.join(", "));
            }
            Command::Reconnect => {
                if let Err(err) = self.channel.reconnect().await {
                    warn!(error = %err, "reconnect request failed");
                }
            }
            Command::Logout => return Flow::Logout,
            Command::Quit => return Flow::Quit,
            Command::Help => println!("{HELP}"),
        }
        Flow::Continue
    }

    async fn say(&mut self, content: String) {
        if self.peer_blocked {
            println!("! you blocked this user, /unblock to message them");
            return;
        }
        if !self.channel.connected() {
            println!("! not connected, message not sent");
            return;
        }
        self.send(OutboundEvent::ChatSend { content }).await;
        if let Some(event) = self.typing.on_sent() {
            self.send(event).await;
        }
    }

    fn reply_meta(&self, id: MessageId) -> Option<ReplyMeta> {
        let message = &self.conversation().timeline().get(id)?.message;
        Some(ReplyMeta {
            id,
            username: message.user_username.clone().unwrap_or_default(),
            nickname: message.user_nickname.clone().unwrap_or_default(),
            content: parse_content(&message.content).body.to_owned(),
        })
    }

    async fn edit(&mut self, id: MessageId, body: &str) {
        let original = self
            .conversation()
            .timeline()
            .get(id)
            .map(|item| item.message.content.clone())
            .unwrap_or_default();
        let content = edit_content(&original, body);
        let result = match self.credential() {
            Ok(credential) => match self.peer_id() {
                Some(_) => self.rest.edit_dm_message(&credential, id, &content).await,
                None => self.rest.edit_room_message(&credential, id, &content).await,
            },
            Err(err) => Err(err),
        };
        self.apply_mutation(id, result);
    }

    async fn delete(&mut self, id: MessageId, for_me_only: bool) {
        let credential = match self.credential() {
            Ok(credential) => credential,
            Err(err) => return self.notice(err),
        };
        let result = match self.peer_id() {
            Some(_) => self.rest.delete_dm_message(&credential, id, for_me_only).await,
            None if for_me_only => {
                println!("! delete-for-me is only available in direct chats");
                return;
            }
            None => self.rest.delete_room_message(&credential, id).await,
        };
        match result {
            Ok(()) if for_me_only => {
                self.conversation_mut().apply_local(TimelineOp::Remove { id })
            }
            Ok(()) => {
                self.conversation_mut()
                    .apply_local(TimelineOp::MarkDeleted { id });
                self.print_message(id);
            }
            Err(err) => self.notice(err),
        }
    }

    async fn react(&mut self, id: MessageId, emoji: &str) {
        let result = match self.credential() {
            Ok(credential) => match self.peer_id() {
                Some(_) => self.rest.react_dm_message(&credential, id, emoji).await,
                None => self.rest.react_room_message(&credential, id, emoji).await,
            },
            Err(err) => Err(err),
        };
        self.apply_mutation(id, result);
    }

    async fn pin(&mut self, id: MessageId) {
        let result = match self.credential() {
            Ok(credential) => match self.peer_id() {
                Some(_) => self.rest.pin_dm_message(&credential, id).await,
                None => self.rest.pin_room_message(&credential, id).await,
            },
            Err(err) => Err(err),
        };
        self.apply_mutation(id, result);
    }

    async fn forward(&mut self, id: MessageId, to: &str) {
        let credential = match self.credential() {
            Ok(credential) => credential,
            Err(err) => return self.notice(err),
        };
        let result = match self.conversation().target().clone() {
            ConversationTarget::Direct { .. } => match Command::forward_user(to) {
                Some(to_user_id) => {
                    self.rest
                        .forward_dm_message(&credential, id, to_user_id)
                        .await
                }
                None => {
                    println!("! forward target must be a user id");
                    return;
                }
            },
            ConversationTarget::Room { room_id } => {
                let to_room = if to.trim().is_empty() {
                    room_id
                } else {
                    to.trim().to_owned()
                };
                self.rest
                    .forward_room_message(&credential, id, &to_room)
                    .await
            }
        };
        match result {
            Ok(()) => println!("-- forwarded #{id} --"),
            Err(err) => self.notice(err),
        }
    }

    async fn clear(&mut self) {
        let Some(peer_id) = self.peer_id() else {
            println!("! /clear is only available in direct chats");
            return;
        };
        let result = match self.credential() {
            Ok(credential) => self.rest.clear_dm_conversation(&credential, peer_id).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                self.conversation_mut().apply_local(TimelineOp::Clear);
                println!("-- conversation cleared --");
            }
            Err(err) => self.notice(err),
        }
    }

    async fn set_blocked(&mut self, blocked: bool) {
        let Some(peer_id) = self.peer_id() else {
            println!("! blocking is only available in direct chats");
            return;
        };
        let result = match self.credential() {
            Ok(credential) if blocked => self.rest.block_user(&credential, peer_id).await,
            Ok(credential) => self.rest.unblock_user(&credential, peer_id).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                self.peer_blocked = blocked;
                let verb = if blocked { "blocked" } else { "unblocked" };
                println!("-- user {peer_id} {verb} --");
            }
            Err(err) => self.notice(err),
        }
    }

    async fn set_preferences(&mut self, preferences: ConversationPreferences) {
        let Some(peer_id) = self.peer_id() else {
            println!("! mute and archive are only available in direct chats");
            return;
        };
        let result = match self.credential() {
            Ok(credential) => {
                self.rest
                    .set_dm_preferences(&credential, peer_id, &preferences)
                    .await
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => println!("-- conversation preferences saved --"),
            Err(err) => self.notice(err),
        }
    }

    async fn add_member(&mut self, username: &str) {
        let Some(room_id) = self.room_id() else {
            println!("! /add is only available in rooms");
            return;
        };
        let result = match self.credential() {
            Ok(credential) => {
                self.rest
                    .add_room_member(&credential, &room_id, username)
                    .await
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => println!("-- added @{} --", username.to_lowercase()),
            Err(err) => self.notice(err),
        }
    }

    async fn kick(&mut self, user_id: UserId) {
        let Some(room_id) = self.room_id() else {
            println!("! /kick is only available in rooms");
            return;
        };
        let result = match self.credential() {
            Ok(credential) => {
                self.rest
                    .remove_room_member(&credential, &room_id, user_id)
                    .await
            }
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => println!("-- removed user {user_id} --"),
            Err(err) => self.notice(err),
        }
    }

    /// Leave, end or delete the room. The screen quits once the backend agreed.
    async fn close_room(&mut self, command: Command) -> Flow {
        let Some(room_id) = self.room_id() else {
            println!("! this command is only available in rooms");
            return Flow::Continue;
        };
        let credential = match self.credential() {
            Ok(credential) => credential,
            Err(err) => {
                self.notice(err);
                return Flow::Continue;
            }
        };
        let (result, done) = match command {
            Command::EndRoom => (self.rest.end_room(&credential, &room_id).await, "ended"),
            Command::DeleteRoom => (self.rest.delete_room(&credential, &room_id).await, "deleted"),
            _ => (self.rest.leave_room(&credential, &room_id).await, "left"),
        };
        match result {
            Ok(()) => {
                info!(%room_id, done, "room closed");
                println!("-- room {room_id} {done} --");
                Flow::Quit
            }
            Err(err) => {
                self.notice(err);
                Flow::Continue
            }
        }
    }

    fn apply_mutation(&mut self, id: MessageId, result: Result<Value, ClientError>) {
        match result {
            Ok(response) => {
                self.conversation_mut().apply_local(TimelineOp::Merge {
                    id,
                    patch: mutation_patch(response),
                });
                self.print_message(id);
            }
            Err(err) => self.notice(err),
        }
    }

    async fn send(&self, event: OutboundEvent) {
        if let Err(err) = self.channel.send(event).await {
            warn!(error = %err, "channel send failed");
        }
    }

    /// REST failures never stop the screen; they surface as notices.
    fn notice(&mut self, err: ClientError) {
        warn!(
            code = %err.code,
            category = ?err.category,
            message = %err.message,
            "request failed"
        );
        self.conversation_mut().push_notice(err);
    }

    fn flush_notices(&mut self) {
        for notice in self.conversation_mut().take_notices() {
            println!("! {}", notice.message);
        }
    }

    fn print_message(&self, id: MessageId) {
        let conversation = self.conversation();
        if let Some(item) = conversation.timeline().get(id) {
            println!("{}", screen::render_item(conversation, item));
        }
    }

    fn print_status(&mut self, force: bool) {
        let status = screen::status_line(self.conversation());
        if force || status != self.last_status {
            println!("[{status}]");
            self.last_status = status;
        }
    }
}

fn channel_error(err: client_remote::ChannelError) -> ClientError {
    ClientError::new(
        ClientErrorCategory::Internal,
        "channel_stopped",
        err.to_string(),
    )
}
